//! RFC 7616 Digest proxy authentication (MD5 default, SHA-256 and
//! SHA-512-256 also accepted), including `qop`/`stale` handling.

use md5::Digest as _;
use rand::RngCore;
use sha2::Digest as Sha2Digest;

use crate::error::PubnubError;

/// The hash algorithm negotiated for this Digest dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// `algorithm` absent or `MD5` (the default).
    Md5,
    /// `algorithm=SHA-256`.
    Sha256,
    /// `algorithm=SHA-512-256`.
    Sha512_256,
}

impl Algorithm {
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_uppercase).as_deref() {
            Some("SHA-256") | Some("SHA-256-SESS") => Algorithm::Sha256,
            Some("SHA-512-256") | Some("SHA-512-256-SESS") => Algorithm::Sha512_256,
            _ => Algorithm::Md5,
        }
    }

    fn hash_hex(self, input: &str) -> String {
        match self {
            Algorithm::Md5 => {
                let mut hasher = md5::Md5::new();
                hasher.update(input.as_bytes());
                hex_encode(&hasher.finalize())
            }
            Algorithm::Sha256 => {
                let mut hasher = sha2::Sha256::new();
                hasher.update(input.as_bytes());
                hex_encode(&hasher.finalize())
            }
            Algorithm::Sha512_256 => {
                let mut hasher = sha2::Sha512Trunc256::new();
                hasher.update(input.as_bytes());
                hex_encode(&hasher.finalize())
            }
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Which `qop` (quality of protection) directive is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qop {
    /// `qop=auth`.
    Auth,
    /// `qop=auth-int` — `HA2` folds in a hash of the request body.
    AuthInt,
}

/// A parsed `Proxy-Authenticate: Digest ...` (or `WWW-Authenticate`)
/// challenge.
#[derive(Debug, Clone)]
pub struct Challenge {
    /// `realm`.
    pub realm: String,
    /// `nonce`.
    pub nonce: String,
    /// `opaque`, if present.
    pub opaque: Option<String>,
    /// Negotiated algorithm.
    pub algorithm: Algorithm,
    /// Preferred `qop`, if the server offered one.
    pub qop: Option<Qop>,
    /// `stale=TRUE`.
    pub stale: bool,
}

impl Challenge {
    /// Parse the header value following the `Digest` scheme token.
    pub fn parse(header_value: &str) -> Result<Self, PubnubError> {
        let rest = header_value
            .trim()
            .strip_prefix("Digest")
            .ok_or_else(|| {
                PubnubError::AuthenticationFailed("not a Digest challenge".into())
            })?
            .trim();

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut algorithm = None;
        let mut qop = None;
        let mut stale = false;

        for pair in split_challenge_pairs(rest) {
            let (key, value) = pair;
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value.to_string()),
                "nonce" => nonce = Some(value.to_string()),
                "opaque" => opaque = Some(value.to_string()),
                "algorithm" => algorithm = Some(value.to_string()),
                "stale" => stale = value.eq_ignore_ascii_case("true"),
                "qop" => {
                    // May list several: "auth,auth-int"; prefer "auth".
                    qop = if value.split(',').any(|q| q.trim() == "auth") {
                        Some(Qop::Auth)
                    } else if value.split(',').any(|q| q.trim() == "auth-int") {
                        Some(Qop::AuthInt)
                    } else {
                        None
                    };
                }
                _ => {}
            }
        }

        let realm = realm.ok_or_else(|| {
            PubnubError::AuthenticationFailed("Digest challenge missing realm".into())
        })?;
        let nonce = nonce.ok_or_else(|| {
            PubnubError::AuthenticationFailed("Digest challenge missing nonce".into())
        })?;

        Ok(Challenge {
            realm,
            nonce,
            opaque,
            algorithm: Algorithm::parse(algorithm.as_deref()),
            qop,
            stale,
        })
    }
}

/// Split `key=value, key="value", ...` into `(key, value)` pairs,
/// stripping surrounding quotes from values.
fn split_challenge_pairs(input: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if let Some(idx) = part.find('=') {
            let key = part[..idx].trim().to_string();
            let value = part[idx + 1..].trim().trim_matches('"').to_string();
            pairs.push((key, value));
        }
    }
    pairs
}

/// Accumulated state for a Digest dialogue on one proxy connection.
/// `nc` persists and strictly increases within a `(realm, nonce)` pair
/// (§8 property 7); it resets to `0` (so the next computed response uses
/// `1`) whenever the nonce changes.
#[derive(Debug, Clone)]
pub struct DigestState {
    realm: String,
    nonce: String,
    cnonce: String,
    nc: u32,
    qop: Option<Qop>,
    opaque: Option<String>,
    algorithm: Algorithm,
}

impl Default for DigestState {
    fn default() -> Self {
        DigestState {
            realm: String::new(),
            nonce: String::new(),
            cnonce: String::new(),
            nc: 0,
            qop: None,
            opaque: None,
            algorithm: Algorithm::Md5,
        }
    }
}

impl DigestState {
    /// The current nonce-count, as the zero-padded 8-hex-digit string the
    /// wire format expects.
    #[must_use]
    pub fn nc_hex(&self) -> String {
        format!("{:08x}", self.nc)
    }
}

/// Generate a cryptographically strong client nonce (§9 open question:
/// the source seeded its PRNG from wall-clock time; this uses the OS CSPRNG).
fn generate_cnonce() -> String {
    let mut bytes = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

/// Apply a new challenge to `state`, enforcing the restart/failure rules
/// from §4.3: a repeated nonce without `stale=TRUE` (or a realm that
/// doesn't match what we started with) is `authentication_failed`; a
/// `stale=TRUE` challenge restarts the dialogue with the new nonce and
/// resets `nc`.
pub fn advance(state: &mut DigestState, challenge: &Challenge) -> Result<(), PubnubError> {
    let is_first_contact = state.nonce.is_empty();
    let same_nonce = !is_first_contact && state.nonce == challenge.nonce;

    if same_nonce && !challenge.stale {
        return Err(PubnubError::AuthenticationFailed(
            "proxy repeated the same Digest nonce without stale=TRUE".into(),
        ));
    }
    if !is_first_contact && state.realm != challenge.realm {
        return Err(PubnubError::AuthenticationFailed(
            "proxy changed Digest realm mid-dialogue".into(),
        ));
    }

    state.realm = challenge.realm.clone();
    state.nonce = challenge.nonce.clone();
    state.opaque = challenge.opaque.clone();
    state.algorithm = challenge.algorithm;
    state.qop = challenge.qop;
    state.nc = 0;
    state.cnonce = generate_cnonce();
    Ok(())
}

/// Build the `Proxy-Authorization: Digest ...` header value for
/// `method`/`uri` and, for `qop=auth-int`, `body`. Bumps `state.nc` (and
/// generates a fresh `cnonce`) for this request; `nc` persists across
/// calls on the same `state` so it strictly increases for the life of
/// the `(realm, nonce)` pair, matching §8 property 7.
pub fn authorization_header(
    state: &mut DigestState,
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
    body: &[u8],
) -> String {
    state.nc += 1;
    let algorithm = state.algorithm;

    let ha1 = algorithm.hash_hex(&format!("{}:{}:{}", username, state.realm, password));
    let ha2 = match state.qop {
        Some(Qop::AuthInt) => {
            let body_hash = algorithm.hash_hex(&String::from_utf8_lossy(body));
            algorithm.hash_hex(&format!("{}:{}:{}", method, uri, body_hash))
        }
        _ => algorithm.hash_hex(&format!("{}:{}", method, uri)),
    };

    let qop_str = match state.qop {
        Some(Qop::Auth) => "auth",
        Some(Qop::AuthInt) => "auth-int",
        None => "",
    };

    let response = if state.qop.is_some() {
        algorithm.hash_hex(&format!(
            "{}:{}:{}:{}:{}:{}",
            ha1,
            state.nonce,
            state.nc_hex(),
            state.cnonce,
            qop_str,
            ha2
        ))
    } else {
        algorithm.hash_hex(&format!("{}:{}:{}", ha1, state.nonce, ha2))
    };

    let mut header = format!(
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\"",
        username, state.realm, state.nonce, uri, response
    );
    if let Some(opaque) = &state.opaque {
        header.push_str(&format!(", opaque=\"{}\"", opaque));
    }
    if let Some(qop) = state.qop {
        let qop_token = match qop {
            Qop::Auth => "auth",
            Qop::AuthInt => "auth-int",
        };
        header.push_str(&format!(
            ", qop={}, nc={}, cnonce=\"{}\"",
            qop_token,
            state.nc_hex(),
            state.cnonce
        ));
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc_style_challenge() {
        let header = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;
        let challenge = Challenge::parse(header).unwrap();
        assert_eq!(challenge.realm, "testrealm@host.com");
        assert_eq!(challenge.nonce, "dcd98b7102dd2f0e8b11d0f600bfb0c093");
        assert_eq!(challenge.qop, Some(Qop::Auth));
        assert!(!challenge.stale);
    }

    #[test]
    fn nc_starts_at_one_and_increments() {
        let mut state = DigestState::default();
        let challenge = Challenge {
            realm: "r".into(),
            nonce: "n1".into(),
            opaque: None,
            algorithm: Algorithm::Md5,
            qop: Some(Qop::Auth),
            stale: false,
        };
        advance(&mut state, &challenge).unwrap();

        let mut bump_state = state.clone();
        authorization_header(&mut bump_state, "u", "p", "GET", "/x", b"");
        assert_eq!(bump_state.nc_hex(), "00000001");
        authorization_header(&mut bump_state, "u", "p", "GET", "/x", b"");
        assert_eq!(bump_state.nc_hex(), "00000002");
    }

    #[test]
    fn nc_resets_on_new_nonce() {
        let mut state = DigestState::default();
        let challenge1 = Challenge {
            realm: "r".into(),
            nonce: "n1".into(),
            opaque: None,
            algorithm: Algorithm::Md5,
            qop: Some(Qop::Auth),
            stale: false,
        };
        advance(&mut state, &challenge1).unwrap();
        authorization_header(&mut state, "u", "p", "GET", "/x", b"");
        assert_eq!(state.nc_hex(), "00000001");

        let challenge2 = Challenge {
            stale: true,
            nonce: "n2".into(),
            ..challenge1
        };
        advance(&mut state, &challenge2).unwrap();
        authorization_header(&mut state, "u", "p", "GET", "/x", b"");
        assert_eq!(state.nc_hex(), "00000001");
    }

    #[test]
    fn repeated_nonce_without_stale_fails() {
        let mut state = DigestState::default();
        let challenge = Challenge {
            realm: "r".into(),
            nonce: "n1".into(),
            opaque: None,
            algorithm: Algorithm::Md5,
            qop: Some(Qop::Auth),
            stale: false,
        };
        advance(&mut state, &challenge).unwrap();
        let result = advance(&mut state, &challenge);
        assert!(matches!(result, Err(PubnubError::AuthenticationFailed(_))));
    }

    #[test]
    fn header_contains_expected_fields() {
        let mut state = DigestState::default();
        let challenge = Challenge {
            realm: "testrealm@host.com".into(),
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".into(),
            opaque: Some("5ccc069c403ebaf9f0171e9517f40e41".into()),
            algorithm: Algorithm::Md5,
            qop: Some(Qop::AuthInt),
            stale: false,
        };
        advance(&mut state, &challenge).unwrap();
        let header = authorization_header(&mut state, "Mufasa", "Circle Of Life", "GET", "/dir/index.html", b"");
        assert!(header.starts_with("Digest username=\"Mufasa\""));
        assert!(header.contains("qop=auth-int"));
        assert!(header.contains("nc=00000001"));
    }
}
