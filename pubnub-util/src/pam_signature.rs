//! PAM v3 request signing (`HMAC-SHA256` over the canonical request
//! string, base64-encoded). Carried over from the teacher crate's
//! `pam_signature` feature; PubNub Access Manager itself is out of this
//! port's scope, but the signing primitive is small and shared, so it
//! stays behind its own optional feature rather than being deleted.

use hmac::{Hmac, Mac, NewMac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Sign `string_to_sign` with `secret_key`, returning the URL-safe base64
/// signature PAM expects in the `signature` query parameter.
///
/// # Errors
///
/// Returns an error string if `secret_key` is empty (HMAC key length is
/// otherwise unconstrained).
pub fn sign(secret_key: &str, string_to_sign: &str) -> Result<String, String> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|e| format!("invalid PAM secret key: {}", e))?;
    mac.update(string_to_sign.as_bytes());
    let result = mac.finalize().into_bytes();
    Ok(base64::encode(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_deterministically() {
        let a = sign("secret", "GET\ndemo\n/v2/auth/grant\npnsdk=test").unwrap();
        let b = sign("secret", "GET\ndemo\n/v2/auth/grant\npnsdk=test").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_differ() {
        let a = sign("secret", "one").unwrap();
        let b = sign("secret", "two").unwrap();
        assert_ne!(a, b);
    }
}
