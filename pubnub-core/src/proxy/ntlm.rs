//! Microsoft NTLMv2 proxy authentication: the Type-1 (negotiate) /
//! Type-2 (challenge) / Type-3 (authenticate) message dialogue.
//!
//! §8 property 8: a Type-3 message is only ever built immediately after
//! parsing a Type-2 that itself followed our own Type-1 send; any other
//! ordering is `authentication_failed` rather than attempting a message
//! anyway.

use std::convert::TryInto;

use hmac::{Hmac, Mac, NewMac};
use md4::Digest as _;
use rand::RngCore;

use crate::error::PubnubError;

type HmacMd5 = Hmac<md5::Md5>;

const SIGNATURE: &[u8] = b"NTLMSSP\0";

bitflags::bitflags! {
    struct NegotiateFlags: u32 {
        const NEGOTIATE_UNICODE        = 0x0000_0001;
        const NEGOTIATE_NTLM           = 0x0000_0200;
        const NEGOTIATE_ALWAYS_SIGN    = 0x0000_8000;
        const NEGOTIATE_TARGET_INFO    = 0x0080_0000;
        const NEGOTIATE_VERSION        = 0x0200_0000;
        const NEGOTIATE_128            = 0x2000_0000;
        const NEGOTIATE_56             = 0x8000_0000;
    }
}

/// Where this context's NTLM dialogue is, across 407 round trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NtlmState {
    /// Nothing sent yet.
    None,
    /// Type-1 sent, awaiting Type-2.
    Type1Sent,
    /// Type-3 sent; the proxy either accepts the next request or the
    /// credentials are wrong.
    Authenticated,
}

impl Default for NtlmState {
    fn default() -> Self {
        NtlmState::None
    }
}

/// Drive one step of the NTLM dialogue for a `407` response.
///
/// `challenge_header` is the `Proxy-Authenticate` value, if any (the
/// first 407 typically carries a bare `NTLM` with no payload).
pub fn advance(
    state: &mut NtlmState,
    challenge_header: Option<&str>,
    username: &str,
    password: &str,
) -> Result<Option<String>, PubnubError> {
    match state {
        NtlmState::None => {
            let message = build_type1();
            *state = NtlmState::Type1Sent;
            Ok(Some(format!("NTLM {}", base64::encode(message))))
        }
        NtlmState::Type1Sent => {
            let header = challenge_header.ok_or_else(|| {
                PubnubError::AuthenticationFailed(
                    "proxy did not send an NTLM Type-2 challenge after our Type-1".into(),
                )
            })?;
            let payload = header.trim().strip_prefix("NTLM").map(str::trim).ok_or_else(|| {
                PubnubError::AuthenticationFailed("not an NTLM challenge".into())
            })?;
            let bytes = base64::decode(payload).map_err(|_| {
                PubnubError::AuthenticationFailed("malformed NTLM Type-2 base64".into())
            })?;
            let type2 = Type2Message::parse(&bytes)?;
            let (domain, user) = split_domain(username);
            let message = build_type3(&type2, &domain, &user, password);
            *state = NtlmState::Authenticated;
            Ok(Some(format!("NTLM {}", base64::encode(message))))
        }
        NtlmState::Authenticated => Err(PubnubError::AuthenticationFailed(
            "proxy rejected NTLM credentials after Type-3 was already sent".into(),
        )),
    }
}

fn split_domain(username: &str) -> (String, String) {
    match username.split_once('\\') {
        Some((domain, user)) => (domain.to_string(), user.to_string()),
        None => (String::new(), username.to_string()),
    }
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

fn build_type1() -> Vec<u8> {
    let flags = NegotiateFlags::NEGOTIATE_UNICODE
        | NegotiateFlags::NEGOTIATE_NTLM
        | NegotiateFlags::NEGOTIATE_ALWAYS_SIGN;
    let mut message = Vec::with_capacity(32);
    message.extend_from_slice(SIGNATURE);
    message.extend_from_slice(&1u32.to_le_bytes());
    message.extend_from_slice(&flags.bits().to_le_bytes());
    message
}

struct Type2Message {
    negotiate_flags: u32,
    server_challenge: [u8; 8],
    target_info: Vec<u8>,
}

impl Type2Message {
    fn parse(bytes: &[u8]) -> Result<Self, PubnubError> {
        if bytes.len() < 32 || &bytes[0..8] != SIGNATURE {
            return Err(PubnubError::AuthenticationFailed(
                "NTLM Type-2 signature mismatch".into(),
            ));
        }
        let message_type = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        if message_type != 2 {
            return Err(PubnubError::AuthenticationFailed(
                "expected NTLM message type 2".into(),
            ));
        }
        let negotiate_flags = u32::from_le_bytes(bytes[20..24].try_into().unwrap());
        let mut server_challenge = [0u8; 8];
        server_challenge.copy_from_slice(&bytes[24..32]);

        let target_info = if negotiate_flags & NegotiateFlags::NEGOTIATE_TARGET_INFO.bits() != 0
            && bytes.len() >= 48
        {
            let len = u16::from_le_bytes(bytes[40..42].try_into().unwrap()) as usize;
            let offset = u32::from_le_bytes(bytes[44..48].try_into().unwrap()) as usize;
            bytes
                .get(offset..offset + len)
                .map(|s| s.to_vec())
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Type2Message {
            negotiate_flags,
            server_challenge,
            target_info,
        })
    }
}

/// `NTOWFv2 = HMAC-MD5(MD4(UTF16(password)), UTF16(UPPER(username) + domain))`.
fn ntowf_v2(username: &str, domain: &str, password: &str) -> [u8; 16] {
    let mut md4 = md4::Md4::new();
    md4.update(utf16le(password));
    let password_hash = md4.finalize();

    let identity = utf16le(&format!("{}{}", username.to_uppercase(), domain));
    let mut mac = HmacMd5::new_varkey(&password_hash).expect("HMAC accepts any key length");
    mac.update(&identity);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; 16];
    out.copy_from_slice(&result);
    out
}

fn build_type3(challenge: &Type2Message, domain: &str, username: &str, password: &str) -> Vec<u8> {
    let ntowf = ntowf_v2(username, domain, password);

    let mut client_challenge = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut client_challenge);

    // blob = responserversion(1) hiresponserversion(1) Z(6) time(8)
    //        client_challenge(8) Z(4) target_info Z(4)
    let mut blob = Vec::new();
    blob.push(0x01);
    blob.push(0x01);
    blob.extend_from_slice(&[0u8; 6]);
    blob.extend_from_slice(&0u64.to_le_bytes()); // timestamp, filled by caller if needed
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(&challenge.target_info);
    blob.extend_from_slice(&[0u8; 4]);

    let mut nt_proof_input = challenge.server_challenge.to_vec();
    nt_proof_input.extend_from_slice(&blob);
    let mut mac = HmacMd5::new_varkey(&ntowf).expect("HMAC accepts any key length");
    mac.update(&nt_proof_input);
    let nt_proof_str = mac.finalize().into_bytes();

    let mut nt_challenge_response = nt_proof_str.to_vec();
    nt_challenge_response.extend_from_slice(&blob);

    let mut lm_input = challenge.server_challenge.to_vec();
    lm_input.extend_from_slice(&client_challenge);
    let mut mac = HmacMd5::new_varkey(&ntowf).expect("HMAC accepts any key length");
    mac.update(&lm_input);
    let mut lm_challenge_response = mac.finalize().into_bytes().to_vec();
    lm_challenge_response.extend_from_slice(&client_challenge);

    let domain_utf16 = utf16le(domain);
    let user_utf16 = utf16le(username);
    let workstation_utf16 = utf16le("");

    // Fixed header: signature(8) type(4) lm_resp(8) nt_resp(8) domain(8)
    // user(8) workstation(8) session_key(8) flags(4) = 64 bytes, then
    // the variable-length fields follow in that field order.
    let header_len = 64u32;
    let lm_offset = header_len;
    let nt_offset = lm_offset + lm_challenge_response.len() as u32;
    let domain_offset = nt_offset + nt_challenge_response.len() as u32;
    let user_offset = domain_offset + domain_utf16.len() as u32;
    let workstation_offset = user_offset + user_utf16.len() as u32;

    let mut message = Vec::new();
    message.extend_from_slice(SIGNATURE);
    message.extend_from_slice(&3u32.to_le_bytes());

    push_field(&mut message, lm_challenge_response.len() as u16, lm_offset);
    push_field(&mut message, nt_challenge_response.len() as u16, nt_offset);
    push_field(&mut message, domain_utf16.len() as u16, domain_offset);
    push_field(&mut message, user_utf16.len() as u16, user_offset);
    push_field(&mut message, workstation_utf16.len() as u16, workstation_offset);
    push_field(&mut message, 0, workstation_offset + workstation_utf16.len() as u32); // session key (empty)

    let flags = NegotiateFlags::NEGOTIATE_UNICODE
        | NegotiateFlags::NEGOTIATE_NTLM
        | NegotiateFlags::NEGOTIATE_ALWAYS_SIGN;
    message.extend_from_slice(&(challenge.negotiate_flags & flags.bits()).to_le_bytes());

    message.extend_from_slice(&lm_challenge_response);
    message.extend_from_slice(&nt_challenge_response);
    message.extend_from_slice(&domain_utf16);
    message.extend_from_slice(&user_utf16);
    message.extend_from_slice(&workstation_utf16);

    message
}

fn push_field(message: &mut Vec<u8>, len: u16, offset: u32) {
    message.extend_from_slice(&len.to_le_bytes());
    message.extend_from_slice(&len.to_le_bytes());
    message.extend_from_slice(&offset.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_advance_sends_type1() {
        let mut state = NtlmState::default();
        let result = advance(&mut state, None, "user", "pass").unwrap();
        assert_eq!(state, NtlmState::Type1Sent);
        let header = result.unwrap();
        assert!(header.starts_with("NTLM "));
        let decoded = base64::decode(header.trim_start_matches("NTLM ")).unwrap();
        assert_eq!(&decoded[0..8], SIGNATURE);
        assert_eq!(u32::from_le_bytes(decoded[8..12].try_into().unwrap()), 1);
    }

    #[test]
    fn type2_only_accepted_after_type1() {
        let mut state = NtlmState::Authenticated;
        let result = advance(&mut state, Some("NTLM garbage"), "user", "pass");
        assert!(matches!(result, Err(PubnubError::AuthenticationFailed(_))));
    }

    #[test]
    fn type1_then_type2_yields_type3() {
        let mut state = NtlmState::default();
        advance(&mut state, None, "user", "pass").unwrap();

        let mut type2 = Vec::new();
        type2.extend_from_slice(SIGNATURE);
        type2.extend_from_slice(&2u32.to_le_bytes());
        type2.extend_from_slice(&0u16.to_le_bytes()); // target name len
        type2.extend_from_slice(&0u16.to_le_bytes()); // target name maxlen
        type2.extend_from_slice(&0u32.to_le_bytes()); // target name offset
        type2.extend_from_slice(&0u32.to_le_bytes()); // negotiate flags (no target info)
        type2.extend_from_slice(&[0xAAu8; 8]); // server challenge
        type2.extend_from_slice(&[0u8; 8]); // reserved

        let header_value = format!("NTLM {}", base64::encode(&type2));
        let result = advance(&mut state, Some(&header_value), "DOMAIN\\user", "pass").unwrap();
        assert_eq!(state, NtlmState::Authenticated);
        assert!(result.unwrap().starts_with("NTLM "));
    }

    #[test]
    fn missing_type2_after_type1_is_authentication_failed() {
        let mut state = NtlmState::Type1Sent;
        let result = advance(&mut state, None, "user", "pass");
        assert!(matches!(result, Err(PubnubError::AuthenticationFailed(_))));
    }
}
