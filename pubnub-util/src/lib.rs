//! # PubNub utils
//!
//! Small, dependency-light helpers shared by `pubnub-core` and the root
//! `pubnub` crate: percent-encoding tuned to PubNub's URL shapes, assembly
//! of comma-separated channel/group lists, query-parameter serialization,
//! and (optional) PAM v3 request signing.
//!
//! None of this module talks to a socket; it only builds the strings the
//! Transaction State Machine sends.

#![deny(missing_docs)]

#[cfg(feature = "url-encoded-list")]
pub mod encoded_channels_list;

#[cfg(feature = "url-encoded-list")]
pub mod url_encode;

#[cfg(feature = "url-encoded-list")]
pub mod query_params;

#[cfg(feature = "pam_signature")]
pub mod pam_signature;

#[cfg(feature = "uritemplate_api")]
pub mod uritemplate_api;
