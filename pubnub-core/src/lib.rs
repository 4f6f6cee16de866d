//! Heavy lifting behind the `pubnub` facade crate: buffers, HTTP framing,
//! proxy authentication, the connection engine, the transaction state
//! machine, and the subscribe event engine.

#![deny(missing_docs)]

pub mod buffer;
pub mod connection;
pub mod context;
pub mod context_pool;
pub mod error;
pub mod http;
pub mod logging;
pub mod proxy;
pub mod subscribe;
pub mod transaction;

pub use error::PubnubError;
