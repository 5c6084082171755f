//! Shared types for the gateway's transport stack and client pool: the
//! `Provider` configuration record, the cache keys that decide transport
//! and client sharing, the hook and recording-sink interfaces, and the
//! error kinds everything downstream reports through.

pub mod config;
pub mod errors;
pub mod headers;
pub mod hooks;
pub mod keys;
pub mod provider;
pub mod recorded;
pub mod sink;

pub use errors::{GatewayError, GatewayResult};
pub use keys::{ClientKey, TransportKey};
pub use provider::{Auth, Dialect, OAuthDetail, OAuthProviderKind, Provider, TlsFingerprint};
