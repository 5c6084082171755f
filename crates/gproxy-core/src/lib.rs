//! The gateway core (spec §2 steps 3-6): hook chain, client pool, recording
//! round-tripper, and protocol translator wired together behind
//! [`dispatch::Gateway`]. Routing, auth, and the SSE front-end live outside
//! this crate (§1, §2 step 7); it only exposes the interface they consume.

pub mod dispatch;
pub mod error;
pub mod registry;

pub use dispatch::{Gateway, GatewayResponse, Surface};
pub use registry::ProviderRegistry;
