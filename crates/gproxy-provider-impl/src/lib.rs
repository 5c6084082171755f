pub mod client_pool;
pub mod hooks;
pub mod recording;
pub mod tls;
pub mod transport;

pub use client_pool::{ClientPool, PooledClient};
pub use hooks::default_registry;
pub use recording::{RecordingBuffer, SingleFireRecorder};
pub use transport::{PooledTransport, SharedTransportPool, TransportPool};
