pub mod config;
pub mod logging;

// Signing core: buffered framing, retry, wire protocol, client.
pub mod client;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod retry;
pub mod stream;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::{SignatureProvider, SigningClient};
pub use error::{ErrorKind, SignError};
