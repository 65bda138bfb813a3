//! DatagramTransport trait - Dispatcher output interface
//!
//! One call sends one datagram; there is no connection state.

use crate::ContractError;

/// Connectionless datagram output
#[trait_variant::make(DatagramTransport: Send)]
pub trait LocalDatagramTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Send one datagram to `address:port`
    ///
    /// # Errors
    /// Returns send error (should include context)
    async fn send_to(&self, payload: &[u8], address: &str, port: u16)
        -> Result<usize, ContractError>;
}
