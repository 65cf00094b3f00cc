//! Networking: wire protocol, framing, WebTransport sessions and HTTP control endpoints

pub mod framing;
pub mod gateway;
pub mod http;
pub mod protocol;
pub mod tls;
pub mod transport;
