use crate::config::ClientConfig;
use crate::connection;
use crate::error::Error;
use crate::split::{WSReader, WSWriter};

/// Connects to `url` (`ws://` or `wss://`) using default configuration and
/// returns a split reader/writer pair once the opening handshake completes.
pub async fn connect_async(url: &str) -> Result<(WSReader, WSWriter), Error> {
    connect_async_with_config(url, ClientConfig::default()).await
}

/// Same as [`connect_async`] but with an explicit [`ClientConfig`], letting
/// callers set timeouts, proxy/TLS settings, permessage-deflate offers, and
/// subprotocols before dialing.
pub async fn connect_async_with_config(
    url: &str,
    config: ClientConfig,
) -> Result<(WSReader, WSWriter), Error> {
    connection::connect(url, config).await
}
