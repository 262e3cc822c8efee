use crate::extensions::Extensions;
use std::time::Duration;

/// Controls which address families the Happy-Eyeballs socket initiator races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DualStackMode {
    #[default]
    Both,
    Ipv4Only,
    Ipv6Only,
}

#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    pub secure: bool,
    pub host: String,
    pub port: u16,
    pub id: Option<String>,
    pub password: Option<String>,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Path to a PEM file with extra trust roots, added on top of `webpki-roots`.
    pub ca_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub max_frame_size: Option<usize>,
    pub max_message_size: Option<usize>,
    pub connect_timeout: Duration,
    pub fallback_delay: Duration,
    pub dual_stack_mode: DualStackMode,
    pub server_names: Vec<String>,
    pub auto_flush: bool,
    pub ping_interval: Option<Duration>,
    pub pong_interval: Option<Duration>,
    pub extended: bool,
    pub missing_close_frame_allowed: bool,
    pub close_timeout: Duration,
    pub extensions: Option<Extensions>,
    /// Subprotocols offered via `Sec-WebSocket-Protocol`, in preference order.
    pub protocols: Vec<String>,
    /// Extra headers appended to the opening-handshake request, in order,
    /// after the standard upgrade headers and before `Authorization`.
    pub headers: Vec<(String, String)>,
    /// `id:password` sent as `Authorization: Basic` on the opening handshake.
    pub basic_auth: Option<(String, String)>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_message_size: Some(64 << 20),
            max_frame_size: Some(16 << 20),
            connect_timeout: Duration::from_secs(10),
            fallback_delay: Duration::from_millis(250),
            dual_stack_mode: DualStackMode::Both,
            server_names: Vec::new(),
            auto_flush: true,
            ping_interval: None,
            pong_interval: None,
            extended: false,
            missing_close_frame_allowed: false,
            close_timeout: Duration::from_secs(5),
            extensions: None,
            protocols: Vec::new(),
            headers: Vec::new(),
            basic_auth: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub web_socket_config: WebSocketConfig,
    pub tls: TlsConfig,
    pub proxy: Option<ProxyConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = WebSocketConfig::default();
        assert_eq!(config.dual_stack_mode, DualStackMode::Both);
        assert!(config.auto_flush);
        assert!(config.extensions.is_none());
    }
}
