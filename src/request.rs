use crate::error::Error;
use crate::extensions::Extensions;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use std::collections::HashMap;
use url::Url;

/// Everything the opening handshake needs to build the GET request and to
/// validate the matching response.
#[derive(Debug, Clone)]
pub struct HandshakeTarget {
    pub host: String,
    pub host_with_port: String,
    pub path: String,
    pub use_tls: bool,
}

/// Parses a `ws://`/`wss://` URL into the pieces needed to dial a socket and
/// to build the HTTP/1.1 upgrade request.
pub fn parse_ws_url(ws_url: &str) -> Result<HandshakeTarget, Error> {
    let parsed_url = Url::parse(ws_url)?;

    let use_tls = match parsed_url.scheme() {
        "ws" => false,
        "wss" => true,
        _ => return Err(Error::InvalidSchemeURL),
    };
    let default_port = if use_tls { 443 } else { 80 };

    let host = parsed_url.host_str().ok_or(Error::URLNoHost)?.to_string();
    let port = parsed_url.port().unwrap_or(default_port);
    let host_with_port = format!("{}:{}", host, port);

    let request_host_field = match parsed_url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.clone(),
    };

    let path = match parsed_url.query() {
        Some(query) => format!("{}?{}", parsed_url.path(), query),
        None => parsed_url.path().to_string(),
    };

    Ok(HandshakeTarget {
        host: request_host_field,
        host_with_port,
        path,
        use_tls,
    })
}

/// Builds the client opening-handshake request line + headers. The caller
/// supplies the already-generated `Sec-WebSocket-Key` so the lifecycle
/// controller can independently compute the expected accept value.
pub fn construct_http_request(
    target: &HandshakeTarget,
    key: &str,
    protocols: &[String],
    extensions: Option<&Extensions>,
    extra_headers: &[(String, String)],
    basic_auth: Option<(&str, &str)>,
) -> String {
    let mut request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: Upgrade\r\nUpgrade: websocket\r\nSec-WebSocket-Key: {}\r\nSec-WebSocket-Version: 13\r\n",
        target.path, target.host, key,
    );

    if !protocols.is_empty() {
        request.push_str(&format!(
            "Sec-WebSocket-Protocol: {}\r\n",
            protocols.join(", ")
        ));
    }

    crate::extensions::add_extension_headers(&mut request, extensions);

    for (name, value) in extra_headers {
        request.push_str(&format!("{}: {}\r\n", name, value));
    }

    if let Some((id, password)) = basic_auth {
        let encoded = BASE64_STANDARD.encode(format!("{}:{}", id, password));
        request.push_str(&format!("Authorization: Basic {}\r\n", encoded));
    }

    request.push_str("\r\n");
    request
}

/// A parsed HTTP/1.1 response (status line already resolved to a numeric code).
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn header_contains(&self, name: &str, token: &str) -> bool {
        self.header(name)
            .map(|value| {
                value
                    .split(',')
                    .any(|part| part.trim().eq_ignore_ascii_case(token))
            })
            .unwrap_or(false)
    }
}

/// Parses a complete HTTP/1.1 response (status line + headers, no body) using
/// `httparse`.
pub fn parse_http_response(raw: &[u8]) -> Result<HttpResponse, Error> {
    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut response = httparse::Response::new(&mut headers);

    match response.parse(raw)? {
        httparse::Status::Complete(_) => {}
        httparse::Status::Partial => return Err(Error::IncompleteHTTPRequest),
    }

    let status = response.code.ok_or(Error::StatusLineError)?;

    let mut header_map = HashMap::new();
    for header in response.headers.iter() {
        header_map.insert(
            header.name.to_lowercase(),
            String::from_utf8_lossy(header.value).trim().to_string(),
        );
    }

    Ok(HttpResponse {
        status,
        headers: header_map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ws_url_without_explicit_port() {
        let target = parse_ws_url("ws://example.com/chat").unwrap();
        assert_eq!(target.host, "example.com");
        assert_eq!(target.host_with_port, "example.com:80");
        assert_eq!(target.path, "/chat");
        assert!(!target.use_tls);
    }

    #[test]
    fn parses_wss_url_with_query() {
        let target = parse_ws_url("wss://example.com:9443/ws?token=abc").unwrap();
        assert_eq!(target.host, "example.com:9443");
        assert_eq!(target.host_with_port, "example.com:9443");
        assert_eq!(target.path, "/ws?token=abc");
        assert!(target.use_tls);
    }

    #[test]
    fn rejects_non_ws_scheme() {
        assert!(matches!(
            parse_ws_url("http://example.com"),
            Err(Error::InvalidSchemeURL)
        ));
    }

    #[test]
    fn builds_request_with_key_and_extensions() {
        let target = parse_ws_url("ws://example.com/chat").unwrap();
        let extensions = Extensions {
            permessage_deflate: true,
            ..Default::default()
        };
        let request = construct_http_request(
            &target,
            "dGhlIHNhbXBsZSBub25jZQ==",
            &[],
            Some(&extensions),
            &[],
            None,
        );
        assert!(request.starts_with("GET /chat HTTP/1.1\r\n"));
        assert!(request.contains("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n"));
        assert!(request.contains("Sec-WebSocket-Extensions: permessage-deflate"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[test]
    fn builds_request_with_extra_headers_and_basic_auth() {
        let target = parse_ws_url("ws://example.com/chat").unwrap();
        let request = construct_http_request(
            &target,
            "dGhlIHNhbXBsZSBub25jZQ==",
            &[],
            None,
            &[("X-Custom".to_string(), "value".to_string())],
            Some(("user", "pass")),
        );
        assert!(request.contains("X-Custom: value\r\n"));
        let auth_line = format!(
            "Authorization: Basic {}\r\n",
            base64::prelude::BASE64_STANDARD.encode("user:pass")
        );
        assert!(request.contains(&auth_line));
        // The Authorization header must come after the extra header, matching
        // the order documented for the opening handshake request.
        assert!(request.find("X-Custom").unwrap() < request.find("Authorization").unwrap());
    }

    #[test]
    fn parses_101_response() {
        let raw = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n";
        let response = parse_http_response(raw).unwrap();
        assert_eq!(response.status, 101);
        assert!(response.header_contains("upgrade", "websocket"));
        assert!(response.header_contains("connection", "Upgrade"));
    }
}
