use crate::compression::{Decoder, Encoder};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::extensions;
use crate::frame::Frame;
use crate::happy_eyeballs;
use crate::listener::ListenerRegistry;
use crate::proxy;
use crate::read::ReadStream;
use crate::request::{self, HandshakeTarget};
use crate::split::{WSReader, WSWriter};
use crate::state::{CloseTracker, ConnectionState, SharedState};
use crate::stream::SocketFlowStream;
use crate::tls;
use crate::utils;
use crate::write::Writer;
use std::sync::Arc;
use tokio::io::{split, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;

const MESSAGE_CHANNEL_CAPACITY: usize = 128;
const RESPONSE_READ_BUFFER: usize = 4096;

fn split_host_port(host_with_port: &str) -> Result<(String, u16), Error> {
    let (host, port) = host_with_port.rsplit_once(':').ok_or(Error::URLNoPort)?;
    let port: u16 = port.parse().map_err(|_| Error::URLNoPort)?;
    Ok((host.to_string(), port))
}

async fn dial(target: &HandshakeTarget, config: &ClientConfig) -> Result<SocketFlowStream, Error> {
    let (host, port) = split_host_port(&target.host_with_port)?;
    let sni = config
        .web_socket_config
        .server_names
        .first()
        .map(String::as_str)
        .unwrap_or(&host);

    if let Some(proxy) = &config.proxy {
        return proxy::connect_via_proxy(
            proxy,
            &host,
            port,
            target.use_tls,
            &config.web_socket_config,
            &config.tls,
        )
        .await;
    }

    let tcp = happy_eyeballs::connect(&host, port, &config.web_socket_config).await?;
    if target.use_tls {
        tls::overlay_tls(tcp, sni, &config.tls).await
    } else {
        Ok(SocketFlowStream::Plain(tcp))
    }
}

/// Reads raw bytes off `stream` until a full HTTP header block (terminated by
/// a blank line) has been buffered, then returns the accumulated bytes.
async fn read_header_block(stream: &mut SocketFlowStream) -> Result<Vec<u8>, Error> {
    let mut buffer = vec![0u8; RESPONSE_READ_BUFFER];
    let mut filled = 0;
    loop {
        if filled == buffer.len() {
            buffer.resize(buffer.len() * 2, 0);
        }
        let n = stream.read(&mut buffer[filled..]).await?;
        if n == 0 {
            return Err(Error::OpeningHandshakeError(
                "connection closed before the handshake response completed".to_string(),
            ));
        }
        filled += n;
        if buffer[..filled].windows(4).any(|w| w == b"\r\n\r\n") {
            return Ok(buffer[..filled].to_vec());
        }
    }
}

const BODY_PREVIEW_LIMIT: usize = 512;

/// Whatever trailed the `\r\n\r\n` header terminator in the bytes already read
/// off the wire, capped and lossily decoded for diagnosing a rejected
/// handshake (e.g. an auth error page behind a 401).
fn body_preview_after_headers(raw_response: &[u8]) -> String {
    let header_end = raw_response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| i + 4)
        .unwrap_or(raw_response.len());
    let body = &raw_response[header_end..raw_response.len().min(header_end + BODY_PREVIEW_LIMIT)];
    String::from_utf8_lossy(body).to_string()
}

/// Performs the RFC 6455 opening handshake: sends the GET upgrade request and
/// validates the server's 101 response, including permessage-deflate
/// negotiation and Sec-WebSocket-Accept verification.
async fn perform_opening_handshake(
    stream: &mut SocketFlowStream,
    target: &HandshakeTarget,
    config: &ClientConfig,
) -> Result<Option<extensions::Extensions>, Error> {
    let key = utils::generate_websocket_key();
    let offered_extensions = config.web_socket_config.extensions.clone();

    let basic_auth = config
        .web_socket_config
        .basic_auth
        .as_ref()
        .map(|(id, password)| (id.as_str(), password.as_str()));
    let http_request = request::construct_http_request(
        target,
        &key,
        &config.web_socket_config.protocols,
        offered_extensions.as_ref(),
        &config.web_socket_config.headers,
        basic_auth,
    );
    stream.write_all(http_request.as_bytes()).await?;
    stream.flush().await?;

    let raw_response = read_header_block(stream).await?;
    let response = request::parse_http_response(&raw_response)?;

    if response.status != 101 {
        return Err(Error::NotSwitchingProtocols {
            status: response.status,
            headers: response.headers.clone(),
            body_preview: body_preview_after_headers(&raw_response),
        });
    }
    if response.header("upgrade").is_none() {
        return Err(Error::NoUpgradeHeader);
    }
    if !response.header_contains("upgrade", "websocket") {
        return Err(Error::NoWebsocketInUpgradeHeader);
    }
    if response.header("connection").is_none() {
        return Err(Error::NoConnectionHeader);
    }
    if !response.header_contains("connection", "upgrade") {
        return Err(Error::NoUpgradeInConnectionHeader);
    }

    let expected_accept = utils::generate_websocket_accept_value(&key);
    if response.header("sec-websocket-accept") != Some(expected_accept.as_str()) {
        return Err(Error::UnexpectedSecWebSocketAccept);
    }

    if let Some(protocol) = response.header("sec-websocket-protocol") {
        if !config
            .web_socket_config
            .protocols
            .iter()
            .any(|p| p.eq_ignore_ascii_case(protocol))
        {
            return Err(Error::UnsupportedProtocol(protocol.to_string()));
        }
    }

    match response.header("sec-websocket-extensions") {
        Some(value) => extensions::validate_negotiated_extensions(value, offered_extensions.as_ref()),
        None => Ok(None),
    }
}

/// Establishes a client WebSocket connection end-to-end: dials the socket
/// (racing Happy-Eyeballs candidates, optionally through a proxy CONNECT
/// tunnel), overlays TLS if `wss://`, performs the opening handshake, and
/// spawns the reader task and periodical ping sender. Returns a split
/// reader/writer pair.
pub async fn connect(url: &str, config: ClientConfig) -> Result<(WSReader, WSWriter), Error> {
    let target = request::parse_ws_url(url)?;
    let mut stream = dial(&target, &config).await?;
    let negotiated_extensions = perform_opening_handshake(&mut stream, &target, &config).await?;

    let mut web_socket_config = config.web_socket_config.clone();
    web_socket_config.extensions = negotiated_extensions.clone();

    let (encoder_reset, encoder_bits, decoder_reset, decoder_bits) = match &negotiated_extensions {
        Some(ext) => (
            ext.client_no_context_takeover.unwrap_or(false),
            ext.client_max_window_bits,
            ext.server_no_context_takeover.unwrap_or(false),
            ext.server_max_window_bits,
        ),
        None => (false, None, false, None),
    };
    let encoder = Encoder::new(encoder_reset, encoder_bits);
    let decoder = Decoder::new(decoder_reset, decoder_bits);

    let (read_half, write_half) = split(stream);
    let buf_reader = BufReader::new(read_half);
    let writer = Arc::new(Mutex::new(Writer::new(write_half)));

    let (message_tx, message_rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);

    let listeners = ListenerRegistry::new();
    let close_tracker = CloseTracker::new();
    let state = SharedState::new();
    state.set(ConnectionState::Open);

    spawn_reader(
        buf_reader,
        message_tx,
        writer.clone(),
        web_socket_config.clone(),
        decoder,
        listeners.clone(),
        close_tracker.clone(),
        state.clone(),
    );

    if let Some(interval) = web_socket_config.ping_interval {
        spawn_periodical_sender(writer.clone(), state.clone(), interval, Frame::ping);
    }
    if let Some(interval) = web_socket_config.pong_interval {
        spawn_periodical_sender(writer.clone(), state.clone(), interval, Frame::pong);
    }

    let ws_writer = WSWriter::new(
        writer,
        web_socket_config,
        encoder,
        listeners.clone(),
        close_tracker,
        state,
    );
    let ws_reader = WSReader::new(ReceiverStream::new(message_rx));

    listeners.on_connected();

    Ok((ws_reader, ws_writer))
}

#[allow(clippy::too_many_arguments)]
fn spawn_reader(
    buf_reader: tokio::io::BufReader<tokio::io::ReadHalf<SocketFlowStream>>,
    message_tx: mpsc::Sender<Result<crate::message::Message, Error>>,
    writer: Arc<Mutex<Writer>>,
    config: crate::config::WebSocketConfig,
    decoder: Decoder,
    listeners: ListenerRegistry,
    close_tracker: CloseTracker,
    state: SharedState,
) {
    tokio::spawn(async move {
        let mut read_stream = ReadStream::new(
            buf_reader,
            message_tx,
            writer,
            config,
            decoder,
            listeners.clone(),
            close_tracker,
        );

        let outcome = read_stream.run().await;
        state.set(ConnectionState::Closed);

        match outcome {
            Ok(close) => listeners.on_disconnected(
                close.server_close_received,
                close.client_close_sent,
                close.closed_by_server,
            ),
            Err(error) => {
                listeners.on_error(&error);
                listeners.on_disconnected(false, false, false);
            }
        }
    });
}

/// Spawns a periodical keepalive sender (§4.7): fires `build_frame(payload)`
/// at `interval` while the connection is OPEN, stopping as soon as it
/// observes anything else (CLOSING/CLOSED). The payload generator here is
/// always an empty vector; a caller needing application-chosen payloads
/// would plug a different generator into `build_frame`.
fn spawn_periodical_sender(
    writer: Arc<Mutex<Writer>>,
    state: SharedState,
    interval: std::time::Duration,
    build_frame: fn(Vec<u8>) -> Frame,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if state.get() != ConnectionState::Open {
                break;
            }
            let mut guard = writer.lock().await;
            if guard.write_frame(build_frame(Vec::new()), false).await.is_err() {
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Reads bytes off `socket` until a full HTTP header block is buffered,
    /// mirroring `read_header_block` on the server side of the fixture.
    async fn read_request_headers(socket: &mut TcpStream) -> String {
        let mut buffer = vec![0u8; 4096];
        let mut filled = 0;
        loop {
            let n = socket.read(&mut buffer[filled..]).await.unwrap();
            filled += n;
            if buffer[..filled].windows(4).any(|w| w == b"\r\n\r\n") {
                return String::from_utf8_lossy(&buffer[..filled]).to_string();
            }
        }
    }

    fn extract_key(request: &str) -> String {
        request
            .lines()
            .find_map(|line| line.strip_prefix("Sec-WebSocket-Key: "))
            .unwrap()
            .trim()
            .to_string()
    }

    fn server_text_frame(payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0x81, payload.len() as u8];
        frame.extend_from_slice(payload);
        frame
    }

    fn server_close_frame(status: u16, reason: &str) -> Vec<u8> {
        let mut payload = status.to_be_bytes().to_vec();
        payload.extend_from_slice(reason.as_bytes());
        let mut frame = vec![0x88, payload.len() as u8];
        frame.extend_from_slice(&payload);
        frame
    }

    /// End-to-end scenario 1 (spec.md §8): connect, receive a TEXT message,
    /// observe the server-initiated close handshake complete with
    /// `closed_by_server = true`.
    #[tokio::test]
    async fn full_round_trip_against_a_fake_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request_headers(&mut socket).await;
            let key = extract_key(&request);
            let accept = crate::utils::generate_websocket_accept_value(&key);

            let response = format!(
                "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {accept}\r\n\r\n"
            );
            socket.write_all(response.as_bytes()).await.unwrap();

            socket.write_all(&server_text_frame(b"world")).await.unwrap();
            socket
                .write_all(&server_close_frame(1000, "bye"))
                .await
                .unwrap();

            // Drain the client's echoing CLOSE frame before dropping the socket.
            let mut drain = [0u8; 32];
            let _ = socket.read(&mut drain).await;
        });

        let url = format!("ws://{addr}");
        let (mut reader, _writer) = connect(&url, ClientConfig::default()).await.unwrap();

        let message = reader.next().await.unwrap().unwrap();
        assert_eq!(message, crate::message::Message::Text("world".to_string()));

        // The reader task exits once the close handshake completes, closing
        // the channel; no further messages are delivered.
        assert!(reader.next().await.is_none());

        server.await.unwrap();
    }
}
