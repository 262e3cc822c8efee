use crate::frame::Frame;
use httparse::Error as HttpParseError;
use pki_types::InvalidDnsNameError;
use std::collections::HashMap;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError;
use tokio::time::error::Elapsed;
use url::ParseError;

#[derive(Error, Debug)]
pub enum Error {
    // Channel / task errors
    #[error("{source}")]
    SendError {
        #[from]
        source: SendError<Frame>,
    },

    #[error("channel communication error")]
    CommunicationError,

    #[error("operation timed out: {source}")]
    Timeout {
        #[from]
        source: Elapsed,
    },

    #[error("IO error: {source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    FromUtf8Error {
        #[from]
        source: FromUtf8Error,
    },

    // Setup errors
    #[error("could not connect to any resolved address: {0}")]
    SocketConnectError(String),

    #[error("proxy CONNECT handshake failed: {0}")]
    ProxyHandshakeError(String),

    #[error("failed to overlay TLS onto the established socket: {source}")]
    SocketOverlayError {
        #[from]
        source: rustls::Error,
    },

    #[error("TLS handshake failed: {0}")]
    SslHandshakeError(String),

    #[error("server hostname failed verification: {source}")]
    HostnameUnverified {
        #[from]
        source: InvalidDnsNameError,
    },

    // Opening handshake errors
    #[error("opening handshake failed: {0}")]
    OpeningHandshakeError(String),

    #[error("couldn't parse HTTP status line")]
    StatusLineError,

    #[error("server responded {status} instead of 101 Switching Protocols")]
    NotSwitchingProtocols {
        status: u16,
        headers: HashMap<String, String>,
        /// First bytes of the response body, e.g. a server error page, for
        /// diagnosing rejected handshakes (401 + `WWW-Authenticate`, etc.).
        body_preview: String,
    },

    #[error("malformed HTTP header block")]
    HttpHeaderFailure,

    #[error("response is missing the Upgrade header")]
    NoUpgradeHeader,

    #[error("Upgrade header does not contain 'websocket'")]
    NoWebsocketInUpgradeHeader,

    #[error("response is missing the Connection header")]
    NoConnectionHeader,

    #[error("Connection header does not contain 'Upgrade'")]
    NoUpgradeInConnectionHeader,

    #[error("Sec-WebSocket-Accept did not match the expected value")]
    UnexpectedSecWebSocketAccept,

    #[error("couldn't parse Sec-WebSocket-Extensions: {0}")]
    ExtensionParseError(String),

    #[error("server accepted an extension that was never offered: {0}")]
    UnsupportedExtension(String),

    #[error("server's accepted extensions conflict with each other")]
    ExtensionsConflict,

    #[error("server selected a subprotocol that was never offered: {0}")]
    UnsupportedProtocol(String),

    #[error("server sent an unsupported permessage-deflate parameter: {0}")]
    PermessageDeflateUnsupportedParameter(String),

    #[error("max_window_bits must be between 8 and 15, got {0}")]
    PermessageDeflateInvalidMaxWindowBits(u8),

    // Handshake errors (request construction / response validation)
    #[error("Invalid handshake request method and version")]
    InvalidHTTPHandshake,

    #[error("Connection: Upgrade header missing in the request")]
    NoConnectionHeaderPresent,

    #[error("Upgrade: websocket header missing in the request")]
    NoUpgradeHeaderPresent,

    #[error("Host header missing in the request")]
    NoHostHeaderPresent,

    #[error("Couldn't find Sec-WebSocket-Key header in the request")]
    NoSecWebsocketKey,

    #[error("Server didn't upgrade the connection")]
    NoUpgrade,

    #[error("Sever didn't send a valid Sec-WebSocket-Accept key")]
    InvalidAcceptKey,

    // Framing errors
    #[error("insufficient data to decode a frame")]
    InsufficientData,

    #[error("invalid payload length encoding")]
    InvalidPayloadLength,

    #[error("payload exceeds max_frame_size")]
    TooLongPayload,

    #[error("payload too large to allocate")]
    InsufficientMemoryForPayload,

    #[error("frame from server was masked")]
    FrameMasked,

    #[error("unknown opcode `{0}`")]
    UnknownOpcode(u8),

    #[error("RSV not zero")]
    RSVNotZero,

    #[error("Control frames must not be fragmented")]
    ControlFramesFragmented,

    #[error("Control frame with invalid payload size, can be greater than 125")]
    ControlFramePayloadSize,

    #[error("fragment_size: `{0}` can't be greater than max_frame_size: `{1}`")]
    CustomFragmentSizeExceeded(usize, usize),

    #[error("Max frame size reached")]
    MaxFrameSize,

    #[error("Max message size reached")]
    MaxMessageSize,

    // Fragmentation errors
    #[error("Invalid frame while there is a fragmented message in progress")]
    InvalidFrameFragmentation,

    #[error("Incoming fragmented message but there is one already in progress")]
    FragmentedInProgress,

    #[error("Invalid continuation frame: no fragmented message to continue")]
    InvalidContinuationFrame,

    #[error("Invalid Opcode")]
    InvalidOpcode,

    #[error("message failed reassembly")]
    MessageConstructionError,

    #[error("text message was not valid UTF-8")]
    TextMessageConstructionError,

    #[error("connection closed without a final close frame")]
    NoMoreFrame,

    #[error("operation is only valid before the handshake starts")]
    NotInCreatedState,

    #[error("reader task was interrupted")]
    InterruptedInReading,

    // HTTP / URL errors
    #[error("{source}")]
    URLParseError {
        #[from]
        source: ParseError,
    },

    #[error("Invalid scheme in WebSocket URL")]
    InvalidSchemeURL,

    #[error("URL has no host")]
    URLNoHost,

    #[error("URL has no port")]
    URLNoPort,

    #[error("{source}")]
    HttpParseError {
        #[from]
        source: HttpParseError,
    },

    #[error("Incomplete HTTP request")]
    IncompleteHTTPRequest,

    #[error("invalid HTTP request line")]
    InvalidHTTPRequestLine,

    #[error("missing HTTP method")]
    MissingHTTPMethod,

    #[error("missing HTTP URI")]
    MissingHTTPUri,

    #[error("missing HTTP version")]
    MissingHTTPVersion,

    #[error("invalid Content-Length header")]
    InvalidContentLength,

    #[error("use_tls = `{0}` argument does not match the passed URL scheme: `{1}`")]
    SchemeAgainstTlsConfig(bool, String),

    // Compression / decompression errors
    #[error("max_window_bits should be a value between 8 and 15")]
    InvalidMaxWindowBits,

    #[error("failed to compress payload")]
    CompressionError,

    #[error("failed to decompress payload")]
    DecompressionError,
}
