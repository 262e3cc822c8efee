//! Client-side async WebSockets implementation for the Tokio stack.
//!
//! This library dials `ws://`/`wss://` endpoints over a `tokio::net::TcpStream`,
//! racing RFC 6555 Happy-Eyeballs candidates and optionally tunneling through
//! an HTTP proxy's `CONNECT` method, then speaks the RFC 6455 framing protocol
//! (with optional RFC 7692 permessage-deflate compression) over the resulting
//! socket, optionally overlayed with TLS via `rustls`.
//!
//! The public entry points are [`handshake::connect_async`] and
//! [`handshake::connect_async_with_config`], both returning a split
//! [`split::WSReader`]/[`split::WSWriter`] pair: the reader implements
//! `futures::Stream<Item = Result<message::Message, error::Error>>`, the
//! writer exposes `send`/`send_as_binary`/`send_as_text`/`close_connection`.

mod compression;
pub mod config;
mod connection;
pub mod error;
pub mod extensions;
pub mod frame;
mod happy_eyeballs;
pub mod handshake;
pub mod listener;
pub mod message;
mod proxy;
mod read;
mod request;
pub mod split;
mod state;
mod stream;
mod tls;
mod utils;
mod write;

pub use config::{ClientConfig, DualStackMode, ProxyConfig, TlsConfig, WebSocketConfig};
pub use error::Error;
pub use extensions::Extensions;
pub use frame::{Frame, OpCode};
pub use handshake::{connect_async, connect_async_with_config};
pub use listener::{ListenerRegistry, WebSocketListener};
pub use message::Message;
pub use split::{WSReader, WSWriter};
