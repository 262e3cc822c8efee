use crate::compression::Encoder;
use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::frame::{Frame, OpCode};
use crate::listener::{ListenerRegistry, WebSocketListener};
use crate::message::Message;
use crate::state::{CloseTracker, ConnectionState, SharedState};
use crate::write::Writer;
use bytes::BytesMut;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;

const PAYLOAD_SIZE_COMPRESSION_ENABLE: usize = 1;

/// The read half of a split connection; yields reassembled, decompressed
/// messages as a `Stream`.
pub struct WSReader {
    message_rx: ReceiverStream<Result<Message, Error>>,
}

impl WSReader {
    pub fn new(message_rx: ReceiverStream<Result<Message, Error>>) -> Self {
        Self { message_rx }
    }
}

impl Stream for WSReader {
    type Item = Result<Message, Error>;
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.message_rx).poll_next(cx)
    }
}

/// The write half of a split connection. Owns the compressor and fires
/// listener callbacks around each frame it puts on the wire.
pub struct WSWriter {
    pub(crate) writer: Arc<Mutex<Writer>>,
    pub web_socket_config: WebSocketConfig,
    encoder: Encoder,
    listeners: ListenerRegistry,
    close_tracker: CloseTracker,
    state: SharedState,
}

impl WSWriter {
    pub fn new(
        writer: Arc<Mutex<Writer>>,
        web_socket_config: WebSocketConfig,
        encoder: Encoder,
        listeners: ListenerRegistry,
        close_tracker: CloseTracker,
        state: SharedState,
    ) -> Self {
        Self {
            writer,
            web_socket_config,
            encoder,
            listeners,
            close_tracker,
            state,
        }
    }

    pub fn register_listener(&self, listener: Arc<dyn WebSocketListener>) {
        self.listeners.register(listener);
    }

    /// Sends a CLOSE frame (unless one has already been sent by the reader
    /// echoing a peer-initiated close) and waits briefly for the connection
    /// to settle into `Closed`.
    pub async fn close_connection(&mut self) -> Result<(), Error> {
        self.state.set(ConnectionState::Closing);

        if self.close_tracker.mark_sent() {
            self.write_frames(vec![Frame::close(Some(1000), "")]).await?;
        }

        let _ = timeout(self.web_socket_config.close_timeout, async {
            while self.state.get() != ConnectionState::Closed {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;

        Ok(())
    }

    pub async fn send_message(&mut self, message: Message) -> Result<(), Error> {
        self.write_message(message).await
    }

    /// Sends raw bytes as a text message, matching the crate's historical
    /// default of treating `send` as a text-opcode convenience method.
    pub async fn send(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.write_message(Message::Text(String::from_utf8(data)?))
            .await
    }

    pub async fn send_as_binary(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.write_message(Message::Binary(data)).await
    }

    pub async fn send_as_text(&mut self, data: String) -> Result<(), Error> {
        self.write_message(Message::Text(data)).await
    }

    pub async fn send_ping(&mut self) -> Result<(), Error> {
        self.write_frames(vec![Frame::ping(Vec::new())]).await
    }

    /// Splits `data` into fragments of at most `fragment_size` bytes, sent as
    /// a TEXT/CONTINUE sequence.
    pub async fn send_large_data_fragmented(
        &mut self,
        mut data: Vec<u8>,
        fragment_size: usize,
    ) -> Result<(), Error> {
        let max_frame_size = self.web_socket_config.max_frame_size.unwrap_or(usize::MAX);
        if fragment_size > max_frame_size {
            return Err(Error::CustomFragmentSizeExceeded(fragment_size, max_frame_size));
        }

        if data.len() > self.web_socket_config.max_message_size.unwrap_or(usize::MAX) {
            return Err(Error::MaxMessageSize);
        }

        let compressed = self.check_compression(&mut data)?;

        let chunks = data.chunks(fragment_size);
        let total_chunks = chunks.len().max(1);

        let mut frames = Vec::with_capacity(total_chunks);
        for (i, chunk) in chunks.enumerate() {
            let is_final = i == total_chunks - 1;
            let opcode = if i == 0 { OpCode::Text } else { OpCode::Continue };
            frames.push(Frame::new(is_final, opcode, chunk.to_vec(), compressed));
        }
        if frames.is_empty() {
            frames.push(Frame::new(true, OpCode::Text, Vec::new(), false));
        }

        self.write_frames(frames).await
    }

    fn check_compression(&mut self, data: &mut Vec<u8>) -> Result<bool, Error> {
        let permessage_deflate = self
            .web_socket_config
            .extensions
            .as_ref()
            .map(|e| e.permessage_deflate)
            .unwrap_or(false);

        // Empty messages still go through the encoder when the extension is
        // negotiated: RFC 7692 8.2.3.1 requires the single-byte 0x00 sentinel
        // with RSV1 set rather than an empty RSV1 payload.
        if permessage_deflate && (data.is_empty() || data.len() > PAYLOAD_SIZE_COMPRESSION_ENABLE) {
            *data = self.encoder.compress(&mut BytesMut::from(&data[..]))?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn convert_to_frames(&mut self, message: Message) -> Result<Vec<Frame>, Error> {
        let opcode = message.opcode();
        let mut payload = message.into_payload();

        let max_frame_size = self.web_socket_config.max_frame_size.unwrap_or(usize::MAX);
        let compressed = self.check_compression(&mut payload)?;

        if payload.is_empty() {
            return Ok(vec![Frame::new(true, opcode, payload, compressed)]);
        }

        let mut frames = Vec::new();
        for chunk in payload.chunks(max_frame_size) {
            let chunk_opcode = if frames.is_empty() { opcode } else { OpCode::Continue };
            frames.push(Frame::new(false, chunk_opcode, chunk.to_vec(), compressed));
        }

        if let Some(last_frame) = frames.last_mut() {
            last_frame.final_fragment = true;
        }

        Ok(frames)
    }

    async fn write_message(&mut self, message: Message) -> Result<(), Error> {
        if message.as_binary().len() > self.web_socket_config.max_message_size.unwrap_or(usize::MAX) {
            return Err(Error::MaxMessageSize);
        }

        let frames = self.convert_to_frames(message)?;
        self.write_frames(frames).await
    }

    async fn write_frames(&mut self, frames: Vec<Frame>) -> Result<(), Error> {
        // For compressed messages, regardless of fragmentation, only the first
        // frame carries RSV1.
        let mut set_rsv1_first_frame = frames.first().map(|f| f.compressed).unwrap_or(false);

        for frame in frames {
            self.listeners.on_sending_frame(&frame);
            let mut writer = self.writer.lock().await;
            match writer.write_frame(frame.clone(), set_rsv1_first_frame).await {
                Ok(()) => self.listeners.on_frame_sent(&frame),
                Err(error) => {
                    self.listeners.on_frame_unsent(&frame);
                    self.listeners.on_send_error(&error);
                    return Err(error);
                }
            }
            if self.web_socket_config.auto_flush {
                writer.flush().await?;
            }
            set_rsv1_first_frame = false;
        }
        Ok(())
    }
}
