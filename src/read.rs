use crate::compression::Decoder;
use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::frame::{Frame, OpCode, MAX_CONTROL_FRAME_PAYLOAD};
use crate::listener::ListenerRegistry;
use crate::message::Message;
use crate::state::CloseTracker;
use crate::stream::SocketFlowStream;
use crate::write::Writer;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, BufReader, ReadHalf};
use tokio::sync::mpsc::Sender;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};

const FRAME_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct FragmentedMessage {
    fragments: Vec<u8>,
    op_code: OpCode,
    compressed: bool,
}

/// Outcome of the closing handshake, handed back to the lifecycle controller
/// once the reader loop exits.
#[derive(Debug, Clone)]
pub struct CloseOutcome {
    pub status: Option<u16>,
    pub reason: String,
    pub closed_by_server: bool,
    pub server_close_received: bool,
    pub client_close_sent: bool,
}

pub struct ReadStream {
    buf_reader: BufReader<ReadHalf<SocketFlowStream>>,
    fragmented_message: Option<FragmentedMessage>,
    message_tx: Sender<Result<Message, Error>>,
    writer: Arc<Mutex<Writer>>,
    config: WebSocketConfig,
    decoder: Decoder,
    listeners: ListenerRegistry,
    close_tracker: CloseTracker,
}

impl ReadStream {
    pub fn new(
        read: BufReader<ReadHalf<SocketFlowStream>>,
        message_tx: Sender<Result<Message, Error>>,
        writer: Arc<Mutex<Writer>>,
        config: WebSocketConfig,
        decoder: Decoder,
        listeners: ListenerRegistry,
        close_tracker: CloseTracker,
    ) -> Self {
        Self {
            buf_reader: read,
            fragmented_message: None,
            message_tx,
            writer,
            config,
            decoder,
            listeners,
            close_tracker,
        }
    }

    /// Drives the reader loop until the closing handshake completes, the
    /// peer drops the connection, or a fatal I/O error occurs.
    pub async fn run(&mut self) -> Result<CloseOutcome, Error> {
        loop {
            let frame = match self.read_frame().await {
                Ok(frame) => frame,
                Err(Error::IOError { source }) if source.kind() == std::io::ErrorKind::UnexpectedEof => {
                    if self.config.missing_close_frame_allowed {
                        let _ = self
                            .writer
                            .lock()
                            .await
                            .write_frame(Frame::close(Some(1000), ""), false)
                            .await;
                        self.close_tracker.mark_sent();
                        return Ok(CloseOutcome {
                            status: Some(1000),
                            reason: String::new(),
                            closed_by_server: false,
                            server_close_received: false,
                            client_close_sent: true,
                        });
                    }
                    return Err(Error::NoMoreFrame);
                }
                Err(error) => return Err(self.fail_with_close(error).await),
            };

            match self.dispatch(frame).await {
                Ok(Some(outcome)) => return Ok(outcome),
                Ok(None) => {}
                Err(error) => return Err(self.fail_with_close(error).await),
            }
        }
    }

    /// Sends a best-effort protocol-violation CLOSE per RFC 6455 7.1.7, then
    /// hands the triggering error back to the caller. Shared by every path
    /// that can detect a protocol violation, whether it surfaces while
    /// parsing a frame (`read_frame`) or while reassembling/decoding a
    /// message from already-parsed frames (`dispatch`).
    async fn fail_with_close(&mut self, error: Error) -> Error {
        self.listeners.on_error(&error);
        let status = match &error {
            Error::TextMessageConstructionError => 1007,
            _ => 1002,
        };
        if self.close_tracker.mark_sent() {
            let _ = self
                .writer
                .lock()
                .await
                .write_frame(Frame::close(Some(status), ""), false)
                .await;
        }
        error
    }

    /// Returns `Some(outcome)` once the closing handshake has completed.
    async fn dispatch(&mut self, frame: Frame) -> Result<Option<CloseOutcome>, Error> {
        match frame.opcode {
            OpCode::Text | OpCode::Binary if !frame.final_fragment => {
                if self.fragmented_message.is_some() {
                    return Err(Error::FragmentedInProgress);
                }
                self.fragmented_message = Some(FragmentedMessage {
                    op_code: frame.opcode,
                    fragments: frame.payload,
                    compressed: frame.compressed,
                });
                Ok(None)
            }
            OpCode::Continue => {
                let Some(fragmented) = self.fragmented_message.as_mut() else {
                    return Err(Error::InvalidContinuationFrame);
                };
                fragmented.fragments.extend_from_slice(&frame.payload);

                if fragmented.fragments.len()
                    > self.config.max_message_size.unwrap_or(usize::MAX)
                {
                    return Err(Error::MessageConstructionError);
                }

                if frame.final_fragment {
                    let mut fragmented = self.fragmented_message.take().unwrap();
                    if fragmented.compressed {
                        fragmented.fragments = self.decoder.decompress(&fragmented.fragments)?;
                    }
                    self.transmit_message(Frame::new(
                        true,
                        fragmented.op_code,
                        fragmented.fragments,
                        false,
                    ))
                    .await?;
                }
                Ok(None)
            }
            OpCode::Text | OpCode::Binary => {
                if self.fragmented_message.is_some() {
                    return Err(Error::InvalidFrameFragmentation);
                }
                self.transmit_message(frame).await?;
                Ok(None)
            }
            OpCode::Close => {
                let (status, reason) = Frame::parse_close_payload(&frame.payload)?;
                let we_initiated = self.close_tracker.was_sent();
                if self.close_tracker.mark_sent() {
                    // Peer closed first; echo with the same status (or 1000).
                    self.writer
                        .lock()
                        .await
                        .write_frame(Frame::close(status.or(Some(1000)), ""), false)
                        .await?;
                }
                Ok(Some(CloseOutcome {
                    status,
                    reason,
                    closed_by_server: !we_initiated,
                    server_close_received: true,
                    client_close_sent: true,
                }))
            }
            OpCode::Ping => {
                self.writer
                    .lock()
                    .await
                    .write_frame(Frame::pong(frame.payload), false)
                    .await?;
                Ok(None)
            }
            OpCode::Pong => {
                self.listeners.on_message(&Message::Binary(frame.payload));
                Ok(None)
            }
        }
    }

    pub async fn read_frame(&mut self) -> Result<Frame, Error> {
        let mut header = [0u8; 2];
        self.buf_reader.read_exact(&mut header).await?;

        let final_fragment = (header[0] & 0b1000_0000) != 0;
        let opcode = OpCode::from(header[0] & 0b0000_1111)?;

        let rsv1 = (header[0] & 0b0100_0000) != 0;
        let rsv2 = (header[0] & 0b0010_0000) != 0;
        let rsv3 = (header[0] & 0b0001_0000) != 0;

        let permessage_deflate = self
            .config
            .extensions
            .as_ref()
            .map(|e| e.permessage_deflate)
            .unwrap_or(false);

        if rsv2 || rsv3 || (rsv1 && !permessage_deflate && !self.config.extended) {
            return Err(Error::RSVNotZero);
        }

        if !final_fragment && opcode.is_control() {
            return Err(Error::ControlFramesFragmented);
        }

        let masked = (header[1] & 0b1000_0000) != 0;
        if masked {
            return Err(Error::FrameMasked);
        }

        let mut length = (header[1] & 0b0111_1111) as usize;

        if length > MAX_CONTROL_FRAME_PAYLOAD && opcode.is_control() {
            return Err(Error::ControlFramePayloadSize);
        }

        if length == 126 {
            let mut be_bytes = [0u8; 2];
            self.buf_reader.read_exact(&mut be_bytes).await?;
            length = u16::from_be_bytes(be_bytes) as usize;
        } else if length == 127 {
            let mut be_bytes = [0u8; 8];
            self.buf_reader.read_exact(&mut be_bytes).await?;
            if be_bytes[0] & 0x80 != 0 {
                return Err(Error::InvalidPayloadLength);
            }
            length = u64::from_be_bytes(be_bytes) as usize;
        }

        if length > self.config.max_frame_size.unwrap_or(usize::MAX) {
            return Err(Error::TooLongPayload);
        }

        let mut payload = vec![0u8; length];

        let read_result = timeout(FRAME_READ_TIMEOUT, self.buf_reader.read_exact(&mut payload)).await;
        match read_result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(elapsed) => return Err(elapsed.into()),
        }

        if rsv1 && final_fragment && permessage_deflate && opcode.is_data() {
            payload = self.decoder.decompress(&payload)?;
        }

        Ok(Frame {
            final_fragment,
            opcode,
            payload,
            compressed: rsv1,
        })
    }

    async fn transmit_message(&mut self, frame: Frame) -> Result<(), Error> {
        let message = Message::from_frame(frame)?;
        self.listeners.on_message(&message);
        self.message_tx
            .send(Ok(message))
            .await
            .map_err(|_| Error::CommunicationError)
    }
}
