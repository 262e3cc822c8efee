use crate::error::Error;
use crate::frame::Frame;
use crate::stream::SocketFlowStream;
use crate::utils::{apply_mask, generate_masking_key};
use tokio::io::{AsyncWriteExt, WriteHalf};

/// Serializes and writes a single frame to the socket, masking the payload as
/// RFC 6455 requires of every client-to-server frame.
pub struct Writer {
    write_half: WriteHalf<SocketFlowStream>,
}

impl Writer {
    pub fn new(write_half: WriteHalf<SocketFlowStream>) -> Self {
        Self { write_half }
    }

    /// Writes `frame`. `set_rsv1` is independent from `frame.compressed`
    /// because RSV1 must only be set on the first frame of a compressed,
    /// possibly-fragmented message - the splitter decides this, not the
    /// frame itself.
    pub async fn write_frame(&mut self, frame: Frame, set_rsv1: bool) -> Result<(), Error> {
        let mask = generate_masking_key();

        let mut first_byte = (frame.final_fragment as u8) << 7 | frame.opcode.as_u8();
        if set_rsv1 {
            first_byte |= 0x40;
        }

        let payload_len = frame.payload.len();
        self.write_half.write_all(&[first_byte]).await?;

        if payload_len <= 125 {
            let length = 0b1000_0000 | payload_len as u8;
            self.write_half.write_all(&[length]).await?;
        } else if payload_len <= 65535 {
            self.write_half
                .write_all(&[126 | 0b1000_0000, (payload_len >> 8) as u8, payload_len as u8])
                .await?;
        } else {
            let bytes = (payload_len as u64).to_be_bytes();
            let mut header = [0u8; 9];
            header[0] = 127 | 0b1000_0000;
            header[1..].copy_from_slice(&bytes);
            self.write_half.write_all(&header).await?;
        }

        self.write_half.write_all(&mask).await?;

        let mut masked_payload = frame.payload;
        apply_mask(&mut masked_payload, mask);
        self.write_half.write_all(&masked_payload).await?;

        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), Error> {
        self.write_half.flush().await.map_err(Error::from)
    }

    pub async fn shutdown(&mut self) -> Result<(), Error> {
        self.write_half.shutdown().await.map_err(Error::from)
    }
}
