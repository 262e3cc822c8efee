use crate::error::Error;
use bytes::BytesMut;
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

/// The RFC 7692 sync-flush trailer. The sender strips it before putting the
/// compressed bytes on the wire; the receiver appends it back before inflating.
const DEFLATE_TRAILER: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

/// A message that compresses to nothing (e.g. an empty text message) still
/// needs a non-empty payload once RSV1 is set, per RFC 7692 8.2.3.1.
const EMPTY_COMPRESSED_MESSAGE: [u8; 1] = [0x00];

/// `flate2`'s zlib-backed raw-deflate implementation refuses a window smaller
/// than 9 bits even though RFC 7692 nominally allows 8; clamp up like zlib does.
const MIN_WINDOW_BITS: u8 = 9;
const MAX_WINDOW_BITS: u8 = 15;

fn clamp_window_bits(bits: Option<u8>) -> u8 {
    match bits {
        Some(bits) => bits.clamp(MIN_WINDOW_BITS, MAX_WINDOW_BITS),
        None => MAX_WINDOW_BITS,
    }
}

fn calculate_buffer_size(payload_size: usize) -> usize {
    if payload_size <= 4096 {
        4096
    } else if payload_size <= 65536 {
        16384
    } else {
        65536
    }
}

/// Per-direction permessage-deflate compressor. One `Encoder` lives for the
/// whole connection; `reset_context` governs whether the sliding window is
/// reset after every message (client_no_context_takeover) or kept across
/// messages for better ratios at the cost of memory.
pub(crate) struct Encoder {
    compressor: Compress,
    reset_context: bool,
}

impl Encoder {
    pub fn new(reset_context: bool, window_bits: Option<u8>) -> Self {
        let compressor = Compress::new_with_window_bits(
            Compression::default(),
            false,
            clamp_window_bits(window_bits),
        );
        Self {
            compressor,
            reset_context,
        }
    }

    /// Compresses a full logical message, strips the RFC 7692 trailer, and
    /// substitutes the single-byte empty-message sentinel when the result
    /// would otherwise be empty.
    pub fn compress(&mut self, payload: &mut BytesMut) -> Result<Vec<u8>, Error> {
        if self.reset_context {
            self.compressor.reset();
        }

        let buffer_size = calculate_buffer_size(payload.len());
        let mut compressed = Vec::with_capacity(buffer_size);
        let mut buffer = vec![0u8; buffer_size];

        let before_in = self.compressor.total_in();
        while (self.compressor.total_in() - before_in) < payload.len() as u64 {
            let consumed_so_far = (self.compressor.total_in() - before_in) as usize;
            let input = &payload[consumed_so_far..];
            let before_out = self.compressor.total_out();
            let status = self
                .compressor
                .compress(input, &mut buffer, FlushCompress::Sync)
                .map_err(|_| Error::CompressionError)?;
            let produced = (self.compressor.total_out() - before_out) as usize;
            compressed.extend_from_slice(&buffer[..produced]);
            if status == Status::BufError && produced == 0 {
                break;
            }
        }

        // Flush to guarantee the sync-flush trailer is actually present before we strip it.
        loop {
            let before_out = self.compressor.total_out();
            let status = self
                .compressor
                .compress(&[], &mut buffer, FlushCompress::Sync)
                .map_err(|_| Error::CompressionError)?;
            let produced = (self.compressor.total_out() - before_out) as usize;
            compressed.extend_from_slice(&buffer[..produced]);
            if produced == 0 || status == Status::StreamEnd {
                break;
            }
        }

        if compressed.ends_with(&DEFLATE_TRAILER) {
            compressed.truncate(compressed.len() - DEFLATE_TRAILER.len());
        }

        if compressed.is_empty() {
            compressed.extend_from_slice(&EMPTY_COMPRESSED_MESSAGE);
        }

        Ok(compressed)
    }
}

pub(crate) struct Decoder {
    decompressor: Decompress,
    reset_context: bool,
}

impl Decoder {
    pub fn new(reset_context: bool, window_bits: Option<u8>) -> Self {
        let decompressor = Decompress::new_with_window_bits(false, clamp_window_bits(window_bits));
        Self {
            decompressor,
            reset_context,
        }
    }

    /// Appends the RFC 7692 trailer to `payload` and inflates the result.
    pub fn decompress(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let mut input = BytesMut::with_capacity(payload.len() + DEFLATE_TRAILER.len());
        input.extend_from_slice(payload);
        input.extend_from_slice(&DEFLATE_TRAILER);

        let buffer_size = calculate_buffer_size(input.len());
        let mut decompressed = BytesMut::with_capacity(buffer_size);
        let mut buffer = Vec::with_capacity(buffer_size);

        if self.reset_context {
            self.decompressor.reset(false);
        }

        let before_in = self.decompressor.total_in();
        while (self.decompressor.total_in() - before_in) < input.len() as u64 {
            let consumed_so_far = (self.decompressor.total_in() - before_in) as usize;
            let chunk = &input[consumed_so_far..];
            match self
                .decompressor
                .decompress_vec(chunk, &mut buffer, FlushDecompress::Sync)
                .map_err(|_| Error::DecompressionError)?
            {
                Status::Ok => {
                    decompressed.extend_from_slice(&buffer);
                    buffer.clear();
                }
                Status::StreamEnd => {
                    decompressed.extend_from_slice(&buffer);
                    break;
                }
                Status::BufError => break,
            }
        }

        Ok(decompressed.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_small_message() {
        let mut encoder = Encoder::new(false, None);
        let mut decoder = Decoder::new(false, None);

        let mut payload = BytesMut::from(&b"hello permessage-deflate"[..]);
        let compressed = encoder.compress(&mut payload).unwrap();
        assert!(!compressed.is_empty());

        let decompressed = decoder.decompress(&compressed).unwrap();
        assert_eq!(decompressed, b"hello permessage-deflate".to_vec());
    }

    #[test]
    fn empty_message_gets_sentinel_byte() {
        let mut encoder = Encoder::new(false, None);
        let mut payload = BytesMut::new();
        let compressed = encoder.compress(&mut payload).unwrap();
        assert_eq!(compressed, vec![0x00]);
    }

    #[test]
    fn context_takeover_reset_is_independent_per_message() {
        let mut encoder = Encoder::new(true, None);
        let mut decoder = Decoder::new(true, None);

        for msg in ["first message", "second message", "third"] {
            let mut payload = BytesMut::from(msg.as_bytes());
            let compressed = encoder.compress(&mut payload).unwrap();
            let decompressed = decoder.decompress(&compressed).unwrap();
            assert_eq!(decompressed, msg.as_bytes().to_vec());
        }
    }

    #[test]
    fn window_bits_below_nine_are_clamped() {
        assert_eq!(clamp_window_bits(Some(8)), 9);
        assert_eq!(clamp_window_bits(Some(15)), 15);
        assert_eq!(clamp_window_bits(None), 15);
    }
}
