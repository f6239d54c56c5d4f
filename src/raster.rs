//! Raster bitmap representation and the transfer codec.
//!
//! The printer consumes the label image as a sequence of vertical raster
//! lines, each compressed with TIFF PackBits and wrapped in a transfer
//! packet (`0x47`, little-endian payload length, payload). The encoder
//! here is byte-identical to the stream produced by the official Brother
//! app, which is the compatibility surface the hardware accepts.

use crate::{error::Error, BUFFER_HEIGHT, RASTER_LINE_BYTES};

/// "Raster graphics transfer" command byte.
pub const TRANSFER_COMMAND: u8 = 0x47;

/// Longest run or literal PackBits can express in one control byte.
const MAX_RUN: usize = 127;

/// A monochrome label image, packed 1 bit per pixel.
///
/// The image is stored column-major: each raster line is one vertical
/// 128-pixel slice of the label, 16 bytes long, most significant bit at
/// the top. The width (number of lines) is arbitrary; zero is valid and
/// prints nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    data: Vec<u8>,
    line_bytes: usize,
}

impl Bitmap {
    /// Wrap already-packed raster data using the default line size.
    ///
    /// Fails if the buffer is not a whole number of raster lines.
    pub fn from_packed(data: Vec<u8>) -> Result<Self, Error> {
        Self::from_packed_lines(data, RASTER_LINE_BYTES)
    }

    /// Wrap already-packed raster data with an explicit line size.
    pub fn from_packed_lines(data: Vec<u8>, line_bytes: usize) -> Result<Self, Error> {
        if line_bytes == 0 || data.len() % line_bytes != 0 {
            return Err(Error::InvalidBitmap(data.len()));
        }
        Ok(Bitmap { data, line_bytes })
    }

    /// Build a bitmap from a pixel predicate.
    ///
    /// `black(x, y)` is sampled for every column `x` in `0..width` and
    /// row `y` in `0..128`; `true` means a printed (black) pixel. Pixels
    /// are packed top-down, most significant bit first.
    pub fn from_pixels<F>(width: u32, black: F) -> Self
    where
        F: Fn(u32, u32) -> bool,
    {
        let mut data = Vec::with_capacity(width as usize * RASTER_LINE_BYTES);
        for x in 0..width {
            let mut bit_cursor = 8u8;
            let mut byte = 0u8;
            for y in 0..BUFFER_HEIGHT {
                bit_cursor -= 1;
                if black(x, y) {
                    byte |= 1 << bit_cursor;
                }
                if bit_cursor == 0 {
                    data.push(byte);
                    byte = 0;
                    bit_cursor = 8;
                }
            }
        }
        Bitmap {
            data,
            line_bytes: RASTER_LINE_BYTES,
        }
    }

    /// Width of the label in pixels (= number of raster lines).
    pub fn width(&self) -> u32 {
        (self.data.len() / self.line_bytes) as u32
    }

    pub fn line_count(&self) -> u16 {
        (self.data.len() / self.line_bytes) as u16
    }

    pub fn line_bytes(&self) -> usize {
        self.line_bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Per-line PackBits compressor and transfer-packet framer.
///
/// The raster line size is a protocol parameter; the default matches the
/// 128 pixel buffer of the PT series.
#[derive(Debug, Clone, Copy)]
pub struct RasterCodec {
    line_bytes: usize,
}

impl Default for RasterCodec {
    fn default() -> Self {
        RasterCodec {
            line_bytes: RASTER_LINE_BYTES,
        }
    }
}

impl RasterCodec {
    pub fn new(line_bytes: usize) -> Self {
        RasterCodec { line_bytes }
    }

    /// Encode packed raster data into a stream of transfer packets.
    ///
    /// Each raster line is compressed independently and wrapped as
    /// `0x47, len_lo, len_hi, payload`. Empty input yields an empty
    /// stream.
    pub fn encode(&self, data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        for line in data.chunks(self.line_bytes) {
            let packed = pack_bits(line);
            let len = packed.len() as u16;
            buf.push(TRANSFER_COMMAND);
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(&packed);
        }
        buf
    }

    /// Decode a stream of transfer packets back into raster lines.
    ///
    /// Walks the stream opcode by opcode. An unexpected opcode, a packet
    /// length running past the end of the buffer, or a decompressed line
    /// that is not exactly one raster line long is a framing error.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
        let mut lines = Vec::new();
        let mut i = 0;

        while i < data.len() {
            let packet_start = i;
            if data[i] != TRANSFER_COMMAND {
                return Err(Error::UnexpectedOpcode {
                    opcode: data[i],
                    offset: i,
                });
            }
            if i + 3 > data.len() {
                return Err(Error::TruncatedPacket {
                    offset: packet_start,
                });
            }
            let len = data[i + 1] as usize | (data[i + 2] as usize) << 8;
            i += 3;
            if i + len > data.len() {
                return Err(Error::TruncatedPacket {
                    offset: packet_start,
                });
            }

            let line = unpack_bits(&data[i..i + len], packet_start)?;
            if line.len() != self.line_bytes {
                return Err(Error::LineLength {
                    expected: self.line_bytes,
                    got: line.len(),
                });
            }
            lines.push(line);
            i += len;
        }

        Ok(lines)
    }
}

/// TIFF PackBits compression of one raster line.
///
/// Two-state walk (literal vs run) matching the reference encoder: runs
/// of two or more bytes become a replicate, everything else accumulates
/// into literals. A single input byte encodes as `00 <byte>`.
fn pack_bits(data: &[u8]) -> Vec<u8> {
    match data.len() {
        0 => return Vec::new(),
        1 => return vec![0x00, data[0]],
        _ => {}
    }

    let mut result = Vec::new();
    let mut literal: Vec<u8> = Vec::new();
    let mut repeat_count = 0usize;
    let mut in_run = false;
    let mut pos = 0;

    while pos < data.len() - 1 {
        if data[pos] == data[pos + 1] {
            if !in_run {
                flush_literal(&mut result, &mut literal);
                in_run = true;
                repeat_count = 1;
            } else {
                if repeat_count == MAX_RUN {
                    push_run(&mut result, repeat_count, data[pos]);
                    repeat_count = 0;
                }
                repeat_count += 1;
            }
        } else if in_run {
            repeat_count += 1;
            push_run(&mut result, repeat_count, data[pos]);
            in_run = false;
            repeat_count = 0;
        } else {
            if literal.len() == MAX_RUN {
                flush_literal(&mut result, &mut literal);
            }
            literal.push(data[pos]);
        }
        pos += 1;
    }

    if in_run {
        repeat_count += 1;
        push_run(&mut result, repeat_count, data[pos]);
    } else {
        literal.push(data[pos]);
        flush_literal(&mut result, &mut literal);
    }

    result
}

fn flush_literal(out: &mut Vec<u8>, literal: &mut Vec<u8>) {
    if literal.is_empty() {
        return;
    }
    out.push((literal.len() - 1) as u8);
    out.extend_from_slice(literal);
    literal.clear();
}

fn push_run(out: &mut Vec<u8>, count: usize, value: u8) {
    // Replicate control byte is -(count - 1) in two's complement.
    out.push((256 - (count - 1)) as u8);
    out.push(value);
}

/// PackBits decompression of one packet payload.
///
/// `offset` is the packet's position in the outer stream, used for error
/// reporting only.
fn unpack_bits(data: &[u8], offset: usize) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let control = data[i] as i8;
        i += 1;
        if control == -128 {
            // No-op control byte per the TIFF spec.
            continue;
        }
        if control >= 0 {
            let n = control as usize + 1;
            if i + n > data.len() {
                return Err(Error::TruncatedPacket { offset });
            }
            out.extend_from_slice(&data[i..i + n]);
            i += n;
        } else {
            if i >= data.len() {
                return Err(Error::TruncatedPacket { offset });
            }
            let n = 1 - control as isize;
            out.extend(std::iter::repeat(data[i]).take(n as usize));
            i += 1;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_bits_reference_vectors() {
        assert_eq!(pack_bits(&[]), Vec::<u8>::new());
        assert_eq!(pack_bits(&[0x42]), vec![0x00, 0x42]);
        // Run of 16 identical bytes: replicate control -(16 - 1) = 0xF1.
        assert_eq!(pack_bits(&[0xFF; 16]), vec![0xF1, 0xFF]);
        // Mixed literal / run / literal.
        assert_eq!(
            pack_bits(&[0x41, 0x42, 0x42, 0x43]),
            vec![0x00, 0x41, 0xFF, 0x42, 0x00, 0x43]
        );
    }

    #[test]
    fn pack_bits_run_of_two_is_a_replicate() {
        assert_eq!(pack_bits(&[0x07, 0x07]), vec![0xFF, 0x07]);
    }

    #[test]
    fn all_black_line_packet() {
        let codec = RasterCodec::default();
        let encoded = codec.encode(&[0xFF; 16]);
        assert_eq!(encoded, vec![0x47, 0x02, 0x00, 0xF1, 0xFF]);
    }

    #[test]
    fn empty_bitmap_encodes_to_empty_stream() {
        let codec = RasterCodec::default();
        assert!(codec.encode(&[]).is_empty());
        assert!(codec.decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn round_trip_reconstructs_lines() {
        let codec = RasterCodec::default();
        let mut data = Vec::new();
        // Three lines with different shapes: blank, mixed, all black.
        data.extend_from_slice(&[0x00; 16]);
        data.extend_from_slice(&[
            0x12, 0x34, 0x34, 0x34, 0x00, 0x00, 0xAB, 0xCD, 0xEF, 0x01, 0x01, 0x01, 0x01, 0xFE,
            0xFE, 0x80,
        ]);
        data.extend_from_slice(&[0xFF; 16]);

        let encoded = codec.encode(&data);
        let lines = codec.decode(&encoded).unwrap();

        assert_eq!(lines.len(), 3);
        let flat: Vec<u8> = lines.into_iter().flatten().collect();
        assert_eq!(flat, data);
    }

    #[test]
    fn decoding_is_idempotent() {
        let codec = RasterCodec::default();
        let encoded = codec.encode(&[0x5A; 32]);
        let first = codec.decode(&encoded).unwrap();
        let second = codec.decode(&encoded).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unexpected_opcode_is_a_framing_error() {
        let codec = RasterCodec::default();
        match codec.decode(&[0x5A, 0x02, 0x00, 0xF1, 0xFF]) {
            Err(Error::UnexpectedOpcode { opcode, offset }) => {
                assert_eq!(opcode, 0x5A);
                assert_eq!(offset, 0);
            }
            other => panic!("expected framing error, got {:?}", other),
        }
    }

    #[test]
    fn declared_length_past_end_is_truncated() {
        let codec = RasterCodec::default();
        match codec.decode(&[0x47, 0x10, 0x00, 0xF1]) {
            Err(Error::TruncatedPacket { offset }) => assert_eq!(offset, 0),
            other => panic!("expected truncated packet, got {:?}", other),
        }
    }

    #[test]
    fn short_decoded_line_is_rejected() {
        let codec = RasterCodec::default();
        // Replicate of 8 bytes only, half a raster line.
        match codec.decode(&[0x47, 0x02, 0x00, 0xF9, 0xFF]) {
            Err(Error::LineLength { expected, got }) => {
                assert_eq!(expected, 16);
                assert_eq!(got, 8);
            }
            other => panic!("expected line length error, got {:?}", other),
        }
    }

    #[test]
    fn bitmap_from_pixels_packs_msb_first() {
        // Single column, top pixel black only.
        let bitmap = Bitmap::from_pixels(1, |_, y| y == 0);
        assert_eq!(bitmap.as_bytes()[0], 0x80);
        assert!(bitmap.as_bytes()[1..].iter().all(|&b| b == 0));
        assert_eq!(bitmap.line_count(), 1);
    }

    #[test]
    fn bitmap_rejects_partial_lines() {
        assert!(Bitmap::from_packed(vec![0x00; 17]).is_err());
        assert!(Bitmap::from_packed(vec![0x00; 32]).is_ok());
    }

    #[test]
    fn zero_width_bitmap_is_valid() {
        let bitmap = Bitmap::from_pixels(0, |_, _| true);
        assert_eq!(bitmap.width(), 0);
        assert!(RasterCodec::default().encode(bitmap.as_bytes()).is_empty());
    }
}
