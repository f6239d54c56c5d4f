//! Transport abstraction over the byte-stream channel to the printer.
//!
//! The protocol engine drives a serial port and a Bluetooth RFCOMM
//! socket through the same trait; both are half-duplex blocking channels
//! with a shared timeout discipline.

use std::io;
use std::time::Duration;

/// Symmetric read/write timeout shared by all transports.
pub const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// A byte-stream channel to the printer.
///
/// Implementations own the underlying OS resource and release it on
/// drop. A single print job occupies the transport exclusively for its
/// whole duration; the engine never pipelines commands.
pub trait Transport {
    /// Write the whole buffer, blocking on device flow control.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// One timeout-bounded read. Returns the number of bytes received;
    /// zero means the timeout elapsed with nothing available.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Discard any unread input from the device.
    fn reset_input_buffer(&mut self) -> io::Result<()>;

    /// Human-readable channel name for logging.
    fn name(&self) -> &str;

    /// Read up to `n` bytes, accumulating reads until the frame is full
    /// or the timeout elapses. A short buffer is returned as-is so the
    /// caller can observe truncated status frames instead of an I/O
    /// error.
    fn read_frame(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;

        while filled < n {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(count) => filled += count,
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) => return Err(e),
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Transport stub feeding back scripted reads in arbitrary chunks.
    struct Scripted {
        reads: VecDeque<Vec<u8>>,
    }

    impl Transport for Scripted {
        fn write_all(&mut self, _data: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")),
            }
        }

        fn reset_input_buffer(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn read_frame_accumulates_partial_reads() {
        let mut transport = Scripted {
            reads: vec![vec![1, 2], vec![3], vec![4, 5, 6]].into(),
        };
        assert_eq!(transport.read_frame(6).unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn read_frame_returns_short_buffer_on_timeout() {
        let mut transport = Scripted {
            reads: vec![vec![1, 2, 3]].into(),
        };
        assert_eq!(transport.read_frame(32).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn read_frame_returns_empty_on_immediate_timeout() {
        let mut transport = Scripted {
            reads: VecDeque::new(),
        };
        assert!(transport.read_frame(32).unwrap().is_empty());
    }
}
