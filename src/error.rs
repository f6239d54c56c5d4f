//! Error types for P-Touch printer operations.
//!
//! This module defines all possible errors that can occur during printer
//! communication, raster encoding, and print operations.

use crate::printer::Stage;
use thiserror::Error;

/// Main error type for P-Touch printer operations.
///
/// This enum encompasses all possible errors that can occur when using
/// the printer, from transport I/O issues to printer-reported errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport I/O error during a print job.
    ///
    /// Carries the sequencing stage at which the failure occurred. A job
    /// that fails here must be restarted from scratch; the command
    /// sequence is never partially retried.
    #[error("transport I/O failed during {stage}")]
    Transport {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    /// Serial port could not be opened or configured.
    #[error(transparent)]
    Serial(#[from] serialport::Error),

    #[error("unexpected transfer opcode 0x{opcode:02X} at offset {offset}")]
    UnexpectedOpcode { opcode: u8, offset: usize },

    #[error("transfer packet at offset {offset} runs past the end of the stream")]
    TruncatedPacket { offset: usize },

    /// Decompressed raster line has the wrong size.
    ///
    /// Every transfer packet must decode to exactly one raster line; a
    /// mismatch means the stream is corrupt.
    #[error("decompressed raster line is {got} bytes, expected {expected}")]
    LineLength { expected: usize, got: usize },

    #[error("bitmap data is {0} bytes, not a whole number of raster lines")]
    InvalidBitmap(usize),

    #[error("status frame must be 32 bytes, got {0}")]
    StatusLength(usize),

    /// Bluetooth connection could not be established.
    #[error("failed to connect Bluetooth device: {0}")]
    Connect(#[source] std::io::Error),

    /// SDP lookup found no serial service on the device.
    ///
    /// Raised only after the bounded number of lookup attempts; the
    /// target service may not be advertised right after pairing.
    #[error("no serial service found on {0}")]
    ServiceNotFound(String),

    #[error("invalid Bluetooth address: {0}")]
    InvalidAddress(String),

    #[error("Bluetooth transport is not supported on this platform")]
    Unsupported,

    /// Hardware-level error decoded from the final status frame.
    #[error(transparent)]
    Device(PrinterError),
}

/// Hardware-specific errors reported by the printer.
///
/// These errors are classified from the two error bytes of the 32-byte
/// status frame and indicate physical problems with the device that need
/// user intervention.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterError {
    // Error information 1 flags
    #[error("No media is installed")]
    NoMedia,

    #[error("End of media")]
    EndOfMedia,

    #[error("Tape cutter jam")]
    TapeCutJam,

    // Error information 2 flags
    #[error("Replace the media")]
    ReplaceMedia,

    #[error("Expansion buffer is full")]
    BufferFull,

    #[error("Transmission error")]
    TransmissionError,

    #[error("Transmission buffer is full")]
    TransmissionBufferFull,

    #[error("The cover is open")]
    CoverOpen,

    #[error("Unknown error (E1: 0x{0:02X} E2: 0x{1:02X})")]
    Unknown(u8, u8),
}

impl PrinterError {
    /// Classify the two error bytes of a status frame.
    ///
    /// Error byte 1 flags take priority over error byte 2 flags, and
    /// within a byte the lowest flag wins. Returns `None` when both
    /// bytes are zero (no error).
    pub fn from_bytes(error1: u8, error2: u8) -> Option<Self> {
        if error1 == 0 && error2 == 0 {
            return None;
        }

        let classified = if error1 & 0x01 != 0 {
            Self::NoMedia
        } else if error1 & 0x02 != 0 {
            Self::EndOfMedia
        } else if error1 & 0x04 != 0 {
            Self::TapeCutJam
        } else if error2 & 0x01 != 0 {
            Self::ReplaceMedia
        } else if error2 & 0x02 != 0 {
            Self::BufferFull
        } else if error2 & 0x04 != 0 {
            Self::TransmissionError
        } else if error2 & 0x08 != 0 {
            Self::TransmissionBufferFull
        } else if error2 & 0x10 != 0 {
            Self::CoverOpen
        } else {
            Self::Unknown(error1, error2)
        };

        Some(classified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_error_when_both_bytes_zero() {
        assert_eq!(PrinterError::from_bytes(0x00, 0x00), None);
    }

    #[test]
    fn error_byte_1_takes_priority() {
        // No media and cover open set at once: byte 1 wins.
        assert_eq!(
            PrinterError::from_bytes(0x01, 0x10),
            Some(PrinterError::NoMedia)
        );
    }

    #[test]
    fn lowest_flag_wins_within_a_byte() {
        assert_eq!(
            PrinterError::from_bytes(0x06, 0x00),
            Some(PrinterError::EndOfMedia)
        );
    }

    #[test]
    fn error_byte_2_flags() {
        assert_eq!(
            PrinterError::from_bytes(0x00, 0x04),
            Some(PrinterError::TransmissionError)
        );
        assert_eq!(
            PrinterError::from_bytes(0x00, 0x10),
            Some(PrinterError::CoverOpen)
        );
    }

    #[test]
    fn unmatched_flags_are_unknown_with_raw_bytes() {
        assert_eq!(
            PrinterError::from_bytes(0x40, 0x20),
            Some(PrinterError::Unknown(0x40, 0x20))
        );
    }
}
