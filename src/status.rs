//! Decoding of the printer's fixed 32-byte status frame.
//!
//! The printer answers a status request (and finishes a print job) with a
//! 32-byte binary frame describing battery, media, phase and error state.
//! Byte offsets are protocol constants; unknown status or battery codes
//! are preserved raw and rendered as hexadecimal so firmware revisions
//! never crash the engine.

use std::fmt;

use log::warn;

use crate::error::{Error, PrinterError};

/// Fixed size of a status frame.
pub const STATUS_FRAME_LEN: usize = 32;

/// Expected frame header.
///
/// The last two magic bytes overlap the battery and extended-error
/// offsets, so a mismatch is common on battery-powered units and must
/// stay non-fatal.
const HEADER_MAGIC: [u8; 8] = [0x80, 0x20, 0x42, 0x30, 0x4A, 0x30, 0x00, 0x00];

const OFFSET_BATTERY: usize = 6;
const OFFSET_EXTENDED_ERROR: usize = 7;
const OFFSET_ERROR_INFO_1: usize = 8;
const OFFSET_ERROR_INFO_2: usize = 9;
const OFFSET_MEDIA_WIDTH: usize = 10;
const OFFSET_MEDIA_TYPE: usize = 11;
const OFFSET_MEDIA_LENGTH: usize = 17;
const OFFSET_STATUS_TYPE: usize = 18;
const OFFSET_PHASE_TYPE: usize = 19;
const OFFSET_NOTIFICATION: usize = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusType {
    ReplyToRequest,
    PrintingCompleted,
    ErrorOccurred,
    IfModeFinished,
    PowerOff,
    Notification,
    PhaseChange,
    Unknown(u8),
}

impl StatusType {
    fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::ReplyToRequest,
            0x01 => Self::PrintingCompleted,
            0x02 => Self::ErrorOccurred,
            0x03 => Self::IfModeFinished,
            0x04 => Self::PowerOff,
            0x05 => Self::Notification,
            0x06 => Self::PhaseChange,
            code => Self::Unknown(code),
        }
    }
}

impl fmt::Display for StatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplyToRequest => write!(f, "Reply to status request"),
            Self::PrintingCompleted => write!(f, "Printing completed"),
            Self::ErrorOccurred => write!(f, "Error occured"),
            Self::IfModeFinished => write!(f, "IF mode finished"),
            Self::PowerOff => write!(f, "Power off"),
            Self::Notification => write!(f, "Notification"),
            Self::PhaseChange => write!(f, "Phase change"),
            Self::Unknown(code) => write!(f, "0x{:02X}", code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Battery {
    Full,
    Half,
    Low,
    ChangeBatteries,
    AcAdapter,
    Unknown(u8),
}

impl Battery {
    fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::Full,
            0x01 => Self::Half,
            0x02 => Self::Low,
            0x03 => Self::ChangeBatteries,
            0x04 => Self::AcAdapter,
            code => Self::Unknown(code),
        }
    }
}

impl fmt::Display for Battery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "Full"),
            Self::Half => write!(f, "Half"),
            Self::Low => write!(f, "Low"),
            Self::ChangeBatteries => write!(f, "Change batteries"),
            Self::AcAdapter => write!(f, "AC adapter in use"),
            Self::Unknown(code) => write!(f, "0x{:02X}", code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Receiving,
    Printing,
    Unknown(u8),
}

impl Phase {
    fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::Receiving,
            0x01 => Self::Printing,
            code => Self::Unknown(code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    NotAvailable,
    CoolingStarted,
    CoolingFinished,
}

impl Notification {
    fn from_code(code: u8) -> Self {
        match code {
            0x03 => Self::CoolingStarted,
            0x04 => Self::CoolingFinished,
            _ => Self::NotAvailable,
        }
    }
}

/// Kind of tape installed in the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    NoMedia,
    /// Laminated tape, stamp tape and security tape.
    Laminated,
    /// Instant lettering tape and iron-on transfer tape.
    Lettering,
    /// Non-laminated tape/rolls and thermal tape.
    NonLaminated,
    AvTape,
    /// TZ/HG tape.
    HgTape,
    Unknown(u8),
}

impl MediaType {
    fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::NoMedia,
            0x01 => Self::Laminated,
            0x02 => Self::Lettering,
            0x03 => Self::NonLaminated,
            0x08 => Self::AvTape,
            0x09 => Self::HgTape,
            code => Self::Unknown(code),
        }
    }
}

///
/// Status received from the printer decoded to a Rust friendly type.
///
#[derive(Debug, Clone, Copy)]
pub struct Status {
    /// False when the 8-byte frame header did not match the expected
    /// magic. Non-fatal; the rest of the frame is decoded regardless.
    pub header_ok: bool,
    pub status_type: StatusType,
    pub battery: Battery,
    pub media_width: u8,
    pub media_type: MediaType,
    pub media_length: u8,
    pub phase: Phase,
    pub notification: Notification,
    pub error1: u8,
    pub error2: u8,
    pub extended_error: u8,
}

impl Status {
    /// Decode a raw status frame.
    ///
    /// Anything other than exactly 32 bytes fails with
    /// [`Error::StatusLength`]; no partial fields are produced.
    pub fn parse(raw: &[u8]) -> Result<Self, Error> {
        if raw.len() != STATUS_FRAME_LEN {
            return Err(Error::StatusLength(raw.len()));
        }

        let header_ok = raw[..8] == HEADER_MAGIC;
        if !header_ok {
            warn!("status header mismatch, got {:02X?}", &raw[..8]);
        }

        Ok(Status {
            header_ok,
            status_type: StatusType::from_code(raw[OFFSET_STATUS_TYPE]),
            battery: Battery::from_code(raw[OFFSET_BATTERY]),
            media_width: raw[OFFSET_MEDIA_WIDTH],
            media_type: MediaType::from_code(raw[OFFSET_MEDIA_TYPE]),
            media_length: raw[OFFSET_MEDIA_LENGTH],
            phase: Phase::from_code(raw[OFFSET_PHASE_TYPE]),
            notification: Notification::from_code(raw[OFFSET_NOTIFICATION]),
            error1: raw[OFFSET_ERROR_INFO_1],
            error2: raw[OFFSET_ERROR_INFO_2],
            extended_error: raw[OFFSET_EXTENDED_ERROR],
        })
    }

    /// Classify the error bytes of this frame, if any error is flagged.
    pub fn error(&self) -> Option<PrinterError> {
        PrinterError::from_bytes(self.error1, self.error2)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status: {}", self.status_type)?;
        if let Some(error) = self.error() {
            write!(f, ", Error: {}", error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> [u8; 32] {
        let mut raw = [0u8; 32];
        raw[..8].copy_from_slice(&HEADER_MAGIC);
        raw
    }

    #[test]
    fn wrong_length_never_yields_partial_fields() {
        for len in [0usize, 1, 16, 31, 33, 64] {
            match Status::parse(&vec![0u8; len]) {
                Err(Error::StatusLength(got)) => assert_eq!(got, len),
                other => panic!("expected length error for {}, got {:?}", len, other),
            }
        }
    }

    #[test]
    fn decodes_fixed_offsets() {
        let mut raw = frame();
        raw[6] = 0x02; // battery low
        raw[7] = 0x7F;
        raw[8] = 0x01;
        raw[9] = 0x10;
        raw[10] = 12;
        raw[11] = 0x01;
        raw[17] = 24;
        raw[18] = 0x02;
        raw[19] = 0x01;
        raw[22] = 0x03;

        let status = Status::parse(&raw).unwrap();
        assert_eq!(status.battery, Battery::Low);
        assert_eq!(status.extended_error, 0x7F);
        assert_eq!(status.error1, 0x01);
        assert_eq!(status.error2, 0x10);
        assert_eq!(status.media_width, 12);
        assert_eq!(status.media_type, MediaType::Laminated);
        assert_eq!(status.media_length, 24);
        assert_eq!(status.status_type, StatusType::ErrorOccurred);
        assert_eq!(status.phase, Phase::Printing);
        assert_eq!(status.notification, Notification::CoolingStarted);
        // Error byte 1 flag outranks the cover-open flag in byte 2.
        assert_eq!(status.error(), Some(PrinterError::NoMedia));
    }

    #[test]
    fn header_mismatch_is_non_fatal() {
        let mut raw = frame();
        raw[0] = 0x00;
        let status = Status::parse(&raw).unwrap();
        assert!(!status.header_ok);
        assert_eq!(status.status_type, StatusType::ReplyToRequest);
    }

    #[test]
    fn battery_codes_overlapping_the_magic_stay_decodable() {
        let mut raw = frame();
        raw[6] = 0x03;
        let status = Status::parse(&raw).unwrap();
        assert!(!status.header_ok);
        assert_eq!(status.battery, Battery::ChangeBatteries);
    }

    #[test]
    fn unknown_codes_render_as_hex() {
        let mut raw = frame();
        raw[6] = 0xAB;
        raw[18] = 0xCD;
        let status = Status::parse(&raw).unwrap();
        assert_eq!(status.battery, Battery::Unknown(0xAB));
        assert_eq!(status.battery.to_string(), "0xAB");
        assert_eq!(status.status_type, StatusType::Unknown(0xCD));
        assert_eq!(status.to_string(), "Status: 0xCD");
    }
}
