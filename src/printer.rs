//! The protocol engine: command sequencing for a raster print job.
//!
//! A print job is one strictly ordered, blocking command exchange; the
//! device has no framing recovery, so bytes must reach it exactly in the
//! order below. Any transport failure aborts the job, and a failed job
//! must be restarted from scratch with a fresh engine.

use std::fmt;

use log::{debug, info, warn};

use crate::config::{ExpandedMode, FeedMargin, MediaFormat, ModeFlags, PrintConfig};
use crate::error::Error;
use crate::raster::{Bitmap, RasterCodec};
use crate::status::{Status, STATUS_FRAME_LEN};
use crate::transport::Transport;

const ENTER_RASTER_MODE: [u8; 4] = [0x1B, 0x69, 0x61, 0x01]; // ESC i a : PTCBP mode
const INITIALIZE: [u8; 2] = [0x1B, 0x40]; // ESC @ : clear buffer and position
const QUERY_STATUS: [u8; 3] = [0x1B, 0x69, 0x53]; // ESC i S
const SET_MEDIA_QUALITY: [u8; 3] = [0x1B, 0x69, 0x7A]; // ESC i z
const SET_EXPANDED_MODE: [u8; 3] = [0x1B, 0x69, 0x4B]; // ESC i K
const SET_MODE_FLAGS: [u8; 3] = [0x1B, 0x69, 0x4D]; // ESC i M
const SET_MARGIN: [u8; 3] = [0x1B, 0x69, 0x64]; // ESC i d
const SET_COMPRESSION_TIFF: [u8; 2] = [0x4D, 0x02]; // M : select PackBits
const PRINT_AND_FEED: u8 = 0x1A; // Control-Z

/// Number of filler zero bytes written to clear residual buffer state.
///
/// The official app always sends 64 regardless of the job size; kept as
/// observed vendor behavior, not derived from any documented rule.
const FLUSH_BYTES: usize = 64;

/// Unused trailing bytes of the media & quality command.
const MEDIA_FORMAT_PADDING: [u8; 4] = [0x00; 4];

/// Sequencing step at which a transport failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initializing,
    QueryingStatus,
    FlushingBuffer,
    Reinitializing,
    SettingGraphicsMode,
    SettingMediaFormat,
    ApplyingConfig,
    SendingCompressionMode,
    StreamingData,
    PrintAndFeed,
    AwaitingFinalStatus,
    Closing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initializing => "initialization",
            Self::QueryingStatus => "status query",
            Self::FlushingBuffer => "buffer flush",
            Self::Reinitializing => "re-initialization",
            Self::SettingGraphicsMode => "graphics mode selection",
            Self::SettingMediaFormat => "media format setup",
            Self::ApplyingConfig => "config application",
            Self::SendingCompressionMode => "compression mode selection",
            Self::StreamingData => "raster data streaming",
            Self::PrintAndFeed => "print and feed",
            Self::AwaitingFinalStatus => "final status read",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Result of a completed print job.
#[derive(Debug, Clone, Copy)]
pub enum JobOutcome {
    /// The final status frame was decoded; it is the authoritative
    /// result of the job.
    Completed(Status),
    /// The print commands were all sent, but the final status frame was
    /// missing or truncated, so the real outcome is unknown.
    Unknown { frame_len: usize },
}

/// Protocol engine driving one printer over one transport.
///
/// The engine owns the transport exclusively; the caller must not run
/// two jobs on the same device concurrently. [`Printer::print_label`]
/// consumes the engine so the transport is released on every exit path.
pub struct Printer<T: Transport> {
    transport: T,
    config: PrintConfig,
    media: MediaFormat,
}

impl<T: Transport> Printer<T> {
    pub fn new(transport: T, config: PrintConfig, media: MediaFormat) -> Self {
        Printer {
            transport,
            config,
            media,
        }
    }

    /// Read printer status outside of a print job.
    ///
    /// This method is convenient for inspection when a new media is
    /// added.
    pub fn query_status(&mut self) -> Result<Status, Error> {
        self.write(Stage::QueryingStatus, &QUERY_STATUS)?;
        let raw = self.read_status_frame(Stage::QueryingStatus)?;
        debug!("Raw status frame: {:02X?}", raw);
        Status::parse(&raw)
    }

    /// Print one label.
    ///
    /// Runs the full command sequence: mode selection, initialization,
    /// status query, buffer flush, media format, config application,
    /// compression selection, raster streaming, print-and-feed, final
    /// status. Any I/O error aborts immediately with the stage at which
    /// it occurred; the sequence is never partially retried.
    pub fn print_label(mut self, bitmap: &Bitmap) -> Result<JobOutcome, Error> {
        info!("Using device: {}", self.transport.name());
        self.transport
            .reset_input_buffer()
            .map_err(|source| Error::Transport {
                stage: Stage::Initializing,
                source,
            })?;

        info!("Entering raster graphics (PTCBP) mode...");
        self.write(Stage::Initializing, &ENTER_RASTER_MODE)?;

        info!("Initialize...");
        self.write(Stage::Initializing, &INITIALIZE)?;

        info!("Query status...");
        self.write(Stage::QueryingStatus, &QUERY_STATUS)?;
        let raw = self.read_status_frame(Stage::QueryingStatus)?;
        match Status::parse(&raw) {
            Ok(status) => {
                debug!("Raw status frame: {:02X?}", raw);
                info!("{}", status);
                info!("Battery: {}", status.battery);
                if status.extended_error != 0 {
                    info!("Extended error: 0x{:02X}", status.extended_error);
                }
            }
            Err(err) => warn!("Ignoring undecodable status reply: {}", err),
        }

        info!("Flushing print buffer...");
        self.write(Stage::FlushingBuffer, &[0x00; FLUSH_BYTES])?;

        info!("Initialize...");
        self.write(Stage::Reinitializing, &INITIALIZE)?;

        // The mode selection does not survive the flush and must be
        // repeated.
        info!("Entering raster graphics (PTCBP) mode...");
        self.write(Stage::SettingGraphicsMode, &ENTER_RASTER_MODE)?;

        self.set_media_format(bitmap)?;

        self.set_expanded_mode(self.config.expanded_mode())?;
        self.set_mode_flags(self.config.mode_flags())?;
        self.set_margin(self.config.feed_margin())?;

        self.write(Stage::SendingCompressionMode, &SET_COMPRESSION_TIFF)?;

        info!("Sending image data");
        let codec = RasterCodec::new(bitmap.line_bytes());
        self.write(Stage::StreamingData, &codec.encode(bitmap.as_bytes()))?;
        info!("Done");

        self.write(Stage::PrintAndFeed, &[PRINT_AND_FEED])?;

        info!("Waiting for final status...");
        let raw = self.read_status_frame(Stage::AwaitingFinalStatus)?;
        let parsed = Status::parse(&raw);

        // Housekeeping initialize before the transport is released.
        self.write(Stage::Closing, &INITIALIZE)?;

        match parsed {
            Ok(status) => {
                info!("{}", status);
                if let Some(error) = status.error() {
                    return Err(Error::Device(error));
                }
                Ok(JobOutcome::Completed(status))
            }
            Err(err) => {
                warn!("Print commands sent but final status is unreadable: {}", err);
                Ok(JobOutcome::Unknown {
                    frame_len: raw.len(),
                })
            }
        }
    }

    fn set_media_format(&mut self, bitmap: &Bitmap) -> Result<(), Error> {
        info!("Setting media format...");
        let line_count = bitmap.line_count();
        debug!("Setting raster lines: {}", line_count);

        let mut buf = Vec::with_capacity(13);
        buf.extend_from_slice(&SET_MEDIA_QUALITY);
        buf.push(self.media.quality_byte());
        buf.push(self.media.media_kind_byte());
        buf.push(self.media.width);
        buf.push(self.media.length_byte());
        buf.extend_from_slice(&line_count.to_le_bytes());
        buf.extend_from_slice(&MEDIA_FORMAT_PADDING);
        self.write(Stage::SettingMediaFormat, &buf)
    }

    fn set_expanded_mode(&mut self, mode: ExpandedMode) -> Result<(), Error> {
        debug!("Expanded mode: {:02X}", mode.bits());
        let mut buf = SET_EXPANDED_MODE.to_vec();
        buf.push(mode.bits());
        self.write(Stage::ApplyingConfig, &buf)
    }

    fn set_mode_flags(&mut self, flags: ModeFlags) -> Result<(), Error> {
        debug!("Mode flags: {:02X}", flags.bits());
        let mut buf = SET_MODE_FLAGS.to_vec();
        buf.push(flags.bits());
        self.write(Stage::ApplyingConfig, &buf)
    }

    fn set_margin(&mut self, margin: FeedMargin) -> Result<(), Error> {
        let mut buf = SET_MARGIN.to_vec();
        buf.extend_from_slice(&margin.bytes());
        self.write(Stage::ApplyingConfig, &buf)
    }

    fn write(&mut self, stage: Stage, data: &[u8]) -> Result<(), Error> {
        self.transport
            .write_all(data)
            .map_err(|source| Error::Transport { stage, source })
    }

    fn read_status_frame(&mut self, stage: Stage) -> Result<Vec<u8>, Error> {
        self.transport
            .read_frame(STATUS_FRAME_LEN)
            .map_err(|source| Error::Transport { stage, source })
    }
}
