//! P-Touch Cube Printer Driver
//!
//! This crate drives Brother P-Touch label makers (PT-P300BT and friends)
//! over a serial port or a Bluetooth RFCOMM socket using the raster
//! (PTCBP) command protocol.
//!
//! # Example
//!
//! ```rust,no_run
//! use ptlabel::{Bitmap, MediaFormat, PrintConfig, Printer, SerialTransport};
//!
//! let transport = SerialTransport::open("/dev/ttyUSB0").unwrap();
//! let config = PrintConfig::new().auto_tape_cut(true).set_margin(14);
//! let printer = Printer::new(transport, config, MediaFormat::default());
//!
//! let bitmap = Bitmap::from_pixels(160, |_x, _y| true);
//! let outcome = printer.print_label(&bitmap).unwrap();
//! println!("{:?}", outcome);
//! ```

mod bluetooth;
mod config;
mod error;
mod printer;
mod raster;
mod serial;
mod status;
mod transport;

pub use crate::{
    bluetooth::{BdAddr, BluetoothTransport, SdptoolResolver, SppResolver},
    config::{ExpandedMode, FeedMargin, MediaFormat, ModeFlags, PrintConfig},
    error::{Error, PrinterError},
    printer::{JobOutcome, Printer, Stage},
    raster::{Bitmap, RasterCodec},
    serial::{list_ports, PortListing, SerialTransport},
    status::{Battery, MediaType, Notification, Phase, Status, StatusType},
    transport::Transport,
};

/// Height of the print buffer in pixels.
///
/// The PT-P300BT rasterizes into a fixed 128 pixel tall buffer regardless
/// of the installed tape width; narrower tapes only use the middle of it.
pub const BUFFER_HEIGHT: u32 = 128;

/// Size of one raster line in bytes (128 pixels at 1 bpp).
///
/// One line is the atomic compression unit of the transfer protocol. This
/// mirrors the chunk size used by the official Brother app; other values
/// are untested against hardware.
pub const RASTER_LINE_BYTES: usize = (BUFFER_HEIGHT / 8) as usize;
