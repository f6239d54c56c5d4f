//! Serial transport backed by the `serialport` crate.
//!
//! The PT series talks 9600 baud, 8 data bits, no parity, 1 stop bit,
//! with DTR/DSR handshaking. `serialport` has no DSR/DTR flow-control
//! mode, so the port is opened with RTS/CTS hardware flow control and
//! DTR is asserted explicitly; the printer only gates on DTR, which
//! this covers. Bluetooth-paired units usually surface as a virtual
//! comm port, so this transport covers them too.

use std::io::{self, Read, Write};

use log::info;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::error::Error;
use crate::transport::{Transport, IO_TIMEOUT};

/// Fixed line speed of the PT serial protocol.
pub const BAUD_RATE: u32 = 9600;

/// A printer reachable through a serial device.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialTransport {
    /// Open a serial device with the fixed protocol parameters
    /// (9600 8N1, RTS/CTS flow control plus asserted DTR, 10 s
    /// symmetric timeout).
    pub fn open(path: &str) -> Result<Self, Error> {
        info!("Opening serial device connection...");
        let mut port = serialport::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::Hardware)
            .timeout(IO_TIMEOUT)
            .open()?;

        // The device gates its receiver on DTR.
        port.write_data_terminal_ready(true)?;

        Ok(SerialTransport {
            port,
            name: path.to_string(),
        })
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(count) => Ok(count),
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// One entry of the comm-port directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortListing {
    /// OS device path to open, e.g. `/dev/ttyUSB0` or `COM3`.
    pub device: String,
    /// Display name, annotated with the USB product string when the OS
    /// exposes one.
    pub name: String,
}

/// List serial devices present on the system.
///
/// This is the discovery boundary for the serial transport kind; callers
/// pick an entry and hand its `device` to [`SerialTransport::open`].
pub fn list_ports() -> Vec<PortListing> {
    serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|info| {
            let product = match &info.port_type {
                serialport::SerialPortType::UsbPort(usb) => usb.product.clone(),
                _ => None,
            };
            PortListing {
                name: display_name(&info.port_name, product.as_deref()),
                device: info.port_name,
            }
        })
        .collect()
}

fn display_name(device: &str, product: Option<&str>) -> String {
    match product {
        Some(product) => format!("{} ({})", product, device),
        None => device.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_product_string() {
        assert_eq!(
            display_name("/dev/ttyUSB0", Some("PT-P300BT")),
            "PT-P300BT (/dev/ttyUSB0)"
        );
        assert_eq!(display_name("/dev/ttyS0", None), "/dev/ttyS0");
    }
}
