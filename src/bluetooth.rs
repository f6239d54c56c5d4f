//! Bluetooth RFCOMM transport.
//!
//! Paired PT units advertise a Serial Port Profile service whose RFCOMM
//! channel has to be discovered before connecting. Right after pairing
//! the service is often not advertised yet, so the lookup is retried a
//! bounded number of times before giving up.
//!
//! The socket itself is a raw `AF_BLUETOOTH` stream socket (Linux); on
//! other platforms connecting fails with an unsupported-platform error.

use std::fmt;
use std::io;
use std::process::Command;
use std::str::FromStr;

use log::{info, warn};

use crate::error::Error;
use crate::transport::Transport;

/// How many times the SPP service lookup is attempted before the
/// connection fails. The service may not be advertised right after
/// pairing.
pub const SERVICE_LOOKUP_ATTEMPTS: u32 = 10;

/// A Bluetooth device address (`XX:XX:XX:XX:XX:XX`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BdAddr([u8; 6]);

impl BdAddr {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Address in socket byte order (least significant octet first).
    #[cfg(unix)]
    fn to_wire(self) -> [u8; 6] {
        let mut wire = self.0;
        wire.reverse();
        wire
    }
}

impl FromStr for BdAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(Error::InvalidAddress(s.to_string()));
        }
        let mut octets = [0u8; 6];
        for (octet, part) in octets.iter_mut().zip(&parts) {
            if part.len() != 2 {
                return Err(Error::InvalidAddress(s.to_string()));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| Error::InvalidAddress(s.to_string()))?;
        }
        Ok(BdAddr(octets))
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// One attempt at resolving the RFCOMM channel of the device's Serial
/// Port Profile service.
///
/// `Ok(None)` means the lookup ran but the service is not (yet)
/// advertised; the caller decides whether to retry.
pub trait SppResolver {
    fn find_channel(&mut self, address: &BdAddr) -> io::Result<Option<u8>>;
}

/// Default resolver shelling out to BlueZ's `sdptool`.
pub struct SdptoolResolver;

impl SppResolver for SdptoolResolver {
    fn find_channel(&mut self, address: &BdAddr) -> io::Result<Option<u8>> {
        let address = address.to_string();
        let output = Command::new("sdptool")
            .args(["search", "--bdaddr", address.as_str(), "SP"])
            .output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_channel(&stdout))
    }
}

/// Pick the RFCOMM channel out of `sdptool search` output.
fn parse_channel(output: &str) -> Option<u8> {
    for line in output.lines() {
        if let Some(rest) = line.trim().strip_prefix("Channel:") {
            if let Ok(channel) = rest.trim().parse() {
                return Some(channel);
            }
        }
    }
    None
}

/// Run the service lookup with the bounded retry policy.
fn resolve_with_retry<R>(address: &BdAddr, resolver: &mut R) -> Result<u8, Error>
where
    R: SppResolver + ?Sized,
{
    for attempt in 1..=SERVICE_LOOKUP_ATTEMPTS {
        if let Some(channel) = resolver.find_channel(address).map_err(Error::Connect)? {
            info!("Found serial service on channel {}", channel);
            return Ok(channel);
        }
        warn!(
            "No service candidate found, re-querying... ({}/{})",
            attempt, SERVICE_LOOKUP_ATTEMPTS
        );
    }
    Err(Error::ServiceNotFound(address.to_string()))
}

/// A printer reachable through a Bluetooth RFCOMM socket.
pub struct BluetoothTransport {
    #[cfg(unix)]
    socket: rfcomm::RfcommSocket,
    name: String,
}

impl BluetoothTransport {
    /// Discover the device's serial service and connect to it.
    ///
    /// The service lookup is retried up to [`SERVICE_LOOKUP_ATTEMPTS`]
    /// times; when every attempt comes back empty the connection fails
    /// with [`Error::ServiceNotFound`].
    #[cfg(unix)]
    pub fn connect<R>(address: BdAddr, resolver: &mut R) -> Result<Self, Error>
    where
        R: SppResolver + ?Sized,
    {
        let channel = resolve_with_retry(&address, resolver)?;
        let socket = rfcomm::RfcommSocket::connect(&address, channel).map_err(Error::Connect)?;
        info!("Connected to {} on channel {}", address, channel);
        Ok(BluetoothTransport {
            socket,
            name: address.to_string(),
        })
    }

    #[cfg(not(unix))]
    pub fn connect<R>(_address: BdAddr, _resolver: &mut R) -> Result<Self, Error>
    where
        R: SppResolver + ?Sized,
    {
        Err(Error::Unsupported)
    }
}

#[cfg(unix)]
impl Transport for BluetoothTransport {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.socket.write_all(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.read(buf)
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        // The socket has no input buffer to reset; matches the serial
        // transport's contract as a no-op.
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(not(unix))]
impl Transport for BluetoothTransport {
    fn write_all(&mut self, _data: &[u8]) -> io::Result<()> {
        Err(unsupported())
    }

    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(unsupported())
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        Err(unsupported())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(not(unix))]
fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Other,
        "Bluetooth transport is not supported on this platform",
    )
}

#[cfg(unix)]
mod rfcomm {
    //! Raw RFCOMM stream socket plumbing; all `libc` calls live here.

    use std::io;
    use std::mem;
    use std::os::unix::io::RawFd;

    use crate::transport::IO_TIMEOUT;

    use super::BdAddr;

    const AF_BLUETOOTH: libc::c_int = 31;
    const BTPROTO_RFCOMM: libc::c_int = 3;

    #[repr(C)]
    struct SockaddrRc {
        rc_family: libc::sa_family_t,
        rc_bdaddr: [u8; 6],
        rc_channel: u8,
    }

    pub struct RfcommSocket {
        fd: RawFd,
    }

    impl RfcommSocket {
        pub fn connect(address: &BdAddr, channel: u8) -> io::Result<Self> {
            let fd = unsafe { libc::socket(AF_BLUETOOTH, libc::SOCK_STREAM, BTPROTO_RFCOMM) };
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            let socket = RfcommSocket { fd };
            socket.set_timeouts()?;

            let addr = SockaddrRc {
                rc_family: AF_BLUETOOTH as libc::sa_family_t,
                rc_bdaddr: address.to_wire(),
                rc_channel: channel,
            };
            let result = unsafe {
                libc::connect(
                    socket.fd,
                    &addr as *const SockaddrRc as *const libc::sockaddr,
                    mem::size_of::<SockaddrRc>() as libc::socklen_t,
                )
            };
            if result != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(socket)
        }

        fn set_timeouts(&self) -> io::Result<()> {
            let timeval = libc::timeval {
                tv_sec: IO_TIMEOUT.as_secs() as libc::time_t,
                tv_usec: 0,
            };
            for option in [libc::SO_RCVTIMEO, libc::SO_SNDTIMEO] {
                let result = unsafe {
                    libc::setsockopt(
                        self.fd,
                        libc::SOL_SOCKET,
                        option,
                        &timeval as *const libc::timeval as *const libc::c_void,
                        mem::size_of::<libc::timeval>() as libc::socklen_t,
                    )
                };
                if result != 0 {
                    return Err(io::Error::last_os_error());
                }
            }
            Ok(())
        }

        pub fn write_all(&self, mut data: &[u8]) -> io::Result<()> {
            while !data.is_empty() {
                let written = unsafe {
                    libc::write(self.fd, data.as_ptr() as *const libc::c_void, data.len())
                };
                if written < 0 {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }
                    return Err(err);
                }
                data = &data[written as usize..];
            }
            Ok(())
        }

        pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
            loop {
                let count = unsafe {
                    libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len())
                };
                if count < 0 {
                    let err = io::Error::last_os_error();
                    match err.kind() {
                        io::ErrorKind::Interrupted => continue,
                        // A receive timeout surfaces as EAGAIN.
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => return Ok(0),
                        _ => return Err(err),
                    }
                }
                return Ok(count as usize);
            }
        }
    }

    impl Drop for RfcommSocket {
        fn drop(&mut self) {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}
