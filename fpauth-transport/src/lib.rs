//! Transport layer for the fingerprint authenticator protocol
//!
//! Turns a non-blocking duplex byte channel into discrete frames.
//! Physical line setup (device path, baud rate, parity) belongs to whoever
//! opens the channel.

pub mod error;
pub mod framed;
pub mod memory;
pub mod tcp;

pub use error::{Error, Result};
pub use framed::FrameTransport;
pub use memory::MemoryChannel;
pub use tcp::TcpChannel;

use std::io::{Read, Write};

/// Duplex byte channel
///
/// Reads must not block: an implementation reports "nothing yet" as
/// [`std::io::ErrorKind::WouldBlock`] and end-of-data as `Ok(0)`.
pub trait Channel: Read + Write + Send {
    /// Describe the peer for logs
    fn peer(&self) -> String;
}

/// Device node opened by the caller with `O_NONBLOCK` and raw line settings
impl Channel for std::fs::File {
    fn peer(&self) -> String {
        "device file".to_string()
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn peer(&self) -> String {
        (**self).peer()
    }
}
