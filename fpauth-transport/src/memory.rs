//! In-memory duplex channel
//!
//! Two connected endpoints backed by shared byte queues. Used by tests and
//! simulations in place of a USB CDC line. Dropping or closing one end makes
//! the other read end-of-data once drained and fail its writes.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::Channel;

#[derive(Debug, Default)]
struct Pipe {
    data: VecDeque<u8>,
    closed: bool,
}

/// One end of an in-memory duplex channel
#[derive(Debug)]
pub struct MemoryChannel {
    rx: Arc<Mutex<Pipe>>,
    tx: Arc<Mutex<Pipe>>,

    /// Accept at most this many bytes per write call
    write_limit: Option<usize>,
    name: &'static str,
}

impl MemoryChannel {
    /// Create two connected endpoints
    pub fn pair() -> (Self, Self) {
        let a_to_b = Arc::new(Mutex::new(Pipe::default()));
        let b_to_a = Arc::new(Mutex::new(Pipe::default()));

        let a = Self {
            rx: b_to_a.clone(),
            tx: a_to_b.clone(),
            write_limit: None,
            name: "memory:a",
        };
        let b = Self {
            rx: a_to_b,
            tx: b_to_a,
            write_limit: None,
            name: "memory:b",
        };

        (a, b)
    }

    /// Simulate a congested line that accepts only `limit` bytes per write
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Close both directions
    pub fn close(&mut self) {
        self.tx.lock().closed = true;
        self.rx.lock().closed = true;
    }

    /// Bytes waiting to be read on this end
    pub fn pending(&self) -> usize {
        self.rx.lock().data.len()
    }
}

impl Read for MemoryChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut pipe = self.rx.lock();

        if pipe.data.is_empty() {
            return if pipe.closed {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        }

        let n = buf.len().min(pipe.data.len());
        for (slot, byte) in buf.iter_mut().zip(pipe.data.drain(..n)) {
            *slot = byte;
        }

        Ok(n)
    }
}

impl Write for MemoryChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut pipe = self.tx.lock();

        if pipe.closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }

        let n = self.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        pipe.data.extend(&buf[..n]);

        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Channel for MemoryChannel {
    fn peer(&self) -> String {
        self.name.to_string()
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_memory_pair_exchange() {
        let (mut a, mut b) = MemoryChannel::pair();

        a.write_all(b"ping").unwrap();
        assert_eq!(b.pending(), 4);

        let mut buf = [0u8; 8];
        let n = b.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
    }

    #[test]
    fn test_memory_empty_would_block() {
        let (mut a, _b) = MemoryChannel::pair();
        let mut buf = [0u8; 4];

        let error = a.read(&mut buf).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_memory_drains_before_eof() {
        let (mut a, mut b) = MemoryChannel::pair();
        a.write_all(b"bye").unwrap();
        drop(a);

        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf).unwrap(), 3);
        assert_eq!(b.read(&mut buf).unwrap(), 0);
        assert_eq!(b.write(b"x").unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_memory_write_limit() {
        let (a, _b) = MemoryChannel::pair();
        let mut a = a.with_write_limit(2);

        assert_eq!(a.write(b"abcdef").unwrap(), 2);
    }
}
