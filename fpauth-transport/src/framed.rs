//! Frame transport over a byte channel
//!
//! Bytes can arrive split across reads. The transport keeps the partial
//! frame between calls and only reads as far as the current frame, so a
//! caller polling [`FrameTransport::try_read_frame`] never blocks and never
//! consumes the next frame early.
//!
//! - `None`: the 4-byte length prefix has not fully arrived, or the body is
//!   still trickling in within the stall limit
//! - `Some(Err(Framing(..)))`: the body never completed (end-of-data or the
//!   stall limit) or the frame is malformed; the channel stays usable
//! - `Some(Err(..))` otherwise: the channel failed and the session is over

use std::io::ErrorKind;

use byteorder::{BigEndian, ByteOrder};
use bytes::BytesMut;
use tracing::{debug, trace, warn};

use fpauth_core::constants::{DEFAULT_BODY_STALL_LIMIT, DEFAULT_MAX_FRAME_LEN, LENGTH_PREFIX_SIZE};
use fpauth_core::{Frame, FramingError};

use crate::{error::*, Channel};

/// Bytes requested from the channel per read call
const READ_CHUNK: usize = 512;

/// How far the current frame has been read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    /// Waiting for the length prefix
    Prefix,

    /// Prefix read, waiting for `declared` more bytes
    Body { declared: usize },
}

/// Outcome of topping up the buffer
enum Fill {
    Ready,
    Pending,
    Eof,
}

/// Frame reader/writer owning a byte channel
pub struct FrameTransport<C> {
    channel: C,
    buffer: BytesMut,
    state: ReadState,
    stalls: u32,
    max_frame_len: usize,
    body_stall_limit: u32,
}

impl<C: Channel> FrameTransport<C> {
    /// Create new frame transport over an open channel
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            state: ReadState::Prefix,
            stalls: 0,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            body_stall_limit: DEFAULT_BODY_STALL_LIMIT,
        }
    }

    /// Set the largest accepted declared length
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Set how many empty polls a started frame may wait for its body
    pub fn with_body_stall_limit(mut self, limit: u32) -> Self {
        self.body_stall_limit = limit;
        self
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Give the channel back, dropping any partial frame
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Check if a frame has been started but not completed
    pub fn is_mid_frame(&self) -> bool {
        self.state != ReadState::Prefix || !self.buffer.is_empty()
    }

    /// Try to read one frame without blocking
    pub fn try_read_frame(&mut self) -> Option<Result<Frame>> {
        self.poll_frame().transpose()
    }

    /// Write one frame
    ///
    /// Returns `false` on any failure, including a short write; nothing is
    /// retried.
    pub fn write_frame(&mut self, frame: &Frame) -> bool {
        match self.send_frame(frame) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write {} to {}: {}", frame, self.channel.peer(), e);
                false
            }
        }
    }

    /// Write one frame, reporting why it failed
    pub fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        let data = frame.encode();

        trace!(
            "Sending {} bytes: {}",
            data.len(),
            hex::encode(&data[..data.len().min(32)])
        );

        let written = self.channel.write(&data)?;
        if written != data.len() {
            return Err(Error::WriteFailed {
                written,
                expected: data.len(),
            });
        }

        self.channel.flush()?;

        Ok(())
    }

    fn poll_frame(&mut self) -> Result<Option<Frame>> {
        let declared = match self.state {
            ReadState::Prefix => {
                match self.fill(LENGTH_PREFIX_SIZE)? {
                    Fill::Ready => {}
                    Fill::Pending => return Ok(None),
                    Fill::Eof => {
                        self.reset();
                        return Err(Error::ConnectionClosed);
                    }
                }

                let declared = BigEndian::read_u32(&self.buffer[..LENGTH_PREFIX_SIZE]) as usize;

                if declared == 0 {
                    self.reset();
                    return Err(FramingError::EmptyFrame.into());
                }

                if declared > self.max_frame_len {
                    self.reset();
                    return Err(FramingError::FrameTooLarge {
                        size: declared,
                        max: self.max_frame_len,
                    }
                    .into());
                }

                self.state = ReadState::Body { declared };
                self.stalls = 0;
                declared
            }
            ReadState::Body { declared } => declared,
        };

        let total = LENGTH_PREFIX_SIZE + declared;

        match self.fill(total)? {
            Fill::Ready => {
                let bytes = self.buffer.split_to(total);
                self.reset();

                let frame = Frame::decode(bytes)?;
                trace!("Received: {:?}", frame);

                Ok(Some(frame))
            }
            Fill::Pending => {
                self.stalls += 1;
                if self.stalls <= self.body_stall_limit {
                    return Ok(None);
                }

                debug!(declared, stalls = self.stalls, "Frame body stalled");
                Err(self.truncate(declared).into())
            }
            Fill::Eof => Err(self.truncate(declared).into()),
        }
    }

    /// Read until the buffer holds `want` bytes or the channel runs dry
    fn fill(&mut self, want: usize) -> Result<Fill> {
        let mut chunk = [0u8; READ_CHUNK];

        while self.buffer.len() < want {
            let missing = (want - self.buffer.len()).min(READ_CHUNK);

            match self.channel.read(&mut chunk[..missing]) {
                Ok(0) => return Ok(Fill::Eof),
                Ok(n) => {
                    trace!("Received {} bytes: {}", n, hex::encode(&chunk[..n]));
                    self.buffer.extend_from_slice(&chunk[..n]);
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(Fill::Pending);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }

        Ok(Fill::Ready)
    }

    /// Drop the partial frame and describe what was missing
    fn truncate(&mut self, declared: usize) -> FramingError {
        let actual = self.buffer.len().saturating_sub(LENGTH_PREFIX_SIZE);
        warn!(expected = declared, actual, "Frame truncated");

        self.reset();
        FramingError::Truncated {
            expected: declared,
            actual,
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.state = ReadState::Prefix;
        self.stalls = 0;
    }
}
