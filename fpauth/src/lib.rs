//! # fpauth
//!
//! Host and device sessions for a USB-serial fingerprint authenticator.
//!
//! ## Features
//!
//! - Length-prefixed frame protocol with Debug, Handshake and Auth payloads
//! - Non-blocking device session driven one tick at a time
//! - Host initiator with a bounded poll-sleep-retry budget
//! - Blocking adapter returning a tri-state verdict for credential hooks
//!
//! ## Quick Start
//!
//! ```no_run
//! use fpauth::{FrameTransport, Initiator, Operation, TcpChannel};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> fpauth::Result<()> {
//!     // Serial line exposed by a TCP bridge
//!     let mut channel = TcpChannel::new("127.0.0.1", 7000);
//!     channel.connect()?;
//!
//!     let mut initiator = Initiator::new(FrameTransport::new(channel));
//!     let verdict = initiator.execute(Operation::Verify, "alice").await?;
//!     println!("{}", verdict);
//!
//!     Ok(())
//! }
//! ```

pub mod blocking;
pub mod device;
pub mod error;
pub mod event;
pub mod host;

// Re-exports
pub use device::{DeviceConfig, DeviceSession, SessionPhase};
pub use error::{Error, Result};
pub use event::{ChannelEvent, EventSender};
pub use host::{verdict_for, Initiator, InitiatorConfig};

// Re-export protocol and transport types
pub use fpauth_core::{
    AuthMessage, AuthOp, AuthPhase, Frame, HandshakeMessage, HandshakeState, Message, PacketKind,
    Sensor, SensorError,
};
pub use fpauth_transport::{Channel, FrameTransport, MemoryChannel, TcpChannel};
pub use fpauth_types::{Operation, UserId, Verdict};
