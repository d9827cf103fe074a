//! # fpauth-core
//!
//! Core protocol implementation for the serial fingerprint authenticator.
//!
//! This crate provides the I/O-free protocol pieces:
//! - Frame envelope and payload encoding/decoding
//! - Wire discriminants with forward-compatible clamping
//! - Handshake state machine (both roles)
//! - Sensor capability and the device-side auth state machine
//! - Protocol constants

pub mod constants;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod kind;
pub mod message;
pub mod responder;
pub mod sensor;

pub use error::{Error, FramingError, Result};
pub use frame::Frame;
pub use handshake::{Handshake, HandshakeState, Role};
pub use kind::{AuthOp, HandshakeStage, PacketKind};
pub use message::{AuthMessage, HandshakeMessage, Message};
pub use responder::{AuthPhase, RegisterStep, Responder};
pub use sensor::{Sensor, SensorError};
