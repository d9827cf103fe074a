//! Handshake state machine
//!
//! Establishes a fresh sequence number before Auth traffic is trusted.
//! Both ends run the same machine in different roles:
//!
//! ```text
//! initiator:  Idle --send SYN--> SynSent --recv SYN_ACK(n)--> Established  (+ ACK(n+1))
//! responder:  *    --recv SYN--> AwaitingAck (sent SYN_ACK(0)) --recv ACK--> Established
//! ```
//!
//! A `SYN_ACK` alone completes the initiator (2-way); the responder also
//! accepts the first Auth request in `AwaitingAck` as completion.

use std::fmt;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::kind::HandshakeStage;
use crate::message::HandshakeMessage;

/// Which end of the link this machine runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Host: sends SYN
    Initiator,

    /// Device: answers SYN
    Responder,
}

/// Handshake state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// No handshake in progress
    Idle,

    /// Initiator sent SYN, waiting for SYN_ACK
    SynSent,

    /// Responder answered SYN_ACK, waiting for ACK
    AwaitingAck,

    /// Sequence agreed; Auth traffic is trusted
    Established,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::SynSent => "syn sent",
            Self::AwaitingAck => "awaiting ack",
            Self::Established => "established",
        };
        f.write_str(name)
    }
}

/// Handshake state and the negotiated sequence number
#[derive(Debug, Clone)]
pub struct Handshake {
    role: Role,
    state: HandshakeState,
    sequence: Option<u32>,
    send_final_ack: bool,
}

impl Handshake {
    /// Sequence number a responder hands out
    pub const INITIAL_SEQUENCE: u32 = 0;

    /// Create an idle handshake for the given role
    pub fn new(role: Role) -> Self {
        Self {
            role,
            state: HandshakeState::Idle,
            sequence: None,
            send_final_ack: true,
        }
    }

    /// Choose whether the initiator answers SYN_ACK with a final ACK
    pub fn with_final_ack(mut self, send_final_ack: bool) -> Self {
        self.send_final_ack = send_final_ack;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Get current state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Negotiated sequence number, `None` until a handshake got that far
    pub fn sequence(&self) -> Option<u32> {
        self.sequence
    }

    /// Check if Auth traffic may be acted on
    pub fn is_established(&self) -> bool {
        matches!(self.state, HandshakeState::Established)
    }

    /// Start a handshake (initiator only)
    ///
    /// Returns the SYN to send. Any previous sequence is discarded.
    pub fn initiate(&mut self) -> Result<HandshakeMessage> {
        if self.role != Role::Initiator {
            return Err(Error::ProtocolSequence(
                "responder cannot initiate a handshake".into(),
            ));
        }

        self.sequence = None;
        self.state = HandshakeState::SynSent;
        debug!("Handshake: SYN sent");

        Ok(HandshakeMessage::syn())
    }

    /// Feed a received handshake message
    ///
    /// Returns the reply to send, if any.
    ///
    /// # Errors
    ///
    /// [`Error::HandshakeAborted`] if the stage is `Invalid` or does not fit
    /// the current state. The state has been reset to `Idle` when this is
    /// returned.
    pub fn on_message(&mut self, message: &HandshakeMessage) -> Result<Option<HandshakeMessage>> {
        match (self.role, self.state, message.stage) {
            // Any SYN re-arms a responder, including an established one
            (Role::Responder, _, HandshakeStage::Syn) => {
                if self.state != HandshakeState::Idle {
                    debug!(from = %self.state, "Handshake: re-handshake requested");
                }

                self.sequence = Some(Self::INITIAL_SEQUENCE);
                self.state = HandshakeState::AwaitingAck;
                debug!("Handshake: SYN received, replying SYN_ACK");

                Ok(Some(HandshakeMessage::syn_ack(Self::INITIAL_SEQUENCE)))
            }

            (Role::Responder, HandshakeState::AwaitingAck, HandshakeStage::Ack) => {
                let expected = self.sequence.map(|seq| seq.wrapping_add(1));
                if message.ack != expected {
                    warn!(
                        received = ?message.ack,
                        expected = ?expected,
                        "Handshake: ACK number differs from expected"
                    );
                }

                self.state = HandshakeState::Established;
                debug!("Handshake: established (3-way)");

                Ok(None)
            }

            (Role::Initiator, HandshakeState::SynSent, HandshakeStage::SynAck) => {
                let ack = message.ack.unwrap_or(Self::INITIAL_SEQUENCE);

                self.sequence = Some(ack);
                self.state = HandshakeState::Established;
                debug!(sequence = ack, "Handshake: established");

                if self.send_final_ack {
                    Ok(Some(HandshakeMessage::ack(ack.wrapping_add(1))))
                } else {
                    Ok(None)
                }
            }

            (_, state, stage) => {
                self.reset();
                warn!(%stage, %state, "Handshake: aborted");

                Err(Error::HandshakeAborted { stage, state })
            }
        }
    }

    /// Treat the first trusted request as the end of a 2-way handshake
    ///
    /// Only a responder in `AwaitingAck` is promoted. Returns whether the
    /// session is established afterwards.
    pub fn complete_implicitly(&mut self) -> bool {
        if self.role == Role::Responder && self.state == HandshakeState::AwaitingAck {
            self.state = HandshakeState::Established;
            debug!("Handshake: established (2-way, peer sent no ACK)");
        }

        self.is_established()
    }

    /// Drop back to idle and forget the sequence
    pub fn reset(&mut self) {
        self.state = HandshakeState::Idle;
        self.sequence = None;
    }
}
