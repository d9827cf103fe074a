//! Host-side initiator
//!
//! Performs one operation against a device: handshake, a single request,
//! then a bounded poll for the matching response. Every wait is
//! `attempts` reads with `poll_interval` sleeps in between; that budget is
//! the only timeout.

use std::time::Duration;

use tracing::{debug, info, warn};

use fpauth_core::constants::{responses, DEFAULT_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use fpauth_core::{AuthMessage, AuthOp, Frame, Handshake, Message, Role};
use fpauth_transport::{Channel, FrameTransport};
use fpauth_types::{Operation, Verdict};

use crate::error::{Error, Result};

/// Host retry and handshake settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitiatorConfig {
    /// Read attempts per wait (handshake, response)
    pub attempts: u32,

    /// Sleep after a read attempt that found nothing
    pub poll_interval: Duration,

    /// Answer SYN_ACK with a final ACK (3-way); `false` stops at 2-way
    pub send_final_ack: bool,
}

impl InitiatorConfig {
    /// Set attempts per wait (at least one)
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Set delay between empty reads
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Enable or disable the final ACK
    pub fn with_final_ack(mut self, send_final_ack: bool) -> Self {
        self.send_final_ack = send_final_ack;
        self
    }
}

impl Default for InitiatorConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            send_final_ack: true,
        }
    }
}

/// Map a device response onto the credential hook's verdict
pub fn verdict_for(response: &AuthMessage) -> Verdict {
    let granted = match response.op {
        AuthOp::CheckUserResponse => response.payload == responses::VERIFIED,
        AuthOp::SetUserResponse | AuthOp::RevokeUserResponse => response.payload == responses::OK,
        _ => false,
    };

    if granted { Verdict::Granted } else { Verdict::Denied }
}

/// Host end of a session
///
/// # Examples
///
/// ```no_run
/// use fpauth::{FrameTransport, Initiator, Operation, TcpChannel};
///
/// # async fn demo() -> fpauth::Result<()> {
/// let mut channel = TcpChannel::new("127.0.0.1", 7000);
/// channel.connect()?;
///
/// let mut initiator = Initiator::new(FrameTransport::new(channel));
/// let verdict = initiator.execute(Operation::Verify, "alice").await?;
/// println!("{}", verdict);
/// # Ok(())
/// # }
/// ```
pub struct Initiator<C> {
    transport: FrameTransport<C>,
    handshake: Handshake,
    config: InitiatorConfig,
}

impl<C: Channel> Initiator<C> {
    /// Create an initiator with default settings
    pub fn new(transport: FrameTransport<C>) -> Self {
        Self::with_config(transport, InitiatorConfig::default())
    }

    /// Create an initiator with explicit settings
    pub fn with_config(transport: FrameTransport<C>, config: InitiatorConfig) -> Self {
        Self {
            transport,
            handshake: Handshake::new(Role::Initiator).with_final_ack(config.send_final_ack),
            config,
        }
    }

    pub fn config(&self) -> &InitiatorConfig {
        &self.config
    }

    /// Check if requests may be sent
    pub fn is_established(&self) -> bool {
        self.handshake.is_established()
    }

    /// Sequence number from the device's SYN_ACK
    pub fn sequence(&self) -> Option<u32> {
        self.handshake.sequence()
    }

    /// Give back the transport
    pub fn into_transport(self) -> FrameTransport<C> {
        self.transport
    }

    /// Run the handshake
    ///
    /// Returns the negotiated sequence number.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if no SYN_ACK arrives within the budget
    /// - a protocol sequence error if an Auth response arrives first
    /// - [`fpauth_core::Error::HandshakeAborted`] for an out-of-place stage
    pub async fn connect(&mut self) -> Result<u32> {
        info!("Handshaking with {}...", self.transport.channel().peer());

        let syn = self.handshake.initiate()?;
        self.send(syn.into())?;

        let sequence = self
            .poll_until("SYN_ACK", |this, message| match message {
                Message::Handshake(handshake) => {
                    if let Some(reply) = this.handshake.on_message(&handshake)? {
                        this.send(reply.into())?;
                    }
                    Ok(this.handshake.sequence())
                }
                Message::Auth(auth) if auth.op.is_response() => {
                    Err(fpauth_core::Error::ProtocolSequence(format!(
                        "{} received before handshake",
                        auth.op
                    ))
                    .into())
                }
                other => {
                    this.observe(&other);
                    Ok(None)
                }
            })
            .await?;

        info!(sequence, "Session established");
        Ok(sequence)
    }

    /// Send one request on an established session
    ///
    /// Returns the response op to wait for.
    pub fn request(&mut self, operation: Operation, user: &str) -> Result<AuthOp> {
        if !self.is_established() {
            return Err(fpauth_core::Error::ProtocolSequence(format!(
                "{} requested before handshake",
                operation
            ))
            .into());
        }

        let op = AuthOp::request_for(operation);
        debug!(%op, user, "Sending request");
        self.send(AuthMessage::new(op, user).into())?;

        // request_for only yields request ops
        Ok(op.response().unwrap_or(AuthOp::Invalid))
    }

    /// Wait for the response with the given op
    ///
    /// Other well-formed frames are logged and ignored.
    pub async fn await_response(&mut self, expected: AuthOp) -> Result<AuthMessage> {
        self.poll_until(expected.name(), |this, message| match message {
            Message::Auth(auth) if auth.op == expected => Ok(Some(auth)),
            other => {
                this.observe(&other);
                Ok(None)
            }
        })
        .await
    }

    /// Handshake if needed, send `operation` for `user`, map the response
    pub async fn execute(&mut self, operation: Operation, user: &str) -> Result<Verdict> {
        if !self.is_established() {
            self.connect().await?;
        }

        let expected = self.request(operation, user)?;
        let response = self.await_response(expected).await?;
        let verdict = verdict_for(&response);

        info!(%operation, user, response = %response.payload, %verdict, "Operation complete");
        Ok(verdict)
    }

    /// Like [`execute`](Self::execute), with failures folded into
    /// [`Verdict::Unavailable`]
    pub async fn perform(&mut self, operation: Operation, user: &str) -> Verdict {
        match self.execute(operation, user).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(%operation, user, error = %e, "Operation unavailable");
                e.to_verdict()
            }
        }
    }

    /// Handshake if needed, then hand every decoded frame to `observe`
    /// until the device closes the channel
    pub async fn monitor<F>(&mut self, mut observe: F) -> Result<()>
    where
        F: FnMut(&Message),
    {
        if !self.is_established() {
            self.connect().await?;
        }

        loop {
            match self.transport.try_read_frame() {
                None => tokio::time::sleep(self.config.poll_interval).await,
                Some(Ok(frame)) => match Message::from_frame(&frame) {
                    Ok(message) => observe(&message),
                    Err(e) => warn!("Undecodable {}: {}", frame, e),
                },
                Some(Err(fpauth_transport::Error::ConnectionClosed)) => {
                    info!("Device closed the channel");
                    return Ok(());
                }
                Some(Err(e)) if e.is_fatal() => return Err(e.into()),
                Some(Err(e)) => warn!("Dropped malformed frame: {}", e),
            }
        }
    }

    /// Bounded poll-sleep-retry
    ///
    /// Each read attempt counts against the budget; only empty reads sleep.
    /// `handle` returns `Some` to finish the wait.
    async fn poll_until<T, F>(&mut self, waiting_for: &str, mut handle: F) -> Result<T>
    where
        F: FnMut(&mut Self, Message) -> Result<Option<T>>,
    {
        let attempts = self.config.attempts;

        for attempt in 1..=attempts {
            match self.transport.try_read_frame() {
                None => {
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Some(Ok(frame)) => match Message::from_frame(&frame) {
                    Ok(message) => {
                        if let Some(value) = handle(self, message)? {
                            debug!(attempt, "Received {}", waiting_for);
                            return Ok(value);
                        }
                    }
                    Err(e) => warn!("Undecodable {}: {}", frame, e),
                },
                Some(Err(e)) if e.is_fatal() => return Err(e.into()),
                Some(Err(e)) => warn!("Dropped malformed frame: {}", e),
            }
        }

        warn!("Gave up waiting for {} after {} attempts", waiting_for, attempts);
        Err(Error::Timeout { attempts })
    }

    /// Log a frame that is not the one being waited for
    fn observe(&self, message: &Message) {
        match message {
            Message::Debug(text) => info!(device = %text, "Device debug message"),
            other => debug!("Ignoring {}", other),
        }
    }

    fn send(&mut self, frame: Frame) -> Result<()> {
        self.transport.send_frame(&frame).map_err(Error::from)
    }
}
