//! Device-side session
//!
//! Owns the transport, the responder handshake and the auth responder.
//! The embedded control loop calls [`DeviceSession::tick`] once per cycle;
//! nothing in a tick waits on the host or on a finger.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use fpauth_core::constants::{DEFAULT_MAX_FRAMES_PER_TICK, DEFAULT_TICK_INTERVAL};
use fpauth_core::{
    AuthMessage, AuthPhase, Frame, Handshake, HandshakeMessage, HandshakeStage, HandshakeState,
    Message, Responder, Role, Sensor,
};
use fpauth_transport::{Channel, FrameTransport};

use crate::error::{Error, Result};
use crate::event::{ChannelEvent, EventSender};

/// Device loop settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Delay between ticks in [`DeviceSession::run`]
    pub tick_interval: Duration,

    /// Frames handled per tick before the sensor gets its turn
    pub max_frames_per_tick: usize,
}

impl DeviceConfig {
    /// Set tick interval
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Set per-tick frame cap (at least one)
    pub fn with_max_frames_per_tick(mut self, max: usize) -> Self {
        self.max_frames_per_tick = max.max(1);
        self
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_frames_per_tick: DEFAULT_MAX_FRAMES_PER_TICK,
        }
    }
}

/// Combined handshake/auth phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Handshake not established yet
    Handshake(HandshakeState),

    /// Established; auth workflow phase
    Auth(AuthPhase),
}

/// Protocol session bound to one open channel on the device
///
/// # Examples
///
/// ```no_run
/// use fpauth::{DeviceSession, FrameTransport, MemoryChannel};
/// # fn sensor() -> Box<dyn fpauth::Sensor + Send> { unimplemented!() }
///
/// # async fn demo() -> fpauth::Result<()> {
/// let (_host_end, device_end) = MemoryChannel::pair();
/// let mut session = DeviceSession::new(FrameTransport::new(device_end), sensor());
///
/// // Hand this to the USB driver's event callback
/// let _events = session.event_sender();
///
/// session.run().await
/// # }
/// ```
pub struct DeviceSession<C, S> {
    transport: FrameTransport<C>,
    handshake: Handshake,
    responder: Responder<S>,
    config: DeviceConfig,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    events_rx: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl<C: Channel, S: Sensor> DeviceSession<C, S> {
    /// Create a session for a freshly opened channel
    pub fn new(transport: FrameTransport<C>, sensor: S) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            transport,
            handshake: Handshake::new(Role::Responder),
            responder: Responder::new(sensor),
            config: DeviceConfig::default(),
            events_tx,
            events_rx,
        }
    }

    /// Set loop configuration
    pub fn with_config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }

    /// Handle for the platform's USB event callback
    pub fn event_sender(&self) -> EventSender {
        EventSender::new(self.events_tx.clone())
    }

    /// Negotiated sequence number
    pub fn sequence(&self) -> Option<u32> {
        self.handshake.sequence()
    }

    /// Current combined phase
    pub fn phase(&self) -> SessionPhase {
        if self.handshake.is_established() {
            SessionPhase::Auth(self.responder.phase())
        } else {
            SessionPhase::Handshake(self.handshake.state())
        }
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    pub fn responder(&self) -> &Responder<S> {
        &self.responder
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// End the session, keeping the sensor for the next one
    pub fn into_sensor(self) -> S {
        self.responder.into_sensor()
    }

    /// Run one cooperative cycle
    ///
    /// Reports queued channel events, handles up to `max_frames_per_tick`
    /// frames, then advances the auth workflow by one transition.
    ///
    /// # Errors
    ///
    /// Only session-fatal transport failures. Protocol problems are
    /// reported to the host as Debug frames and the session continues.
    pub fn tick(&mut self) -> Result<()> {
        self.report_events()?;

        for _ in 0..self.config.max_frames_per_tick {
            match self.transport.try_read_frame() {
                None => break,
                Some(Ok(frame)) => {
                    if let Err(e) = self.handle_frame(frame) {
                        if e.is_fatal() {
                            return Err(e);
                        }
                        debug!("Frame rejected: {}", e);
                    }
                }
                Some(Err(e)) if e.is_fatal() => return Err(e.into()),
                Some(Err(e)) => self.diagnostic(format!("Dropped malformed frame: {}", e))?,
            }
        }

        if let Some(response) = self.responder.poll() {
            self.send(response.into())?;
        }

        Ok(())
    }

    /// Tick forever with a fixed delay, until the channel fails
    pub async fn run(&mut self) -> Result<()> {
        info!("Device session started on {}", self.transport.channel().peer());

        loop {
            if let Err(e) = self.tick() {
                warn!("Device session ended: {}", e);
                self.responder.abort();
                return Err(e);
            }

            tokio::time::sleep(self.config.tick_interval).await;
        }
    }

    /// Route one received frame
    ///
    /// Every frame ends in exactly one branch; rejected and unsupported
    /// frames produce a Debug diagnostic for the host before the error is
    /// returned.
    pub fn handle_frame(&mut self, frame: Frame) -> Result<()> {
        let message = match Message::from_frame(&frame) {
            Ok(message) => message,
            Err(e) => {
                self.diagnostic(format!("Malformed {} payload: {}", frame.kind, e))?;
                return Err(e.into());
            }
        };

        match message {
            Message::Debug(text) => {
                info!(host = %text, "Host debug message");
                Ok(())
            }
            Message::Handshake(handshake) => self.handle_handshake(handshake),
            Message::Auth(auth) => self.handle_auth(auth),
            Message::Undefined(payload) => self.diagnostic(format!(
                "Unsupported packet kind ({} byte payload ignored)",
                payload.len()
            )),
        }
    }

    fn handle_handshake(&mut self, message: HandshakeMessage) -> Result<()> {
        if message.stage == HandshakeStage::Syn {
            self.abort_operation("re-handshake")?;
        }

        match self.handshake.on_message(&message) {
            Ok(Some(reply)) => self.send(reply.into()),
            Ok(None) => Ok(()),
            Err(e) => {
                // The handshake is back to Idle; nothing may answer into it
                if e.aborts_operation() {
                    self.abort_operation("handshake reset")?;
                }
                self.diagnostic(e.to_string())?;
                Err(e.into())
            }
        }
    }

    fn abort_operation(&mut self, cause: &str) -> Result<()> {
        match self.responder.abort() {
            Some(phase) => self.diagnostic(format!("Operation ({}) aborted by {}", phase, cause)),
            None => Ok(()),
        }
    }

    fn handle_auth(&mut self, message: AuthMessage) -> Result<()> {
        if !self.handshake.complete_implicitly() {
            let e = fpauth_core::Error::ProtocolSequence(format!(
                "{} received before handshake",
                message.op
            ));
            self.diagnostic(e.to_string())?;
            return Err(e.into());
        }

        if let Err(e) = self.responder.handle_request(&message) {
            self.diagnostic(e.to_string())?;
            return Err(e.into());
        }

        Ok(())
    }

    fn report_events(&mut self) -> Result<()> {
        while let Ok(event) = self.events_rx.try_recv() {
            debug!(?event, "Channel event");
            self.send(Frame::debug(event.to_string()))?;
        }

        Ok(())
    }

    fn diagnostic(&mut self, text: String) -> Result<()> {
        warn!("{}", text);
        self.send(Frame::debug(text))
    }

    fn send(&mut self, frame: Frame) -> Result<()> {
        self.transport.send_frame(&frame).map_err(Error::from)
    }
}
