//! Blocking entry point for credential hooks
//!
//! A credential check runs on a plain synchronous call path with no ambient
//! event loop. [`authenticate`] opens the channel, runs one initiator
//! operation on a private current-thread runtime, and always returns a
//! verdict.

use tokio::runtime::Runtime;
use tracing::warn;

use fpauth_core::Message;
use fpauth_transport::{Channel, FrameTransport};
use fpauth_types::{Operation, Verdict};

use crate::error::{Error, Result};
use crate::host::{Initiator, InitiatorConfig};

/// Perform `operation` for `user` and wait for the verdict
///
/// `open` supplies the pre-configured channel. Failing to open it, build
/// the runtime, or get an answer in time all end as
/// [`Verdict::Unavailable`].
///
/// # Examples
///
/// ```no_run
/// use fpauth::{blocking, InitiatorConfig, Operation, TcpChannel};
///
/// let verdict = blocking::authenticate(
///     || {
///         let mut channel = TcpChannel::new("127.0.0.1", 7000);
///         channel.connect()?;
///         Ok(channel)
///     },
///     Operation::Verify,
///     "alice",
///     InitiatorConfig::default(),
/// );
///
/// if verdict.is_granted() {
///     println!("welcome");
/// }
/// ```
pub fn authenticate<C, F>(open: F, operation: Operation, user: &str, config: InitiatorConfig) -> Verdict
where
    C: Channel,
    F: FnOnce() -> Result<C>,
{
    let channel = match open() {
        Ok(channel) => channel,
        Err(e) => {
            warn!(%operation, user, error = %e, "Could not open device channel");
            let e = match e {
                Error::Open(_) => e,
                other => Error::Open(other.to_string()),
            };
            return e.to_verdict();
        }
    };

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(e) => {
            warn!(error = %e, "Could not start runtime");
            return Verdict::Unavailable(e.to_string());
        }
    };

    let mut initiator = Initiator::with_config(FrameTransport::new(channel), config);
    runtime.block_on(initiator.perform(operation, user))
}

/// Handshake and report every frame the device sends until it closes
/// the channel
pub fn monitor<C, F>(channel: C, config: InitiatorConfig, observe: F) -> Result<()>
where
    C: Channel,
    F: FnMut(&Message),
{
    let runtime = runtime().map_err(|e| Error::Open(e.to_string()))?;
    let mut initiator = Initiator::with_config(FrameTransport::new(channel), config);

    runtime.block_on(initiator.monitor(observe))
}

fn runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_time().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpauth_core::{AuthMessage, AuthOp, HandshakeMessage};
    use fpauth_transport::MemoryChannel;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn quick() -> InitiatorConfig {
        InitiatorConfig::default()
            .with_attempts(3)
            .with_poll_interval(Duration::from_millis(1))
    }

    #[test]
    fn test_open_failure_is_unavailable() {
        let verdict = authenticate::<MemoryChannel, _>(
            || Err(Error::Open("no such device".into())),
            Operation::Verify,
            "alice",
            quick(),
        );

        assert!(verdict.is_unavailable());
        assert!(verdict.reason().unwrap().contains("no such device"));
    }

    #[test]
    fn test_prepared_answers() {
        let (host, device) = MemoryChannel::pair();
        let mut device = FrameTransport::new(device);

        // Answers queued ahead of the requests they belong to
        assert!(device.write_frame(&HandshakeMessage::syn_ack(0).into()));
        assert!(device.write_frame(&AuthMessage::new(AuthOp::SetUserResponse, "OK").into()));

        let verdict = authenticate(move || Ok(host), Operation::Enroll, "bob", quick());
        assert_eq!(verdict, Verdict::Granted);
    }

    #[test]
    fn test_monitor_closed_line() {
        let (host, device) = MemoryChannel::pair();
        drop(device);

        let mut seen = Vec::new();
        let result = monitor(host, quick(), |message| seen.push(message.clone()));

        assert!(result.unwrap_err().is_fatal());
        assert!(seen.is_empty());
    }

    #[test]
    fn test_silent_device_is_unavailable() {
        let (host, _device) = MemoryChannel::pair();

        let verdict = authenticate(move || Ok(host), Operation::Verify, "alice", quick());
        assert!(verdict.is_unavailable());
    }
}
