//! Channel events reported by the platform USB stack
//!
//! The platform registers a callback with its USB driver and hands it an
//! [`EventSender`] obtained from the device session. The callback only
//! queues; the session reports queued events to the host on its next tick.

use std::fmt;

use tokio::sync::mpsc;

/// Line or bus event on the device's USB CDC link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Plugged,
    Unplugged,
    Suspended { remote_wakeup: bool },
    Resumed,
    CdcConnected,
    CdcDisconnected,
    LineState { dtr: bool, rts: bool },
    LineCoding {
        bit_rate: u32,
        data_bits: u8,
        stop_bits: u8,
        parity: u8,
    },
    Rx { len: usize },
    RxOverflow { dropped: usize },
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

impl fmt::Display for ChannelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plugged => f.write_str("USB PLUGGED"),
            Self::Unplugged => f.write_str("USB UNPLUGGED"),
            Self::Suspended { remote_wakeup } => {
                write!(f, "USB SUSPENDED: remote_wakeup_en: {}", yes_no(*remote_wakeup))
            }
            Self::Resumed => f.write_str("USB RESUMED"),
            Self::CdcConnected => f.write_str("CDC CONNECTED"),
            Self::CdcDisconnected => f.write_str("CDC DISCONNECTED"),
            Self::LineState { dtr, rts } => {
                write!(f, "CDC LINE STATE: dtr: {} rts: {}", yes_no(*dtr), yes_no(*rts))
            }
            Self::LineCoding { bit_rate, data_bits, stop_bits, parity } => write!(
                f,
                "CDC LINE CODING: bit_rate: {}, data_bits: {}, stop_bits: {}, parity: {}",
                bit_rate, data_bits, stop_bits, parity
            ),
            Self::Rx { len } => write!(f, "CDC RX {}", len),
            Self::RxOverflow { dropped } => write!(f, "CDC RX OVERFLOW: {} bytes dropped", dropped),
        }
    }
}

/// Handle for queueing channel events into a device session
///
/// Cheap to clone and safe to move into a driver callback.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl EventSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<ChannelEvent>) -> Self {
        Self { tx }
    }

    /// Queue an event; returns `false` once the session is gone
    pub fn notify(&self, event: ChannelEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_event_text() {
        assert_eq!(ChannelEvent::Plugged.to_string(), "USB PLUGGED");
        assert_eq!(
            ChannelEvent::LineState { dtr: true, rts: false }.to_string(),
            "CDC LINE STATE: dtr: yes rts: no"
        );
        assert_eq!(
            ChannelEvent::Suspended { remote_wakeup: false }.to_string(),
            "USB SUSPENDED: remote_wakeup_en: no"
        );
    }

    #[test]
    fn test_sender_reports_closed_session() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = EventSender::new(tx);

        assert!(sender.notify(ChannelEvent::Resumed));
        drop(rx);
        assert!(!sender.notify(ChannelEvent::Resumed));
    }
}
