//! Fingerprint sensor capability
//!
//! The responder drives the sensor only through this trait. Every call must
//! return promptly: touch readiness is re-checked each tick instead of
//! waiting for a finger.

use fpauth_types::UserId;

/// Sensor failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("Sensor not connected")]
    NotConnected,

    #[error("Sensor did not answer in time")]
    Timeout,

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("Template storage failed: {0}")]
    Storage(String),

    /// Raw status code reported by the module
    #[error("Sensor reported error code 0x{0:02X}")]
    Device(u8),
}

/// Biometric sensor operations used by the responder
#[cfg_attr(test, mockall::automock)]
pub trait Sensor {
    /// Power up / arm touch detection
    fn enable(&mut self);

    /// Power down
    fn disable(&mut self);

    /// Check if a finger is on the sensor right now
    fn is_touched(&mut self) -> bool;

    /// Capture enrollment sample `stage` (1-based)
    fn enroll_stage(&mut self, stage: u8) -> Result<(), SensorError>;

    /// Capture the last sample and store the template
    fn enroll_finalize(&mut self) -> Result<UserId, SensorError>;

    /// Match the finger on the sensor against stored templates
    fn identify(&mut self) -> Result<Option<UserId>, SensorError>;

    /// Remove every stored template
    fn delete_all(&mut self) -> Result<(), SensorError>;
}

impl<S: Sensor + ?Sized> Sensor for Box<S> {
    fn enable(&mut self) {
        (**self).enable()
    }

    fn disable(&mut self) {
        (**self).disable()
    }

    fn is_touched(&mut self) -> bool {
        (**self).is_touched()
    }

    fn enroll_stage(&mut self, stage: u8) -> Result<(), SensorError> {
        (**self).enroll_stage(stage)
    }

    fn enroll_finalize(&mut self) -> Result<UserId, SensorError> {
        (**self).enroll_finalize()
    }

    fn identify(&mut self) -> Result<Option<UserId>, SensorError> {
        (**self).identify()
    }

    fn delete_all(&mut self) -> Result<(), SensorError> {
        (**self).delete_all()
    }
}
