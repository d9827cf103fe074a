//! Device-side auth workflow
//!
//! Enrollment and verification span many ticks while a person places and
//! lifts a finger. The responder keeps the current phase and evaluates at
//! most one transition per [`Responder::poll`], so the tick loop never
//! waits on the sensor.
//!
//! ```text
//! Idle --SET_USER--> Touch1 -> Release1 -> Touch2 -> Release2 -> Touch3 --> Idle
//! Idle --CHECK_USER--> Check --touched--> Idle
//! Idle --REVOKE_USER--> Delete --> Idle
//! ```
//!
//! `Delete` never waits on the sensor: the device calls `poll` at the end
//! of the tick that accepted `REVOKE_USER`, so templates are wiped and the
//! response sent within that same tick.

use std::fmt;

use tracing::{debug, info, warn};

use crate::constants::responses;
use crate::error::{Error, Result};
use crate::kind::AuthOp;
use crate::message::AuthMessage;
use crate::sensor::Sensor;

/// Enrollment progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterStep {
    Touch1,
    Release1,
    Touch2,
    Release2,
    Touch3,
}

impl RegisterStep {
    fn next(self) -> Self {
        match self {
            Self::Touch1 => Self::Release1,
            Self::Release1 => Self::Touch2,
            Self::Touch2 => Self::Release2,
            Self::Release2 | Self::Touch3 => Self::Touch3,
        }
    }
}

/// Responder phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// Ready for a request
    Idle,

    /// Enrolling a new template
    Register(RegisterStep),

    /// Waiting for a finger to identify
    Check,

    /// Revocation accepted, runs on the next poll
    Delete,
}

impl AuthPhase {
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if the sensor is powered in this phase
    fn uses_sensor(self) -> bool {
        matches!(self, Self::Register(_) | Self::Check)
    }
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Register(step) => write!(f, "register/{:?}", step),
            Self::Check => f.write_str("check/touch"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Result of evaluating one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: AuthPhase,

    /// Response to send this tick, when the outcome is determined
    pub response: Option<AuthMessage>,
}

impl Transition {
    fn to(next: AuthPhase) -> Self {
        Self { next, response: None }
    }

    fn finish(op: AuthOp, outcome: &str) -> Self {
        Self {
            next: AuthPhase::Idle,
            response: Some(AuthMessage::new(op, outcome)),
        }
    }
}

/// Device-side auth state machine
pub struct Responder<S> {
    sensor: S,
    phase: AuthPhase,

    /// Username of the operation in flight, for logs only
    user: Option<String>,
}

impl<S: Sensor> Responder<S> {
    /// Create an idle responder
    pub fn new(sensor: S) -> Self {
        Self {
            sensor,
            phase: AuthPhase::Idle,
            user: None,
        }
    }

    /// Get current phase
    pub fn phase(&self) -> AuthPhase {
        self.phase
    }

    /// Username of the operation in flight
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Give back the sensor, e.g. to serve the next session
    pub fn into_sensor(self) -> S {
        self.sensor
    }

    /// Accept a request from a trusted (handshaked) peer
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedRequest`] for response or invalid ops
    /// - [`Error::OperationInProgress`] when not idle; the running operation
    ///   is left untouched
    pub fn handle_request(&mut self, request: &AuthMessage) -> Result<()> {
        if !request.op.is_request() {
            return Err(Error::UnsupportedRequest(request.op));
        }

        if !self.phase.is_idle() {
            warn!(
                phase = %self.phase,
                op = %request.op,
                "Request rejected, operation in progress"
            );
            return Err(Error::OperationInProgress(self.phase));
        }

        let next = match request.op {
            AuthOp::SetUser => {
                self.sensor.enable();
                AuthPhase::Register(RegisterStep::Touch1)
            }
            AuthOp::CheckUser => {
                self.sensor.enable();
                AuthPhase::Check
            }
            AuthOp::RevokeUser => AuthPhase::Delete,
            op => return Err(Error::UnsupportedRequest(op)),
        };

        info!(op = %request.op, user = %request.payload, "Operation started");

        self.user = Some(request.payload.clone());
        self.phase = next;

        Ok(())
    }

    /// Evaluate one transition
    ///
    /// Returns the response to send when the operation finished this tick.
    pub fn poll(&mut self) -> Option<AuthMessage> {
        let transition = self.transition();

        if transition.next != self.phase {
            debug!(from = %self.phase, to = %transition.next, "Auth phase changed");
        }

        if transition.next.is_idle() && self.phase.uses_sensor() {
            self.sensor.disable();
        }

        if let Some(response) = &transition.response {
            info!(
                user = self.user.as_deref().unwrap_or_default(),
                response = %response,
                "Operation finished"
            );
        }

        self.phase = transition.next;
        if self.phase.is_idle() {
            self.user = None;
        }

        transition.response
    }

    /// Abandon the operation in flight without a response
    ///
    /// Returns the abandoned phase, or `None` if idle.
    pub fn abort(&mut self) -> Option<AuthPhase> {
        if self.phase.is_idle() {
            return None;
        }

        let aborted = self.phase;
        if aborted.uses_sensor() {
            self.sensor.disable();
        }

        warn!(phase = %aborted, user = self.user.as_deref().unwrap_or_default(), "Operation aborted");

        self.phase = AuthPhase::Idle;
        self.user = None;

        Some(aborted)
    }

    fn transition(&mut self) -> Transition {
        match self.phase {
            AuthPhase::Idle => Transition::to(AuthPhase::Idle),
            AuthPhase::Register(step) => self.register(step),
            AuthPhase::Check => self.check(),
            AuthPhase::Delete => self.delete(),
        }
    }

    fn register(&mut self, step: RegisterStep) -> Transition {
        let touched = self.sensor.is_touched();

        match step {
            RegisterStep::Touch1 | RegisterStep::Touch2 if touched => {
                let stage = if step == RegisterStep::Touch1 { 1 } else { 2 };

                match self.sensor.enroll_stage(stage) {
                    Ok(()) => {
                        debug!(stage, "Enroll stage captured");
                        Transition::to(AuthPhase::Register(step.next()))
                    }
                    Err(e) => {
                        warn!(stage, error = %e, "Enroll stage failed");
                        Transition::finish(AuthOp::SetUserResponse, responses::FAIL)
                    }
                }
            }

            RegisterStep::Release1 | RegisterStep::Release2 if !touched => {
                Transition::to(AuthPhase::Register(step.next()))
            }

            RegisterStep::Touch3 if touched => match self.sensor.enroll_finalize() {
                Ok(id) if id.is_valid() => {
                    info!(%id, "Template stored");
                    Transition::finish(AuthOp::SetUserResponse, responses::OK)
                }
                Ok(id) => {
                    warn!(%id, "Enroll finalize returned an unusable slot");
                    Transition::finish(AuthOp::SetUserResponse, responses::FAIL)
                }
                Err(e) => {
                    warn!(error = %e, "Enroll finalize failed");
                    Transition::finish(AuthOp::SetUserResponse, responses::FAIL)
                }
            },

            // Waiting for the finger
            _ => Transition::to(AuthPhase::Register(step)),
        }
    }

    fn check(&mut self) -> Transition {
        if !self.sensor.is_touched() {
            return Transition::to(AuthPhase::Check);
        }

        match self.sensor.identify() {
            Ok(Some(id)) => {
                debug!(%id, "Finger matched");
                Transition::finish(AuthOp::CheckUserResponse, responses::VERIFIED)
            }
            Ok(None) => {
                debug!("No matching template");
                Transition::finish(AuthOp::CheckUserResponse, responses::REJECTED)
            }
            Err(e) => {
                warn!(error = %e, "Identify failed");
                Transition::finish(AuthOp::CheckUserResponse, responses::REJECTED)
            }
        }
    }

    fn delete(&mut self) -> Transition {
        match self.sensor.delete_all() {
            Ok(()) => Transition::finish(AuthOp::RevokeUserResponse, responses::OK),
            Err(e) => {
                warn!(error = %e, "Delete all templates failed");
                Transition::finish(AuthOp::RevokeUserResponse, responses::FAIL)
            }
        }
    }
}

impl<S> fmt::Debug for Responder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("phase", &self.phase)
            .field("user", &self.user)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{MockSensor, SensorError};
    use fpauth_types::UserId;
    use pretty_assertions::assert_eq;

    fn request(op: AuthOp, user: &str) -> AuthMessage {
        AuthMessage::new(op, user)
    }

    fn touches(pattern: Vec<bool>) -> impl FnMut() -> bool + Send + 'static {
        let mut pattern = pattern.into_iter();
        move || pattern.next().unwrap_or(false)
    }

    #[test]
    fn test_responder_new() {
        let responder = Responder::new(MockSensor::new());
        assert_eq!(responder.phase(), AuthPhase::Idle);
        assert_eq!(responder.user(), None);
    }

    #[test]
    fn test_idle_poll_touches_nothing() {
        // A mock with no expectations panics on any call
        let mut responder = Responder::new(MockSensor::new());
        assert_eq!(responder.poll(), None);
        assert_eq!(responder.phase(), AuthPhase::Idle);
    }

    #[test]
    fn test_enroll_success() {
        let mut sensor = MockSensor::new();
        sensor.expect_enable().times(1).return_const(());
        sensor.expect_is_touched().times(5).returning(touches(vec![true, false, true, false, true]));
        sensor.expect_enroll_stage().withf(|s| *s == 1).times(1).returning(|_| Ok(()));
        sensor.expect_enroll_stage().withf(|s| *s == 2).times(1).returning(|_| Ok(()));
        sensor.expect_enroll_finalize().times(1).returning(|| Ok(UserId(17)));
        sensor.expect_disable().times(1).return_const(());

        let mut responder = Responder::new(sensor);
        responder.handle_request(&request(AuthOp::SetUser, "bob")).unwrap();
        assert_eq!(responder.phase(), AuthPhase::Register(RegisterStep::Touch1));
        assert_eq!(responder.user(), Some("bob"));

        let expected = [
            AuthPhase::Register(RegisterStep::Release1),
            AuthPhase::Register(RegisterStep::Touch2),
            AuthPhase::Register(RegisterStep::Release2),
            AuthPhase::Register(RegisterStep::Touch3),
        ];
        for phase in expected {
            assert_eq!(responder.poll(), None);
            assert_eq!(responder.phase(), phase);
        }

        let response = responder.poll();
        assert_eq!(response, Some(AuthMessage::new(AuthOp::SetUserResponse, "OK")));
        assert_eq!(responder.phase(), AuthPhase::Idle);
        assert_eq!(responder.user(), None);
    }

    #[test]
    fn test_enroll_waits_for_release() {
        let mut sensor = MockSensor::new();
        sensor.expect_enable().return_const(());
        sensor.expect_is_touched().returning(touches(vec![true, true, true]));
        sensor.expect_enroll_stage().times(1).returning(|_| Ok(()));

        let mut responder = Responder::new(sensor);
        responder.handle_request(&request(AuthOp::SetUser, "bob")).unwrap();

        responder.poll();
        responder.poll();
        responder.poll();
        assert_eq!(responder.phase(), AuthPhase::Register(RegisterStep::Release1));
    }

    #[test]
    fn test_enroll_stage_failure() {
        let mut sensor = MockSensor::new();
        sensor.expect_enable().return_const(());
        sensor.expect_is_touched().return_const(true);
        sensor
            .expect_enroll_stage()
            .times(1)
            .returning(|_| Err(SensorError::Capture("smudged".into())));
        sensor.expect_disable().times(1).return_const(());

        let mut responder = Responder::new(sensor);
        responder.handle_request(&request(AuthOp::SetUser, "bob")).unwrap();

        let response = responder.poll();
        assert_eq!(response, Some(AuthMessage::new(AuthOp::SetUserResponse, "FAIL")));
        assert_eq!(responder.phase(), AuthPhase::Idle);
    }

    #[test]
    fn test_enroll_zero_id_fails() {
        let mut sensor = MockSensor::new();
        sensor.expect_enable().return_const(());
        sensor.expect_is_touched().returning(touches(vec![true, false, true, false, true]));
        sensor.expect_enroll_stage().returning(|_| Ok(()));
        sensor.expect_enroll_finalize().returning(|| Ok(UserId(0)));
        sensor.expect_disable().times(1).return_const(());

        let mut responder = Responder::new(sensor);
        responder.handle_request(&request(AuthOp::SetUser, "bob")).unwrap();

        let responses: Vec<_> = (0..5).filter_map(|_| responder.poll()).collect();
        assert_eq!(responses, vec![AuthMessage::new(AuthOp::SetUserResponse, "FAIL")]);
    }

    #[test]
    fn test_check_verified() {
        let mut sensor = MockSensor::new();
        sensor.expect_enable().times(1).return_const(());
        sensor.expect_is_touched().returning(touches(vec![false, false, true]));
        sensor.expect_identify().times(1).returning(|| Ok(Some(UserId(42))));
        sensor.expect_disable().times(1).return_const(());

        let mut responder = Responder::new(sensor);
        responder.handle_request(&request(AuthOp::CheckUser, "alice")).unwrap();

        assert_eq!(responder.poll(), None);
        assert_eq!(responder.poll(), None);
        assert_eq!(
            responder.poll(),
            Some(AuthMessage::new(AuthOp::CheckUserResponse, "VERIFIED"))
        );
        assert_eq!(responder.phase(), AuthPhase::Idle);
    }

    #[test]
    fn test_check_identify_error_rejects() {
        let mut sensor = MockSensor::new();
        sensor.expect_enable().return_const(());
        sensor.expect_is_touched().return_const(true);
        sensor.expect_identify().returning(|| Err(SensorError::Timeout));
        sensor.expect_disable().times(1).return_const(());

        let mut responder = Responder::new(sensor);
        responder.handle_request(&request(AuthOp::CheckUser, "alice")).unwrap();

        assert_eq!(
            responder.poll(),
            Some(AuthMessage::new(AuthOp::CheckUserResponse, "REJECTED"))
        );
    }

    #[test]
    fn test_revoke_completes_on_first_poll() {
        let mut sensor = MockSensor::new();
        sensor.expect_delete_all().times(1).returning(|| Ok(()));

        let mut responder = Responder::new(sensor);
        responder.handle_request(&request(AuthOp::RevokeUser, "carol")).unwrap();
        assert_eq!(responder.phase(), AuthPhase::Delete);

        assert_eq!(
            responder.poll(),
            Some(AuthMessage::new(AuthOp::RevokeUserResponse, "OK"))
        );
        assert_eq!(responder.phase(), AuthPhase::Idle);
    }

    #[test]
    fn test_revoke_failure() {
        let mut sensor = MockSensor::new();
        sensor
            .expect_delete_all()
            .returning(|| Err(SensorError::Storage("flash busy".into())));

        let mut responder = Responder::new(sensor);
        responder.handle_request(&request(AuthOp::RevokeUser, "carol")).unwrap();

        assert_eq!(
            responder.poll(),
            Some(AuthMessage::new(AuthOp::RevokeUserResponse, "FAIL"))
        );
    }

    #[test]
    fn test_busy_rejects_without_disturbing() {
        let mut sensor = MockSensor::new();
        sensor.expect_enable().times(1).return_const(());

        let mut responder = Responder::new(sensor);
        responder.handle_request(&request(AuthOp::CheckUser, "alice")).unwrap();

        for op in [AuthOp::SetUser, AuthOp::CheckUser, AuthOp::RevokeUser] {
            let result = responder.handle_request(&request(op, "mallory"));
            assert!(matches!(result, Err(Error::OperationInProgress(AuthPhase::Check))));
            assert_eq!(responder.phase(), AuthPhase::Check);
            assert_eq!(responder.user(), Some("alice"));
        }
    }

    #[test]
    fn test_response_op_is_unsupported() {
        let mut responder = Responder::new(MockSensor::new());

        for op in [AuthOp::CheckUserResponse, AuthOp::Invalid] {
            let result = responder.handle_request(&request(op, ""));
            assert!(matches!(result, Err(Error::UnsupportedRequest(o)) if o == op));
        }
        assert_eq!(responder.phase(), AuthPhase::Idle);
    }

    #[test]
    fn test_abort_disables_sensor() {
        let mut sensor = MockSensor::new();
        sensor.expect_enable().times(1).return_const(());
        sensor.expect_disable().times(1).return_const(());

        let mut responder = Responder::new(sensor);
        responder.handle_request(&request(AuthOp::SetUser, "bob")).unwrap();

        assert_eq!(responder.abort(), Some(AuthPhase::Register(RegisterStep::Touch1)));
        assert_eq!(responder.phase(), AuthPhase::Idle);
        assert_eq!(responder.abort(), None);
    }
}
