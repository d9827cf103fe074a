//! Protocol constants

use std::time::Duration;

/// Size of the big-endian length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the kind byte that follows the length prefix
pub const KIND_SIZE: usize = 1;

/// Default upper bound for a frame's declared length
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Default number of empty polls tolerated mid-frame before it is truncated
pub const DEFAULT_BODY_STALL_LIMIT: u32 = 16;

/// Host retry budget (attempts per wait)
pub const DEFAULT_ATTEMPTS: u32 = 30;

/// Host delay between read attempts
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Device delay between ticks
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Frames drained per device tick before the sensor is polled
pub const DEFAULT_MAX_FRAMES_PER_TICK: usize = 8;

/// Auth response payloads
pub mod responses {
    /// Enroll or revoke succeeded
    pub const OK: &str = "OK";

    /// Enroll or revoke failed
    pub const FAIL: &str = "FAIL";

    /// Presented finger matched a stored template
    pub const VERIFIED: &str = "VERIFIED";

    /// Presented finger did not match, or identify failed
    pub const REJECTED: &str = "REJECTED";
}
