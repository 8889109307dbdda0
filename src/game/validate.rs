//! Command Validation
//!
//! Anti-cheat checks applied to inbound commands before they touch the
//! simulation. A rejected command mutates nothing.

use std::collections::VecDeque;

use crate::core::vec2::Vec2;
use crate::game::store::WorldBounds;

/// Default maximum straight-line distance a single move request may
/// cover (tiles). Zones override this through their config.
pub const MAX_MOVE_DISTANCE: f32 = 15.0;

/// Maximum commands per rate window.
pub const RATE_LIMIT_MAX: u32 = 20;

/// Rate window length in milliseconds.
pub const RATE_LIMIT_WINDOW_MS: u64 = 1000;

/// Why a command was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Target position is outside the zone (or not a finite number).
    #[error("target position out of bounds")]
    OutOfBounds,

    /// Requested move exceeds the per-request distance cap.
    #[error("move distance exceeds limit")]
    DistanceTooFar,

    /// Too many commands inside the rate window.
    #[error("command rate limit exceeded")]
    RateLimit,
}

/// Validate a move request from `from` to `to`.
///
/// Non-finite coordinates are treated as out of bounds; they never reach
/// the distance check.
pub fn validate_move(
    bounds: &WorldBounds,
    from: Vec2,
    to: Vec2,
    max_distance: f32,
) -> Result<(), ValidationError> {
    if !bounds.contains(to) {
        return Err(ValidationError::OutOfBounds);
    }

    if from.distance(to) > max_distance {
        return Err(ValidationError::DistanceTooFar);
    }

    Ok(())
}

/// Sliding-window rate limiter, one per session.
///
/// Timestamps are caller-supplied milliseconds so the limiter itself
/// stays clock-agnostic and testable.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window_ms: u64,
    max_in_window: u32,
    timestamps: VecDeque<u64>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RATE_LIMIT_WINDOW_MS, RATE_LIMIT_MAX)
    }
}

impl RateLimiter {
    /// Create a limiter allowing `max_in_window` commands per `window_ms`.
    pub fn new(window_ms: u64, max_in_window: u32) -> Self {
        Self {
            window_ms,
            max_in_window,
            timestamps: VecDeque::new(),
        }
    }

    /// Record a command at `now_ms` and check it against the window.
    ///
    /// Returns an error when the command would exceed the limit; the
    /// rejected command is not recorded.
    pub fn check(&mut self, now_ms: u64) -> Result<(), ValidationError> {
        while let Some(oldest) = self.timestamps.front() {
            if now_ms.saturating_sub(*oldest) >= self.window_ms {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }

        if self.timestamps.len() as u32 >= self.max_in_window {
            return Err(ValidationError::RateLimit);
        }

        self.timestamps.push_back(now_ms);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
