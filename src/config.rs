use std::time::Duration;

/// Delay between a position falling behind a watermark and a placeholder being proposed for it.
pub const FILL_DELAY: Duration = Duration::from_millis(500);

/// Default lookahead window.
pub const ALPHA: u64 = 50;

/// Configurable parameters of a [`Manager`](crate::Manager).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The number of positions a member anticipates beyond the position at which it was defined. A member defined at
    /// `start` first participates at `start + alpha`, and membership for position `n` is the one committed at
    /// `n - alpha`.
    pub alpha: u64,

    /// How long the gap filler waits before proposing a placeholder for a position behind a watermark.
    pub fill_delay: Duration,
}

impl Config {
    pub fn with_alpha(alpha: u64) -> Self {
        Self {
            alpha,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alpha: ALPHA,
            fill_delay: FILL_DELAY,
        }
    }
}
