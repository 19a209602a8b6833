//! # Exponential Backoff
//!
//! Per-item retry delays for the rate-limited work queues.
//!
//! The delay doubles with every consecutive failure of the same item and is
//! capped at a maximum. The failure count itself lives in the work queue; this
//! type only maps a count to a delay.
//!
//! ## Usage
//!
//! ```rust
//! use azure_keyvault_controller::controller::backoff::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let backoff = ExponentialBackoff::new(Duration::from_millis(5), Duration::from_secs(1000));
//! assert_eq!(backoff.delay_for(0), Duration::from_millis(5));
//! assert_eq!(backoff.delay_for(1), Duration::from_millis(10));
//! assert_eq!(backoff.delay_for(2), Duration::from_millis(20));
//! ```

use std::time::Duration;

/// Exponential backoff calculator
///
/// `delay_for(n) = min(base * 2^n, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with the given first delay and cap
    ///
    /// # Example
    ///
    /// ```
    /// use azure_keyvault_controller::controller::backoff::ExponentialBackoff;
    /// use std::time::Duration;
    ///
    /// let backoff = ExponentialBackoff::new(Duration::from_millis(5), Duration::from_secs(1000));
    /// ```
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    /// Delay before the retry that follows `failures` earlier failures
    ///
    /// # Example
    ///
    /// ```
    /// use azure_keyvault_controller::controller::backoff::ExponentialBackoff;
    /// use std::time::Duration;
    ///
    /// let backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(10));
    /// assert_eq!(backoff.delay_for(3), Duration::from_secs(8));
    /// assert_eq!(backoff.delay_for(4), Duration::from_secs(10));
    /// ```
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        // 2^31 already overflows any realistic base, so clamp the exponent
        let factor = 1u32.checked_shl(failures.min(31)).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// First delay in the sequence
    #[must_use]
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Upper bound of the sequence
    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(crate::constants::DEFAULT_BACKOFF_START_MS),
            Duration::from_millis(crate::constants::DEFAULT_BACKOFF_MAX_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_sequence() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60));

        assert_eq!(backoff.delay_for(0), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(1), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(4));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(8));
        assert_eq!(backoff.delay_for(4), Duration::from_secs(16));
        assert_eq!(backoff.delay_for(5), Duration::from_secs(32));
        assert_eq!(backoff.delay_for(6), Duration::from_secs(60)); // capped
    }

    #[test]
    fn test_exponential_backoff_never_overflows() {
        let backoff = ExponentialBackoff::default();

        assert_eq!(backoff.delay_for(0), Duration::from_millis(5));
        assert_eq!(backoff.delay_for(40), Duration::from_secs(1000));
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_secs(1000));
    }

    #[test]
    fn test_max_below_base_is_raised() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(backoff.max(), Duration::from_secs(5));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(5));
    }
}
