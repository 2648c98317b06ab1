// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2025 Ridelink Contributors. All rights reserved.
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Exponential backoff with optional jitter and a bounded attempt budget,
//! driving the reconnection schedule of the duplex client.

use std::time::Duration;

use rand::Rng;

/// Computes the delay before each reconnection attempt.
///
/// The delay doubles (or grows by `factor`) after every attempt up to
/// `delay_max`, with uniform random jitter of up to `jitter_ms` added on top.
/// When `max_attempts` is set the schedule is exhausted once that many delays
/// have been issued without an intervening [`reset`](Self::reset).
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// The initial delay on the first attempt.
    delay_initial: Duration,
    /// The maximum delay the schedule will grow to.
    delay_max: Duration,
    /// The delay the next attempt will use (before jitter).
    delay_current: Duration,
    /// The multiplicative growth factor.
    factor: f64,
    /// The maximum random jitter added to each delay, in milliseconds.
    jitter_ms: u64,
    /// Number of delays issued since the last reset.
    attempts: u32,
    /// Attempt budget; `None` retries forever.
    max_attempts: Option<u32>,
    /// If the first call should return zero delay.
    immediate_first: bool,
}

impl ExponentialBackoff {
    /// Creates a new [`ExponentialBackoff`] instance.
    #[must_use]
    pub fn new(
        delay_initial: Duration,
        delay_max: Duration,
        factor: f64,
        jitter_ms: u64,
        immediate_first: bool,
        max_attempts: Option<u32>,
    ) -> Self {
        Self {
            delay_initial,
            delay_max,
            delay_current: delay_initial,
            factor,
            jitter_ms,
            attempts: 0,
            max_attempts,
            immediate_first,
        }
    }

    /// Returns the delay for the current attempt and advances the schedule.
    ///
    /// If `immediate_first` is set the very first call after construction or
    /// reset returns `Duration::ZERO` without consuming the growth step.
    pub fn next_duration(&mut self) -> Duration {
        self.attempts += 1;

        if self.immediate_first && self.attempts == 1 {
            return Duration::ZERO;
        }

        let jitter = rand::rng().random_range(0..=self.jitter_ms);
        let delay_with_jitter = self.delay_current + Duration::from_millis(jitter);

        // Prepare the delay for the next attempt
        let next_delay_ms = (self.delay_current.as_millis() as f64 * self.factor) as u64;
        let next_delay = Duration::from_millis(next_delay_ms);
        self.delay_current = next_delay.min(self.delay_max);

        delay_with_jitter
    }

    /// Resets the backoff to its initial state.
    pub fn reset(&mut self) {
        self.delay_current = self.delay_initial;
        self.attempts = 0;
    }

    /// Returns the number of delays issued since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns true once the attempt budget has been spent.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.max_attempts.is_some_and(|max| self.attempts >= max)
    }

    /// Returns the current base delay (without jitter).
    #[must_use]
    pub const fn current_delay(&self) -> Duration {
        self.delay_current
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_no_jitter_growth() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(1600),
            2.0,
            0,
            false,
            None,
        );

        assert_eq!(backoff.next_duration(), Duration::from_millis(100));
        assert_eq!(backoff.next_duration(), Duration::from_millis(200));
        assert_eq!(backoff.next_duration(), Duration::from_millis(400));
        assert_eq!(backoff.next_duration(), Duration::from_millis(800));
        assert_eq!(backoff.next_duration(), Duration::from_millis(1600));
        // Capped at delay_max
        assert_eq!(backoff.next_duration(), Duration::from_millis(1600));
    }

    #[rstest]
    fn test_reset_restores_initial_delay() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(1600),
            2.0,
            0,
            false,
            None,
        );

        backoff.next_duration();
        backoff.next_duration();
        backoff.reset();

        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_duration(), Duration::from_millis(100));
    }

    #[rstest]
    fn test_jitter_within_bound() {
        let delay_initial = Duration::from_millis(100);
        let jitter_ms = 50;
        let mut backoff = ExponentialBackoff::new(
            delay_initial,
            Duration::from_millis(1600),
            2.0,
            jitter_ms,
            false,
            None,
        );

        for _ in 0..10 {
            let delay = backoff.next_duration();
            let base = delay
                .checked_sub(Duration::from_millis(jitter_ms))
                .unwrap_or(Duration::ZERO);
            assert!(delay >= base);
            assert!(delay <= backoff.current_delay() + Duration::from_millis(jitter_ms));
        }
    }

    #[rstest]
    fn test_immediate_first() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(1600),
            2.0,
            0,
            true,
            None,
        );

        assert_eq!(backoff.next_duration(), Duration::ZERO);
        assert_eq!(backoff.next_duration(), Duration::from_millis(100));
        assert_eq!(backoff.next_duration(), Duration::from_millis(200));

        // After a reset the first delay is immediate again
        backoff.reset();
        assert_eq!(backoff.next_duration(), Duration::ZERO);
    }

    #[rstest]
    fn test_attempt_budget_exhaustion() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(1600),
            2.0,
            0,
            false,
            Some(3),
        );

        assert!(!backoff.is_exhausted());
        backoff.next_duration();
        backoff.next_duration();
        assert!(!backoff.is_exhausted());
        backoff.next_duration();
        assert!(backoff.is_exhausted());

        backoff.reset();
        assert!(!backoff.is_exhausted());
    }

    #[rstest]
    fn test_unbounded_never_exhausts() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(1),
            Duration::from_millis(16),
            2.0,
            0,
            false,
            None,
        );

        for _ in 0..1000 {
            backoff.next_duration();
        }
        assert!(!backoff.is_exhausted());
        assert_eq!(backoff.attempts(), 1000);
    }
}
