//! Countdown Module
//!
//! One-second countdown used for the OTP resend cooldown. The ticking task
//! stops by itself at zero and is aborted when the countdown is dropped.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Cooldown shown when the verification screen opens
pub const INITIAL_RESEND_SECS: u32 = 52;
/// Cooldown after a code has been resent
pub const RESEND_SECS: u32 = 60;

const TICK: Duration = Duration::from_secs(1);

pub struct Countdown {
    remaining: watch::Receiver<u32>,
    task: JoinHandle<()>,
}

impl Countdown {
    /// Start counting down. Must be called inside a Tokio runtime.
    pub fn start(seconds: u32) -> Self {
        let (tx, remaining) = watch::channel(seconds);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            // The first tick completes immediately
            interval.tick().await;

            let mut left = seconds;
            while left > 0 {
                interval.tick().await;
                left -= 1;
                if tx.send(left).is_err() {
                    break;
                }
            }
            debug!("Countdown of {}s finished", seconds);
        });

        Self { remaining, task }
    }

    /// Seconds left
    pub fn remaining(&self) -> u32 {
        *self.remaining.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }

    /// Watch the remaining seconds, e.g. to redraw a label
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.remaining.clone()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counts_down_to_zero() {
        let countdown = Countdown::start(3);
        assert_eq!(countdown.remaining(), 3);

        let mut rx = countdown.subscribe();
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let value = *rx.borrow_and_update();
            seen.push(value);
            if value == 0 {
                break;
            }
        }

        assert_eq!(seen, vec![2, 1, 0]);
        assert!(countdown.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_is_finished_immediately() {
        let countdown = Countdown::start(0);
        assert!(countdown.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_stops_the_tick() {
        let countdown = Countdown::start(RESEND_SECS);
        let mut rx = countdown.subscribe();
        drop(countdown);

        // The sender goes away with the aborted task
        while rx.changed().await.is_ok() {}
        assert!(*rx.borrow() > 0);
    }
}
