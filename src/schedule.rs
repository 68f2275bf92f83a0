use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

/// Shared flag to stop an [`Interval`]. Cancelling twice is the same as cancelling once.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    /// The task asked not to be rescheduled.
    Finished { ticks: u32 },
    Cancelled { ticks: u32 },
}

/// Repeating task with a fixed delay between ticks, run on the calling thread.
#[derive(Debug)]
pub struct Interval {
    delay: Duration,
    token: CancelToken,
}

impl Interval {
    pub fn new(delay: Duration) -> Self {
        Interval {
            delay,
            token: CancelToken::new(),
        }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Call `tick` until it returns `false` or the token is cancelled.
    ///
    /// Cancellation is checked before every tick, so a tick is never cut short.
    pub fn run<F>(&self, mut tick: F) -> Outcome
    where
        F: FnMut() -> bool,
    {
        let mut ticks = 0;
        loop {
            if self.token.is_cancelled() {
                return Outcome::Cancelled { ticks };
            }
            ticks += 1;
            if !tick() {
                return Outcome::Finished { ticks };
            }
            if !self.delay.is_zero() {
                sleep(self.delay);
            }
        }
    }
}
