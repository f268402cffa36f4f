//! Time source, deadline-bounded retries and the drift-corrected control period.

use embedded_hal::delay::DelayNs;

/// Monotonic millisecond time source.
///
/// Firmware typically backs this with the RTOS tick counter or a SysTick
/// monotonic; tests use a fake that advances on every call.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin. Must never go backwards.
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Outcome of [`retry_with_deadline`] when the attempt never succeeded.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryError<E> {
    /// The attempt kept reporting `WouldBlock` past the deadline.
    TimedOut,
    /// The attempt failed with a non-retryable error.
    Failed(E),
}

/// Repeat `attempt` while it reports `nb::Error::WouldBlock`, giving up once
/// more than `timeout_ms` has elapsed since the first call.
///
/// The attempt is always invoked at least once, even with a zero timeout.
pub fn retry_with_deadline<C, T, E>(
    clock: &C,
    timeout_ms: u32,
    mut attempt: impl FnMut() -> nb::Result<T, E>,
) -> Result<T, RetryError<E>>
where
    C: Clock + ?Sized,
{
    let start = clock.now_ms();
    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(nb::Error::Other(e)) => return Err(RetryError::Failed(e)),
            Err(nb::Error::WouldBlock) => {
                if clock.now_ms().saturating_sub(start) > u64::from(timeout_ms) {
                    return Err(RetryError::TimedOut);
                }
                core::hint::spin_loop();
            }
        }
    }
}

/// Fixed-period wake-up that targets period boundaries instead of
/// "now + period", so execution jitter does not accumulate.
#[derive(Clone, Copy, Debug)]
pub struct Periodic {
    period_ms: u32,
    next_wake_ms: u64,
}

impl Periodic {
    /// Start a period train whose first boundary is one period after `now`.
    pub fn new<C: Clock + ?Sized>(clock: &C, period_ms: u32) -> Self {
        Self {
            period_ms,
            next_wake_ms: clock.now_ms() + u64::from(period_ms),
        }
    }

    /// The boundary the next [`wait`](Self::wait) sleeps until.
    pub fn next_wake_ms(&self) -> u64 {
        self.next_wake_ms
    }

    /// Sleep until the next period boundary and advance it by one period.
    ///
    /// Returns immediately if the boundary has already passed; the following
    /// boundary is still computed from the previous one.
    pub fn wait<C, D>(&mut self, clock: &C, delay: &mut D)
    where
        C: Clock + ?Sized,
        D: DelayNs,
    {
        let remaining = self.next_wake_ms.saturating_sub(clock.now_ms());
        if remaining > 0 {
            delay.delay_ms(u32::try_from(remaining).unwrap_or(u32::MAX));
        }
        self.next_wake_ms += u64::from(self.period_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct StepClock {
        now: Cell<u64>,
        step: u64,
    }

    impl Clock for StepClock {
        fn now_ms(&self) -> u64 {
            let t = self.now.get();
            self.now.set(t + self.step);
            t
        }
    }

    #[test]
    fn retry_returns_first_success() {
        let clock = StepClock { now: Cell::new(0), step: 10 };
        let mut calls = 0;
        let r: Result<u8, RetryError<()>> = retry_with_deadline(&clock, 100, || {
            calls += 1;
            if calls < 3 { Err(nb::Error::WouldBlock) } else { Ok(7) }
        });
        assert_eq!(r, Ok(7));
        assert_eq!(calls, 3);
    }

    #[test]
    fn retry_times_out_when_never_idle() {
        let clock = StepClock { now: Cell::new(0), step: 10 };
        let r: Result<(), RetryError<()>> =
            retry_with_deadline(&clock, 100, || Err(nb::Error::WouldBlock));
        assert_eq!(r, Err(RetryError::TimedOut));
        assert!(clock.now.get() <= 130);
    }

    #[test]
    fn retry_does_not_repeat_hard_errors() {
        let clock = StepClock { now: Cell::new(0), step: 1 };
        let mut calls = 0;
        let r: Result<(), RetryError<u8>> = retry_with_deadline(&clock, 100, || {
            calls += 1;
            Err(nb::Error::Other(5))
        });
        assert_eq!(r, Err(RetryError::Failed(5)));
        assert_eq!(calls, 1);
    }

    struct Sleeps(Vec<u32>);

    impl DelayNs for Sleeps {
        fn delay_ns(&mut self, ns: u32) {
            self.0.push(ns / 1_000_000);
        }

        fn delay_ms(&mut self, ms: u32) {
            self.0.push(ms);
        }
    }

    #[test]
    fn periodic_targets_boundaries() {
        let clock = StepClock { now: Cell::new(0), step: 0 };
        let mut period = Periodic::new(&clock, 500);
        let mut sleeps = Sleeps(Vec::new());

        clock.now.set(120);
        period.wait(&clock, &mut sleeps);
        assert_eq!(period.next_wake_ms(), 1_000);

        // Overran the boundary: no sleep, next boundary unchanged in phase.
        clock.now.set(1_300);
        period.wait(&clock, &mut sleeps);
        assert_eq!(period.next_wake_ms(), 1_500);

        clock.now.set(1_450);
        period.wait(&clock, &mut sleeps);
        assert_eq!(sleeps.0, vec![380, 50]);
    }
}
