//! Fixed-step ticker with drift correction
//!
//! The ticker keeps a schedule `start + tick_ms * index` and, each time it is
//! polled, compares the next scheduled tick against the clock:
//! - more than one tick early: do nothing
//! - more than [`HARD_RESET_TICKS`] late: drop the backlog, restart the
//!   schedule at now and run one tick
//! - more than one tick late: catch up, at most [`MAX_CATCH_UP_TICKS`] per
//!   poll, hard resetting if the backlog grows past the threshold mid-burst
//! - otherwise: run one tick
//!
//! The host re-polls after the returned delay. Nothing here touches timers
//! directly, so the ticker runs the same under a manual clock.

use std::collections::VecDeque;

use crate::consts::{HARD_RESET_TICKS, MAX_CATCH_UP_TICKS, TICK_HISTORY_LEN};
use crate::platform::Clock;

/// What one poll did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Ahead of schedule
    Skipped,
    /// Ran this many ticks on schedule or catching up
    Ran(u32),
    /// Backlog dropped, one tick run
    HardReset,
}

#[derive(Debug, Clone)]
pub struct Ticker {
    tick_ms: f64,
    start_ms: f64,
    index: u64,
    running: bool,
    hard_resets: u32,
    durations: VecDeque<f64>,
}

impl Ticker {
    pub fn new(tick_ms: f64) -> Self {
        Self {
            tick_ms,
            start_ms: 0.0,
            index: 0,
            running: false,
            hard_resets: 0,
            durations: VecDeque::with_capacity(TICK_HISTORY_LEN),
        }
    }

    pub fn tick_ms(&self) -> f64 {
        self.tick_ms
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Ticks run since the schedule was last (re)started
    pub fn tick_index(&self) -> u64 {
        self.index
    }

    pub fn hard_resets(&self) -> u32 {
        self.hard_resets
    }

    pub fn start(&mut self, now_ms: f64) {
        self.start_ms = now_ms;
        self.index = 0;
        self.running = true;
        log::debug!("ticker started at {now_ms:.1}ms ({:.2}ms/tick)", self.tick_ms);
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    fn expected_ms(&self) -> f64 {
        self.start_ms + self.tick_ms * self.index as f64
    }

    /// Poll the schedule, running `on_tick` as many times as it calls for.
    /// Returns the outcome and the delay until the next poll, or `None` if
    /// the ticker is stopped.
    pub fn advance<C, F>(&mut self, clock: &C, mut on_tick: F) -> Option<(TickOutcome, f64)>
    where
        C: Clock + ?Sized,
        F: FnMut(),
    {
        if !self.running {
            return None;
        }

        let now = clock.now_ms();
        let expected = self.expected_ms();
        let behind_limit = HARD_RESET_TICKS * self.tick_ms;

        let outcome = if expected > now + self.tick_ms {
            TickOutcome::Skipped
        } else if expected < now - behind_limit {
            self.hard_reset(clock, &mut on_tick)
        } else if expected < now - self.tick_ms {
            let mut ran = 0;
            let mut outcome = None;
            while ran < MAX_CATCH_UP_TICKS {
                self.run_tick(clock, &mut on_tick);
                ran += 1;

                let now = clock.now_ms();
                let expected = self.expected_ms();
                if expected < now - behind_limit {
                    outcome = Some(self.hard_reset(clock, &mut on_tick));
                    break;
                }
                if expected >= now - self.tick_ms {
                    break;
                }
            }
            outcome.unwrap_or(TickOutcome::Ran(ran))
        } else {
            self.run_tick(clock, &mut on_tick);
            TickOutcome::Ran(1)
        };

        let delay = (self.expected_ms() - clock.now_ms()).max(0.0);
        Some((outcome, delay))
    }

    fn hard_reset<C, F>(&mut self, clock: &C, on_tick: &mut F) -> TickOutcome
    where
        C: Clock + ?Sized,
        F: FnMut(),
    {
        let now = clock.now_ms();
        log::warn!(
            "ticker {:.0}ms behind, dropping backlog",
            now - self.expected_ms()
        );
        self.hard_resets += 1;
        self.start_ms = now;
        self.index = 0;
        self.run_tick(clock, on_tick);
        TickOutcome::HardReset
    }

    fn run_tick<C, F>(&mut self, clock: &C, on_tick: &mut F)
    where
        C: Clock + ?Sized,
        F: FnMut(),
    {
        let began = clock.now_ms();
        on_tick();
        self.index += 1;

        if self.durations.len() == TICK_HISTORY_LEN {
            self.durations.pop_front();
        }
        self.durations.push_back(clock.now_ms() - began);
    }

    /// Mean duration of the last few ticks, 0 before the first tick
    pub fn average_tick_ms(&self) -> f64 {
        if self.durations.is_empty() {
            0.0
        } else {
            self.durations.iter().sum::<f64>() / self.durations.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ManualClock;

    const T: f64 = 10.0;

    fn started(clock: &ManualClock) -> Ticker {
        let mut ticker = Ticker::new(T);
        ticker.start(clock.now_ms());
        ticker
    }

    #[test]
    fn test_stopped_ticker_does_nothing() {
        let clock = ManualClock::new(0.0);
        let mut ticker = Ticker::new(T);
        let mut count = 0;
        assert_eq!(ticker.advance(&clock, || count += 1), None);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_on_schedule_runs_one_tick() {
        let clock = ManualClock::new(1000.0);
        let mut ticker = started(&clock);
        let mut count = 0;

        let (outcome, delay) = ticker.advance(&clock, || count += 1).unwrap();
        assert_eq!(outcome, TickOutcome::Ran(1));
        assert_eq!(count, 1);
        assert_eq!(delay, T);

        clock.advance(T);
        let (outcome, _) = ticker.advance(&clock, || count += 1).unwrap();
        assert_eq!(outcome, TickOutcome::Ran(1));
        assert_eq!(ticker.tick_index(), 2);
    }

    #[test]
    fn test_ahead_of_schedule_skips() {
        let clock = ManualClock::new(0.0);
        let mut ticker = started(&clock);
        let mut count = 0;
        // three polls at t=0, only two ticks are due
        for _ in 0..3 {
            ticker.advance(&clock, || count += 1);
        }
        assert_eq!(count, 2);

        let (outcome, delay) = ticker.advance(&clock, || count += 1).unwrap();
        assert_eq!(outcome, TickOutcome::Skipped);
        assert_eq!(count, 2);
        assert_eq!(delay, 2.0 * T);
    }

    #[test]
    fn test_mildly_behind_catches_up() {
        let clock = ManualClock::new(0.0);
        let mut ticker = started(&clock);
        clock.advance(3.5 * T);

        let mut count = 0;
        let (outcome, delay) = ticker.advance(&clock, || count += 1).unwrap();
        // expected times 0, 10, 20 are more than a tick behind 35; 30 is not
        assert_eq!(outcome, TickOutcome::Ran(3));
        assert_eq!(count, 3);
        assert_eq!(ticker.tick_index(), 3);
        assert_eq!(delay, 0.0);
    }

    #[test]
    fn test_badly_behind_hard_resets() {
        let clock = ManualClock::new(0.0);
        let mut ticker = started(&clock);
        clock.advance(100.0 * T);

        let mut count = 0;
        let (outcome, delay) = ticker.advance(&clock, || count += 1).unwrap();
        assert_eq!(outcome, TickOutcome::HardReset);
        assert_eq!(count, 1);
        assert_eq!(ticker.tick_index(), 1);
        assert_eq!(ticker.hard_resets(), 1);
        assert_eq!(delay, T);
    }

    #[test]
    fn test_slow_ticks_trigger_reset_mid_catch_up() {
        let clock = ManualClock::new(0.0);
        let mut ticker = started(&clock);
        clock.advance(3.0 * T);

        // every tick costs three tick lengths, so the backlog grows
        let mut count = 0;
        let (outcome, _) = ticker
            .advance(&clock, || {
                count += 1;
                clock.advance(3.0 * T);
            })
            .unwrap();
        assert_eq!(outcome, TickOutcome::HardReset);
        assert!(count <= MAX_CATCH_UP_TICKS + 1);
        assert_eq!(ticker.tick_index(), 1);
        assert_eq!(ticker.average_tick_ms(), 3.0 * T);
    }

    #[test]
    fn test_host_loop_with_timer_jitter_keeps_pace() {
        let clock = ManualClock::new(0.0);
        let mut ticker = started(&clock);
        let mut count = 0;

        // timers fire on whole milliseconds plus a little lateness
        for _ in 0..100 {
            let (outcome, delay) = ticker
                .advance(&clock, || {
                    count += 1;
                    clock.advance(1.0);
                })
                .unwrap();
            assert_eq!(outcome, TickOutcome::Ran(1));
            clock.advance(delay.ceil() + 0.3);
        }

        assert_eq!(count, 100);
        assert_eq!(ticker.hard_resets(), 0);
        assert!((clock.now_ms() - 100.0 * T).abs() < 3.0);
    }

    #[test]
    fn test_ticks_slower_than_reset_threshold() {
        let clock = ManualClock::new(0.0);
        let mut ticker = started(&clock);
        let mut count = 0;
        let slow = (HARD_RESET_TICKS + 1.0) * T;

        let (outcome, delay) = ticker
            .advance(&clock, || {
                count += 1;
                clock.advance(slow);
            })
            .unwrap();
        assert_eq!(outcome, TickOutcome::Ran(1));
        assert_eq!(delay, 0.0);

        // every later poll is one catch-up tick then a reset
        for _ in 0..4 {
            let (outcome, _) = ticker
                .advance(&clock, || {
                    count += 1;
                    clock.advance(slow);
                })
                .unwrap();
            assert_eq!(outcome, TickOutcome::HardReset);
            assert_eq!(ticker.tick_index(), 1);
        }
        assert_eq!(ticker.hard_resets(), 4);
        assert_eq!(count, 9);
        assert_eq!(ticker.average_tick_ms(), slow);
    }

    #[test]
    fn test_catch_up_is_bounded() {
        let clock = ManualClock::new(0.0);
        let mut ticker = Ticker::new(T);
        ticker.start(0.0);
        // behind, but under the reset threshold
        clock.set(4.5 * T);
        let mut count = 0;
        let (outcome, _) = ticker.advance(&clock, || count += 1).unwrap();
        assert_eq!(outcome, TickOutcome::Ran(4));
        assert_eq!(count, 4);
        assert!(count <= MAX_CATCH_UP_TICKS);
    }

    #[test]
    fn test_average_window() {
        let clock = ManualClock::new(0.0);
        let mut ticker = started(&clock);
        assert_eq!(ticker.average_tick_ms(), 0.0);

        for cost in [1.0, 1.0, 1.0, 1.0, 1.0, 6.0] {
            clock.advance(T);
            ticker.advance(&clock, || clock.advance(cost));
        }
        // window keeps the last five
        assert_eq!(ticker.average_tick_ms(), 2.0);
    }

    #[test]
    fn test_stop_and_restart() {
        let clock = ManualClock::new(0.0);
        let mut ticker = started(&clock);
        ticker.advance(&clock, || ());
        ticker.stop();
        assert!(!ticker.is_running());
        assert!(ticker.advance(&clock, || ()).is_none());

        clock.advance(1000.0);
        ticker.start(clock.now_ms());
        assert_eq!(ticker.tick_index(), 0);
        let (outcome, _) = ticker.advance(&clock, || ()).unwrap();
        assert_eq!(outcome, TickOutcome::Ran(1));
    }
}
