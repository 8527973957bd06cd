//! Timekeeping driven by the periodic timer interrupt.
//!
//! A [TickSource] is advanced once per timer event and read from the main
//! loop. Elapsed time is always computed through a [Timebase] so that
//! comparisons stay correct when a counter wraps.

use crate::config::TickConfig;

/// One reading of a tick counter
pub type Tick = u16;

/// The range of values a counter runs through before it repeats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct Timebase {
    /// The value the counter restarts from after it wraps
    first: u32,

    /// The number of distinct values the counter takes
    modulus: u32,
}

impl Timebase {
    /// A counter that uses every 16 bit value
    pub const WRAPPING: Self = Self {
        first: 0,
        modulus: 1 << 16,
    };

    /// A 16 bit counter that steps over zero, so zero can never be "now"
    pub const SKIP_ZERO: Self = Self {
        first: 1,
        modulus: (1 << 16) - 1,
    };

    /// A counter running from `0` to `modulus - 1`
    pub const fn bounded(modulus: Tick) -> Self {
        Self {
            first: 0,
            modulus: modulus as u32,
        }
    }

    /// The number of distinct values before the counter repeats
    pub const fn modulus(&self) -> u32 {
        self.modulus
    }

    /// The value following `tick`, and whether the counter wrapped to get there
    pub const fn next(&self, tick: Tick) -> (Tick, bool) {
        let next = tick as u32 + 1;
        if next >= self.first + self.modulus {
            (self.first as Tick, true)
        } else {
            (next as Tick, false)
        }
    }

    /// Returns the time from `since` to `now`.
    ///
    /// The result is only meaningful if less than one full period of the
    /// counter has passed. A negative raw difference has the modulus added,
    /// which for the full-width counter is the same as wrapping subtraction.
    pub const fn elapsed(&self, now: Tick, since: Tick) -> Tick {
        let now = now as u32;
        let since = since as u32;

        let delta = if now >= since {
            now - since
        } else {
            now + self.modulus - since
        };

        delta as Tick
    }
}

/// What happens when the counter overflows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum WrapPolicy {
    /// A single counter that steps from its maximum straight to 1
    SkipZero,

    /// A single counter using plain modular arithmetic
    Wrapping,

    /// A fine counter running `0..fine_per_coarse` that carries into a plainly
    /// wrapping coarse counter, e.g. milliseconds into seconds
    Cascade {
        /// The number of fine ticks in one coarse tick
        fine_per_coarse: Tick,
    },
}

impl WrapPolicy {
    /// The timebase of the fine counter
    pub const fn fine_timebase(&self) -> Timebase {
        match *self {
            WrapPolicy::SkipZero => Timebase::SKIP_ZERO,
            WrapPolicy::Wrapping => Timebase::WRAPPING,
            WrapPolicy::Cascade { fine_per_coarse } => Timebase::bounded(fine_per_coarse),
        }
    }

    /// The timebase of the coarse counter. Single counter policies use the same
    /// counter for both.
    pub const fn coarse_timebase(&self) -> Timebase {
        match *self {
            WrapPolicy::SkipZero => Timebase::SKIP_ZERO,
            WrapPolicy::Wrapping | WrapPolicy::Cascade { .. } => Timebase::WRAPPING,
        }
    }

    const fn start(&self) -> Tick {
        match *self {
            WrapPolicy::SkipZero => 1,
            WrapPolicy::Wrapping | WrapPolicy::Cascade { .. } => 0,
        }
    }
}

/// Spreads a fractional hardware period over a repeating cycle of timer periods.
///
/// When the hardware count per tick is not a whole number, each cycle of
/// `cycle_len` periods uses `long_cycles` periods of `short + 1` counts
/// followed by periods of `short` counts, so the long run rate is exact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct CycleCorrection {
    short: u32,
    cycle_len: u16,
    long_cycles: u16,
}

impl CycleCorrection {
    /// Creates a correction with the given short period length (in hardware
    /// counts), cycle length, and number of long periods per cycle.
    pub const fn new(short: u32, cycle_len: u16, long_cycles: u16) -> Self {
        Self {
            short,
            cycle_len,
            long_cycles,
        }
    }

    /// Works out the correction needed to produce `rate_hz` ticks from a
    /// counter running at `counter_hz`. Returns `None` if the rate divides
    /// evenly and no correction is required.
    pub const fn dividing(counter_hz: u32, rate_hz: u32) -> Option<Self> {
        if rate_hz == 0 || rate_hz > u16::MAX as u32 {
            return None;
        }

        let remainder = counter_hz % rate_hz;
        if remainder == 0 {
            None
        } else {
            Some(Self::new(
                counter_hz / rate_hz,
                rate_hz as u16,
                remainder as u16,
            ))
        }
    }

    /// The length of a short period in hardware counts
    pub const fn short(&self) -> u32 {
        self.short
    }

    /// The length of a long period in hardware counts
    pub const fn long(&self) -> u32 {
        self.short + 1
    }

    fn period_at(&self, position: u16) -> u32 {
        if position < self.long_cycles {
            self.long()
        } else {
            self.short()
        }
    }
}

/// A pair of counter readings taken at the same instant. For single counter
/// policies both fields hold the same value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct Timestamp {
    /// The fine counter, used for debouncing
    pub fine: Tick,

    /// The coarse counter, used for power timing
    pub coarse: Tick,
}

/// The monotonic tick counter.
///
/// The timer interrupt is the only caller of [TickSource::advance]. Everything
/// else takes a copy through [TickSource::now] while the interrupt is masked.
#[derive(Debug)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct TickSource {
    policy: WrapPolicy,
    fine: Tick,
    coarse: Tick,
    correction: Option<CycleCorrection>,
    cycle_position: u16,
}

impl TickSource {
    /// Creates a tick source at its starting value
    pub const fn new(config: &TickConfig, correction: Option<CycleCorrection>) -> Self {
        let start = config.policy.start();

        Self {
            policy: config.policy,
            fine: start,
            coarse: start,
            correction,
            cycle_position: 0,
        }
    }

    /// Returns the current counter values
    pub fn now(&self) -> Timestamp {
        Timestamp {
            fine: self.fine,
            coarse: self.coarse,
        }
    }

    /// The timebase of [Timestamp::fine]
    pub const fn fine_timebase(&self) -> Timebase {
        self.policy.fine_timebase()
    }

    /// The timebase of [Timestamp::coarse]
    pub const fn coarse_timebase(&self) -> Timebase {
        self.policy.coarse_timebase()
    }

    /// Advances the counter by one tick. If cycle correction is configured,
    /// returns the number of hardware counts the next period should last.
    pub fn advance(&mut self) -> Option<u32> {
        let (fine, wrapped) = self.policy.fine_timebase().next(self.fine);
        self.fine = fine;

        match self.policy {
            WrapPolicy::Cascade { .. } => {
                if wrapped {
                    self.coarse = self.coarse.wrapping_add(1);
                }
            }
            WrapPolicy::SkipZero | WrapPolicy::Wrapping => self.coarse = fine,
        }

        self.next_period()
    }

    /// Returns the length of the next hardware period and moves the correction
    /// cycle on, or `None` if no correction is configured.
    ///
    /// Called once when the timer is started and then by [TickSource::advance].
    pub fn next_period(&mut self) -> Option<u32> {
        let correction = self.correction?;
        let period = correction.period_at(self.cycle_position);

        self.cycle_position += 1;
        if self.cycle_position >= correction.cycle_len {
            self.cycle_position = 0;
        }

        Some(period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(policy: WrapPolicy) -> TickSource {
        TickSource::new(
            &TickConfig {
                rate_hz: 1000,
                policy,
            },
            None,
        )
    }

    #[test]
    fn elapsed_is_correct_across_the_wrap() {
        let full = Timebase::WRAPPING;
        assert_eq!(full.elapsed(10, 3), 7);
        assert_eq!(full.elapsed(2, 65_535), 3);
        assert_eq!(full.elapsed(0, 65_535), 1);
        assert_eq!(full.elapsed(5, 5), 0);

        let skip = Timebase::SKIP_ZERO;
        assert_eq!(skip.elapsed(1, 65_535), 1);
        assert_eq!(skip.elapsed(3, 65_534), 4);

        let millis = Timebase::bounded(1000);
        assert_eq!(millis.elapsed(3, 998), 5);
        assert_eq!(millis.elapsed(998, 3), 995);
    }

    #[test]
    fn elapsed_matches_counting_every_tick() {
        // each start is less than 3000 ticks before its counter wraps
        for (timebase, start) in [
            (Timebase::WRAPPING, 65_000),
            (Timebase::SKIP_ZERO, 65_000),
            (Timebase::bounded(1000), 2),
        ] {
            let mut now = start;

            for expected in 0..3000u32 {
                assert_eq!(
                    u32::from(timebase.elapsed(now, start)),
                    expected % timebase.modulus()
                );
                now = timebase.next(now).0;
            }
        }
    }

    #[test]
    fn skip_zero_never_reads_zero() {
        let mut ticks = source(WrapPolicy::SkipZero);
        assert_eq!(ticks.now().fine, 1);

        ticks.fine = u16::MAX - 1;
        ticks.advance();
        assert_eq!(ticks.now().fine, u16::MAX);

        ticks.advance();
        assert_eq!(ticks.now().fine, 1);
        assert_eq!(ticks.now().coarse, 1);
    }

    #[test]
    fn wrapping_counter_passes_through_zero() {
        let mut ticks = source(WrapPolicy::Wrapping);
        assert_eq!(ticks.now().fine, 0);

        ticks.fine = u16::MAX;
        ticks.advance();
        assert_eq!(ticks.now(), Timestamp { fine: 0, coarse: 0 });
    }

    #[test]
    fn cascade_carries_into_the_coarse_counter() {
        let mut ticks = source(WrapPolicy::Cascade {
            fine_per_coarse: 1000,
        });

        for _ in 0..999 {
            ticks.advance();
        }
        assert_eq!(ticks.now(), Timestamp { fine: 999, coarse: 0 });

        ticks.advance();
        assert_eq!(ticks.now(), Timestamp { fine: 0, coarse: 1 });

        ticks.coarse = u16::MAX;
        for _ in 0..1000 {
            ticks.advance();
        }
        assert_eq!(ticks.now(), Timestamp { fine: 0, coarse: 0 });
    }

    #[test]
    fn no_reload_without_correction() {
        let mut ticks = source(WrapPolicy::Wrapping);
        assert_eq!(ticks.next_period(), None);
        assert_eq!(ticks.advance(), None);
    }

    #[test]
    fn correction_averages_to_the_exact_rate() {
        // 1 MHz into 3 Hz leaves one spare count every three periods
        let correction = CycleCorrection::dividing(1_000_000, 3).unwrap();
        assert_eq!(correction.short(), 333_333);
        assert_eq!(correction.long(), 333_334);

        let mut ticks = TickSource::new(
            &TickConfig {
                rate_hz: 3,
                policy: WrapPolicy::Wrapping,
            },
            Some(correction),
        );

        let mut total = u64::from(ticks.next_period().unwrap());
        for _ in 0..5 {
            total += u64::from(ticks.advance().unwrap());
        }

        assert_eq!(total, 2_000_000);
    }

    #[test]
    fn long_periods_come_first_in_each_cycle() {
        let mut ticks = TickSource::new(
            &TickConfig {
                rate_hz: 10,
                policy: WrapPolicy::SkipZero,
            },
            Some(CycleCorrection::new(100, 4, 1)),
        );

        let periods: [u32; 8] = core::array::from_fn(|_| ticks.advance().unwrap());
        assert_eq!(periods, [101, 100, 100, 100, 101, 100, 100, 100]);
    }

    #[test]
    fn delayed_reloads_still_average_exactly() {
        // 10.5 MHz into 9 Hz: six long periods in every nine
        let mut ticks = TickSource::new(
            &TickConfig {
                rate_hz: 9,
                policy: WrapPolicy::Wrapping,
            },
            CycleCorrection::dividing(10_500_000, 9),
        );

        // The counter loads its reload value when a period ends, before the
        // handler runs, so a value written by the handler sets the period
        // after the one just loaded.
        let mut reload = ticks.next_period().unwrap();
        let mut current = reload;
        let mut lengths = [0u32; 1 + 9 * 3];
        for length in lengths.iter_mut() {
            *length = current;
            current = reload;
            if let Some(counts) = ticks.advance() {
                reload = counts;
            }
        }

        assert_eq!(lengths[0], lengths[1]);
        for window in lengths[1..].windows(9) {
            assert_eq!(window.iter().sum::<u32>(), 10_500_000);
        }
    }

    #[test]
    fn even_division_needs_no_correction() {
        assert_eq!(CycleCorrection::dividing(10_500_000, 1000), None);
        assert_eq!(CycleCorrection::dividing(1_000_000, 1000), None);
        assert_eq!(CycleCorrection::dividing(1_000_000, 0), None);
    }
}
