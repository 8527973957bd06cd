//! Build time configuration for the timer.
//!
//! Every hardware variant is described by one [TimerConfig] value. The presets
//! below cover the three load controllers this firmware runs on, and the
//! firmware picks one of them with a cargo feature.

use crate::{
    debounce::Boundary,
    power::{DutyCycle, PressAction},
    tick::{Tick, WrapPolicy},
};

/// Timer interrupt rate and counter behaviour
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct TickConfig {
    /// How many timer interrupts are raised per second
    pub rate_hz: u32,

    /// What the counter does when it overflows
    pub policy: WrapPolicy,
}

/// Button debounce settings. The threshold is counted in fine ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct DebounceConfig {
    /// How long a new level must hold before it is reported
    pub threshold: Tick,

    /// Whether holding for exactly `threshold` is enough
    pub boundary: Boundary,
}

/// Power state machine settings. All durations are counted in coarse ticks and
/// must be shorter than one period of the coarse counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct PowerConfig {
    /// How long the load stays on before it is switched off automatically
    pub off_after: Tick,

    /// When to raise the warning output, if there is a warning stage
    pub warn_after: Option<Tick>,

    /// Periodic exercising of the load while it is on
    pub duty: Option<DutyCycle>,

    /// What a button press does while the load is on
    pub press_action: PressAction,

    /// Start switched on as soon as the firmware boots
    pub boot_on: bool,
}

/// The complete description of one timer variant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct TimerConfig {
    /// The tick counter
    pub tick: TickConfig,

    /// The button debouncer
    pub debounce: DebounceConfig,

    /// The power state machine
    pub power: PowerConfig,

    /// Whether a button is fitted at all
    pub has_button: bool,
}

/// Ticks per minute with a 10 Hz tick
const TENTHS_PER_MINUTE: Tick = 600;

/// Seconds in six hours
const SIX_HOURS: Tick = 6 * 3600;

/// Exercise period in seconds. Prime, so the pulses drift against other cycles
const EXERCISE_PERIOD: Tick = 223;

impl TimerConfig {
    /// A plain countdown: press to switch the load on for half an hour, with a
    /// warning light for the last five minutes. Pressing during the warning
    /// restarts the countdown, pressing otherwise switches off.
    ///
    /// Uses a 10 Hz tick that skips zero. Limits are checked in whole minutes
    /// and must be exceeded, so the warning starts in minute 26 and the load
    /// switches off in minute 31.
    pub const fn countdown() -> Self {
        Self {
            tick: TickConfig {
                rate_hz: 10,
                policy: WrapPolicy::SkipZero,
            },
            debounce: DebounceConfig {
                threshold: 1,
                boundary: Boundary::Exclusive,
            },
            power: PowerConfig {
                off_after: (30 + 1) * TENTHS_PER_MINUTE,
                warn_after: Some((25 + 1) * TENTHS_PER_MINUTE),
                duty: None,
                press_action: PressAction::Toggle,
                boot_on: false,
            },
            has_button: true,
        }
    }

    /// Keeps a flow sensor awake: each press (re)starts a six hour session in
    /// which the load runs for one minute of every 223 seconds.
    ///
    /// Uses a 1 kHz tick that carries into a seconds counter, debouncing on the
    /// milliseconds.
    pub const fn exercise() -> Self {
        Self {
            tick: TickConfig {
                rate_hz: 1000,
                policy: WrapPolicy::Cascade {
                    fine_per_coarse: 1000,
                },
            },
            debounce: DebounceConfig {
                threshold: 50,
                boundary: Boundary::Inclusive,
            },
            power: PowerConfig {
                off_after: SIX_HOURS,
                warn_after: None,
                duty: Some(DutyCycle {
                    period: EXERCISE_PERIOD,
                    on_for: 60,
                }),
                press_action: PressAction::Restart,
                boot_on: false,
            },
            has_button: true,
        }
    }

    /// The board's own supply is switched by the session output, so the
    /// session starts at boot and ends by cutting power. The load runs for two
    /// minutes of every 223 seconds. There is no button.
    pub const fn self_powered() -> Self {
        Self {
            tick: TickConfig {
                rate_hz: 1,
                policy: WrapPolicy::Wrapping,
            },
            debounce: DebounceConfig {
                threshold: 0,
                boundary: Boundary::Exclusive,
            },
            power: PowerConfig {
                off_after: SIX_HOURS,
                warn_after: None,
                duty: Some(DutyCycle {
                    period: EXERCISE_PERIOD,
                    on_for: 120,
                }),
                press_action: PressAction::Toggle,
                boot_on: true,
            },
            has_button: false,
        }
    }
}
