//! The power state machine.
//!
//! ```text
//!            press                  elapsed >= warn_after
//!   Off ─────────────► On ─────────────────────────────► Warning
//!    ▲  ◄─────────────  │ ▲                                  │
//!    │   press (toggle) │ └──────────── press ───────────────┘
//!    │                  │               (restarts the timer)
//!    └──────────────────┴──── elapsed >= off_after ──────────┘
//! ```
//!
//! A press while the warning is showing restarts the session instead of
//! ending it, so the user can extend the time without the load dropping out.

use crate::{
    config::PowerConfig,
    debounce::Edge,
    tick::{Tick, Timebase},
};

/// The state of the load
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum PowerState {
    /// The load is off
    Off,

    /// The load is on and the session is running
    On,

    /// The load is on and the session is about to time out
    Warning,
}

/// What a button press does while the load is on (and not warning)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum PressAction {
    /// Switch the load off
    Toggle,

    /// Restart the session timer, leaving the load on
    Restart,
}

/// Pulses the load on for `on_for` out of every `period` ticks, measured from
/// the start of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct DutyCycle {
    /// Length of one cycle
    pub period: Tick,

    /// How long the load is on at the start of each cycle
    pub on_for: Tick,
}

impl DutyCycle {
    /// Returns true if the load should be on `elapsed` ticks into the session
    pub const fn is_on(&self, elapsed: Tick) -> bool {
        if self.period == 0 {
            return true;
        }

        elapsed % self.period < self.on_for
    }
}

/// The output levels derived from the power state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct Outputs {
    /// The load enable line
    pub load: bool,

    /// The warning indicator
    pub warning: bool,

    /// High for the whole session, regardless of duty cycling
    pub active: bool,
}

impl Outputs {
    /// Everything off
    pub const OFF: Self = Self {
        load: false,
        warning: false,
        active: false,
    };
}

/// Decides when the load is on from button edges and the passage of time.
#[derive(Debug)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct PowerController {
    config: PowerConfig,
    timebase: Timebase,
    state: PowerState,

    /// When the current session started. Only meaningful while not [PowerState::Off]
    power_on_time: Tick,

    /// Whether the duty cycle currently wants the load on
    duty_on: bool,
}

impl PowerController {
    /// Creates a controller. If the configuration asks for it the session
    /// starts straight away at `now`, otherwise the load starts off.
    pub fn new(config: PowerConfig, timebase: Timebase, now: Tick) -> Self {
        let mut controller = Self {
            config,
            timebase,
            state: PowerState::Off,
            power_on_time: 0,
            duty_on: false,
        };

        if config.boot_on {
            controller.start_session(now);
        }

        controller
    }

    /// The outputs a controller built from `config` shows before its first
    /// tick, so pins can be set to them before anything else is running.
    pub const fn boot_outputs(config: &PowerConfig) -> Outputs {
        if !config.boot_on {
            return Outputs::OFF;
        }

        Outputs {
            load: match config.duty {
                Some(duty) => duty.is_on(0),
                None => true,
            },
            warning: false,
            active: true,
        }
    }

    /// The current state
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// When the current session started, or `None` if the load is off
    pub fn power_on_time(&self) -> Option<Tick> {
        match self.state {
            PowerState::Off => None,
            PowerState::On | PowerState::Warning => Some(self.power_on_time),
        }
    }

    /// The output levels for the current state
    pub fn outputs(&self) -> Outputs {
        match self.state {
            PowerState::Off => Outputs::OFF,
            PowerState::On => Outputs {
                load: self.duty_on,
                warning: false,
                active: true,
            },
            PowerState::Warning => Outputs {
                load: self.duty_on,
                warning: true,
                active: true,
            },
        }
    }

    /// Handles a debounced button edge at `now`. Releases are ignored.
    pub fn on_button_edge(&mut self, edge: Edge, now: Tick) {
        if edge != Edge::Pressed {
            return;
        }

        match (self.state, self.config.press_action) {
            (PowerState::Off, _)
            | (PowerState::Warning, _)
            | (PowerState::On, PressAction::Restart) => self.start_session(now),
            (PowerState::On, PressAction::Toggle) => self.switch_off(),
        }
    }

    /// Re-evaluates the timeouts and the duty cycle at `now`. Must be called
    /// on every pass of the main loop.
    pub fn on_tick(&mut self, now: Tick) {
        if self.state == PowerState::Off {
            return;
        }

        let elapsed = self.timebase.elapsed(now, self.power_on_time);
        if elapsed >= self.config.off_after {
            self.switch_off();
            return;
        }

        if let (PowerState::On, Some(warn_after)) = (self.state, self.config.warn_after) {
            if elapsed >= warn_after {
                self.set_state(PowerState::Warning);
            }
        }

        self.duty_on = self.duty_at(elapsed);
    }

    fn start_session(&mut self, now: Tick) {
        self.power_on_time = now;
        self.duty_on = self.duty_at(0);
        self.set_state(PowerState::On);
    }

    fn switch_off(&mut self) {
        self.duty_on = false;
        self.set_state(PowerState::Off);
    }

    fn duty_at(&self, elapsed: Tick) -> bool {
        match self.config.duty {
            Some(duty) => duty.is_on(elapsed),
            None => true,
        }
    }

    fn set_state(&mut self, state: PowerState) {
        #[cfg(feature = "logging")]
        defmt::info!(
            "Power {} -> {} (session started {})",
            self.state,
            state,
            self.power_on_time
        );

        self.state = state;
    }
}
