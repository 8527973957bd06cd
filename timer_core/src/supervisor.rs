//! The cooperative main loop.
//!
//! [Supervisor::step] is one pass of the loop: feed the watchdog, take the
//! time, sample and debounce the button, run the power state machine and
//! drive the outputs. The firmware calls it back to back forever. Nothing in
//! here blocks, so a hung pass can only mean a fault, and the watchdog then
//! resets the MCU.

use embedded_hal::watchdog::Watchdog;
use switch_hal::{InputSwitch, OutputSwitch};

use crate::{
    config::TimerConfig,
    debounce::Debouncer,
    power::{Outputs, PowerController, PowerState},
    tick::{TickSource, Timestamp},
};

/// One output line and the level it was last driven to
struct Line<S> {
    switch: S,

    /// `None` until a write has succeeded
    level: Option<bool>,
}

impl<S: OutputSwitch> Line<S> {
    fn new(switch: S) -> Self {
        Self { switch, level: None }
    }

    /// Drives the line to `on` unless it is already there. Returns true if
    /// a write was attempted. A failed write is not recorded, so the next
    /// call tries again.
    fn set(&mut self, on: bool) -> bool {
        if self.level == Some(on) {
            return false;
        }

        let result = if on { self.switch.on() } else { self.switch.off() };
        if result.is_ok() {
            self.level = Some(on);
        } else {
            #[cfg(feature = "logging")]
            defmt::warn!("Failed to drive output line {}", on);
        }

        true
    }
}

/// The output lines, written only when their level needs to change.
pub struct OutputBank<L, W, A> {
    load: Line<L>,
    warning: Option<Line<W>>,
    active: Option<Line<A>>,
}

impl<L, W, A> OutputBank<L, W, A>
where
    L: OutputSwitch,
    W: OutputSwitch,
    A: OutputSwitch,
{
    /// Creates a bank from the load switch and the optional warning and
    /// session lines. Nothing is written until the first [OutputBank::write].
    pub fn new(load: L, warning: Option<W>, active: Option<A>) -> Self {
        Self {
            load: Line::new(load),
            warning: warning.map(Line::new),
            active: active.map(Line::new),
        }
    }

    /// Drives every line whose level differs from the last successful write
    /// to it. The first write drives all lines.
    pub fn write(&mut self, outputs: Outputs) {
        let mut changed = self.load.set(outputs.load);

        if let Some(warning) = self.warning.as_mut() {
            changed |= warning.set(outputs.warning);
        }

        if let Some(active) = self.active.as_mut() {
            changed |= active.set(outputs.active);
        }

        if changed {
            #[cfg(feature = "logging")]
            defmt::trace!("Outputs {}", outputs);
        }
    }
}

/// Owns everything the main loop touches.
pub struct Supervisor<D, B, L, W, A> {
    watchdog: D,
    button: Option<B>,
    debouncer: Debouncer,
    power: PowerController,
    outputs: OutputBank<L, W, A>,
}

impl<D, B, L, W, A> Supervisor<D, B, L, W, A>
where
    D: Watchdog,
    B: InputSwitch,
    L: OutputSwitch,
    W: OutputSwitch,
    A: OutputSwitch,
{
    /// Builds the loop state from `config`, taking the timebases and start
    /// time from `ticks`, and drives the outputs to their starting levels.
    /// The watchdog must already be running.
    pub fn new(
        config: &TimerConfig,
        ticks: &TickSource,
        watchdog: D,
        button: Option<B>,
        outputs: OutputBank<L, W, A>,
    ) -> Self {
        let now = ticks.now();

        let mut supervisor = Self {
            watchdog,
            button,
            debouncer: Debouncer::new(&config.debounce, ticks.fine_timebase()),
            power: PowerController::new(config.power, ticks.coarse_timebase(), now.coarse),
            outputs,
        };

        supervisor.outputs.write(supervisor.power.outputs());
        supervisor
    }

    /// The power state machine
    pub fn power(&self) -> &PowerController {
        &self.power
    }

    /// Runs one pass of the main loop, reading the time with `read_clock`
    /// after the watchdog has been fed. Returns the resulting power state.
    pub fn step<C>(&mut self, read_clock: C) -> PowerState
    where
        C: FnOnce() -> Timestamp,
    {
        self.watchdog.feed();
        let now = read_clock();

        if let Some(button) = self.button.as_mut() {
            // a pin that can't be read counts as released
            let is_pressed = button.is_active().unwrap_or(false);

            if let Some(edge) = self.debouncer.update(is_pressed, now.fine) {
                self.power.on_button_edge(edge, now.coarse);
            }
        }

        self.power.on_tick(now.coarse);
        self.outputs.write(self.power.outputs());

        self.power.state()
    }
}
