//! Time based debouncing of the push button.
//!
//! A raw level change opens a confirmation window. The change is only reported
//! as an [Edge] once the level has held for the configured threshold, and a
//! further change inside the window restarts it from the new level.

use crate::{
    config::DebounceConfig,
    tick::{Tick, Timebase},
};

/// A confirmed change of the logical button level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum Edge {
    /// The button was pressed and held for the debounce window
    Pressed,

    /// The button was released and stayed released for the debounce window
    Released,
}

impl Edge {
    fn from_level(is_pressed: bool) -> Self {
        if is_pressed {
            Edge::Pressed
        } else {
            Edge::Released
        }
    }
}

/// How the debounce threshold itself is classified
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum Boundary {
    /// The elapsed time must be strictly greater than the threshold
    Exclusive,

    /// An elapsed time equal to the threshold is enough
    Inclusive,
}

impl Boundary {
    /// Returns true if `elapsed` completes a window of `threshold` ticks
    pub const fn is_reached(&self, elapsed: Tick, threshold: Tick) -> bool {
        match self {
            Boundary::Exclusive => elapsed > threshold,
            Boundary::Inclusive => elapsed >= threshold,
        }
    }
}

/// Filters a noisy button level into single [Edge] events.
#[derive(Debug)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct Debouncer {
    timebase: Timebase,
    threshold: Tick,
    boundary: Boundary,

    /// The most recently sampled level, which is waiting to be confirmed if
    /// `window_start` is set
    candidate: bool,

    /// The last level reported as an edge
    accepted: bool,

    /// When the current confirmation window started, if one is open
    window_start: Option<Tick>,
}

impl Debouncer {
    /// Creates a debouncer with the button released. `timebase` must describe
    /// the counter that will be passed to [Debouncer::update].
    pub const fn new(config: &DebounceConfig, timebase: Timebase) -> Self {
        Self {
            timebase,
            threshold: config.threshold,
            boundary: config.boundary,
            candidate: false,
            accepted: false,
            window_start: None,
        }
    }

    /// Returns true if the last confirmed level is "pressed"
    pub fn is_pressed(&self) -> bool {
        self.accepted
    }

    /// Returns true while a level change is waiting to be confirmed
    #[cfg(test)]
    pub(crate) fn is_settling(&self) -> bool {
        self.window_start.is_some()
    }

    /// Feeds in the raw button level sampled at `now`, returning an edge if a
    /// change has just been confirmed.
    pub fn update(&mut self, is_pressed: bool, now: Tick) -> Option<Edge> {
        if is_pressed != self.candidate {
            // restart the window from the newest transition
            self.candidate = is_pressed;
            self.window_start = Some(now);
            return None;
        }

        let start = self.window_start?;
        let elapsed = self.timebase.elapsed(now, start);
        if !self.boundary.is_reached(elapsed, self.threshold) {
            return None;
        }

        self.window_start = None;
        if self.candidate == self.accepted {
            // bounced back to where it started
            return None;
        }

        self.accepted = self.candidate;
        let edge = Edge::from_level(self.accepted);

        #[cfg(feature = "logging")]
        defmt::debug!("Button edge {} at {}", edge, now);

        Some(edge)
    }
}
