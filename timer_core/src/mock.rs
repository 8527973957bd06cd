//! Mocked pins and watchdog for testing the supervisor loop

use core::cell::Cell;

use embedded_hal::{
    digital::v2::{InputPin, OutputPin, StatefulOutputPin},
    watchdog::Watchdog,
};

/// Shared view of a mocked pin, so a test can drive or inspect it while the
/// supervisor owns the pin itself
#[derive(Default)]
pub struct PinProbe {
    level: Cell<bool>,
    writes: Cell<u32>,
    failing: Cell<bool>,
}

impl PinProbe {
    /// A probe whose pin starts at `level`
    pub fn new(level: bool) -> Self {
        Self {
            level: Cell::new(level),
            writes: Cell::new(0),
            failing: Cell::new(false),
        }
    }

    /// Forces the level seen by an input pin
    pub fn set_level(&self, level: bool) {
        self.level.set(level);
    }

    /// The current pin level
    pub fn level(&self) -> bool {
        self.level.get()
    }

    /// Makes writes to the output pin fail, leaving its level alone
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    /// The number of times an output pin has been written
    pub fn writes(&self) -> u32 {
        self.writes.get()
    }

    /// Creates a pin backed by this probe
    pub fn pin(&self) -> MockPin<'_> {
        MockPin { probe: self }
    }
}

/// A pin whose state lives in a [PinProbe]
pub struct MockPin<'a> {
    probe: &'a PinProbe,
}

type MockError = &'static str;

impl InputPin for MockPin<'_> {
    type Error = MockError;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.probe.level())
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        Ok(!self.probe.level())
    }
}

impl OutputPin for MockPin<'_> {
    type Error = MockError;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

impl StatefulOutputPin for MockPin<'_> {
    fn is_set_high(&self) -> Result<bool, Self::Error> {
        Ok(self.probe.level())
    }

    fn is_set_low(&self) -> Result<bool, Self::Error> {
        Ok(!self.probe.level())
    }
}

impl MockPin<'_> {
    fn write(&mut self, level: bool) -> Result<(), MockError> {
        if self.probe.failing.get() {
            return Err("write failed");
        }

        self.probe.level.set(level);
        self.probe.writes.set(self.probe.writes.get() + 1);
        Ok(())
    }
}

/// A watchdog that counts how often it was fed
pub struct MockWatchdog<'a> {
    feeds: &'a Cell<u32>,
}

impl<'a> MockWatchdog<'a> {
    /// Creates a watchdog counting into `feeds`
    pub fn new(feeds: &'a Cell<u32>) -> Self {
        Self { feeds }
    }
}

impl Watchdog for MockWatchdog<'_> {
    fn feed(&mut self) {
        self.feeds.set(self.feeds.get() + 1);
    }
}
