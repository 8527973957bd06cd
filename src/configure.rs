//! Configures the microcontroller for use and returns the timer, tick counter
//! and main loop state

use cortex_m::peripheral::{syst::SystClkSource, SYST};
use hal::{
    gpio::{ErasedPin, Input, Output, PinState},
    pac,
    prelude::*,
    watchdog::IndependentWatchdog,
};
use stm32f4xx_hal as hal;
use switch_hal::{ActiveHigh, ActiveLow, IntoSwitch, Switch};
use timer_core::{
    tick::CycleCorrection, OutputBank, PowerController, Supervisor, TickSource, TimerConfig,
};

/// SysTick counts the external reference, which runs at HCLK / 8
pub const SYSTICK_DIVIDER: u32 = 8;

/// The largest period SysTick can count, in counts
pub const SYSTICK_MAX_PERIOD: u32 = 1 << 24;

/// The main loop must feed the watchdog at least this often
pub const WATCHDOG_TIMEOUT_MS: u32 = 500;

/// The timer variant this firmware is built for
#[cfg(feature = "self_powered")]
pub const TIMER_CONFIG: TimerConfig = TimerConfig::self_powered();

/// The timer variant this firmware is built for
#[cfg(all(feature = "exercise", not(feature = "self_powered")))]
pub const TIMER_CONFIG: TimerConfig = TimerConfig::exercise();

/// The timer variant this firmware is built for
#[cfg(not(any(feature = "exercise", feature = "self_powered")))]
pub const TIMER_CONFIG: TimerConfig = TimerConfig::countdown();

/// The push button, pulled up and active low
pub type Button = Switch<ErasedPin<Input>, ActiveLow>;

/// A line driving an opto-isolator or MOSFET gate
pub type DriveLine = Switch<ErasedPin<Output>, ActiveHigh>;

/// The on-board LED, which lights when its pin is low
pub type Indicator = Switch<ErasedPin<Output>, ActiveLow>;

/// The system timer raising the tick exception. Its reload value only takes
/// effect when the count next reaches zero, so changing it never loses counts.
pub type TickTimer = SYST;

/// The main loop, wired to this board
pub type TimerSupervisor = Supervisor<IndependentWatchdog, Button, DriveLine, Indicator, DriveLine>;

macro_rules! output {
    ($pin: expr, $state: expr) => {{
        $pin.into_push_pull_output_in_state($state).erase()
    }};
}

fn pin_state(high: bool) -> PinState {
    if high {
        PinState::High
    } else {
        PinState::Low
    }
}

/// Configures the micro for operation
pub fn configure(
    core_peripherals: cortex_m::Peripherals,
    device_peripherals: pac::Peripherals,
    config: &TimerConfig,
) -> Configuration {
    // The outputs are set before the clocks or anything else. A self powered
    // board holds its own supply through the session line, so that line goes
    // high here, and every other output starts at its boot level.
    let boot = PowerController::boot_outputs(&config.power);

    let gpioa = device_peripherals.GPIOA.split();
    let gpioc = device_peripherals.GPIOC.split();

    let load = output!(gpioa.pa2, pin_state(boot.load)).into_active_high_switch();
    let warning = output!(gpioc.pc13, pin_state(!boot.warning)).into_active_low_switch();
    let active = output!(gpioa.pa1, pin_state(boot.active)).into_active_high_switch();

    let button = if config.has_button {
        Some(gpioa.pa0.into_pull_up_input().erase().into_active_low_switch())
    } else {
        None
    };

    let outputs = OutputBank::new(
        load,
        config.power.warn_after.map(|_| warning),
        Some(active),
    );

    // Start the watchdog before anything can hang
    let mut watchdog = IndependentWatchdog::new(device_peripherals.IWDG);
    watchdog.start(WATCHDOG_TIMEOUT_MS.millis());

    // Take ownership over raw device and convert it into the corresponding HAL struct
    let rcc = device_peripherals.RCC.constrain();

    // Freeze the configuration of all the clocks in the system and store the
    // frozen frequencies in `clocks`
    let clocks = rcc.cfgr.use_hse(25.MHz()).sysclk(84.MHz()).freeze();
    let counter_hz = clocks.hclk().raw() / SYSTICK_DIVIDER;

    let mut ticks = TickSource::new(
        &config.tick,
        CycleCorrection::dividing(counter_hz, config.tick.rate_hz),
    );
    let first_period = ticks
        .next_period()
        .unwrap_or(counter_hz / config.tick.rate_hz);
    defmt::assert!(
        first_period > 1 && first_period <= SYSTICK_MAX_PERIOD,
        "{} Hz ticks need {} counts, out of range for SysTick",
        config.tick.rate_hz,
        first_period
    );

    let supervisor = Supervisor::new(config, &ticks, watchdog, button, outputs);

    // Start the tick exception last, once everything it touches exists
    let mut timer = core_peripherals.SYST;
    timer.set_clock_source(SystClkSource::External);
    timer.set_reload(first_period - 1);
    timer.clear_current();
    timer.enable_counter();
    timer.enable_interrupt();

    Configuration {
        ticks,
        timer,
        supervisor,
    }
}

/// The configured peripherals and loop state
pub struct Configuration {
    /// The tick counter, shared between the tick exception and the main loop
    pub ticks: TickSource,

    /// The timer raising the tick exception
    pub timer: TickTimer,

    /// The main loop state, owned by the idle task
    pub supervisor: TimerSupervisor,
}
