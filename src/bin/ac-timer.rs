//! The main firmware for the AC load timer, based on cortex_m_rtic
//!
//! The SysTick exception is the only task. Everything else runs in the idle
//! loop, which never sleeps and feeds the watchdog on every pass.

#![deny(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]
#![no_main]
#![no_std]

use ac_timer_rtic as _; // global logger + panicking-behavior + memory layout

use ac_timer_rtic::configure::{self, TickTimer, TimerSupervisor, TIMER_CONFIG};
use timer_core::TickSource;

#[rtic::app(device = stm32f4xx_hal::pac, peripherals = true)]
mod app {
    use super::*;

    // Shared resources go here
    #[shared]
    struct Shared {
        /// Advanced by the tick exception, read by the main loop
        ticks: TickSource,
    }

    // Local resources go here
    #[local]
    struct Local {
        /// The system timer behind the tick exception
        timer: TickTimer,

        /// Everything the main loop owns
        supervisor: TimerSupervisor,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        defmt::println!("init");

        #[cfg(feature = "logging")]
        defmt::info!("Timer config {}", TIMER_CONFIG);

        // configure all the clocks and peripherals
        let config = configure::configure(cx.core, cx.device, &TIMER_CONFIG);

        (
            Shared {
                ticks: config.ticks,
            },
            Local {
                timer: config.timer,
                supervisor: config.supervisor,
            },
            init::Monotonics(),
        )
    }

    /// The supervisor loop. The tick is copied out under the resource lock,
    /// which masks the tick exception, so the loop never sees a half
    /// updated counter.
    #[idle(shared = [ticks], local = [supervisor])]
    fn idle(cx: idle::Context) -> ! {
        let supervisor = cx.local.supervisor;
        let mut ticks = cx.shared.ticks;

        loop {
            supervisor.step(|| ticks.lock(|ticks| ticks.now()));
        }
    }

    /// Advances the tick counter. With cycle correction the reload value
    /// changes, and as the current period has already been loaded, the new
    /// value sets the length of the period after it.
    #[task(binds = SysTick, shared = [ticks], local = [timer])]
    fn tick(mut cx: tick::Context) {
        if let Some(counts) = cx.shared.ticks.lock(|ticks| ticks.advance()) {
            cx.local.timer.set_reload(counts.saturating_sub(1));
        }
    }
}
