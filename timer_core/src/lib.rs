#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(warnings)]
#![no_std]

//! TIMER CORE
//!
//! The hardware independent part of the AC load timer: a tick counter fed by
//! a periodic timer interrupt, a time based button debouncer, and the power
//! state machine that switches the load on, warns before the timeout, and
//! switches it off again. The [supervisor::Supervisor] ties these together
//! into the single cooperative main loop the firmware runs.
//!
//! Built using [`embedded-hal`] and [`switch-hal`] traits, so the whole loop
//! runs on the host against mocked pins.
//!
//! [`embedded-hal`]: https://docs.rs/embedded-hal/0.2
//! [`switch-hal`]: https://docs.rs/switch-hal/0.4

pub mod config;
pub mod debounce;
pub mod power;
pub mod supervisor;
pub mod tick;

#[cfg(test)]
pub mod mock;

pub use config::TimerConfig;
pub use debounce::{Debouncer, Edge};
pub use power::{Outputs, PowerController, PowerState};
pub use supervisor::{OutputBank, Supervisor};
pub use tick::{Tick, TickSource, Timestamp};
