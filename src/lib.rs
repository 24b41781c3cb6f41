#![cfg_attr(not(test), no_std)]

// must come first so the logging macros are visible to every module below
mod fmt;

pub mod clock;
pub mod config;
pub mod cycle;
pub mod decimate;
pub mod link;
pub mod payload;
pub mod session;
pub mod source;
pub mod stream;
pub mod uplink;

#[cfg(feature = "firmware")]
pub mod board;
#[cfg(feature = "firmware")]
pub mod drivers;
#[cfg(feature = "firmware")]
pub mod tasks;

#[cfg(feature = "firmware")]
pub use board::Board;
pub use clock::{Clock, ManualClock};
pub use config::Config;
pub use cycle::{CycleState, PublishOutcome, WindowReport};
pub use link::{Topic, Transport};
pub use session::Session;
pub use source::{Acquisition, Mode, PulseSensor, SignalSource, TemperatureSensor};
