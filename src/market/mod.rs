//! Exchange calendar helpers.

pub mod clock;

pub use clock::{Clock, ManualClock, MarketWindows, SystemClock};
