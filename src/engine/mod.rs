//! Scan engine: detectors, shared state, the tick loop and its read view.

pub mod breakout;
pub mod btst;
pub mod query;
pub mod scanner;
pub mod store;

pub use query::{ScanQuery, WindowStatus};
pub use scanner::{ScanPhase, Scanner, TickReport};
pub use store::{ScanState, ScanStore};
