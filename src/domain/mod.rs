pub mod panel;
pub mod plant;
pub mod series;

pub use panel::*;
pub use plant::*;
pub use series::{PriorReadings, SeriesRecord, StateCounts, StringState};
