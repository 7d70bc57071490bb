//! # Panel Simulation Module
//!
//! Produces the telemetry a plant dashboard shows for each series string:
//! per-panel voltage, current and power, panel health, and the fault or
//! repair state of the string.
//!
//! ## Usage
//!
//! ```rust
//! use rand::{rngs::StdRng, SeedableRng};
//! use solar_string_monitor::domain::SeriesRecord;
//! use solar_string_monitor::simulation::{simulate, PanelRating};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let rating = PanelRating::new(40.0, 10.0);
//!
//! // A freshly installed string of 5 panels
//! let fresh = simulate(5, rating, None, &mut rng);
//! let stored = SeriesRecord::from(&fresh);
//!
//! // Next refresh continues from the stored record
//! let next = simulate(5, rating, Some(&stored), &mut rng);
//! assert_eq!(next.len(), 5);
//! ```

pub mod random;
pub mod series;

pub use random::{RandomSource, ScriptedSource};
pub use series::{
    current_multiplier, simulate, PanelRating, SeriesSimulator, SeriesSimulatorConfig,
};
