//! Series string model and its persisted parallel-array record.
//!
//! Inside the crate a string is an ordered `Vec<Panel>`. On disk and over the
//! wire it is the flat record
//! `{ voltage, current, power, health, states, seriesState, seriesHealth, actualFaultyIndex }`
//! which dashboards and older documents already use. Reading that record is
//! lenient: anything malformed degrades to "no data" for that element.

use serde::{Deserialize, Serialize};

use super::panel::{Panel, PanelState, GOOD_THRESHOLD, MAX_HEALTH};

/// Result of one simulation cycle over a series string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringState {
    /// Panels in physical wiring order
    pub panels: Vec<Panel>,
    pub series_state: PanelState,
    pub series_health: f64,
    /// Origin of the string's degradation, when `series_health` is below the good threshold
    pub actual_faulty_index: Option<usize>,
}

impl StringState {
    pub fn empty() -> Self {
        Self {
            panels: Vec::new(),
            series_state: PanelState::Good,
            series_health: MAX_HEALTH,
            actual_faulty_index: None,
        }
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn total_power(&self) -> f64 {
        self.panels.iter().map(|p| p.power).sum()
    }
}

impl Default for StringState {
    fn default() -> Self {
        Self::empty()
    }
}

/// Per-index view of a string's previous cycle.
///
/// `None` means the slot has no usable record and the engine substitutes its defaults.
pub trait PriorReadings {
    fn health_at(&self, index: usize) -> Option<f64>;
    fn state_at(&self, index: usize) -> Option<PanelState>;
}

impl PriorReadings for StringState {
    fn health_at(&self, index: usize) -> Option<f64> {
        self.panels
            .get(index)
            .map(|p| p.health)
            .filter(|h| h.is_finite())
    }

    fn state_at(&self, index: usize) -> Option<PanelState> {
        self.panels.get(index).map(|p| p.state)
    }
}

/// Persisted shape of one series string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRecord {
    #[serde(default, deserialize_with = "lenient::numbers")]
    pub voltage: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient::numbers")]
    pub current: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient::numbers")]
    pub power: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient::numbers")]
    pub health: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient::states")]
    pub states: Vec<Option<PanelState>>,
    #[serde(default, deserialize_with = "lenient::state")]
    pub series_state: PanelState,
    #[serde(default = "default_series_health", deserialize_with = "lenient::health")]
    pub series_health: f64,
    #[serde(default, deserialize_with = "lenient::index")]
    pub actual_faulty_index: Option<usize>,
}

fn default_series_health() -> f64 {
    MAX_HEALTH
}

impl Default for SeriesRecord {
    fn default() -> Self {
        Self::from(&StringState::empty())
    }
}

impl From<&StringState> for SeriesRecord {
    fn from(state: &StringState) -> Self {
        Self {
            voltage: state.panels.iter().map(|p| Some(p.voltage)).collect(),
            current: state.panels.iter().map(|p| Some(p.current)).collect(),
            power: state.panels.iter().map(|p| Some(p.power)).collect(),
            health: state.panels.iter().map(|p| Some(p.health)).collect(),
            states: state.panels.iter().map(|p| Some(p.state)).collect(),
            series_state: state.series_state,
            series_health: state.series_health,
            actual_faulty_index: state.actual_faulty_index,
        }
    }
}

impl From<StringState> for SeriesRecord {
    fn from(state: StringState) -> Self {
        Self::from(&state)
    }
}

impl PriorReadings for SeriesRecord {
    fn health_at(&self, index: usize) -> Option<f64> {
        self.health.get(index).copied().flatten()
    }

    fn state_at(&self, index: usize) -> Option<PanelState> {
        self.states.get(index).copied().flatten()
    }
}

impl SeriesRecord {
    /// Number of panel slots, taken from the longest array
    pub fn len(&self) -> usize {
        [
            self.voltage.len(),
            self.current.len(),
            self.power.len(),
            self.health.len(),
            self.states.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_power(&self) -> f64 {
        self.power.iter().flatten().sum()
    }

    /// Pad every array with `None` to [`len`](Self::len) so index `i` is the same panel in each
    pub fn align(&mut self) {
        let len = self.len();
        self.voltage.resize(len, None);
        self.current.resize(len, None);
        self.power.resize(len, None);
        self.health.resize(len, None);
        self.states.resize(len, None);
    }

    /// Append another record's panels after this one's.
    ///
    /// Both records are aligned first, so a short array never shifts the appended
    /// readings onto the wrong panels. Per-panel states are kept as they are; only the
    /// string-level summary is recomputed.
    pub fn append(&mut self, mut other: SeriesRecord) {
        self.align();
        other.align();
        self.voltage.extend(other.voltage);
        self.current.extend(other.current);
        self.power.extend(other.power);
        self.health.extend(other.health);
        self.states.extend(other.states);
        self.refresh_summary();
    }

    /// Splice one panel slot out of every array. Returns false if there is no such slot.
    pub fn remove_panel(&mut self, index: usize) -> bool {
        if index >= self.len() {
            return false;
        }
        self.align();
        self.voltage.remove(index);
        self.current.remove(index);
        self.power.remove(index);
        self.health.remove(index);
        self.states.remove(index);
        self.refresh_summary();
        true
    }

    /// Recompute `seriesHealth`, `seriesState` and `actualFaultyIndex` from the arrays
    pub fn refresh_summary(&mut self) {
        let weakest = self
            .health
            .iter()
            .enumerate()
            .filter_map(|(i, h)| h.map(|h| (i, h)))
            .fold(None, |acc: Option<(usize, f64)>, (i, h)| match acc {
                Some((_, min)) if min <= h => acc,
                _ => Some((i, h)),
            });

        match weakest {
            Some((index, health)) => {
                self.series_health = health;
                self.series_state = self.state_at(index).unwrap_or_default();
                self.actual_faulty_index = (health < GOOD_THRESHOLD).then_some(index);
            }
            None => {
                self.series_health = MAX_HEALTH;
                self.series_state = PanelState::Good;
                self.actual_faulty_index = None;
            }
        }
    }

    pub fn count_states(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for state in self.states.iter().flatten() {
            match state {
                PanelState::Good => counts.good += 1,
                PanelState::Repairing => counts.repairing += 1,
                PanelState::Fault => counts.fault += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub good: usize,
    pub repairing: usize,
    pub fault: usize,
}

impl std::ops::AddAssign for StateCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.good += rhs.good;
        self.repairing += rhs.repairing;
        self.fault += rhs.fault;
    }
}

/// Deserializers that never reject a document because of one bad value
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{PanelState, SeriesRecord, MAX_HEALTH};

    fn number(value: &Value) -> Option<f64> {
        value.as_f64().filter(|v| v.is_finite())
    }

    pub fn numbers<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Option<f64>>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items.iter().map(number).collect(),
            _ => Vec::new(),
        })
    }

    pub fn states<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Option<PanelState>>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().and_then(|s| s.parse().ok()))
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn state<'de, D: Deserializer<'de>>(d: D) -> Result<PanelState, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(value
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default())
    }

    pub fn health<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(number(&value).unwrap_or(MAX_HEALTH))
    }

    pub fn index<'de, D: Deserializer<'de>>(d: D) -> Result<Option<usize>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(value.as_u64().and_then(|i| usize::try_from(i).ok()))
    }

    /// A whole record that is not an object reads as an empty string
    pub fn record<'de, D: Deserializer<'de>>(d: D) -> Result<SeriesRecord, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// `null` or missing is no record; anything else reads as [`record`] does
    pub fn optional_record<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<SeriesRecord>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => None,
            value => Some(serde_json::from_value(value).unwrap_or_default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(health: &[f64], states: &[PanelState]) -> SeriesRecord {
        let mut record = SeriesRecord {
            voltage: health.iter().map(|_| Some(40.0)).collect(),
            current: health.iter().map(|_| Some(9.8)).collect(),
            power: health.iter().map(|_| Some(392.0)).collect(),
            health: health.iter().copied().map(Some).collect(),
            states: states.iter().copied().map(Some).collect(),
            ..SeriesRecord::default()
        };
        record.refresh_summary();
        record
    }

    #[test]
    fn test_wire_shape() {
        let rec = record(&[90.0, 15.0], &[PanelState::Good, PanelState::Fault]);
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["health"], json!([90.0, 15.0]));
        assert_eq!(value["states"], json!(["good", "fault"]));
        assert_eq!(value["seriesState"], json!("fault"));
        assert_eq!(value["seriesHealth"], json!(15.0));
        assert_eq!(value["actualFaultyIndex"], json!(1));
    }

    #[test]
    fn test_healthy_record_has_null_faulty_index() {
        let rec = record(&[90.0, 85.0], &[PanelState::Good, PanelState::Good]);
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["actualFaultyIndex"], Value::Null);
        assert_eq!(rec.series_health, 85.0);
    }

    #[test]
    fn test_malformed_record_degrades_per_element() {
        let rec: SeriesRecord = serde_json::from_value(json!({
            "health": [10, "oops", null, 95.5],
            "states": ["fault", "exploded", 3],
            "voltage": "not an array",
            "seriesState": 7,
            "seriesHealth": "low",
            "actualFaultyIndex": -1
        }))
        .unwrap();

        assert_eq!(rec.health, vec![Some(10.0), None, None, Some(95.5)]);
        assert_eq!(rec.states, vec![Some(PanelState::Fault), None, None]);
        assert!(rec.voltage.is_empty());
        assert!(rec.current.is_empty());
        assert_eq!(rec.series_state, PanelState::Good);
        assert_eq!(rec.series_health, 100.0);
        assert_eq!(rec.actual_faulty_index, None);
        assert_eq!(rec.len(), 4);

        assert_eq!(rec.health_at(0), Some(10.0));
        assert_eq!(rec.health_at(1), None);
        assert_eq!(rec.health_at(9), None);
        assert_eq!(rec.state_at(1), None);
    }

    #[test]
    fn test_empty_object_reads_as_empty_record() {
        let rec: SeriesRecord = serde_json::from_value(json!({})).unwrap();
        assert!(rec.is_empty());
        assert_eq!(rec.series_health, 100.0);
        assert_eq!(rec.series_state, PanelState::Good);
    }

    #[test]
    fn test_append_keeps_states_and_refreshes_summary() {
        let mut rec = record(&[90.0, 50.0], &[PanelState::Good, PanelState::Repairing]);
        rec.append(record(&[82.0], &[PanelState::Good]));

        assert_eq!(rec.len(), 3);
        assert_eq!(
            rec.states,
            vec![
                Some(PanelState::Good),
                Some(PanelState::Repairing),
                Some(PanelState::Good)
            ]
        );
        assert_eq!(rec.series_health, 50.0);
        assert_eq!(rec.actual_faulty_index, Some(1));
        assert_eq!(rec.series_state, PanelState::Repairing);
    }

    #[test]
    fn test_remove_faulty_panel_clears_fault_origin() {
        let mut rec = record(
            &[90.0, 12.0, 88.0],
            &[PanelState::Good, PanelState::Fault, PanelState::Fault],
        );
        assert!(rec.remove_panel(1));

        assert_eq!(rec.health, vec![Some(90.0), Some(88.0)]);
        assert_eq!(rec.voltage.len(), 2);
        assert_eq!(rec.series_health, 88.0);
        assert_eq!(rec.actual_faulty_index, None);
        // Downstream state stays as persisted until the next refresh
        assert_eq!(rec.states[1], Some(PanelState::Fault));
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut rec = record(&[90.0], &[PanelState::Good]);
        assert!(!rec.remove_panel(3));
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn test_remove_from_ragged_record() {
        let mut rec: SeriesRecord = serde_json::from_value(json!({
            "health": [90, 91, 92],
            "states": ["good"]
        }))
        .unwrap();
        assert!(rec.remove_panel(0));
        assert_eq!(rec.health, vec![Some(91.0), Some(92.0)]);
        assert_eq!(rec.states, vec![None, None]);
        assert_eq!(rec.voltage, vec![None, None]);
        assert!(!rec.remove_panel(2));
    }

    #[test]
    fn test_append_to_ragged_record_keeps_panels_aligned() {
        // voltage and power dropped out of a stored document; health still covers 3 panels
        let mut rec: SeriesRecord = serde_json::from_value(json!({
            "health": [90, 91, 92],
            "current": [9.8, 9.8, 9.8],
            "states": ["good", "good", "good"]
        }))
        .unwrap();
        rec.append(record(&[85.0], &[PanelState::Good]));

        assert_eq!(rec.len(), 4);
        assert_eq!(rec.voltage, vec![None, None, None, Some(40.0)]);
        assert_eq!(rec.power[3], Some(392.0));
        assert_eq!(rec.health[3], Some(85.0));
        assert_eq!(rec.current.len(), 4);

        assert!(rec.remove_panel(3));
        assert_eq!(rec.voltage, vec![None, None, None]);
        assert_eq!(rec.health, vec![Some(90.0), Some(91.0), Some(92.0)]);
    }

    #[test]
    fn test_summary_tie_takes_first_index() {
        let rec = record(
            &[90.0, 30.0, 30.0],
            &[PanelState::Good, PanelState::Repairing, PanelState::Repairing],
        );
        assert_eq!(rec.actual_faulty_index, Some(1));
    }

    #[test]
    fn test_state_counts() {
        let rec = record(
            &[90.0, 30.0, 10.0, 95.0],
            &[
                PanelState::Good,
                PanelState::Repairing,
                PanelState::Fault,
                PanelState::Good,
            ],
        );
        let counts = rec.count_states();
        assert_eq!(counts, StateCounts { good: 2, repairing: 1, fault: 1 });
    }

    #[test]
    fn test_string_state_prior_readings() {
        let state = StringState {
            panels: vec![Panel {
                health: 42.0,
                state: PanelState::Repairing,
                voltage: 40.0,
                current: 5.0,
                power: 200.0,
            }],
            series_state: PanelState::Repairing,
            series_health: 42.0,
            actual_faulty_index: Some(0),
        };
        assert_eq!(state.health_at(0), Some(42.0));
        assert_eq!(state.state_at(0), Some(PanelState::Repairing));
        assert_eq!(state.health_at(1), None);
        assert_eq!(SeriesRecord::from(&state).total_power(), 200.0);
    }
}
