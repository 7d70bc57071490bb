use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health at or above which a panel is considered good
pub const GOOD_THRESHOLD: f64 = 80.0;
/// Health below which a panel is in fault
pub const FAULT_THRESHOLD: f64 = 20.0;

pub const MIN_HEALTH: f64 = 0.0;
pub const MAX_HEALTH: f64 = 100.0;

/// Visible classification of a panel (or of a whole string)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PanelState {
    #[default]
    Good,
    Repairing,
    Fault,
}

impl PanelState {
    /// Classify a health value by the fixed thresholds
    pub fn from_health(health: f64) -> Self {
        if health < FAULT_THRESHOLD {
            PanelState::Fault
        } else if health < GOOD_THRESHOLD {
            PanelState::Repairing
        } else {
            PanelState::Good
        }
    }

    pub fn is_good(&self) -> bool {
        matches!(self, PanelState::Good)
    }
}

/// One panel of a series string after a simulation cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    /// Wellness proxy, 0-100
    pub health: f64,
    pub state: PanelState,
    /// Volts
    pub voltage: f64,
    /// Amperes
    pub current: f64,
    /// Watts
    pub power: f64,
}

/// Round to one decimal place, the presentation precision of every reading
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn clamp_health(health: f64) -> f64 {
    health.clamp(MIN_HEALTH, MAX_HEALTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, PanelState::Fault)]
    #[case(19.9, PanelState::Fault)]
    #[case(20.0, PanelState::Repairing)]
    #[case(55.5, PanelState::Repairing)]
    #[case(79.9, PanelState::Repairing)]
    #[case(80.0, PanelState::Good)]
    #[case(100.0, PanelState::Good)]
    fn test_state_thresholds(#[case] health: f64, #[case] expected: PanelState) {
        assert_eq!(PanelState::from_health(health), expected);
    }

    #[test]
    fn test_state_wire_names() {
        assert_eq!(serde_json::to_string(&PanelState::Repairing).unwrap(), "\"repairing\"");
        assert_eq!(PanelState::Fault.to_string(), "fault");
        assert_eq!("GOOD".parse::<PanelState>().unwrap(), PanelState::Good);
        assert!("broken".parse::<PanelState>().is_err());
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(12.345), 12.3);
        assert_eq!(round1(12.36), 12.4);
        assert_eq!(round1(40.0), 40.0);
    }

    #[test]
    fn test_clamp_health() {
        assert_eq!(clamp_health(104.2), 100.0);
        assert_eq!(clamp_health(-3.0), 0.0);
        assert_eq!(clamp_health(42.0), 42.0);
    }
}
