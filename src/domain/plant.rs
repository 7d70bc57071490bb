use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::series::{lenient, SeriesRecord, StateCounts};

/// Which row of a table a series string belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Side {
    Top,
    Bottom,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Top, Side::Bottom];
}

/// Plant-details document of one company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantDetails {
    pub company_id: String,
    #[serde(default)]
    pub tables: Vec<PanelTable>,
    pub updated_at: DateTime<Utc>,
}

impl PlantDetails {
    pub fn new(company_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            tables: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn table(&self, id: Uuid) -> Option<&PanelTable> {
        self.tables.iter().find(|t| t.id == id)
    }

    pub fn table_mut(&mut self, id: Uuid) -> Option<&mut PanelTable> {
        self.tables.iter_mut().find(|t| t.id == id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A mounting table carrying a top and a bottom series string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelTable {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub panels_top: usize,
    #[serde(default)]
    pub panels_bottom: usize,
    /// Nominal rating of one panel, volts
    pub voltage_per_panel: f64,
    /// Nominal rating of one panel, amperes
    pub current_per_panel: f64,
    #[serde(default, deserialize_with = "lenient::record")]
    pub top: SeriesRecord,
    #[serde(default, deserialize_with = "lenient::record")]
    pub bottom: SeriesRecord,
}

impl PanelTable {
    pub fn panel_count(&self, side: Side) -> usize {
        match side {
            Side::Top => self.panels_top,
            Side::Bottom => self.panels_bottom,
        }
    }

    pub fn panel_count_mut(&mut self, side: Side) -> &mut usize {
        match side {
            Side::Top => &mut self.panels_top,
            Side::Bottom => &mut self.panels_bottom,
        }
    }

    pub fn series(&self, side: Side) -> &SeriesRecord {
        match side {
            Side::Top => &self.top,
            Side::Bottom => &self.bottom,
        }
    }

    pub fn series_mut(&mut self, side: Side) -> &mut SeriesRecord {
        match side {
            Side::Top => &mut self.top,
            Side::Bottom => &mut self.bottom,
        }
    }

    pub fn total_power(&self) -> f64 {
        self.top.total_power() + self.bottom.total_power()
    }

    pub fn state_counts(&self) -> StateCounts {
        let mut counts = self.top.count_states();
        counts += self.bottom.count_states();
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_side_parsing() {
        assert_eq!("top".parse::<Side>().unwrap(), Side::Top);
        assert_eq!("Bottom".parse::<Side>().unwrap(), Side::Bottom);
        assert!("left".parse::<Side>().is_err());
        assert_eq!(Side::Bottom.to_string(), "bottom");
    }

    #[test]
    fn test_table_with_corrupt_side_still_loads() {
        let table: PanelTable = serde_json::from_value(json!({
            "id": "6f1c2c1e-7a53-4a8e-9f53-3f4b5c0d9a10",
            "name": "T1",
            "panelsTop": 2,
            "panelsBottom": 0,
            "voltagePerPanel": 40.0,
            "currentPerPanel": 10.0,
            "top": "garbage"
        }))
        .unwrap();

        assert!(table.top.is_empty());
        assert!(table.bottom.is_empty());
        assert_eq!(table.panel_count(Side::Top), 2);
    }

    #[test]
    fn test_plant_lookup() {
        let mut plant = PlantDetails::new("acme");
        let id = Uuid::new_v4();
        plant.tables.push(PanelTable {
            id,
            name: "T1".into(),
            panels_top: 0,
            panels_bottom: 0,
            voltage_per_panel: 40.0,
            current_per_panel: 10.0,
            top: SeriesRecord::default(),
            bottom: SeriesRecord::default(),
        });

        assert!(plant.table(id).is_some());
        assert!(plant.table(Uuid::new_v4()).is_none());
        *plant.table_mut(id).unwrap().panel_count_mut(Side::Bottom) = 3;
        assert_eq!(plant.table(id).unwrap().panels_bottom, 3);
    }
}
