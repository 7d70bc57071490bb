//! Plant controller: the handlers that create, grow, shrink and refresh the
//! series strings stored in each company's plant document.

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{
    PanelState, PanelTable, PlantDetails, PriorReadings, SeriesRecord, Side, StateCounts,
    StringState,
};
use crate::repo::{validate_company_id, PlantRepository, Repositories, StoreError};
use crate::simulation::{PanelRating, SeriesSimulator};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub controller: Arc<PlantController>,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let repos = Repositories::new(&cfg).await?;

        let rng = match cfg.simulation.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let controller = Arc::new(PlantController::new(
            repos.plants,
            SeriesSimulator::new(cfg.simulation.series()),
            rng,
            cfg.simulation.max_panels_per_side,
        ));

        Ok(Self { cfg, controller })
    }
}

pub fn spawn_controller_tasks(state: AppState, cfg: Config) {
    if !cfg.simulation.auto_refresh {
        info!("automatic refresh disabled");
        return;
    }

    let controller = state.controller.clone();
    tokio::spawn(async move {
        controller.run(cfg.simulation.refresh_seconds).await;
    });
}

#[derive(Debug, Error)]
pub enum PlantError {
    #[error("Company not found: {0}")]
    CompanyNotFound(String),
    #[error("Company already exists: {0}")]
    CompanyExists(String),
    #[error("Table not found: {0}")]
    TableNotFound(Uuid),
    #[error("No panel {index} on the {side} side of table {table_id}")]
    PanelNotFound {
        table_id: Uuid,
        side: Side,
        index: usize,
    },
    #[error("Invalid request: {0}")]
    Invalid(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parameters of a table to add to a plant
#[derive(Debug, Clone)]
pub struct NewTable {
    pub name: String,
    pub panels_top: usize,
    pub panels_bottom: usize,
    pub voltage_per_panel: f64,
    pub current_per_panel: f64,
}

/// One string whose visible state is not good
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultEntry {
    pub table_id: Uuid,
    pub table_name: String,
    pub side: Side,
    pub series_state: PanelState,
    pub series_health: f64,
    pub actual_faulty_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantSummary {
    pub company_id: String,
    pub tables: usize,
    pub panels: usize,
    pub total_power_w: f64,
    pub states: StateCounts,
    pub faulty_strings: usize,
    pub updated_at: DateTime<Utc>,
}

pub struct PlantController {
    repo: Arc<dyn PlantRepository>,
    simulator: SeriesSimulator,
    rng: Mutex<StdRng>,
    /// Serializes read-modify-write cycles per company document
    company_locks: CompanyLocks,
    max_panels_per_side: usize,
}

impl PlantController {
    pub fn new(
        repo: Arc<dyn PlantRepository>,
        simulator: SeriesSimulator,
        rng: StdRng,
        max_panels_per_side: usize,
    ) -> Self {
        Self {
            repo,
            simulator,
            rng: Mutex::new(rng),
            company_locks: CompanyLocks::default(),
            max_panels_per_side,
        }
    }

    pub fn max_panels_per_side(&self) -> usize {
        self.max_panels_per_side
    }

    /// Load, mutate and save one company's document under its lock.
    ///
    /// `apply` runs synchronously with the controller's RNG; nothing is saved if it fails.
    async fn update<T, F>(&self, company_id: &str, apply: F) -> Result<T, PlantError>
    where
        F: FnOnce(&mut PlantDetails, &SeriesSimulator, &mut StdRng) -> Result<T, PlantError>,
    {
        validate_company_id(company_id)?;
        let _guard = self.company_locks.acquire(company_id).await;

        let mut plant = self
            .repo
            .load(company_id)
            .await?
            .ok_or_else(|| PlantError::CompanyNotFound(company_id.to_string()))?;

        let result = {
            let mut rng = self.rng.lock();
            apply(&mut plant, &self.simulator, &mut *rng)?
        };

        plant.touch();
        self.repo.save(&plant).await?;
        Ok(result)
    }

    pub async fn create_company(&self, company_id: &str) -> Result<PlantDetails, PlantError> {
        validate_company_id(company_id)?;
        let _guard = self.company_locks.acquire(company_id).await;

        if self.repo.load(company_id).await?.is_some() {
            return Err(PlantError::CompanyExists(company_id.to_string()));
        }

        let plant = PlantDetails::new(company_id);
        self.repo.save(&plant).await?;
        info!(company_id, "company created");
        Ok(plant)
    }

    pub async fn plant(&self, company_id: &str) -> Result<PlantDetails, PlantError> {
        self.repo
            .load(company_id)
            .await?
            .ok_or_else(|| PlantError::CompanyNotFound(company_id.to_string()))
    }

    pub async fn delete_company(&self, company_id: &str) -> Result<(), PlantError> {
        validate_company_id(company_id)?;
        let deleted = {
            let _guard = self.company_locks.acquire(company_id).await;
            self.repo.delete(company_id).await?
        };

        if !deleted {
            return Err(PlantError::CompanyNotFound(company_id.to_string()));
        }
        info!(company_id, "company deleted");
        Ok(())
    }

    /// Add a table and simulate a fresh string for each non-empty side
    pub async fn create_table(
        &self,
        company_id: &str,
        new: NewTable,
    ) -> Result<PanelTable, PlantError> {
        self.check_panel_count(new.panels_top)?;
        self.check_panel_count(new.panels_bottom)?;
        let rating = checked_rating(new.voltage_per_panel, new.current_per_panel)?;

        let table = self
            .update(company_id, |plant, simulator, rng| {
                let top = simulator.simulate(new.panels_top, rating, None, rng);
                let bottom = simulator.simulate(new.panels_bottom, rating, None, rng);
                let table = PanelTable {
                    id: Uuid::new_v4(),
                    name: new.name,
                    panels_top: new.panels_top,
                    panels_bottom: new.panels_bottom,
                    voltage_per_panel: rating.voltage,
                    current_per_panel: rating.current,
                    top: SeriesRecord::from(top),
                    bottom: SeriesRecord::from(bottom),
                };
                plant.tables.push(table.clone());
                Ok(table)
            })
            .await?;

        info!(
            company_id,
            table_id = %table.id,
            panels_top = table.panels_top,
            panels_bottom = table.panels_bottom,
            "table created"
        );
        Ok(table)
    }

    pub async fn delete_table(&self, company_id: &str, table_id: Uuid) -> Result<(), PlantError> {
        self.update(company_id, |plant, _, _| {
            let before = plant.tables.len();
            plant.tables.retain(|t| t.id != table_id);
            if plant.tables.len() == before {
                return Err(PlantError::TableNotFound(table_id));
            }
            Ok(())
        })
        .await?;

        info!(company_id, table_id = %table_id, "table deleted");
        Ok(())
    }

    /// Simulate `count` new panels on their own and append them to one side.
    ///
    /// The existing panels are not re-simulated; they catch up on the next refresh.
    pub async fn add_panels(
        &self,
        company_id: &str,
        table_id: Uuid,
        side: Side,
        count: usize,
    ) -> Result<PanelTable, PlantError> {
        if count == 0 {
            return Err(PlantError::Invalid("panel count must be positive".into()));
        }
        let max = self.max_panels_per_side;

        let table = self
            .update(company_id, |plant, simulator, rng| {
                let table = plant
                    .table_mut(table_id)
                    .ok_or(PlantError::TableNotFound(table_id))?;

                let total = table.panel_count(side) + count;
                if total > max {
                    return Err(PlantError::Invalid(format!(
                        "{side} side would have {total} panels, limit is {max}"
                    )));
                }

                let rating = PanelRating::new(table.voltage_per_panel, table.current_per_panel);
                let added = simulator.simulate(count, rating, None, rng);
                table.series_mut(side).append(SeriesRecord::from(added));
                *table.panel_count_mut(side) = total;
                Ok(table.clone())
            })
            .await?;

        info!(company_id, table_id = %table_id, %side, added = count, "panels added");
        Ok(table)
    }

    /// Splice one panel out of a side, bypassing the simulator
    pub async fn delete_panel(
        &self,
        company_id: &str,
        table_id: Uuid,
        side: Side,
        index: usize,
    ) -> Result<PanelTable, PlantError> {
        let table = self
            .update(company_id, |plant, _, _| {
                let table = plant
                    .table_mut(table_id)
                    .ok_or(PlantError::TableNotFound(table_id))?;

                let count = table.panel_count(side);
                if index >= count || !table.series_mut(side).remove_panel(index) {
                    return Err(PlantError::PanelNotFound {
                        table_id,
                        side,
                        index,
                    });
                }
                *table.panel_count_mut(side) = count - 1;
                Ok(table.clone())
            })
            .await?;

        info!(company_id, table_id = %table_id, %side, index, "panel deleted");
        Ok(table)
    }

    /// Advance every non-empty string of a plant by one cycle
    pub async fn refresh_company(&self, company_id: &str) -> Result<PlantDetails, PlantError> {
        let plant = self
            .update(company_id, |plant, simulator, rng| {
                for table in &mut plant.tables {
                    let rating =
                        PanelRating::new(table.voltage_per_panel, table.current_per_panel);
                    for side in Side::ALL {
                        let count = table.panel_count(side);
                        if count == 0 {
                            continue;
                        }
                        let state = simulator.simulate(count, rating, Some(table.series(side)), rng);
                        debug!(
                            table_id = %table.id,
                            %side,
                            panel_count = count,
                            series_state = %state.series_state,
                            series_health = state.series_health,
                            "string refreshed"
                        );
                        *table.series_mut(side) = SeriesRecord::from(state);
                    }
                }
                Ok(plant.clone())
            })
            .await?;

        let faults = fault_entries(&plant).len();
        if faults > 0 {
            info!(company_id, faulty_strings = faults, "plant refreshed with faults");
        } else {
            debug!(company_id, "plant refreshed");
        }
        Ok(plant)
    }

    /// Refresh every stored plant; per-company failures are logged and skipped.
    ///
    /// Returns the number of plants refreshed.
    pub async fn refresh_all(&self) -> Result<usize, PlantError> {
        let companies = self.repo.list().await?;
        let results = join_all(companies.iter().map(|id| self.refresh_company(id))).await;

        let mut refreshed = 0;
        for (company_id, result) in companies.iter().zip(results) {
            match result {
                Ok(_) => refreshed += 1,
                Err(e) => warn!(company_id = %company_id, error = %e, "plant refresh failed"),
            }
        }
        Ok(refreshed)
    }

    pub async fn faults(&self, company_id: &str) -> Result<Vec<FaultEntry>, PlantError> {
        Ok(fault_entries(&self.plant(company_id).await?))
    }

    pub async fn summary(&self, company_id: &str) -> Result<PlantSummary, PlantError> {
        let plant = self.plant(company_id).await?;

        let mut states = StateCounts::default();
        for table in &plant.tables {
            states += table.state_counts();
        }

        Ok(PlantSummary {
            company_id: plant.company_id.clone(),
            tables: plant.tables.len(),
            panels: plant
                .tables
                .iter()
                .map(|t| t.panels_top + t.panels_bottom)
                .sum(),
            total_power_w: crate::domain::round1(
                plant.tables.iter().map(|t| t.total_power()).sum(),
            ),
            states,
            faulty_strings: fault_entries(&plant).len(),
            updated_at: plant.updated_at,
        })
    }

    /// Run one cycle for a string that is not part of any stored plant
    pub fn simulate_string(
        &self,
        panel_count: usize,
        voltage_per_panel: f64,
        current_per_panel: f64,
        prior: Option<&SeriesRecord>,
    ) -> Result<StringState, PlantError> {
        self.check_panel_count(panel_count)?;
        let rating = checked_rating(voltage_per_panel, current_per_panel)?;
        let prior = prior.map(|p| p as &dyn PriorReadings);

        let mut rng = self.rng.lock();
        Ok(self.simulator.simulate(panel_count, rating, prior, &mut *rng))
    }

    /// Number of stored plants; fails when the store cannot be listed
    pub async fn plant_count(&self) -> Result<usize, PlantError> {
        Ok(self.repo.list().await?.len())
    }

    /// Periodic refresh loop
    pub async fn run(&self, refresh_seconds: u64) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(refresh_seconds.max(1)));
        info!(refresh_seconds, "refresh loop started");
        loop {
            interval.tick().await;
            match self.refresh_all().await {
                Ok(plants) => debug!(plants, "refresh tick"),
                Err(e) => warn!(error = %e, "refresh tick failed"),
            }
        }
    }

    fn check_panel_count(&self, count: usize) -> Result<(), PlantError> {
        if count > self.max_panels_per_side {
            return Err(PlantError::Invalid(format!(
                "{count} panels exceeds the limit of {} per side",
                self.max_panels_per_side
            )));
        }
        Ok(())
    }
}

type CompanyMutex = Arc<tokio::sync::Mutex<()>>;

/// One async mutex per company id, present in the map only while some task holds
/// or waits on it.
///
/// Every holder gets its mutex through the map, so an entry is dropped only when the
/// map's own `Arc` is the last one left. A later caller then starts a fresh mutex that
/// nobody else can still be queued on.
#[derive(Default)]
struct CompanyLocks {
    locks: Mutex<HashMap<String, CompanyMutex>>,
}

impl CompanyLocks {
    async fn acquire(&self, company_id: &str) -> CompanyGuard<'_> {
        let lock = self
            .locks
            .lock()
            .entry(company_id.to_string())
            .or_default()
            .clone();

        let mut guard = CompanyGuard {
            locks: self,
            company_id: company_id.to_string(),
            lock: Some(lock.clone()),
            held: None,
        };
        guard.held = Some(lock.lock_owned().await);
        guard
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Holds a company's mutex; dropping it prunes the map entry when no other task uses it
struct CompanyGuard<'a> {
    locks: &'a CompanyLocks,
    company_id: String,
    lock: Option<CompanyMutex>,
    held: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for CompanyGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.locks.lock();
        drop(self.held.take());
        drop(self.lock.take());
        if locks
            .get(&self.company_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.company_id);
        }
    }
}

fn checked_rating(voltage: f64, current: f64) -> Result<PanelRating, PlantError> {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if !positive(voltage) || !positive(current) {
        return Err(PlantError::Invalid(
            "panel voltage and current must be positive".into(),
        ));
    }
    Ok(PanelRating::new(voltage, current))
}

fn fault_entries(plant: &PlantDetails) -> Vec<FaultEntry> {
    plant
        .tables
        .iter()
        .flat_map(|table| {
            Side::ALL.into_iter().filter_map(move |side| {
                let series = table.series(side);
                let degraded = !series.series_state.is_good() || series.actual_faulty_index.is_some();
                (table.panel_count(side) > 0 && degraded).then(|| FaultEntry {
                    table_id: table.id,
                    table_name: table.name.clone(),
                    side,
                    series_state: series.series_state,
                    series_health: series.series_health,
                    actual_faulty_index: series.actual_faulty_index,
                })
            })
        })
        .collect()
}
