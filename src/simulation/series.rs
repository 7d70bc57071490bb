//! # Series String Simulation
//!
//! Advances one series string of panels by one refresh cycle.
//!
//! A cycle runs in fixed stages:
//!
//! 1. **Evolve** the previous cycle (or initialize a fresh, healthy string).
//!    At most one degraded panel, the weakest one, recovers per cycle.
//! 2. **Inject** a new fault with a fixed probability, but only into a string
//!    whose panels are all good.
//! 3. **Measure** the string: weakest panel, shared current multiplier and
//!    per-panel electrical readings.
//! 4. **Propagate** the fault origin's state to every panel wired after it.
//!
//! Health stays panel-true throughout; only the visible state of the
//! downstream segment is rewritten, because a series string carries a single
//! current and a break at one point takes down everything behind it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::random::RandomSource;
use crate::domain::{
    clamp_health, round1, Panel, PanelState, PriorReadings, StringState, FAULT_THRESHOLD,
    GOOD_THRESHOLD, MAX_HEALTH,
};

/// Nominal electrical rating of one panel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelRating {
    /// Volts per panel
    pub voltage: f64,
    /// Amperes per panel
    pub current: f64,
}

impl PanelRating {
    pub fn new(voltage: f64, current: f64) -> Self {
        Self { voltage, current }
    }
}

/// Series simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSimulatorConfig {
    /// Chance per cycle that an all-good string develops a new fault (0.0-1.0)
    pub fault_probability: f64,
    /// Share of new faults that start as hard faults rather than repairs (0.0-1.0)
    pub hard_fault_share: f64,
}

impl Default for SeriesSimulatorConfig {
    fn default() -> Self {
        Self {
            fault_probability: 0.3,
            hard_fault_share: 0.3,
        }
    }
}

/// Health and state of a panel while a cycle is being computed
#[derive(Debug, Clone, Copy, PartialEq)]
struct Condition {
    health: f64,
    state: PanelState,
}

/// Simulates series strings of panels
#[derive(Debug, Clone, Default)]
pub struct SeriesSimulator {
    config: SeriesSimulatorConfig,
}

impl SeriesSimulator {
    pub fn new(config: SeriesSimulatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SeriesSimulatorConfig {
        &self.config
    }

    /// Run one cycle over a string of `panel_count` panels.
    ///
    /// Without `prior` the string is initialized healthy and no fault is injected, so a newly
    /// installed string always starts all GOOD. With `prior`, slots it has no
    /// usable data for get a random health in 0-100 and state GOOD. Never fails; an
    /// empty string yields [`StringState::empty`].
    pub fn simulate<R>(
        &self,
        panel_count: usize,
        rating: PanelRating,
        prior: Option<&dyn PriorReadings>,
        rng: &mut R,
    ) -> StringState
    where
        R: RandomSource + ?Sized,
    {
        if panel_count == 0 {
            return StringState::empty();
        }

        let panels = match prior {
            Some(prior) => {
                let mut panels = evolve(panel_count, prior, rng);
                if panels.iter().all(|p| p.state.is_good()) {
                    self.inject_fault(&mut panels, rng);
                }
                panels
            }
            None => initialize(panel_count, rng),
        };

        measure(panels, rating, rng)
    }

    fn inject_fault<R>(&self, panels: &mut [Condition], rng: &mut R)
    where
        R: RandomSource + ?Sized,
    {
        if panels.is_empty() || !rng.chance(self.config.fault_probability) {
            return;
        }

        let index = rng.pick(panels.len());
        let condition = if rng.chance(self.config.hard_fault_share) {
            Condition {
                health: round1(rng.uniform(0.0, 19.0)),
                state: PanelState::Fault,
            }
        } else {
            Condition {
                health: round1(rng.uniform(20.0, 79.0)),
                state: PanelState::Repairing,
            }
        };

        debug!(
            index,
            state = %condition.state,
            health = condition.health,
            "new panel fault injected"
        );
        panels[index] = condition;
    }
}

/// Run one cycle with the default configuration
pub fn simulate<R>(
    panel_count: usize,
    rating: PanelRating,
    prior: Option<&dyn PriorReadings>,
    rng: &mut R,
) -> StringState
where
    R: RandomSource + ?Sized,
{
    SeriesSimulator::default().simulate(panel_count, rating, prior, rng)
}

fn initialize<R>(panel_count: usize, rng: &mut R) -> Vec<Condition>
where
    R: RandomSource + ?Sized,
{
    (0..panel_count)
        .map(|_| Condition {
            health: round1(rng.uniform(GOOD_THRESHOLD, MAX_HEALTH)),
            state: PanelState::Good,
        })
        .collect()
}

fn evolve<R>(panel_count: usize, prior: &dyn PriorReadings, rng: &mut R) -> Vec<Condition>
where
    R: RandomSource + ?Sized,
{
    let mut panels: Vec<Condition> = (0..panel_count)
        .map(|i| Condition {
            health: prior
                .health_at(i)
                .map(clamp_health)
                .unwrap_or_else(|| round1(rng.uniform(0.0, MAX_HEALTH))),
            state: prior.state_at(i).unwrap_or_default(),
        })
        .collect();

    let target = select_target(&panels);

    for (i, panel) in panels.iter_mut().enumerate() {
        if Some(i) == target {
            recover(panel, rng);
        } else if panel.state.is_good() && panel.health >= GOOD_THRESHOLD {
            let jittered = panel.health + rng.uniform(-1.0, 1.0);
            panel.health = round1(jittered.clamp(GOOD_THRESHOLD, MAX_HEALTH));
        }
    }

    panels
}

/// The one panel allowed to change state this cycle: the weakest degraded panel,
/// first in wiring order on ties.
fn select_target(panels: &[Condition]) -> Option<usize> {
    weakest(panels).filter(|&(_, health)| health < GOOD_THRESHOLD).map(|(i, _)| i)
}

fn recover<R>(panel: &mut Condition, rng: &mut R)
where
    R: RandomSource + ?Sized,
{
    let health = panel.health;
    let gain = match panel.state {
        PanelState::Fault if health < FAULT_THRESHOLD => rng.uniform(2.0, 5.0),
        PanelState::Repairing if (FAULT_THRESHOLD..GOOD_THRESHOLD).contains(&health) => {
            rng.uniform(3.0, 7.0)
        }
        _ => 0.0,
    };
    panel.health = round1(clamp_health(health + gain));
    panel.state = PanelState::from_health(panel.health);
}

fn weakest(panels: &[Condition]) -> Option<(usize, f64)> {
    panels
        .iter()
        .enumerate()
        .fold(None, |acc: Option<(usize, f64)>, (i, p)| match acc {
            Some((_, min)) if min <= p.health => acc,
            _ => Some((i, p.health)),
        })
}

/// Fraction of the nominal current a string can carry, set by its weakest panel
pub fn current_multiplier<R>(series_health: f64, rng: &mut R) -> f64
where
    R: RandomSource + ?Sized,
{
    if series_health >= GOOD_THRESHOLD {
        rng.uniform(0.95, 1.0)
    } else if series_health >= FAULT_THRESHOLD {
        0.2 + (series_health / 100.0) * 0.6
    } else {
        0.05 + (series_health / 100.0) * 0.15
    }
}

fn measure<R>(mut panels: Vec<Condition>, rating: PanelRating, rng: &mut R) -> StringState
where
    R: RandomSource + ?Sized,
{
    let Some((weakest_index, series_health)) = weakest(&panels) else {
        return StringState::empty();
    };

    let multiplier = current_multiplier(series_health, rng);
    let current = round1(rating.current * multiplier);

    let actual_faulty_index = (series_health < GOOD_THRESHOLD).then_some(weakest_index);
    match actual_faulty_index {
        Some(origin) => {
            let origin_state = panels[origin].state;
            for panel in &mut panels[origin..] {
                panel.state = origin_state;
            }
        }
        None => {
            // No fault origin left: states inherited from a cleared fault are released
            for panel in &mut panels {
                panel.state = PanelState::from_health(panel.health);
            }
        }
    }

    let series_state = panels[weakest_index].state;

    let panels = panels
        .into_iter()
        .map(|p| {
            let voltage = round1(rating.voltage * rng.uniform(0.98, 1.02));
            Panel {
                health: p.health,
                state: p.state,
                voltage,
                current,
                power: round1(voltage * current),
            }
        })
        .collect();

    StringState {
        panels,
        series_state,
        series_health,
        actual_faulty_index,
    }
}
