use std::time::Duration;

use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reina_core::simulation::{Progress, Simulation, SimulationError};
use reina_core::variables::VariableStore;
use serde::Serialize;
use serde_json::Value;

use crate::params::{self, SeirParams};

/// One simulated day, as published to pollers.
#[derive(Debug, Clone, Serialize)]
pub struct DayRow {
    pub day: u32,
    pub date: NaiveDate,
    pub susceptible: u64,
    pub exposed: u64,
    pub infected: u64,
    pub recovered: u64,
    pub dead: u64,
    pub new_infections: u64,
}

/// Headline numbers attached to the final result only.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub peak_infected: u64,
    pub peak_day: u32,
    pub total_infected: u64,
    pub total_dead: u64,
}

#[derive(Serialize)]
struct Frame<'a> {
    rows: &'a [DayRow],
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Summary>,
}

#[derive(Debug, Clone, Copy)]
struct Compartments {
    susceptible: f64,
    exposed: f64,
    infected: f64,
    recovered: f64,
    dead: f64,
}

/// Seeded SEIR compartment model with daily steps.
///
/// `pace` adds a fixed sleep per simulated day to emulate the cost of the
/// agent-based model this stands in for. It never affects the output.
#[derive(Debug, Clone, Default)]
pub struct SeirModel {
    pace: Duration,
}

impl SeirModel {
    pub const IDENTITY: &'static str = "reina.seir.v1";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }
}

impl Simulation for SeirModel {
    fn identity(&self) -> &str {
        Self::IDENTITY
    }

    fn default_variables(&self) -> VariableStore {
        params::default_variables()
    }

    fn simulate(
        &self,
        variables: &VariableStore,
        progress: &mut dyn Progress,
    ) -> Result<Value, SimulationError> {
        let p = SeirParams::from_variables(variables)?;
        let mut rng = StdRng::seed_from_u64(p.random_seed);

        let mut state = Compartments {
            susceptible: p.population - p.initial_infected,
            exposed: 0.0,
            infected: p.initial_infected,
            recovered: 0.0,
            dead: 0.0,
        };
        let mut rows = Vec::with_capacity(p.simulation_days as usize);
        let mut total_infected = p.initial_infected;

        for day in 0..p.simulation_days {
            if progress.is_interrupted() {
                tracing::debug!(day, "SEIR run interrupted");
                return Err(SimulationError::Interrupted);
            }
            if !self.pace.is_zero() {
                std::thread::sleep(self.pace);
            }

            let beta = p.r0 / p.infectious_days * p.interventions.contact_factor(day);
            let infections =
                (beta * state.susceptible * state.infected / p.population).min(state.susceptible);
            let imported = sample_imports(&mut rng, p.imported_infections_per_day)
                + p.interventions.imports_on(day);
            let imported = imported.min(state.susceptible - infections);
            let onset = state.exposed / p.incubation_days;
            let resolved = state.infected / p.infectious_days;

            state.susceptible -= infections + imported;
            state.exposed += infections + imported - onset;
            state.infected += onset - resolved;
            state.dead += resolved * p.fatality_rate;
            state.recovered += resolved * (1.0 - p.fatality_rate);
            total_infected += infections + imported;

            rows.push(day_row(&p, day, &state, infections + imported));

            let snapshot = encode(&rows, None)?;
            if !progress.report(&snapshot, false) {
                return Err(SimulationError::Interrupted);
            }
        }

        let summary = summarize(&rows, total_infected);
        encode(&rows, Some(summary))
    }
}

/// Whole imports per day whose mean is `mean`.
fn sample_imports(rng: &mut StdRng, mean: f64) -> f64 {
    let base = mean.floor();
    if rng.random::<f64>() < mean - base {
        base + 1.0
    } else {
        base
    }
}

fn day_row(p: &SeirParams, day: u32, state: &Compartments, new_infections: f64) -> DayRow {
    DayRow {
        day,
        date: p
            .start_date
            .checked_add_days(Days::new(u64::from(day)))
            .unwrap_or(p.start_date),
        susceptible: count(state.susceptible),
        exposed: count(state.exposed),
        infected: count(state.infected),
        recovered: count(state.recovered),
        dead: count(state.dead),
        new_infections: count(new_infections),
    }
}

fn summarize(rows: &[DayRow], total_infected: f64) -> Summary {
    let peak = rows.iter().max_by_key(|r| r.infected);
    Summary {
        peak_infected: peak.map_or(0, |r| r.infected),
        peak_day: peak.map_or(0, |r| r.day),
        total_infected: count(total_infected),
        total_dead: rows.last().map_or(0, |r| r.dead),
    }
}

fn count(x: f64) -> u64 {
    x.max(0.0).round() as u64
}

fn encode(rows: &[DayRow], summary: Option<Summary>) -> Result<Value, SimulationError> {
    serde_json::to_value(Frame { rows, summary })
        .map_err(|e| SimulationError::Failed(format!("failed to encode frame: {e}")))
}
