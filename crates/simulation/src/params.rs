//! Typed view over the model's variables.

use chrono::NaiveDate;
use reina_core::simulation::SimulationError;
use reina_core::variables::VariableStore;
use serde_json::json;

use crate::interventions::Schedule;

/// Longest horizon the model accepts.
pub const MAX_SIMULATION_DAYS: u64 = 730;

#[derive(Debug, Clone)]
pub struct SeirParams {
    pub population: f64,
    pub initial_infected: f64,
    pub r0: f64,
    pub incubation_days: f64,
    pub infectious_days: f64,
    pub fatality_rate: f64,
    pub start_date: NaiveDate,
    pub simulation_days: u32,
    pub random_seed: u64,
    pub imported_infections_per_day: f64,
    pub interventions: Schedule,
}

/// Variables a new session starts with.
pub fn default_variables() -> VariableStore {
    let mut vars = VariableStore::new();
    vars.set("population", 1_000_000);
    vars.set("initial_infected", 20);
    vars.set("r0", 2.5);
    vars.set("incubation_days", 5.1);
    vars.set("infectious_days", 7.0);
    vars.set("fatality_rate", 0.005);
    vars.set("start_date", "2020-02-18");
    vars.set("simulation_days", 180);
    vars.set("random_seed", 0);
    vars.set("imported_infections_per_day", 1.5);
    vars.set(
        "interventions",
        json!([
            {"day": 25, "kind": "test-all-with-symptoms"},
            {"day": 30, "kind": "limit-mobility", "value": 40},
        ]),
    );
    vars
}

impl SeirParams {
    pub fn from_variables(vars: &VariableStore) -> Result<Self, SimulationError> {
        let population = positive(vars, "population")?;
        let initial_infected = non_negative(vars, "initial_infected")?;
        if initial_infected > population {
            return Err(invalid("initial_infected", "exceeds population"));
        }

        let fatality_rate = non_negative(vars, "fatality_rate")?;
        if fatality_rate > 1.0 {
            return Err(invalid("fatality_rate", "must be at most 1"));
        }

        let start_date = vars
            .get_str("start_date")
            .ok_or_else(|| invalid("start_date", "missing or not a string"))?;
        let start_date = NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
            .map_err(|e| invalid("start_date", e.to_string()))?;

        let simulation_days = vars
            .get_u64("simulation_days")
            .filter(|d| (1..=MAX_SIMULATION_DAYS).contains(d))
            .ok_or_else(|| {
                invalid(
                    "simulation_days",
                    format!("must be an integer between 1 and {MAX_SIMULATION_DAYS}"),
                )
            })? as u32;

        let interventions = Schedule::from_value(vars.get("interventions"))?;
        if let Some(day) = interventions.last_day().filter(|d| *d >= simulation_days) {
            return Err(invalid(
                "interventions",
                format!("day {day} falls outside the {simulation_days}-day simulation"),
            ));
        }

        Ok(Self {
            population,
            initial_infected,
            r0: positive(vars, "r0")?,
            incubation_days: positive(vars, "incubation_days")?,
            infectious_days: positive(vars, "infectious_days")?,
            fatality_rate,
            start_date,
            simulation_days,
            random_seed: vars.get_u64("random_seed").unwrap_or(0),
            imported_infections_per_day: non_negative(vars, "imported_infections_per_day")?,
            interventions,
        })
    }
}

fn number(vars: &VariableStore, name: &str) -> Result<f64, SimulationError> {
    vars.get_f64(name)
        .ok_or_else(|| invalid(name, "missing or not a number"))
}

fn positive(vars: &VariableStore, name: &str) -> Result<f64, SimulationError> {
    let v = number(vars, name)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(invalid(name, "must be positive"))
    }
}

fn non_negative(vars: &VariableStore, name: &str) -> Result<f64, SimulationError> {
    let v = number(vars, name)?;
    if v >= 0.0 {
        Ok(v)
    } else {
        Err(invalid(name, "must not be negative"))
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> SimulationError {
    SimulationError::InvalidVariable {
        name: name.to_string(),
        reason: reason.into(),
    }
}
