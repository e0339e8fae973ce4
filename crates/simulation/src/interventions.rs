//! Scheduled events that change the course of the epidemic.

use reina_core::simulation::SimulationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transmission reduction applied by `test-all-with-symptoms`.
const SYMPTOMATIC_TESTING_REDUCTION: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterventionKind {
    /// Cut contacts by `value` percent from `day` on.
    LimitMobility,
    /// Move `value` people straight into the exposed compartment on `day`.
    ImportInfections,
    /// Isolate symptomatic cases from `day` on. Takes no value.
    TestAllWithSymptoms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub day: u32,
    pub kind: InterventionKind,
    #[serde(default)]
    pub value: Option<f64>,
}

impl Intervention {
    fn validate(&self) -> Result<(), String> {
        match (self.kind, self.value) {
            (InterventionKind::LimitMobility, Some(v)) if (0.0..=100.0).contains(&v) => Ok(()),
            (InterventionKind::LimitMobility, _) => {
                Err("limit-mobility needs a value between 0 and 100".into())
            }
            (InterventionKind::ImportInfections, Some(v)) if v >= 0.0 => Ok(()),
            (InterventionKind::ImportInfections, _) => {
                Err("import-infections needs a non-negative value".into())
            }
            (InterventionKind::TestAllWithSymptoms, None) => Ok(()),
            (InterventionKind::TestAllWithSymptoms, Some(_)) => {
                Err("test-all-with-symptoms takes no value".into())
            }
        }
    }
}

/// Interventions sorted by day, with lookups the day loop needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule(Vec<Intervention>);

impl Schedule {
    /// Parse the `interventions` variable. A missing variable is an empty schedule.
    pub fn from_value(value: Option<&Value>) -> Result<Self, SimulationError> {
        let Some(value) = value else {
            return Ok(Self::default());
        };
        let mut items: Vec<Intervention> =
            serde_json::from_value(value.clone()).map_err(|e| invalid(e.to_string()))?;
        for item in &items {
            item.validate().map_err(invalid)?;
        }
        items.sort_by_key(|i| i.day);
        Ok(Self(items))
    }

    /// Fraction of contacts remaining on `day` (1.0 = unrestricted).
    pub fn contact_factor(&self, day: u32) -> f64 {
        let mobility = self
            .0
            .iter()
            .filter(|i| i.kind == InterventionKind::LimitMobility && i.day <= day)
            .last()
            .and_then(|i| i.value)
            .unwrap_or(0.0);
        let testing = self
            .0
            .iter()
            .any(|i| i.kind == InterventionKind::TestAllWithSymptoms && i.day <= day);

        let mut factor = 1.0 - mobility / 100.0;
        if testing {
            factor *= 1.0 - SYMPTOMATIC_TESTING_REDUCTION;
        }
        factor
    }

    /// People imported on exactly `day`.
    pub fn imports_on(&self, day: u32) -> f64 {
        self.0
            .iter()
            .filter(|i| i.kind == InterventionKind::ImportInfections && i.day == day)
            .filter_map(|i| i.value)
            .sum()
    }

    /// Day of the latest scheduled event.
    pub fn last_day(&self) -> Option<u32> {
        self.0.last().map(|i| i.day)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn invalid(reason: impl Into<String>) -> SimulationError {
    SimulationError::InvalidVariable {
        name: "interventions".into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_variable_is_empty_schedule() {
        let schedule = Schedule::from_value(None).unwrap();
        assert!(schedule.is_empty());
        assert_eq!(schedule.contact_factor(100), 1.0);
    }

    #[test]
    fn latest_mobility_limit_wins() {
        let schedule = Schedule::from_value(Some(&json!([
            {"day": 40, "kind": "limit-mobility", "value": 20},
            {"day": 10, "kind": "limit-mobility", "value": 50},
        ])))
        .unwrap();

        assert_eq!(schedule.contact_factor(5), 1.0);
        assert_eq!(schedule.contact_factor(10), 0.5);
        assert_eq!(schedule.contact_factor(45), 0.8);
    }

    #[test]
    fn testing_compounds_with_mobility() {
        let schedule = Schedule::from_value(Some(&json!([
            {"day": 0, "kind": "limit-mobility", "value": 50},
            {"day": 0, "kind": "test-all-with-symptoms"},
        ])))
        .unwrap();
        assert!((schedule.contact_factor(0) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn imports_only_on_their_day() {
        let schedule = Schedule::from_value(Some(&json!([
            {"day": 3, "kind": "import-infections", "value": 10},
            {"day": 3, "kind": "import-infections", "value": 5},
        ])))
        .unwrap();
        assert_eq!(schedule.imports_on(3), 15.0);
        assert_eq!(schedule.imports_on(4), 0.0);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = Schedule::from_value(Some(&json!([
            {"day": 3, "kind": "limit-mobility", "value": 150}
        ])))
        .unwrap_err();
        assert!(matches!(err, SimulationError::InvalidVariable { ref name, .. } if name == "interventions"));

        assert!(Schedule::from_value(Some(&json!([
            {"day": 3, "kind": "test-all-with-symptoms", "value": 1}
        ])))
        .is_err());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(Schedule::from_value(Some(&json!([
            {"day": 3, "kind": "build-a-wall", "value": 1}
        ])))
        .is_err());
    }
}
