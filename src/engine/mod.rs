//! Read-only query engines over an [`EntityStore`].
//!
//! Every query answers with one of three outcomes: a populated result, an
//! empty but valid result, or a [`QueryError`]. Invalid input is rejected
//! before the store is touched. Store failures are logged here and never
//! leak a partially built result.

mod child_alert;
mod community;
mod coverage;
mod flood;
mod person_info;
mod phone_alert;

use serde::Serialize;
use thiserror::Error;

use crate::age::Clock;
use crate::models::Person;
use crate::store::{EntityStore, StoreError};

pub use child_alert::ChildAlert;
pub use community::{StationCoverage, StationResident};
pub use coverage::AddressCoverage;
pub use flood::FloodStation;
pub use person_info::PersonInfo;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store failure during {operation}: {source}")]
    Store {
        operation: &'static str,
        source: StoreError,
    },
}

/// One resident as seen by the coverage and flood queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoveredPerson {
    pub last_name: String,
    pub phone: String,
    pub age: i32,
    pub medications: Vec<String>,
    pub allergies: Vec<String>,
}

pub struct QueryEngine<S> {
    store: S,
    clock: Clock,
}

impl<S: EntityStore> QueryEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Clock::System)
    }

    pub fn with_clock(store: S, clock: Clock) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Unwraps a store read, logging and converting its failure.
    fn read<T>(
        &self,
        operation: &'static str,
        result: Result<T, StoreError>,
    ) -> Result<T, QueryError> {
        result.map_err(|source| {
            tracing::error!(operation, error = %source, "Store lookup failed");
            QueryError::Store { operation, source }
        })
    }

    /// Joins a person to its medical record. A missing record yields no
    /// medications, no allergies and an unknown age.
    fn medical_profile(
        &self,
        operation: &'static str,
        person: &Person,
    ) -> Result<MedicalProfile, QueryError> {
        let record = self.read(operation, self.store.find_medical_record(&person.key()))?;
        Ok(match record {
            Some(record) => MedicalProfile {
                age: self.clock.age(record.birth_date),
                medications: record.medications,
                allergies: record.allergies,
            },
            None => {
                tracing::debug!(person = %person.key(), "No medical record for person");
                MedicalProfile {
                    age: self.clock.age(None),
                    medications: Vec::new(),
                    allergies: Vec::new(),
                }
            }
        })
    }

    fn covered_person(
        &self,
        operation: &'static str,
        person: &Person,
    ) -> Result<CoveredPerson, QueryError> {
        let profile = self.medical_profile(operation, person)?;
        Ok(CoveredPerson {
            last_name: person.last_name.clone(),
            phone: person.phone.clone(),
            age: profile.age,
            medications: profile.medications,
            allergies: profile.allergies,
        })
    }
}

struct MedicalProfile {
    age: i32,
    medications: Vec<String>,
    allergies: Vec<String>,
}

fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str, QueryError> {
    if value.trim().is_empty() {
        tracing::warn!(field, "Rejected blank query parameter");
        return Err(QueryError::InvalidInput(format!("{field} is required")));
    }
    Ok(value)
}

fn require_station(station_number: u32) -> Result<u32, QueryError> {
    if station_number == 0 {
        tracing::warn!("Rejected station number 0");
        return Err(QueryError::InvalidInput(
            "station number must be positive".to_string(),
        ));
    }
    Ok(station_number)
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::fixtures::{self, CountingStore};
    use super::*;
    use crate::age::UNKNOWN_AGE;
    use crate::store::InMemoryStore;

    #[test]
    fn missing_medical_record_yields_unknown_age() {
        let engine = fixtures::engine();
        let jamie = Person::new("Jamie", "Peters", "908 73rd St", "Culver", "97451", "841-874-7462", "jpeter@email.com");
        let covered = engine.covered_person("test", &jamie).unwrap();
        assert_eq!(covered.age, UNKNOWN_AGE);
        assert!(covered.medications.is_empty());
        assert!(covered.allergies.is_empty());
    }

    #[test]
    fn store_failure_carries_operation() {
        let engine = fixtures::engine_over(CountingStore::failing());
        let err = engine.coverage_by_address("1509 Culver St").unwrap_err();
        assert!(matches!(err, QueryError::Store { operation: "coverage", .. }));
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(require_text("address", "  ").is_err());
        assert_eq!(require_text("address", "29 15th St").unwrap(), "29 15th St");
        assert!(require_station(0).is_err());
    }

    #[test]
    fn engines_share_a_store_across_threads() {
        let store = Arc::new(InMemoryStore::from_dataset(fixtures::dataset()).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = fixtures::engine_over(Arc::clone(&store));
                thread::spawn(move || engine.phone_alert_by_station(3).unwrap())
            })
            .collect();

        let results: Vec<Vec<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }
}
