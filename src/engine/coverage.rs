use serde::Serialize;

use crate::store::EntityStore;

use super::{CoveredPerson, QueryEngine, QueryError, require_text};

/// Residents of an address and the station covering it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressCoverage {
    pub persons: Vec<CoveredPerson>,
    pub station_number: Option<u32>,
}

impl<S: EntityStore> QueryEngine<S> {
    /// Unknown addresses produce an empty person list and no station; that is
    /// a valid answer, not an error.
    pub fn coverage_by_address(&self, address: &str) -> Result<AddressCoverage, QueryError> {
        const OPERATION: &str = "coverage";
        let address = require_text("address", address)?;

        let residents = self.read(OPERATION, self.store.find_persons_by_address(address))?;
        let station = self.read(OPERATION, self.store.find_station_by_address(address))?;

        let persons = residents
            .iter()
            .map(|person| self.covered_person(OPERATION, person))
            .collect::<Result<Vec<_>, _>>()?;

        if persons.is_empty() {
            tracing::info!(address, "No residents found at address");
        }
        if station.is_none() {
            tracing::info!(address, "No station mapped to address");
        }

        Ok(AddressCoverage {
            persons,
            station_number: station.map(|s| s.station_number),
        })
    }
}
