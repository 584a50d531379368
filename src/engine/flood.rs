use std::collections::BTreeMap;

use serde::Serialize;

use crate::store::EntityStore;

use super::{CoveredPerson, QueryEngine, QueryError, require_station};

/// Households covered by one station, keyed by address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloodStation {
    pub station_number: u32,
    pub households: BTreeMap<String, Vec<CoveredPerson>>,
}

impl<S: EntityStore> QueryEngine<S> {
    /// One group per distinct station number, in first-requested order.
    /// Stations without residents produce an empty group.
    pub fn flood_by_station_numbers(
        &self,
        station_numbers: &[u32],
    ) -> Result<Vec<FloodStation>, QueryError> {
        const OPERATION: &str = "flood";
        if station_numbers.is_empty() {
            tracing::warn!("Rejected flood query without station numbers");
            return Err(QueryError::InvalidInput(
                "at least one station number is required".to_string(),
            ));
        }
        for &number in station_numbers {
            require_station(number)?;
        }

        let mut requested: Vec<u32> = Vec::with_capacity(station_numbers.len());
        for &number in station_numbers {
            if !requested.contains(&number) {
                requested.push(number);
            }
        }

        let mut groups = Vec::with_capacity(requested.len());
        for station_number in requested {
            let residents = self.read(OPERATION, self.store.find_persons_by_station(station_number))?;

            let mut households: BTreeMap<String, Vec<CoveredPerson>> = BTreeMap::new();
            for person in &residents {
                let covered = self.covered_person(OPERATION, person)?;
                households
                    .entry(person.address.clone())
                    .or_default()
                    .push(covered);
            }

            tracing::debug!(
                station_number,
                addresses = households.len(),
                residents = residents.len(),
                "Grouped station residents"
            );
            groups.push(FloodStation {
                station_number,
                households,
            });
        }

        Ok(groups)
    }
}
