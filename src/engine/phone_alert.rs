use std::collections::HashSet;

use crate::store::EntityStore;

use super::{QueryEngine, QueryError, require_station};

/// Keeps the first occurrence of each value, in iteration order.
pub(crate) fn distinct_in_order<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

impl<S: EntityStore> QueryEngine<S> {
    /// Distinct phone numbers of everyone the station covers.
    pub fn phone_alert_by_station(&self, station_number: u32) -> Result<Vec<String>, QueryError> {
        let station_number = require_station(station_number)?;

        let residents = self.read(
            "phone_alert",
            self.store.find_persons_by_station(station_number),
        )?;
        let phones = distinct_in_order(residents.into_iter().map(|p| p.phone));

        if phones.is_empty() {
            tracing::info!(station_number, "No residents covered by station");
        }
        Ok(phones)
    }
}
