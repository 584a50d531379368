use serde::Serialize;

use crate::age;
use crate::store::EntityStore;

use super::phone_alert::distinct_in_order;
use super::{QueryEngine, QueryError, require_station, require_text};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationResident {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub phone: String,
}

/// Residents covered by a station with an adult/child head count.
/// Residents of unknown age are listed but counted in neither total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationCoverage {
    pub persons: Vec<StationResident>,
    pub adult_count: usize,
    pub child_count: usize,
}

impl<S: EntityStore> QueryEngine<S> {
    pub fn persons_by_station(&self, station_number: u32) -> Result<StationCoverage, QueryError> {
        const OPERATION: &str = "station";
        let station_number = require_station(station_number)?;

        let residents = self.read(OPERATION, self.store.find_persons_by_station(station_number))?;

        let mut coverage = StationCoverage {
            persons: Vec::with_capacity(residents.len()),
            adult_count: 0,
            child_count: 0,
        };
        for person in residents {
            let years = self.medical_profile(OPERATION, &person)?.age;
            if age::is_child(years) {
                coverage.child_count += 1;
            } else if age::is_adult(years) {
                coverage.adult_count += 1;
            }
            coverage.persons.push(StationResident {
                first_name: person.first_name,
                last_name: person.last_name,
                address: person.address,
                phone: person.phone,
            });
        }

        tracing::debug!(
            station_number,
            adults = coverage.adult_count,
            children = coverage.child_count,
            "Counted station residents"
        );
        Ok(coverage)
    }

    /// Distinct emails of a city's residents, first occurrence first.
    pub fn community_email_by_city(&self, city: &str) -> Result<Vec<String>, QueryError> {
        let city = require_text("city", city)?;

        let residents = self.read("community_email", self.store.find_persons_by_city(city))?;
        let emails = distinct_in_order(residents.into_iter().map(|p| p.email));

        if emails.is_empty() {
            tracing::info!(city, "No residents found in city");
        }
        Ok(emails)
    }
}
