use serde::Serialize;

use crate::age;
use crate::models::PersonKey;
use crate::store::EntityStore;

use super::{QueryEngine, QueryError, require_text};

/// A child living at the queried address and the rest of its household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildAlert {
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub household_members: Vec<PersonKey>,
}

impl<S: EntityStore> QueryEngine<S> {
    /// Household members are the other residents of the same address sharing
    /// the child's last name. Residents of unknown age are never children.
    pub fn child_alert_by_address(&self, address: &str) -> Result<Vec<ChildAlert>, QueryError> {
        const OPERATION: &str = "child_alert";
        let address = require_text("address", address)?;

        let residents = self.read(OPERATION, self.store.find_persons_by_address(address))?;
        if residents.is_empty() {
            tracing::info!(address, "No residents found at address");
            return Ok(Vec::new());
        }

        let mut ages = Vec::with_capacity(residents.len());
        for person in &residents {
            ages.push(self.medical_profile(OPERATION, person)?.age);
        }

        let alerts: Vec<ChildAlert> = residents
            .iter()
            .zip(&ages)
            .filter(|(_, years)| age::is_child(**years))
            .map(|(child, years)| ChildAlert {
                first_name: child.first_name.clone(),
                last_name: child.last_name.clone(),
                age: *years,
                household_members: residents
                    .iter()
                    .filter(|other| {
                        other.last_name == child.last_name && other.first_name != child.first_name
                    })
                    .map(|other| other.key())
                    .collect(),
            })
            .collect();

        if alerts.is_empty() {
            tracing::info!(address, residents = residents.len(), "No child at address");
        }
        Ok(alerts)
    }
}
