use serde::Serialize;

use crate::store::EntityStore;

use super::{QueryEngine, QueryError, require_text};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonInfo {
    pub last_name: String,
    pub address: String,
    pub age: i32,
    pub email: String,
    pub medications: Vec<String>,
    pub allergies: Vec<String>,
}

impl<S: EntityStore> QueryEngine<S> {
    /// Medical and contact details of every resident with this exact name.
    /// Callers must not assume a single match.
    pub fn person_info_by_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<PersonInfo>, QueryError> {
        const OPERATION: &str = "person_info";
        let first_name = require_text("first name", first_name)?;
        let last_name = require_text("last name", last_name)?;

        let matches = self.read(
            OPERATION,
            self.store.find_persons_by_name(first_name, last_name),
        )?;
        if matches.is_empty() {
            tracing::info!(first_name, last_name, "No person with this name");
        }

        matches
            .iter()
            .map(|person| {
                let profile = self.medical_profile(OPERATION, person)?;
                Ok(PersonInfo {
                    last_name: person.last_name.clone(),
                    address: person.address.clone(),
                    age: profile.age,
                    email: person.email.clone(),
                    medications: profile.medications,
                    allergies: profile.allergies,
                })
            })
            .collect()
    }
}
