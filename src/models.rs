use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Natural key shared by a Person and its MedicalRecord.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonKey {
    pub first_name: String,
    pub last_name: String,
}

impl PersonKey {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        }
    }
}

impl fmt::Display for PersonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub zip: String,
    pub phone: String,
    pub email: String,
}

impl Person {
    pub fn new(
        first_name: &str,
        last_name: &str,
        address: &str,
        city: &str,
        zip: &str,
        phone: &str,
        email: &str,
    ) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            address: address.to_string(),
            city: city.to_string(),
            zip: zip.to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
        }
    }

    pub fn key(&self) -> PersonKey {
        PersonKey::new(&self.first_name, &self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecord {
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "birthdate", with = "birthdate_format", default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

impl MedicalRecord {
    pub fn new(
        first_name: &str,
        last_name: &str,
        birth_date: Option<NaiveDate>,
        medications: &[&str],
        allergies: &[&str],
    ) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            birth_date,
            medications: medications.iter().map(|m| m.to_string()).collect(),
            allergies: allergies.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn key(&self) -> PersonKey {
        PersonKey::new(&self.first_name, &self.last_name)
    }
}

/// Maps one address to the station covering it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireStation {
    pub address: String,
    #[serde(rename = "station", with = "station_format")]
    pub station_number: u32,
}

impl FireStation {
    pub fn new(address: &str, station_number: u32) -> Self {
        Self {
            address: address.to_string(),
            station_number,
        }
    }
}

/// The three record sets, as found in `data.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub persons: Vec<Person>,
    #[serde(default)]
    pub firestations: Vec<FireStation>,
    #[serde(default)]
    pub medicalrecords: Vec<MedicalRecord>,
}

pub const BIRTHDATE_FORMAT: &str = "%m/%d/%Y";

mod birthdate_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::BIRTHDATE_FORMAT;

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => serializer.serialize_str(&d.format(BIRTHDATE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => NaiveDate::parse_from_str(s, BIRTHDATE_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

// Station numbers travel as strings ("3") in data.json.
mod station_format {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(number: &u32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&number.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u32),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}
