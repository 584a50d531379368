use std::collections::HashMap;
use std::path::Path;

use chrono::{Days, NaiveDate};
use rand::Rng;
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
};

use crate::models::{Dataset, FireStation, MedicalRecord, Person};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Could not access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Malformed dataset: {0}")]
    Json(#[from] serde_json::Error),
}

const FIRST_NAMES: [&str; 10] = [
    "Tom", "Johnny", "Jim", "Eric", "Amanda", "Grace", "Judy", "Frank", "Sally", "Will",
];
const LAST_NAMES: [&str; 10] = [
    "Connor",
    "Henderson",
    "Farley",
    "Henson",
    "Jeffries",
    "Carlin",
    "Anderson",
    "O' Sullivan",
    "Dorothy",
    "McDougal",
];
const STREETS: [&str; 8] = [
    "Culver St",
    "Steppes Pl",
    "Manchester St",
    "Downing Ct",
    "73rd St",
    "Gershwin Cir",
    "E. Rose Dr",
    "Binoc Ave",
];
const CITIES: [(&str, &str); 3] = [("Culver", "97451"), ("Paris", "75001"), ("Lyon", "69001")];
const MEDICATIONS: [&str; 6] = [
    "aznol:350mg",
    "hydrapermazol:100mg",
    "pharmacol:5000mg",
    "terazine:10mg",
    "noznazol:250mg",
    "tetracyclaz:650mg",
];
const ALLERGIES: [&str; 4] = ["nillacilan", "peanut", "shellfish", "xilliathal"];
const STATIONS: u32 = 4;

pub async fn read_dataset(path: &Path) -> Result<Dataset, LoadError> {
    let raw = tokio::fs::read(path).await.map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let dataset: Dataset = serde_json::from_slice(&raw)?;

    tracing::info!(
        path = %path.display(),
        persons = dataset.persons.len(),
        firestations = dataset.firestations.len(),
        medicalrecords = dataset.medicalrecords.len(),
        "Read dataset file"
    );
    Ok(dataset)
}

pub async fn write_dataset(path: &Path, dataset: &Dataset) -> Result<(), LoadError> {
    let io_error = |source| LoadError::Io {
        path: path.display().to_string(),
        source,
    };
    let body = serde_json::to_vec_pretty(dataset)?;

    let file = File::create(path).await.map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&body).await.map_err(io_error)?;
    writer.flush().await.map_err(io_error)?;
    Ok(())
}

fn pick<'a, R: Rng>(rng: &mut R, items: &[&'a str]) -> &'a str {
    items[rng.random_range(0..items.len())]
}

fn pick_some<R: Rng>(rng: &mut R, items: &[&str], max: usize) -> Vec<String> {
    let count = rng.random_range(0..=max);
    let mut picked: Vec<String> = Vec::with_capacity(count);
    for _ in 0..count {
        let item = pick(rng, items);
        if !picked.iter().any(|p| p == item) {
            picked.push(item.to_string());
        }
    }
    picked
}

fn email_for(first_name: &str, last_name: &str) -> String {
    let local: String = format!("{first_name}.{last_name}")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '-')
        .collect();
    format!("{}@email.com", local.to_lowercase())
}

/// Unique by construction: the street cycles fastest, then the house number grows.
fn address_for(household: usize) -> String {
    let number = household / STREETS.len() + 1;
    format!("{} {}", number, STREETS[household % STREETS.len()])
}

/// Builds households of one to five residents sharing an address and a last
/// name, each address mapped to exactly one station. Roughly one resident in
/// twenty has no medical record.
pub fn generate_dataset<R: Rng>(number_persons: u32, rng: &mut R) -> Dataset {
    let mut dataset = Dataset::default();
    // Next free suffix per (first name, last name); a bare first name is suffix 1
    let mut next_suffix: HashMap<(&str, &str), u32> = HashMap::new();
    let earliest = NaiveDate::from_ymd_opt(1940, 1, 1).unwrap_or(NaiveDate::MIN);

    let target = number_persons as usize;
    let mut household = 0;
    while dataset.persons.len() < target {
        let address = address_for(household);
        household += 1;

        let (city, zip) = CITIES[rng.random_range(0..CITIES.len())];
        let station_number = rng.random_range(1..=STATIONS);
        dataset
            .firestations
            .push(FireStation::new(&address, station_number));

        let last_name = pick(rng, &LAST_NAMES);
        let phone = format!("841-874-{:04}", rng.random_range(0..10_000));
        let size = rng.random_range(1..=5).min(target - dataset.persons.len());

        for _ in 0..size {
            let base = pick(rng, &FIRST_NAMES);
            let suffix = next_suffix.entry((base, last_name)).or_insert(1);
            let first_name = match *suffix {
                1 => base.to_string(),
                n => format!("{base}-{n}"),
            };
            *suffix += 1;

            if rng.random_range(0..20) > 0 {
                let birth_date = earliest.checked_add_days(Days::new(rng.random_range(0..30_000)));
                dataset.medicalrecords.push(MedicalRecord {
                    first_name: first_name.clone(),
                    last_name: last_name.to_string(),
                    birth_date,
                    medications: pick_some(rng, &MEDICATIONS, 3),
                    allergies: pick_some(rng, &ALLERGIES, 2),
                });
            }

            let email = email_for(&first_name, last_name);
            dataset.persons.push(Person::new(
                &first_name,
                last_name,
                &address,
                city,
                zip,
                &phone,
                &email,
            ));
        }
    }

    dataset
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use std::collections::HashSet;

    use crate::models::PersonKey;
    use crate::store::InMemoryStore;

    use super::*;

    #[test]
    fn generated_dataset_satisfies_store_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        let dataset = generate_dataset(250, &mut rng);

        assert_eq!(dataset.persons.len(), 250);
        assert!(dataset.medicalrecords.len() <= 250);
        let store = InMemoryStore::from_dataset(dataset.clone()).unwrap();
        assert_eq!(store.snapshot().unwrap().persons.len(), 250);
    }

    #[test]
    fn every_resident_address_is_mapped() {
        let mut rng = StdRng::seed_from_u64(11);
        let dataset = generate_dataset(60, &mut rng);
        let mapped: HashSet<_> = dataset.firestations.iter().map(|s| &s.address).collect();
        assert!(dataset.persons.iter().all(|p| mapped.contains(&p.address)));
    }

    #[test]
    fn addresses_never_repeat() {
        let addresses: HashSet<String> = (0..10_000).map(address_for).collect();
        assert_eq!(addresses.len(), 10_000);
        assert_eq!(address_for(0), "1 Culver St");
        assert_eq!(address_for(STREETS.len()), "2 Culver St");
    }

    #[test]
    fn large_dataset_completes_with_unique_keys() {
        // More residents than 9_999 house numbers x 8 streets x 5 per household
        let mut rng = StdRng::seed_from_u64(5);
        let dataset = generate_dataset(400_001, &mut rng);
        assert_eq!(dataset.persons.len(), 400_001);

        let keys: HashSet<PersonKey> = dataset.persons.iter().map(Person::key).collect();
        assert_eq!(keys.len(), dataset.persons.len());
        let addresses: HashSet<&str> = dataset
            .firestations
            .iter()
            .map(|s| s.address.as_str())
            .collect();
        assert_eq!(addresses.len(), dataset.firestations.len());
    }

    #[test]
    fn repeated_names_get_increasing_suffixes() {
        let mut rng = StdRng::seed_from_u64(9);
        let dataset = generate_dataset(500, &mut rng);
        let suffixed = dataset
            .persons
            .iter()
            .filter(|p| p.first_name.ends_with("-2"))
            .count();
        // 500 residents over 100 name pairs must reuse some pairs
        assert!(suffixed > 0);
        assert!(dataset.persons.iter().all(|p| !p.first_name.ends_with("-1")));
    }

    #[test]
    fn zero_persons_is_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(generate_dataset(0, &mut rng), Dataset::default());
    }

    #[test]
    fn emails_drop_punctuation() {
        assert_eq!(email_for("Tom", "O' Sullivan"), "tom.osullivan@email.com");
    }

    #[tokio::test]
    async fn written_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let mut rng = StdRng::seed_from_u64(3);
        let dataset = generate_dataset(20, &mut rng);

        write_dataset(&path, &dataset).await.unwrap();
        assert_eq!(read_dataset(&path).await.unwrap(), dataset);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_dataset(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[tokio::test]
    async fn malformed_file_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, b"{ \"persons\": 3 }").await.unwrap();
        assert!(matches!(read_dataset(&path).await.unwrap_err(), LoadError::Json(_)));
    }
}
