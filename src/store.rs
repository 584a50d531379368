use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::models::{Dataset, FireStation, MedicalRecord, Person, PersonKey};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Person already exists: {0}")]
    DuplicatePerson(PersonKey),

    #[error("Person not found: {0}")]
    PersonNotFound(PersonKey),

    #[error("Medical record already exists: {0}")]
    DuplicateMedicalRecord(PersonKey),

    #[error("Medical record not found: {0}")]
    MedicalRecordNotFound(PersonKey),

    #[error("Address {address} is already covered by station {station_number}")]
    AddressAlreadyMapped { address: String, station_number: u32 },

    #[error("No station mapped to address {0}")]
    AddressNotMapped(String),

    #[error("No address mapped to station {0}")]
    StationNotFound(u32),

    #[error("Station number for {0} must be positive")]
    InvalidStationNumber(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Read contract the query engines rely on.
///
/// Each call is an independent read. Two calls made while answering one
/// query may observe different store states if a writer runs in between.
pub trait EntityStore {
    fn find_persons_by_address(&self, address: &str) -> Result<Vec<Person>, StoreError>;

    /// Residents of every address the station covers.
    fn find_persons_by_station(&self, station_number: u32) -> Result<Vec<Person>, StoreError>;

    fn find_persons_by_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<Person>, StoreError>;

    fn find_persons_by_city(&self, city: &str) -> Result<Vec<Person>, StoreError>;

    fn find_station_by_address(&self, address: &str) -> Result<Option<FireStation>, StoreError>;

    fn find_medical_record(&self, key: &PersonKey) -> Result<Option<MedicalRecord>, StoreError>;
}

impl<S: EntityStore + ?Sized> EntityStore for Arc<S> {
    fn find_persons_by_address(&self, address: &str) -> Result<Vec<Person>, StoreError> {
        (**self).find_persons_by_address(address)
    }

    fn find_persons_by_station(&self, station_number: u32) -> Result<Vec<Person>, StoreError> {
        (**self).find_persons_by_station(station_number)
    }

    fn find_persons_by_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<Person>, StoreError> {
        (**self).find_persons_by_name(first_name, last_name)
    }

    fn find_persons_by_city(&self, city: &str) -> Result<Vec<Person>, StoreError> {
        (**self).find_persons_by_city(city)
    }

    fn find_station_by_address(&self, address: &str) -> Result<Option<FireStation>, StoreError> {
        (**self).find_station_by_address(address)
    }

    fn find_medical_record(&self, key: &PersonKey) -> Result<Option<MedicalRecord>, StoreError> {
        (**self).find_medical_record(key)
    }
}

#[derive(Debug, Default)]
struct Tables {
    persons: HashMap<PersonKey, Person>,
    person_order: Vec<PersonKey>,
    persons_by_address: HashMap<String, Vec<PersonKey>>,
    persons_by_city: HashMap<String, Vec<PersonKey>>,
    station_by_address: HashMap<String, u32>,
    addresses_by_station: BTreeMap<u32, Vec<String>>,
    station_order: Vec<String>,
    medical_records: HashMap<PersonKey, MedicalRecord>,
    record_order: Vec<PersonKey>,
}

fn unindex<K: PartialEq>(index: &mut HashMap<String, Vec<K>>, bucket: &str, item: &K) {
    if let Some(items) = index.get_mut(bucket) {
        items.retain(|k| k != item);
        if items.is_empty() {
            index.remove(bucket);
        }
    }
}

impl Tables {
    fn persons_at(&self, keys: Option<&Vec<PersonKey>>) -> Vec<Person> {
        keys.map(|keys| {
            keys.iter()
                .filter_map(|key| self.persons.get(key).cloned())
                .collect()
        })
        .unwrap_or_default()
    }

    fn index_person(&mut self, key: &PersonKey, person: &Person) {
        self.persons_by_address
            .entry(person.address.clone())
            .or_default()
            .push(key.clone());
        self.persons_by_city
            .entry(person.city.clone())
            .or_default()
            .push(key.clone());
    }

    fn unindex_person(&mut self, key: &PersonKey, person: &Person) {
        unindex(&mut self.persons_by_address, &person.address, key);
        unindex(&mut self.persons_by_city, &person.city, key);
    }

    fn unmap_address(&mut self, address: &str, station_number: u32) {
        if let Some(addresses) = self.addresses_by_station.get_mut(&station_number) {
            addresses.retain(|a| a != address);
            if addresses.is_empty() {
                self.addresses_by_station.remove(&station_number);
            }
        }
    }
}

/// Indexed in-memory dataset guarded by a single `RwLock`.
///
/// Index buckets keep insertion order, so lookups return residents in the
/// order they were added.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk load. Stops at the first record that breaks a store invariant.
    pub fn from_dataset(dataset: Dataset) -> Result<Self, StoreError> {
        let store = Self::new();
        for person in dataset.persons {
            store.add_person(person)?;
        }
        for station in dataset.firestations {
            store.add_fire_station(station)?;
        }
        for record in dataset.medicalrecords {
            store.add_medical_record(record)?;
        }
        Ok(store)
    }

    pub fn snapshot(&self) -> Result<Dataset, StoreError> {
        let tables = self.read()?;
        let persons = tables
            .person_order
            .iter()
            .filter_map(|key| tables.persons.get(key).cloned())
            .collect();
        let firestations = tables
            .station_order
            .iter()
            .filter_map(|address| {
                tables
                    .station_by_address
                    .get(address)
                    .map(|number| FireStation::new(address, *number))
            })
            .collect();
        let medicalrecords = tables
            .record_order
            .iter()
            .filter_map(|key| tables.medical_records.get(key).cloned())
            .collect();

        Ok(Dataset {
            persons,
            firestations,
            medicalrecords,
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::LockPoisoned)
    }

    pub fn add_person(&self, person: Person) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let key = person.key();
        if tables.persons.contains_key(&key) {
            return Err(StoreError::DuplicatePerson(key));
        }

        tables.index_person(&key, &person);
        tables.person_order.push(key.clone());
        tables.persons.insert(key, person);
        Ok(())
    }

    /// Replaces the contact details of an existing person. The name is the key
    /// and selects the record to update.
    pub fn update_person(&self, person: Person) -> Result<Person, StoreError> {
        let mut tables = self.write()?;
        let key = person.key();
        let previous = tables
            .persons
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::PersonNotFound(key.clone()))?;

        if previous.address != person.address || previous.city != person.city {
            tables.unindex_person(&key, &previous);
            tables.index_person(&key, &person);
        }
        tables.persons.insert(key, person);
        Ok(previous)
    }

    pub fn delete_person(&self, key: &PersonKey) -> Result<Person, StoreError> {
        let mut tables = self.write()?;
        let removed = tables
            .persons
            .remove(key)
            .ok_or_else(|| StoreError::PersonNotFound(key.clone()))?;

        tables.unindex_person(key, &removed);
        tables.person_order.retain(|k| k != key);
        Ok(removed)
    }

    pub fn add_fire_station(&self, station: FireStation) -> Result<(), StoreError> {
        if station.station_number == 0 {
            return Err(StoreError::InvalidStationNumber(station.address));
        }
        let mut tables = self.write()?;
        if let Some(existing) = tables.station_by_address.get(&station.address) {
            return Err(StoreError::AddressAlreadyMapped {
                address: station.address,
                station_number: *existing,
            });
        }

        tables
            .addresses_by_station
            .entry(station.station_number)
            .or_default()
            .push(station.address.clone());
        tables.station_order.push(station.address.clone());
        tables
            .station_by_address
            .insert(station.address, station.station_number);
        Ok(())
    }

    /// Moves an already mapped address to another station.
    pub fn update_fire_station(&self, station: FireStation) -> Result<FireStation, StoreError> {
        if station.station_number == 0 {
            return Err(StoreError::InvalidStationNumber(station.address));
        }
        let mut tables = self.write()?;
        let previous = *tables
            .station_by_address
            .get(&station.address)
            .ok_or_else(|| StoreError::AddressNotMapped(station.address.clone()))?;

        if previous != station.station_number {
            tables.unmap_address(&station.address, previous);
            tables
                .addresses_by_station
                .entry(station.station_number)
                .or_default()
                .push(station.address.clone());
            tables
                .station_by_address
                .insert(station.address.clone(), station.station_number);
        }
        Ok(FireStation::new(&station.address, previous))
    }

    pub fn delete_fire_station_by_address(&self, address: &str) -> Result<FireStation, StoreError> {
        let mut tables = self.write()?;
        let number = tables
            .station_by_address
            .remove(address)
            .ok_or_else(|| StoreError::AddressNotMapped(address.to_string()))?;

        tables.unmap_address(address, number);
        tables.station_order.retain(|a| a != address);
        Ok(FireStation::new(address, number))
    }

    /// Removes every address mapping of the station.
    pub fn delete_fire_station_by_number(
        &self,
        station_number: u32,
    ) -> Result<Vec<FireStation>, StoreError> {
        let mut tables = self.write()?;
        let addresses = tables
            .addresses_by_station
            .remove(&station_number)
            .ok_or(StoreError::StationNotFound(station_number))?;

        for address in &addresses {
            tables.station_by_address.remove(address);
        }
        tables.station_order.retain(|a| !addresses.contains(a));
        Ok(addresses
            .iter()
            .map(|address| FireStation::new(address, station_number))
            .collect())
    }

    pub fn add_medical_record(&self, record: MedicalRecord) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let key = record.key();
        if tables.medical_records.contains_key(&key) {
            return Err(StoreError::DuplicateMedicalRecord(key));
        }

        tables.record_order.push(key.clone());
        tables.medical_records.insert(key, record);
        Ok(())
    }

    pub fn update_medical_record(&self, record: MedicalRecord) -> Result<MedicalRecord, StoreError> {
        let mut tables = self.write()?;
        let key = record.key();
        match tables.medical_records.get_mut(&key) {
            Some(existing) => Ok(std::mem::replace(existing, record)),
            None => Err(StoreError::MedicalRecordNotFound(key)),
        }
    }

    pub fn delete_medical_record(&self, key: &PersonKey) -> Result<MedicalRecord, StoreError> {
        let mut tables = self.write()?;
        let removed = tables
            .medical_records
            .remove(key)
            .ok_or_else(|| StoreError::MedicalRecordNotFound(key.clone()))?;

        tables.record_order.retain(|k| k != key);
        Ok(removed)
    }
}

impl EntityStore for InMemoryStore {
    fn find_persons_by_address(&self, address: &str) -> Result<Vec<Person>, StoreError> {
        let tables = self.read()?;
        Ok(tables.persons_at(tables.persons_by_address.get(address)))
    }

    fn find_persons_by_station(&self, station_number: u32) -> Result<Vec<Person>, StoreError> {
        let tables = self.read()?;
        let Some(addresses) = tables.addresses_by_station.get(&station_number) else {
            return Ok(Vec::new());
        };

        Ok(addresses
            .iter()
            .flat_map(|address| tables.persons_at(tables.persons_by_address.get(address)))
            .collect())
    }

    fn find_persons_by_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<Person>, StoreError> {
        let tables = self.read()?;
        let key = PersonKey::new(first_name, last_name);
        Ok(tables.persons.get(&key).cloned().into_iter().collect())
    }

    fn find_persons_by_city(&self, city: &str) -> Result<Vec<Person>, StoreError> {
        let tables = self.read()?;
        Ok(tables.persons_at(tables.persons_by_city.get(city)))
    }

    fn find_station_by_address(&self, address: &str) -> Result<Option<FireStation>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .station_by_address
            .get(address)
            .map(|number| FireStation::new(address, *number)))
    }

    fn find_medical_record(&self, key: &PersonKey) -> Result<Option<MedicalRecord>, StoreError> {
        let tables = self.read()?;
        Ok(tables.medical_records.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(first: &str, last: &str, address: &str, city: &str) -> Person {
        Person::new(first, last, address, city, "97451", "841-874-6512", "x@email.com")
    }

    fn names(persons: &[Person]) -> Vec<String> {
        persons.iter().map(|p| p.first_name.clone()).collect()
    }

    #[test]
    fn duplicate_person_rejected() {
        let store = InMemoryStore::new();
        store
            .add_person(person("John", "Boyd", "1509 Culver St", "Culver"))
            .unwrap();
        let err = store
            .add_person(person("John", "Boyd", "29 15th St", "Culver"))
            .unwrap_err();
        assert_eq!(err, StoreError::DuplicatePerson(PersonKey::new("John", "Boyd")));
    }

    #[test]
    fn address_maps_to_one_station() {
        let store = InMemoryStore::new();
        store
            .add_fire_station(FireStation::new("1509 Culver St", 3))
            .unwrap();
        let err = store
            .add_fire_station(FireStation::new("1509 Culver St", 2))
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::AddressAlreadyMapped {
                address: "1509 Culver St".into(),
                station_number: 3
            }
        );
    }

    #[test]
    fn lookups_by_address_city_and_name() {
        let store = InMemoryStore::new();
        store.add_person(person("John", "Boyd", "1509 Culver St", "Culver")).unwrap();
        store.add_person(person("Jacob", "Boyd", "1509 Culver St", "Culver")).unwrap();
        store.add_person(person("Tony", "Cooper", "112 Steppes Pl", "Culver")).unwrap();
        store.add_person(person("Ron", "Peters", "112 Steppes Pl", "Paris")).unwrap();

        let at_culver = store.find_persons_by_address("1509 Culver St").unwrap();
        assert_eq!(names(&at_culver), vec!["John", "Jacob"]);

        let in_culver = store.find_persons_by_city("Culver").unwrap();
        assert_eq!(names(&in_culver), vec!["John", "Jacob", "Tony"]);

        assert_eq!(store.find_persons_by_name("Tony", "Cooper").unwrap().len(), 1);
        assert!(store.find_persons_by_name("Tony", "Boyd").unwrap().is_empty());
        assert!(store.find_persons_by_address("nowhere").unwrap().is_empty());
    }

    #[test]
    fn persons_by_station_follow_mapping_order() {
        let store = InMemoryStore::new();
        store.add_person(person("Tony", "Cooper", "112 Steppes Pl", "Culver")).unwrap();
        store.add_person(person("John", "Boyd", "1509 Culver St", "Culver")).unwrap();
        store.add_person(person("Lily", "Cooper", "489 Manchester St", "Culver")).unwrap();
        store.add_fire_station(FireStation::new("1509 Culver St", 3)).unwrap();
        store.add_fire_station(FireStation::new("112 Steppes Pl", 3)).unwrap();
        store.add_fire_station(FireStation::new("489 Manchester St", 4)).unwrap();

        let covered = store.find_persons_by_station(3).unwrap();
        assert_eq!(names(&covered), vec!["John", "Tony"]);
        assert!(store.find_persons_by_station(9).unwrap().is_empty());
    }

    #[test]
    fn update_person_reindexes_address() {
        let store = InMemoryStore::new();
        store.add_person(person("John", "Boyd", "1509 Culver St", "Culver")).unwrap();

        let previous = store
            .update_person(person("John", "Boyd", "29 15th St", "Culver"))
            .unwrap();
        assert_eq!(previous.address, "1509 Culver St");
        assert!(store.find_persons_by_address("1509 Culver St").unwrap().is_empty());
        assert_eq!(store.find_persons_by_address("29 15th St").unwrap().len(), 1);

        let err = store
            .update_person(person("Nobody", "Here", "29 15th St", "Culver"))
            .unwrap_err();
        assert!(matches!(err, StoreError::PersonNotFound(_)));
    }

    #[test]
    fn delete_person_clears_indexes() {
        let store = InMemoryStore::new();
        store.add_person(person("John", "Boyd", "1509 Culver St", "Culver")).unwrap();
        store.delete_person(&PersonKey::new("John", "Boyd")).unwrap();

        assert!(store.find_persons_by_city("Culver").unwrap().is_empty());
        assert!(store.snapshot().unwrap().persons.is_empty());
        assert!(store.delete_person(&PersonKey::new("John", "Boyd")).is_err());
    }

    #[test]
    fn station_update_and_delete() {
        let store = InMemoryStore::new();
        store.add_fire_station(FireStation::new("1509 Culver St", 3)).unwrap();
        store.add_fire_station(FireStation::new("29 15th St", 2)).unwrap();

        let previous = store
            .update_fire_station(FireStation::new("1509 Culver St", 2))
            .unwrap();
        assert_eq!(previous.station_number, 3);
        assert_eq!(
            store.find_station_by_address("1509 Culver St").unwrap(),
            Some(FireStation::new("1509 Culver St", 2))
        );

        let removed = store.delete_fire_station_by_number(2).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(store.find_station_by_address("29 15th St").unwrap(), None);
        assert_eq!(
            store.delete_fire_station_by_address("29 15th St").unwrap_err(),
            StoreError::AddressNotMapped("29 15th St".into())
        );
        assert_eq!(
            store.update_fire_station(FireStation::new("29 15th St", 1)).unwrap_err(),
            StoreError::AddressNotMapped("29 15th St".into())
        );
    }

    #[test]
    fn medical_record_lifecycle() {
        let store = InMemoryStore::new();
        let key = PersonKey::new("John", "Boyd");
        store
            .add_medical_record(MedicalRecord::new("John", "Boyd", None, &["aznol:350mg"], &[]))
            .unwrap();
        assert!(store
            .add_medical_record(MedicalRecord::new("John", "Boyd", None, &[], &[]))
            .is_err());

        let previous = store
            .update_medical_record(MedicalRecord::new("John", "Boyd", None, &[], &["peanut"]))
            .unwrap();
        assert_eq!(previous.medications, vec!["aznol:350mg".to_string()]);
        assert_eq!(
            store.find_medical_record(&key).unwrap().unwrap().allergies,
            vec!["peanut".to_string()]
        );

        store.delete_medical_record(&key).unwrap();
        assert_eq!(store.find_medical_record(&key).unwrap(), None);
    }

    #[test]
    fn dataset_round_trip_keeps_order() {
        let dataset = Dataset {
            persons: vec![
                person("John", "Boyd", "1509 Culver St", "Culver"),
                person("Tony", "Cooper", "112 Steppes Pl", "Culver"),
            ],
            firestations: vec![
                FireStation::new("1509 Culver St", 3),
                FireStation::new("112 Steppes Pl", 4),
            ],
            medicalrecords: vec![MedicalRecord::new("Tony", "Cooper", None, &[], &[])],
        };

        let store = InMemoryStore::from_dataset(dataset.clone()).unwrap();
        assert_eq!(store.snapshot().unwrap(), dataset);
    }

    #[test]
    fn snapshot_keeps_station_insertion_order() {
        let dataset = Dataset {
            firestations: vec![
                FireStation::new("892 Downing Ct", 4),
                FireStation::new("1509 Culver St", 1),
                FireStation::new("29 15th St", 3),
                FireStation::new("644 Gershwin Cir", 1),
            ],
            ..Dataset::default()
        };

        let store = InMemoryStore::from_dataset(dataset.clone()).unwrap();
        assert_eq!(store.snapshot().unwrap(), dataset);

        store
            .update_fire_station(FireStation::new("1509 Culver St", 2))
            .unwrap();
        store.delete_fire_station_by_address("29 15th St").unwrap();
        let addresses: Vec<String> = store
            .snapshot()
            .unwrap()
            .firestations
            .into_iter()
            .map(|s| format!("{}={}", s.address, s.station_number))
            .collect();
        assert_eq!(
            addresses,
            vec!["892 Downing Ct=4", "1509 Culver St=2", "644 Gershwin Cir=1"]
        );

        store.delete_fire_station_by_number(1).unwrap();
        assert_eq!(store.snapshot().unwrap().firestations.len(), 2);
    }

    #[test]
    fn station_zero_is_rejected_on_write() {
        let store = InMemoryStore::new();
        assert_eq!(
            store.add_fire_station(FireStation::new("1509 Culver St", 0)),
            Err(StoreError::InvalidStationNumber("1509 Culver St".into()))
        );
        assert_eq!(store.find_station_by_address("1509 Culver St").unwrap(), None);

        store.add_fire_station(FireStation::new("1509 Culver St", 3)).unwrap();
        assert_eq!(
            store.update_fire_station(FireStation::new("1509 Culver St", 0)),
            Err(StoreError::InvalidStationNumber("1509 Culver St".into()))
        );
        assert_eq!(
            store.find_station_by_address("1509 Culver St").unwrap(),
            Some(FireStation::new("1509 Culver St", 3))
        );
    }

    #[test]
    fn bulk_load_rejects_station_zero_from_json() {
        let raw = r#"{ "firestations": [{ "address":"1509 Culver St", "station":"0" }] }"#;
        let dataset: Dataset = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            InMemoryStore::from_dataset(dataset),
            Err(StoreError::InvalidStationNumber(_))
        ));
    }

    #[test]
    fn bulk_load_rejects_duplicate_mapping() {
        let dataset = Dataset {
            firestations: vec![
                FireStation::new("1509 Culver St", 3),
                FireStation::new("1509 Culver St", 3),
            ],
            ..Dataset::default()
        };
        assert!(matches!(
            InMemoryStore::from_dataset(dataset),
            Err(StoreError::AddressAlreadyMapped { .. })
        ));
    }
}
