//! Emergency dispatch queries over residents, their medical records and the
//! fire stations covering their addresses.

pub mod age;
pub mod config;
pub mod db;
pub mod engine;
pub mod loader;
pub mod models;
pub mod store;

pub use engine::{QueryEngine, QueryError};
pub use models::{Dataset, FireStation, MedicalRecord, Person, PersonKey};
pub use store::{EntityStore, InMemoryStore, StoreError};
