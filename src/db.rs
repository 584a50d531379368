use std::str::FromStr;

use chrono::NaiveDate;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Connection, Row, SqliteConnection, SqlitePool};
use thiserror::Error;
use tokio::sync::mpsc::Receiver;

use crate::models::{Dataset, FireStation, MedicalRecord, Person};

/// Rows per multi-value INSERT.
pub const BATCH_SIZE: usize = 500;

const ISO_DATE: &str = "%Y-%m-%d";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },
}

/// One homogeneous chunk of records headed for the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    Persons(Vec<Person>),
    FireStations(Vec<FireStation>),
    MedicalRecords(Vec<MedicalRecord>),
}

impl Batch {
    pub fn len(&self) -> usize {
        match self {
            Batch::Persons(rows) => rows.len(),
            Batch::FireStations(rows) => rows.len(),
            Batch::MedicalRecords(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn table(&self) -> &'static str {
        match self {
            Batch::Persons(_) => "persons",
            Batch::FireStations(_) => "firestations",
            Batch::MedicalRecords(_) => "medicalrecords",
        }
    }
}

/// Splits a dataset into insert-sized batches, persons first.
pub fn batches(dataset: Dataset) -> Vec<Batch> {
    let mut out = Vec::new();
    out.extend(dataset.persons.chunks(BATCH_SIZE).map(|c| Batch::Persons(c.to_vec())));
    out.extend(
        dataset
            .firestations
            .chunks(BATCH_SIZE)
            .map(|c| Batch::FireStations(c.to_vec())),
    );
    out.extend(
        dataset
            .medicalrecords
            .chunks(BATCH_SIZE)
            .map(|c| Batch::MedicalRecords(c.to_vec())),
    );
    out
}

/// Opens a single-connection pool so every statement hits the same database,
/// including `sqlite::memory:`.
pub async fn connect(database_url: &str) -> Result<SqlitePool, DbError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Memory);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Drops and recreates the dataset tables. Runs inside the caller's
/// transaction when given one.
pub async fn create_schema(conn: &mut SqliteConnection) -> Result<(), DbError> {
    tracing::info!("Creating empty dataset tables");

    for table in ["persons", "firestations", "medicalrecords"] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query(
        r#"
    CREATE TABLE persons (
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            address TEXT NOT NULL,
            city TEXT NOT NULL,
            zip TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT NOT NULL,
            PRIMARY KEY (first_name, last_name))"#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
    CREATE TABLE firestations (
            address TEXT PRIMARY KEY,
            station INTEGER NOT NULL)"#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
    CREATE TABLE medicalrecords (
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            birthdate TEXT,
            medications TEXT NOT NULL,
            allergies TEXT NOT NULL,
            PRIMARY KEY (first_name, last_name))"#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn values_clause(rows: usize, columns: usize) -> String {
    let row = format!("({})", vec!["?"; columns].join(", "));
    vec![row; rows].join(",")
}

fn encode_list(table: &'static str, items: &[String]) -> Result<String, DbError> {
    serde_json::to_string(items).map_err(|e| DbError::CorruptRow {
        table,
        reason: e.to_string(),
    })
}

fn decode_list(table: &'static str, raw: &str) -> Result<Vec<String>, DbError> {
    serde_json::from_str(raw).map_err(|e| DbError::CorruptRow {
        table,
        reason: e.to_string(),
    })
}

/// Inserts one batch with a single multi-row statement.
pub async fn write_batch(conn: &mut SqliteConnection, batch: &Batch) -> Result<usize, DbError> {
    if batch.is_empty() {
        return Ok(0);
    }

    let result = match batch {
        Batch::Persons(persons) => {
            let sql = format!(
                "INSERT INTO persons (first_name, last_name, address, city, zip, phone, email) VALUES {}",
                values_clause(persons.len(), 7)
            );
            let mut query = sqlx::query(&sql);
            for p in persons {
                query = query
                    .bind(p.first_name.as_str())
                    .bind(p.last_name.as_str())
                    .bind(p.address.as_str())
                    .bind(p.city.as_str())
                    .bind(p.zip.as_str())
                    .bind(p.phone.as_str())
                    .bind(p.email.as_str());
            }
            query.execute(&mut *conn).await?
        }
        Batch::FireStations(stations) => {
            let sql = format!(
                "INSERT INTO firestations (address, station) VALUES {}",
                values_clause(stations.len(), 2)
            );
            let mut query = sqlx::query(&sql);
            for s in stations {
                query = query
                    .bind(s.address.as_str())
                    .bind(i64::from(s.station_number));
            }
            query.execute(&mut *conn).await?
        }
        Batch::MedicalRecords(records) => {
            let sql = format!(
                "INSERT INTO medicalrecords (first_name, last_name, birthdate, medications, allergies) VALUES {}",
                values_clause(records.len(), 5)
            );
            let mut encoded = Vec::with_capacity(records.len());
            for r in records {
                encoded.push((
                    r.birth_date.map(|d| d.format(ISO_DATE).to_string()),
                    encode_list("medicalrecords", &r.medications)?,
                    encode_list("medicalrecords", &r.allergies)?,
                ));
            }
            let mut query = sqlx::query(&sql);
            for (r, (birthdate, medications, allergies)) in records.iter().zip(encoded) {
                query = query
                    .bind(r.first_name.as_str())
                    .bind(r.last_name.as_str())
                    .bind(birthdate)
                    .bind(medications)
                    .bind(allergies);
            }
            query.execute(&mut *conn).await?
        }
    };

    Ok(result.rows_affected() as usize)
}

/// Appends a dataset to existing tables in one transaction.
pub async fn save_dataset(pool: &SqlitePool, dataset: Dataset) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut written = 0;
    for batch in batches(dataset) {
        written += write_batch(&mut tx, &batch).await?;
    }
    tx.commit().await?;
    Ok(written)
}

/// Replaces the stored dataset with the batches received until the channel
/// closes. Schema recreation and every insert share one transaction, so a
/// failed batch leaves the previous dataset untouched.
pub async fn replace_dataset<F>(
    conn: &mut SqliteConnection,
    batches: &mut Receiver<Batch>,
    mut on_stored: F,
) -> Result<usize, DbError>
where
    F: FnMut(&Batch, usize),
{
    // Cannot be changed inside a transaction
    sqlx::query("PRAGMA synchronous = OFF")
        .execute(&mut *conn)
        .await?;

    let mut tx = conn.begin().await?;
    create_schema(&mut tx).await?;

    let mut written = 0;
    while let Some(batch) = batches.recv().await {
        let stored = match write_batch(&mut tx, &batch).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(
                    table = batch.table(),
                    records = batch.len(),
                    "Batch insert failed, rolling back import: {e}"
                );
                return Err(e);
            }
        };
        written += stored;
        on_stored(&batch, stored);
    }

    tx.commit().await?;
    Ok(written)
}

/// Reads every table back in insertion order.
pub async fn load_dataset(pool: &SqlitePool) -> Result<Dataset, DbError> {
    let mut dataset = Dataset::default();

    let mut rows = sqlx::query(
        "SELECT first_name, last_name, address, city, zip, phone, email FROM persons ORDER BY rowid",
    )
    .fetch(pool);
    while let Some(row) = rows.try_next().await? {
        dataset.persons.push(Person {
            first_name: row.try_get(0)?,
            last_name: row.try_get(1)?,
            address: row.try_get(2)?,
            city: row.try_get(3)?,
            zip: row.try_get(4)?,
            phone: row.try_get(5)?,
            email: row.try_get(6)?,
        });
    }
    drop(rows);

    let mut rows = sqlx::query("SELECT address, station FROM firestations ORDER BY rowid").fetch(pool);
    while let Some(row) = rows.try_next().await? {
        let station: i64 = row.try_get(1)?;
        let station_number = u32::try_from(station).map_err(|_| DbError::CorruptRow {
            table: "firestations",
            reason: format!("station number {station} out of range"),
        })?;
        dataset.firestations.push(FireStation {
            address: row.try_get(0)?,
            station_number,
        });
    }
    drop(rows);

    let mut rows = sqlx::query(
        "SELECT first_name, last_name, birthdate, medications, allergies FROM medicalrecords ORDER BY rowid",
    )
    .fetch(pool);
    while let Some(row) = rows.try_next().await? {
        let birthdate: Option<String> = row.try_get(2)?;
        let birth_date = birthdate
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, ISO_DATE).map_err(|e| DbError::CorruptRow {
                    table: "medicalrecords",
                    reason: format!("birthdate {raw}: {e}"),
                })
            })
            .transpose()?;
        let medications: String = row.try_get(3)?;
        let allergies: String = row.try_get(4)?;
        dataset.medicalrecords.push(MedicalRecord {
            first_name: row.try_get(0)?,
            last_name: row.try_get(1)?,
            birth_date,
            medications: decode_list("medicalrecords", &medications)?,
            allergies: decode_list("medicalrecords", &allergies)?,
        });
    }

    tracing::info!(
        persons = dataset.persons.len(),
        firestations = dataset.firestations.len(),
        medicalrecords = dataset.medicalrecords.len(),
        "Loaded dataset from database"
    );
    Ok(dataset)
}
