use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::mpsc::channel;

use std::path::Path;

use safetynet::config::Settings;
use safetynet::db::{self, Batch};
use safetynet::{InMemoryStore, QueryEngine, QueryError, loader};

mod commands;

use commands::{Args, Commands};

const ENV_FILE: &str = include_str!("../.env");

async fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Could not create directory {}", parent.display()))?;
    }
    Ok(())
}

async fn generate_data(number_persons: u32, output: &Path) -> Result<()> {
    tracing::info!("Generating dataset");

    let start = std::time::Instant::now();

    let dataset = loader::generate_dataset(number_persons, &mut rand::rng());
    ensure_parent_dir(output).await?;
    loader::write_dataset(output, &dataset).await?;

    tracing::info!(
        persons = dataset.persons.len(),
        firestations = dataset.firestations.len(),
        "Dataset written to {} in {:?}",
        output.display(),
        start.elapsed()
    );

    Ok(())
}

async fn connect(settings: &Settings) -> Result<SqlitePool> {
    tracing::info!("Connecting to database");
    if let Some(path) = settings.database_url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or(path);
        ensure_parent_dir(Path::new(path)).await?;
    }
    db::connect(&settings.database_url)
        .await
        .context("Could not connect to database")
}

async fn import(settings: &Settings, file: &Path) -> Result<()> {
    tracing::info!("Running import pipeline");

    let start = std::time::Instant::now();

    let dataset = loader::read_dataset(file)
        .await
        .with_context(|| format!("Could not read {}", file.display()))?;

    // Reject the file before touching the database if it breaks a store invariant
    let dataset = InMemoryStore::from_dataset(dataset)
        .context("Dataset violates store invariants")?
        .snapshot()?;
    let total = dataset.persons.len() + dataset.firestations.len() + dataset.medicalrecords.len();

    let pool = connect(settings).await?;

    let (to_db, mut from_reader) = channel::<Batch>(16);

    let reader_handle = tokio::spawn(async move {
        for batch in db::batches(dataset) {
            if to_db.send(batch).await.is_err() {
                tracing::warn!("Database writer stopped, dropping remaining batches");
                break;
            }
        }

        tracing::info!("All batches pushed to database writer");
    });

    let writer_pool = pool.clone();
    let writer_handle = tokio::spawn(async move {
        let progress = ProgressBar::new(total as u64);
        progress.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} records")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        // Dedicated connection for all writes; the old tables survive a failed import
        let mut connection = writer_pool.acquire().await?;

        let written = db::replace_dataset(&mut connection, &mut from_reader, |batch, stored| {
            progress.inc(stored as u64);
            tracing::debug!(table = batch.table(), records = stored, "Batch stored");
        })
        .await
        .context("Import rolled back, database left unchanged");

        progress.finish_and_clear();
        written
    });

    let (reader_result, writer_result) = tokio::join!(reader_handle, writer_handle);
    reader_result.context("Batch reader task failed")?;
    let written = writer_result.context("Database writer task failed")??;

    if let Err(e) = sqlx::query("VACUUM").execute(&pool).await {
        tracing::warn!("VACUUM failed: {:?}", e);
    }

    tracing::info!(
        records = written,
        "Import completed in {:?}",
        start.elapsed()
    );

    Ok(())
}

async fn load_engine(settings: &Settings, data: Option<&Path>) -> Result<QueryEngine<InMemoryStore>> {
    let dataset = match data {
        Some(path) => loader::read_dataset(path)
            .await
            .with_context(|| format!("Could not read {}", path.display()))?,
        None => {
            let pool = connect(settings).await?;
            db::load_dataset(&pool)
                .await
                .context("Database error while loading dataset")?
        }
    };

    let store = InMemoryStore::from_dataset(dataset).context("Dataset violates store invariants")?;
    Ok(QueryEngine::new(store))
}

fn render<T: Serialize>(outcome: Result<T, QueryError>) -> Result<String> {
    match outcome {
        Ok(view) => Ok(serde_json::to_string_pretty(&view)?),
        Err(QueryError::InvalidInput(reason)) => bail!("Invalid query: {reason}"),
        Err(e) => Err(e).context("Query failed"),
    }
}

fn run_query(engine: &QueryEngine<InMemoryStore>, command: Commands) -> Result<String> {
    match command {
        Commands::Coverage { address } => render(engine.coverage_by_address(&address)),
        Commands::Flood { stations } => render(engine.flood_by_station_numbers(&stations)),
        Commands::ChildAlert { address } => render(engine.child_alert_by_address(&address)),
        Commands::PhoneAlert { station } => render(engine.phone_alert_by_station(station)),
        Commands::PersonInfo {
            first_name,
            last_name,
        } => render(engine.person_info_by_name(&first_name, &last_name)),
        Commands::Station { station } => render(engine.persons_by_station(station)),
        Commands::CommunityEmail { city } => render(engine.community_email_by_city(&city)),
        Commands::GenerateData { .. } | Commands::Import { .. } => {
            bail!("Not a query command")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Args::parse();
    let Some(command) = cli.command else {
        println!("Run with --help to see instructions");
        return Ok(());
    };

    let settings = Settings::from_env_file(ENV_FILE)?;

    match command {
        Commands::GenerateData {
            number_persons,
            output,
        } => {
            let output = output.unwrap_or_else(|| settings.data_file.clone());
            generate_data(number_persons, &output).await?
        }
        Commands::Import { file } => {
            let file = file.unwrap_or_else(|| settings.data_file.clone());
            import(&settings, &file).await?
        }
        query => {
            let engine = load_engine(&settings, cli.data.as_deref()).await?;
            println!("{}", run_query(&engine, query)?);
        }
    }

    Ok(())
}
