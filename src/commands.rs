use std::path::PathBuf;

use clap::{Parser, Subcommand, command};

#[derive(Parser)]
#[command()]
pub struct Args {
    /// Query a JSON dataset instead of the database
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a synthetic dataset file
    GenerateData {
        /// The number of residents in the dataset
        number_persons: u32,
        /// Where to write the dataset (defaults to SAFETYNET_DATA_FILE)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Load a JSON dataset into the database
    Import {
        /// Dataset to import (defaults to SAFETYNET_DATA_FILE)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Residents of an address with their medical details and covering station
    Coverage {
        address: String,
    },
    /// Residents covered by the given stations, grouped by address
    Flood {
        #[arg(required = true, num_args = 1.., value_delimiter = ',')]
        stations: Vec<u32>,
    },
    /// Children living at an address and their household
    ChildAlert {
        address: String,
    },
    /// Distinct phone numbers of residents covered by a station
    PhoneAlert {
        station: u32,
    },
    /// Medical and contact details for a resident
    PersonInfo {
        first_name: String,
        last_name: String,
    },
    /// Residents covered by a station with adult and child counts
    Station {
        station: u32,
    },
    /// Distinct emails of a city's residents
    CommunityEmail {
        city: String,
    },
}
