use crate::error::Result;
use crate::models::FlightRecord;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Data loader for CSV flight exports
pub struct TrainingDataLoader;

impl TrainingDataLoader {
    /// Load flight records from a CSV file
    pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<FlightRecord>> {
        let file = File::open(&path)?;
        let records = Self::read_records(file)?;

        info!(
            "Loaded {} flight records from {}",
            records.len(),
            path.as_ref().display()
        );

        Ok(records)
    }

    /// Read flight records from any CSV source with a header row
    pub fn read_records<R: Read>(source: R) -> Result<Vec<FlightRecord>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(source);

        let mut records = Vec::new();
        for result in reader.deserialize() {
            let record: FlightRecord = result?;
            records.push(record);
        }

        Ok(records)
    }
}
