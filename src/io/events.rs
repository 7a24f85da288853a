//! Event CSV ingest and corrected-event export.
//!
//! Input columns: `runid` (optional), `refmult`, `zdc`, `vz`.
//! Output columns: `refmultcorr`, `cent16`, `cent9`, `weight`.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::EventCorrectionResult;
use crate::error::{CalibError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EventRecord {
    #[serde(default)]
    pub runid: Option<i64>,
    pub refmult: f64,
    pub zdc: f64,
    pub vz: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
struct CorrectedRecord {
    refmultcorr: f64,
    cent16: i32,
    cent9: i32,
    weight: f64,
}

impl From<&EventCorrectionResult> for CorrectedRecord {
    fn from(r: &EventCorrectionResult) -> Self {
        Self {
            refmultcorr: r.corrected_multiplicity,
            cent16: r.centrality16,
            cent9: r.centrality9,
            weight: r.weight,
        }
    }
}

/// Read every event of a CSV file. A malformed row aborts with its line number.
pub fn read_events(path: &Path) -> Result<Vec<EventRecord>> {
    let file = File::open(path).map_err(|e| CalibError::file(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut events = Vec::new();
    for (idx, row) in reader.deserialize::<EventRecord>().enumerate() {
        // +2: records start after the header on 1-based line numbers.
        let line = idx + 2;
        let event = row.map_err(|e| {
            CalibError::MalformedInput(format!("{}:{line}: {e}", path.display()))
        })?;
        events.push(event);
    }
    Ok(events)
}

pub fn write_corrected(path: &Path, results: &[EventCorrectionResult]) -> Result<()> {
    let file = File::create(path).map_err(|e| CalibError::file(path, e))?;
    let mut writer = csv::Writer::from_writer(file);
    for r in results {
        writer.serialize(CorrectedRecord::from(r))?;
    }
    writer.flush()?;
    Ok(())
}
