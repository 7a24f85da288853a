//! Correction parameter JSON files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::domain::CorrectionParameters;
use crate::error::{CalibError, Result};

/// Read correction parameters; omitted fields take their defaults.
pub fn read_correction_parameters(path: &Path) -> Result<CorrectionParameters> {
    let file = File::open(path).map_err(|e| CalibError::file(path, e))?;
    let params = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        CalibError::InvalidConfig(format!(
            "invalid correction parameters '{}': {e}",
            path.display()
        ))
    })?;
    Ok(params)
}
