//! Read/write histogram object files.
//!
//! An object file is a JSON map from object name to a tagged histogram:
//!
//! ```json
//! {
//!   "refmult":    { "type": "hist1d", "x_min": 0, "x_max": 800, "contents": [...], "errors": [...] },
//!   "npartncoll": { "type": "hist2d", "npart": { "bins": 500, "min": 0, "max": 500 },
//!                   "ncoll": { "bins": 1500, "min": 0, "max": 1500 }, "contents": [...] }
//! }
//! ```
//!
//! 2D contents are laid out Npart-major. `errors` is optional; without it
//! bins are treated as Poisson counts.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CalibError, Result};
use crate::math::{Histogram1D, ParticipantCollisionTable, TableAxis};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredHistogram {
    #[serde(default)]
    pub title: String,
    pub x_min: f64,
    pub x_max: f64,
    pub contents: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<f64>>,
}

impl From<&Histogram1D> for StoredHistogram {
    fn from(h: &Histogram1D) -> Self {
        Self {
            title: h.title().to_string(),
            x_min: h.x_min(),
            x_max: h.x_max(),
            contents: h.contents().to_vec(),
            errors: Some(h.errors()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTable {
    pub npart: TableAxis,
    pub ncoll: TableAxis,
    pub contents: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoredObject {
    Hist1d(StoredHistogram),
    Hist2d(StoredTable),
}

pub type ObjectFile = BTreeMap<String, StoredObject>;

pub fn read_object_file(path: &Path) -> Result<ObjectFile> {
    let file = File::open(path).map_err(|e| CalibError::file(path, e))?;
    let objects: ObjectFile = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        CalibError::MalformedInput(format!("invalid object file '{}': {e}", path.display()))
    })?;
    Ok(objects)
}

fn take_object(path: &Path, name: &str) -> Result<StoredObject> {
    let mut objects = read_object_file(path)?;
    objects.remove(name).ok_or_else(|| {
        CalibError::MalformedInput(format!("object '{name}' not found in '{}'", path.display()))
    })
}

/// Load a 1D histogram named `name` from `path`.
pub fn read_histogram(path: &Path, name: &str) -> Result<Histogram1D> {
    match take_object(path, name)? {
        StoredObject::Hist1d(h) => {
            let mut hist = Histogram1D::from_contents(name, h.x_min, h.x_max, h.contents, h.errors)?;
            hist.set_title(h.title);
            Ok(hist)
        }
        StoredObject::Hist2d(_) => Err(CalibError::MalformedInput(format!(
            "object '{name}' in '{}' is a 2D table, expected a 1D histogram",
            path.display()
        ))),
    }
}

/// Load the Npart × Ncoll table named `name` from `path`.
pub fn read_table(path: &Path, name: &str) -> Result<ParticipantCollisionTable> {
    match take_object(path, name)? {
        StoredObject::Hist2d(t) => ParticipantCollisionTable::new(t.npart, t.ncoll, &t.contents),
        StoredObject::Hist1d(_) => Err(CalibError::MalformedInput(format!(
            "object '{name}' in '{}' is a 1D histogram, expected a 2D table",
            path.display()
        ))),
    }
}

/// Serialize histograms as an object file document, keyed by their names.
pub fn histogram_document<'a, I>(hists: I) -> Result<String>
where
    I: IntoIterator<Item = &'a Histogram1D>,
{
    let objects: ObjectFile = hists
        .into_iter()
        .map(|h| (h.name().to_string(), StoredObject::Hist1d(StoredHistogram::from(h))))
        .collect();
    Ok(serde_json::to_string(&objects)?)
}
