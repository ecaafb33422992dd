//! Loading segment datasets from JSON documents.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::Error;
use crate::engine::RoutingEngine;
use crate::model::SegmentRecord;

/// On-disk dataset shape: one document with a `segments` array.
#[derive(Debug, Deserialize)]
pub struct RiskDataset {
    pub segments: Vec<SegmentRecord>,
}

/// Reads and parses a dataset file.
///
/// # Errors
///
/// I/O errors carry the offending path; a document that does not match the
/// dataset shape surfaces as [`Error::MalformedDataset`].
pub fn load_segments(path: &Path) -> Result<Vec<SegmentRecord>, Error> {
    let file = File::open(path).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("failed to open dataset '{}': {e}", path.display()),
        )
    })?;
    let dataset: RiskDataset = serde_json::from_reader(BufReader::new(file))?;
    Ok(dataset.segments)
}

/// Loads a dataset file into `engine`.
///
/// On any failure the engine keeps serving the previously loaded dataset.
pub fn load_dataset(path: &Path, engine: &RoutingEngine) -> Result<usize, Error> {
    engine.reload_dataset(load_segments(path)?)
}
