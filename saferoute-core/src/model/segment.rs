//! Road-segment records and the authoritative segment store.

use geo::Point;
use hashbrown::HashMap;
use log::info;
use serde::Deserialize;

use crate::{DatasetVersion, Error, planar_distance};

/// One road segment as it appears in the dataset.
///
/// Coordinates are `[lat, lon]` pairs, matching the dataset document format.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentRecord {
    pub id: String,
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub crime: f64,
    pub lighting: f64,
    pub crowd: f64,
}

/// A validated road segment. Immutable once stored.
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: String,
    /// Start endpoint (x = lon, y = lat).
    pub start: Point<f64>,
    /// End endpoint (x = lon, y = lat).
    pub end: Point<f64>,
    /// Crime score in [0, 1].
    pub crime: f64,
    /// Lighting score in [0, 1]; risk uses the deficit `1 - lighting`.
    pub lighting: f64,
    /// Crowd score in [0, 1]; risk uses the scarcity `1 - crowd`.
    pub crowd: f64,
}

impl Segment {
    fn from_record(record: SegmentRecord) -> Result<Self, Error> {
        if record.id.is_empty() {
            return Err(Error::InvalidSegment("segment with empty id".to_string()));
        }
        let start = validate_coordinate(&record.id, "start", record.start)?;
        let end = validate_coordinate(&record.id, "end", record.end)?;
        let crime = validate_score(&record.id, "crime", record.crime)?;
        let lighting = validate_score(&record.id, "lighting", record.lighting)?;
        let crowd = validate_score(&record.id, "crowd", record.crowd)?;

        Ok(Self {
            id: record.id,
            start,
            end,
            crime,
            lighting,
            crowd,
        })
    }
}

fn validate_coordinate(id: &str, field: &str, coord: [f64; 2]) -> Result<Point<f64>, Error> {
    let [lat, lon] = coord;
    if !lat.is_finite()
        || !lon.is_finite()
        || !(-90.0..=90.0).contains(&lat)
        || !(-180.0..=180.0).contains(&lon)
    {
        return Err(Error::InvalidSegment(format!(
            "segment '{id}': {field} coordinate [{lat}, {lon}] is out of range"
        )));
    }
    Ok(Point::new(lon, lat))
}

fn validate_score(id: &str, field: &str, value: f64) -> Result<f64, Error> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(Error::InvalidSegment(format!(
            "segment '{id}': {field} score {value} is outside [0, 1]"
        )));
    }
    Ok(value)
}

/// Owns the authoritative segment set and the derived planar lengths.
///
/// The whole set is replaced atomically by [`SegmentStore::replace`]; nothing
/// is mutated in place, so any reader that captured a dataset version sees a
/// consistent snapshot until the next swap.
#[derive(Debug, Default)]
pub struct SegmentStore {
    segments: HashMap<String, Segment>,
    lengths: HashMap<String, f64>,
    version: DatasetVersion,
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and swaps in a new segment set, bumping the dataset version.
    ///
    /// Every record is validated before any state changes; on the first
    /// invalid record the previous dataset and version are retained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSegment`] for an out-of-range, incomplete or
    /// duplicate record.
    pub fn replace(&mut self, records: Vec<SegmentRecord>) -> Result<usize, Error> {
        let mut segments = HashMap::with_capacity(records.len());
        let mut lengths = HashMap::with_capacity(records.len());

        for record in records {
            let segment = Segment::from_record(record)?;
            if segments.contains_key(&segment.id) {
                return Err(Error::InvalidSegment(format!(
                    "duplicate segment id '{}'",
                    segment.id
                )));
            }
            lengths.insert(
                segment.id.clone(),
                planar_distance(segment.start, segment.end),
            );
            segments.insert(segment.id.clone(), segment);
        }

        self.segments = segments;
        self.lengths = lengths;
        self.version += 1;
        info!(
            "segment store replaced: {} segments (version {})",
            self.segments.len(),
            self.version
        );
        Ok(self.segments.len())
    }

    pub fn get(&self, id: &str) -> Option<&Segment> {
        self.segments.get(id)
    }

    /// Planar length of a segment, interpreted as kilometres by the ETA model.
    pub fn length(&self, id: &str) -> Option<f64> {
        self.lengths.get(id).copied()
    }

    pub fn all(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn version(&self) -> DatasetVersion {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, start: [f64; 2], end: [f64; 2]) -> SegmentRecord {
        SegmentRecord {
            id: id.to_string(),
            start,
            end,
            crime: 0.5,
            lighting: 0.5,
            crowd: 0.5,
        }
    }

    #[test]
    fn replace_swaps_and_bumps_version() {
        let mut store = SegmentStore::new();
        assert_eq!(store.version(), 0);

        store
            .replace(vec![record("a", [0.0, 0.0], [3.0, 4.0])])
            .unwrap();
        assert_eq!(store.version(), 1);
        assert_eq!(store.len(), 1);
        assert!((store.length("a").unwrap() - 5.0).abs() < 1e-12);
        assert!(store.get("a").is_some());
    }

    #[test]
    fn replace_is_atomic_on_invalid_record() {
        let mut store = SegmentStore::new();
        store
            .replace(vec![record("a", [0.0, 0.0], [0.0, 1.0])])
            .unwrap();

        let mut bad = record("b", [0.0, 0.0], [0.0, 1.0]);
        bad.crime = 1.5;
        let err = store
            .replace(vec![record("c", [0.0, 0.0], [0.0, 2.0]), bad])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSegment(_)));

        // Previous dataset and version survive the failed swap
        assert_eq!(store.version(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("a").is_some());
        assert!(store.get("c").is_none());
    }

    #[test]
    fn replace_rejects_duplicates_and_bad_coordinates() {
        let mut store = SegmentStore::new();
        let err = store
            .replace(vec![
                record("a", [0.0, 0.0], [0.0, 1.0]),
                record("a", [0.0, 1.0], [0.0, 2.0]),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSegment(_)));

        let err = store
            .replace(vec![record("b", [91.0, 0.0], [0.0, 1.0])])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSegment(_)));
        assert_eq!(store.version(), 0);
    }
}
