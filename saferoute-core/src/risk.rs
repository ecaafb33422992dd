//! Per-segment risk scoring.
//!
//! A score combines crime, lighting deficit and crowd scarcity, each raised
//! to a configurable exponent, weighted, and scaled by an hour-of-day
//! multiplier. Scoring is pure for a fixed configuration version, so results
//! are memoized keyed by (segment id, hour, version).

use hashbrown::HashMap;
use log::debug;
use rayon::prelude::*;

use crate::model::Segment;
use crate::{Error, RISK_MEMO_CAPACITY, RiskVersion, round2};

/// Mutable scoring weights, versioned for cache invalidation.
///
/// Weights carry no normalization invariant; they need not sum to 1.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub crime_weight: f64,
    pub lighting_weight: f64,
    pub crowd_weight: f64,
    pub nonlinear_exponent: f64,
    /// Unrecognized keys are kept verbatim so callers can round-trip them.
    extra: HashMap<String, f64>,
    version: RiskVersion,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            crime_weight: 0.6,
            lighting_weight: 0.15,
            crowd_weight: 0.15,
            nonlinear_exponent: 1.3,
            extra: HashMap::new(),
            version: 0,
        }
    }
}

impl RiskConfig {
    /// Merges `updates` into the config, last write wins per key.
    ///
    /// Unknown keys are accepted and stored. Every successful merge bumps the
    /// version, which invalidates downstream graphs and memoized scores.
    ///
    /// # Errors
    ///
    /// Rejects non-finite values; the config is left untouched.
    pub fn update(&mut self, updates: &HashMap<String, f64>) -> Result<RiskVersion, Error> {
        for (key, value) in updates {
            if !value.is_finite() {
                return Err(Error::InvalidConfig(format!(
                    "'{key}' is not a finite number"
                )));
            }
        }

        for (key, &value) in updates {
            match key.as_str() {
                "crime_weight" => self.crime_weight = value,
                "lighting_weight" => self.lighting_weight = value,
                "crowd_weight" => self.crowd_weight = value,
                "nonlinear_exponent" => self.nonlinear_exponent = value,
                _ => {
                    debug!("storing unrecognized risk config key '{key}'");
                    self.extra.insert(key.clone(), value);
                }
            }
        }

        self.version += 1;
        Ok(self.version)
    }

    pub fn version(&self) -> RiskVersion {
        self.version
    }

    /// Value of an unrecognized key stored by a previous update.
    pub fn extra(&self, key: &str) -> Option<f64> {
        self.extra.get(key).copied()
    }
}

/// Hour-of-day risk multiplier.
///
/// Flat 1.0 before 20:00; from 20:00 a smooth tanh boost that saturates just
/// under 1.2x, rounded to two decimals.
pub fn time_multiplier(hour: u8) -> f64 {
    if hour < 20 {
        return 1.0;
    }
    round2(1.0 + 0.2 * (f64::from(hour - 20) / 2.0).tanh())
}

/// Danger score for `segment` at `hour` under `config`.
///
/// Deterministic for a fixed config version; rounded to two decimals.
pub fn score(config: &RiskConfig, segment: &Segment, hour: u8) -> f64 {
    let e = config.nonlinear_exponent;
    let crime = segment.crime.powf(e);
    let lighting_deficit = (1.0 - segment.lighting).powf(e);
    let crowd_scarcity = (1.0 - segment.crowd).powf(e);

    let base = config.crime_weight * crime
        + config.lighting_weight * lighting_deficit
        + config.crowd_weight * crowd_scarcity;

    round2(base * time_multiplier(hour))
}

/// Bounded memo of computed scores.
///
/// Scores are valid only for the config version they were computed under;
/// entries from an older version are never served.
#[derive(Debug)]
pub struct ScoreMemo {
    version: RiskVersion,
    scores: HashMap<String, [Option<f64>; 24]>,
    capacity: usize,
}

impl ScoreMemo {
    pub fn new(capacity: usize) -> Self {
        Self {
            version: 0,
            scores: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, id: &str, hour: u8, version: RiskVersion) -> Option<f64> {
        if version != self.version {
            return None;
        }
        self.scores
            .get(id)
            .and_then(|by_hour| by_hour[usize::from(hour)])
    }

    pub fn insert(&mut self, id: String, hour: u8, version: RiskVersion, value: f64) {
        if version != self.version {
            self.scores.clear();
            self.version = version;
        }
        if self.scores.len() >= self.capacity && !self.scores.contains_key(&id) {
            // Full: drop everything rather than track per-entry recency
            debug!("risk memo full ({} segments), clearing", self.scores.len());
            self.scores.clear();
        }
        self.scores.entry(id).or_insert([None; 24])[usize::from(hour)] = Some(value);
    }

    pub fn clear(&mut self) {
        self.scores.clear();
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Scoring state shared by graph builds: the current config plus the memo.
#[derive(Debug)]
pub struct RiskState {
    pub config: RiskConfig,
    pub memo: ScoreMemo,
}

impl Default for RiskState {
    fn default() -> Self {
        Self::new(RISK_MEMO_CAPACITY)
    }
}

impl RiskState {
    pub fn new(memo_capacity: usize) -> Self {
        Self {
            config: RiskConfig::default(),
            memo: ScoreMemo::new(memo_capacity),
        }
    }

    /// Score a single segment, consulting the memo.
    pub fn score_cached(&mut self, segment: &Segment, hour: u8) -> f64 {
        let version = self.config.version();
        if let Some(value) = self.memo.get(&segment.id, hour, version) {
            return value;
        }
        let value = score(&self.config, segment, hour);
        self.memo.insert(segment.id.clone(), hour, version, value);
        value
    }

    /// Score every segment for `hour`; memo misses are computed in parallel.
    pub fn score_all(&mut self, segments: &[&Segment], hour: u8) -> Vec<f64> {
        let version = self.config.version();
        let mut scores = vec![0.0; segments.len()];
        let mut misses = Vec::new();

        for (i, segment) in segments.iter().enumerate() {
            match self.memo.get(&segment.id, hour, version) {
                Some(value) => scores[i] = value,
                None => misses.push(i),
            }
        }

        let config = &self.config;
        let computed: Vec<(usize, f64)> = misses
            .into_par_iter()
            .map(|i| (i, score(config, segments[i], hour)))
            .collect();

        for (i, value) in computed {
            self.memo
                .insert(segments[i].id.clone(), hour, version, value);
            scores[i] = value;
        }

        scores
    }
}
