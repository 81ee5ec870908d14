//! Baseline support.
//!
//! A baseline records the grouped findings of one scan so later scans
//! report only what is new. Matching is exact on inspection id and group
//! identity: the identity string is stable across scans by construction,
//! so no fuzzy tolerance is needed.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

use crate::rules::InspectionResult;

/// Baseline errors
#[derive(Error, Debug)]
pub enum BaselineError {
    #[error("Failed to read baseline file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse baseline: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Baseline version mismatch")]
    VersionMismatch,
}

/// Current baseline format version
const BASELINE_VERSION: u32 = 1;

/// A fingerprint for one finding group, matchable across scans
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FindingFingerprint {
    /// Inspection id, e.g. "HL002"
    pub inspection: String,
    /// Group identity: declaring class, field, relation kind
    pub identity: String,
}

impl FindingFingerprint {
    pub fn new(inspection: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            inspection: inspection.into(),
            identity: identity.into(),
        }
    }
}

/// A baseline containing known findings to suppress
#[derive(Debug, Serialize, Deserialize)]
pub struct Baseline {
    /// Baseline format version
    pub version: u32,
    /// Unix timestamp at creation
    pub created_at: u64,
    /// Known finding groups to suppress
    pub findings: Vec<FindingFingerprint>,
    /// Total groups at baseline time
    pub total_at_baseline: usize,
}

impl Baseline {
    /// Create a new baseline from the grouped results of a scan
    pub fn from_results(results: &[InspectionResult]) -> Self {
        let findings: Vec<FindingFingerprint> = results
            .iter()
            .flat_map(|result| {
                result
                    .groups
                    .iter()
                    .map(|group| FindingFingerprint::new(&result.id, &group.identity))
            })
            .collect();

        Self {
            version: BASELINE_VERSION,
            created_at: unix_now(),
            total_at_baseline: findings.len(),
            findings,
        }
    }

    /// Load a baseline from a file
    pub fn load(path: &Path) -> Result<Self, BaselineError> {
        let file = fs::File::open(path)?;
        let reader = BufReader::new(file);
        let baseline: Self = serde_json::from_reader(reader)?;

        if baseline.version != BASELINE_VERSION {
            return Err(BaselineError::VersionMismatch);
        }

        Ok(baseline)
    }

    /// Save baseline to a file
    pub fn save(&self, path: &Path) -> Result<(), BaselineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Drop baselined groups from the results; results left with no groups
    /// disappear entirely.
    pub fn filter_new(&self, results: &[InspectionResult]) -> Vec<InspectionResult> {
        results
            .iter()
            .filter_map(|result| {
                let groups: Vec<_> = result
                    .groups
                    .iter()
                    .filter(|group| !self.is_baselined(&result.id, &group.identity))
                    .cloned()
                    .collect();
                if groups.is_empty() {
                    None
                } else {
                    Some(InspectionResult {
                        groups,
                        ..result.clone()
                    })
                }
            })
            .collect()
    }

    pub fn is_baselined(&self, inspection: &str, identity: &str) -> bool {
        self.findings
            .iter()
            .any(|fp| fp.inspection == inspection && fp.identity == identity)
    }

    /// Get statistics about baseline coverage
    pub fn stats(&self, results: &[InspectionResult]) -> BaselineStats {
        let mut baselined = 0;
        let mut new = 0;

        for result in results {
            for group in &result.groups {
                if self.is_baselined(&result.id, &group.identity) {
                    baselined += 1;
                } else {
                    new += 1;
                }
            }
        }

        BaselineStats {
            total_in_baseline: self.findings.len(),
            baselined_found: baselined,
            new_findings: new,
        }
    }
}

/// Statistics about baseline comparison
#[derive(Debug, Clone)]
pub struct BaselineStats {
    /// Total groups recorded in baseline
    pub total_in_baseline: usize,
    /// Current groups that match baseline
    pub baselined_found: usize,
    /// Groups not in baseline
    pub new_findings: usize,
}

impl std::fmt::Display for BaselineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} new findings ({} baselined, {} in baseline file)",
            self.new_findings, self.baselined_found, self.total_in_baseline
        )
    }
}

fn unix_now() -> u64 {
    use std::time::SystemTime;

    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
