use serde::{Serialize, Serializer};
use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use crate::warnings::{Severity, Warning};

/// Outcome of one [`crate::context::ValidationContext::validate`] call.
///
/// An incomplete report means network work was still outstanding; callers should validate again
/// after [`ValidationReport::suggested_wait`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub is_complete: bool,
    #[serde(rename = "suggested_wait_ms", serialize_with = "serialize_wait")]
    pub suggested_wait: Option<Duration>,
    /// Sorted by location, then id
    pub warnings: Vec<Warning>,
}

fn serialize_wait<S: Serializer>(wait: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(wait_ms(wait))
}

fn wait_ms(wait: &Option<Duration>) -> i64 {
    match wait {
        Some(wait) => i64::try_from(wait.as_millis()).unwrap_or(i64::MAX),
        None => -1,
    }
}

impl ValidationReport {
    pub fn new(is_complete: bool, suggested_wait: Option<Duration>, mut warnings: Vec<Warning>) -> Self {
        warnings.sort();
        ValidationReport {
            is_complete,
            suggested_wait: if is_complete { None } else { suggested_wait },
            warnings,
        }
    }

    /// Milliseconds to wait before validating again, `-1` when complete.
    pub fn suggested_wait_ms(&self) -> i64 {
        wait_ms(&self.suggested_wait)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn suggestion_count(&self) -> usize {
        self.count(Severity::Suggestion)
    }

    fn count(&self, severity: Severity) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.severity == severity)
            .count()
    }

    pub fn warnings_by_file(&self) -> BTreeMap<&str, Vec<&Warning>> {
        let mut grouped: BTreeMap<&str, Vec<&Warning>> = BTreeMap::new();
        for warning in self.warnings.iter() {
            grouped
                .entry(warning.location.relative_file_path.as_str())
                .or_default()
                .push(warning);
        }
        grouped
    }

    /// Warnings that disappeared and appeared since `previous`, counting duplicates.
    pub fn diff(&self, previous: &ValidationReport) -> (Vec<Warning>, Vec<Warning>) {
        let mut counts: HashMap<&Warning, isize> = HashMap::new();
        for warning in self.warnings.iter() {
            *counts.entry(warning).or_default() += 1;
        }
        for warning in previous.warnings.iter() {
            *counts.entry(warning).or_default() -= 1;
        }

        let mut removed = Vec::new();
        let mut added = Vec::new();
        for (warning, count) in counts {
            for _ in 0..count.unsigned_abs() {
                if count > 0 {
                    added.push(warning.clone());
                } else {
                    removed.push(warning.clone());
                }
            }
        }
        removed.sort();
        added.sort();
        (removed, added)
    }

    pub fn to_json(&self) -> Result<String, crate::error::XrefError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
