// src/domain/evaluator.rs

use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::domain::challenges::ChallengeClassifier;
use crate::domain::filter_spec::{FilterSpec, InvalidFilterSpecError};
use crate::domain::predicates::{Candidate, PREDICATES};
use crate::domain::property::{normalize_all, MalformedRecordError, PropertyRecord};

/// Why a record was left out of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A user-specified predicate failed.
    Predicate(&'static str),
    /// The record has both full water and full wastewater service.
    Baseline,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Predicate(name) => write!(f, "failed `{name}` filter"),
            Rejection::Baseline => write!(f, "has full water and wastewater service"),
        }
    }
}

/// The tool only surfaces properties with an actionable water or wastewater
/// problem. This holds for every query, whatever the filter says.
pub fn baseline_eligible(record: &PropertyRecord) -> bool {
    record.has_no_water() || record.has_no_wastewater()
}

/// Normalization and evaluation of one batch of raw documents.
#[derive(Debug, Default)]
pub struct ScreeningOutcome {
    pub eligible: Vec<PropertyRecord>,
    pub rejected: Vec<MalformedRecordError>,
}

/// Pure and stateless apart from its read-only classifier, so one engine can
/// be shared by every request thread.
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    classifier: ChallengeClassifier,
}

impl FilterEngine {
    pub fn new(classifier: ChallengeClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &ChallengeClassifier {
        &self.classifier
    }

    /// Runs the predicates in order, then the baseline rule, stopping at the
    /// first failure.
    pub fn check(&self, record: &PropertyRecord, spec: &FilterSpec) -> Result<(), Rejection> {
        let candidate = Candidate::new(record, &self.classifier);

        if let Some(&(name, _)) = PREDICATES
            .iter()
            .find(|(_, predicate)| !predicate(&candidate, spec))
        {
            return Err(Rejection::Predicate(name));
        }

        if !baseline_eligible(record) {
            return Err(Rejection::Baseline);
        }

        Ok(())
    }

    /// Keeps the records that satisfy `spec` and the baseline rule, in input
    /// order. The filter is validated before any record is evaluated.
    pub fn evaluate<'r>(
        &self,
        records: &'r [PropertyRecord],
        spec: &FilterSpec,
    ) -> Result<Vec<&'r PropertyRecord>, InvalidFilterSpecError> {
        spec.validate()?;

        let kept = records
            .iter()
            .filter(|record| match self.check(record, spec) {
                Ok(()) => true,
                Err(reason) => {
                    debug!(id = %record.id, %reason, "Property filtered out");
                    false
                }
            })
            .collect();

        Ok(kept)
    }

    /// Normalizes raw documents and evaluates the valid ones. Malformed
    /// documents are reported in the outcome rather than failing the batch.
    pub fn screen(
        &self,
        raws: &[Value],
        spec: &FilterSpec,
    ) -> Result<ScreeningOutcome, InvalidFilterSpecError> {
        spec.validate()?;

        let batch = normalize_all(raws);
        let eligible = self
            .evaluate(&batch.records, spec)?
            .into_iter()
            .cloned()
            .collect();

        Ok(ScreeningOutcome {
            eligible,
            rejected: batch.errors,
        })
    }
}
