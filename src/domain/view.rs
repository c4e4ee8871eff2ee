// src/domain/view.rs

use serde::Serialize;
use std::collections::BTreeSet;

use crate::config::EngineConfig;
use crate::domain::challenges::{ChallengeClassifier, ChallengeTag};
use crate::domain::property::{MalformedRecordError, PropertyRecord};

/// A record as the API hands it out: the canonical fields plus what is derived
/// from them on the way out. Nothing here is ever persisted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyView<'a> {
    #[serde(flatten)]
    pub record: &'a PropertyRecord,
    pub challenges: BTreeSet<ChallengeTag>,
    pub assessor_url: &'a str,
}

impl<'a> PropertyView<'a> {
    pub fn new(
        record: &'a PropertyRecord,
        classifier: &ChallengeClassifier,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            record,
            challenges: classifier.derive_challenges(record),
            assessor_url: config.assessor_url(record.address.state.as_deref()),
        }
    }
}

/// A document that was skipped, as reported next to a result set.
#[derive(Debug, Serialize)]
pub struct RejectedDocument {
    pub index: Option<usize>,
    pub id: Option<String>,
    pub reason: String,
}

impl From<&MalformedRecordError> for RejectedDocument {
    fn from(err: &MalformedRecordError) -> Self {
        Self {
            index: err.index,
            id: err.id.clone(),
            reason: err.reason.to_string(),
        }
    }
}

/// Body of every list endpoint.
#[derive(Debug, Serialize)]
pub struct PropertyList<'a> {
    pub total: usize,
    pub properties: Vec<PropertyView<'a>>,
    pub rejected: Vec<RejectedDocument>,
}

impl<'a> PropertyList<'a> {
    pub fn new<I>(
        records: I,
        errors: &[MalformedRecordError],
        classifier: &ChallengeClassifier,
        config: &'a EngineConfig,
    ) -> Self
    where
        I: IntoIterator<Item = &'a PropertyRecord>,
    {
        let properties: Vec<_> = records
            .into_iter()
            .map(|record| PropertyView::new(record, classifier, config))
            .collect();

        Self {
            total: properties.len(),
            properties,
            rejected: errors.iter().map(RejectedDocument::from).collect(),
        }
    }
}
