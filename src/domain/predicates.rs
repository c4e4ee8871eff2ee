// src/domain/predicates.rs

use std::cell::OnceCell;
use std::collections::BTreeSet;

use crate::domain::challenges::{ChallengeClassifier, ChallengeTag};
use crate::domain::filter_spec::{FilterSpec, ListingTypeFilter};
use crate::domain::property::PropertyRecord;

/// A record under evaluation. The challenge set is derived on first use, so
/// a record that fails an earlier predicate never pays for classification.
pub struct Candidate<'a> {
    record: &'a PropertyRecord,
    classifier: &'a ChallengeClassifier,
    challenges: OnceCell<BTreeSet<ChallengeTag>>,
}

impl<'a> Candidate<'a> {
    pub fn new(record: &'a PropertyRecord, classifier: &'a ChallengeClassifier) -> Self {
        Self {
            record,
            classifier,
            challenges: OnceCell::new(),
        }
    }

    pub fn record(&self) -> &'a PropertyRecord {
        self.record
    }

    pub fn challenges(&self) -> &BTreeSet<ChallengeTag> {
        self.challenges
            .get_or_init(|| self.classifier.derive_challenges(self.record))
    }
}

/// Every predicate reads one filter dimension and nothing else.
pub type Predicate = fn(&Candidate<'_>, &FilterSpec) -> bool;

/// The predicates in evaluation order, by name.
pub const PREDICATES: [(&str, Predicate); 6] = [
    ("state", state_matches),
    ("price", price_in_range),
    ("listing_type", listing_type_matches),
    ("no_water_access", no_water_access_satisfied),
    ("no_wastewater_access", no_wastewater_access_satisfied),
    ("challenges", challenges_satisfied),
];

pub fn state_matches(candidate: &Candidate<'_>, spec: &FilterSpec) -> bool {
    match spec.state_code() {
        None => true,
        Some(code) => candidate
            .record()
            .address
            .state
            .as_deref()
            .is_some_and(|state| state.eq_ignore_ascii_case(code)),
    }
}

pub fn price_in_range(candidate: &Candidate<'_>, spec: &FilterSpec) -> bool {
    spec.price_range.contains(candidate.record().price)
}

pub fn listing_type_matches(candidate: &Candidate<'_>, spec: &FilterSpec) -> bool {
    match spec.listing_type {
        ListingTypeFilter::All => true,
        ListingTypeFilter::Only(wanted) => candidate.record().listing_type == wanted,
    }
}

pub fn no_water_access_satisfied(candidate: &Candidate<'_>, spec: &FilterSpec) -> bool {
    !spec.require_no_water_access || candidate.record().has_no_water()
}

pub fn no_wastewater_access_satisfied(candidate: &Candidate<'_>, spec: &FilterSpec) -> bool {
    !spec.require_no_wastewater_access || candidate.record().has_no_wastewater()
}

/// ALL of the required tags must be present.
pub fn challenges_satisfied(candidate: &Candidate<'_>, spec: &FilterSpec) -> bool {
    spec.required_challenges.is_empty()
        || spec.required_challenges.is_subset(candidate.challenges())
}
