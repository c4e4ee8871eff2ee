// src/domain/challenges.rs

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::warn;

use crate::domain::property::PropertyRecord;

/// A qualitative label for a water, wastewater or environmental deficiency.
///
/// Tags are canonical upper snake case, so `"Very Low Supply"`,
/// `"very-low-supply"` and `"VERY_LOW_SUPPLY"` all name the same tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ChallengeTag(String);

impl ChallengeTag {
    pub const VERY_LOW_SUPPLY: &'static str = "VERY_LOW_SUPPLY";
    pub const SEASONALLY_UNAVAILABLE_DRINKING_WATER: &'static str =
        "SEASONALLY_UNAVAILABLE_DRINKING_WATER";
    pub const SEPTIC_ENVIRONMENTAL_CHALLENGES: &'static str = "SEPTIC_ENVIRONMENTAL_CHALLENGES";
    pub const SEPTIC_SPATIAL_CHALLENGES: &'static str = "SEPTIC_SPATIAL_CHALLENGES";
    pub const NO_DRINKING_WATER_AVAILABLE: &'static str = "NO_DRINKING_WATER_AVAILABLE";

    pub fn new(raw: &str) -> Option<Self> {
        let canonical: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();

        (!canonical.is_empty()).then_some(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display label: the built-in one when known, else the key in title case.
    pub fn label(&self) -> String {
        if let Some((_, label)) = KNOWN_CHALLENGES.iter().find(|(key, _)| *key == self.0) {
            return label.to_string();
        }

        self.0
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let lower = word.to_lowercase();
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }
}

impl fmt::Display for ChallengeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The built-in vocabulary with display labels, in UI order.
pub const KNOWN_CHALLENGES: [(&str, &str); 5] = [
    (ChallengeTag::VERY_LOW_SUPPLY, "Very Low Supply"),
    (
        ChallengeTag::SEASONALLY_UNAVAILABLE_DRINKING_WATER,
        "Seasonally Unavailable Drinking Water",
    ),
    (
        ChallengeTag::SEPTIC_ENVIRONMENTAL_CHALLENGES,
        "Septic Environmental Challenges",
    ),
    (
        ChallengeTag::SEPTIC_SPATIAL_CHALLENGES,
        "Septic Spatial Challenges",
    ),
    (
        ChallengeTag::NO_DRINKING_WATER_AVAILABLE,
        "No Drinking Water Available",
    ),
];

/// Which raw field a rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSource {
    Water,
    Wastewater,
    Environmental,
    /// Facts derived from the access booleans, see the `CONDITION_*` keys.
    Condition,
}

pub const CONDITION_NO_WATER_ACCESS: &str = "no-water-access";
pub const CONDITION_NO_WASTEWATER_ACCESS: &str = "no-wastewater-access";
pub const CONDITION_NO_WATER_RIGHTS: &str = "no-water-rights";

/// One row of the issue-string to tag table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeRule {
    pub source: IssueSource,
    pub issue: String,
    pub tag: String,
}

impl ChallengeRule {
    fn new(source: IssueSource, issue: &str, tag: &str) -> Self {
        Self {
            source,
            issue: issue.to_string(),
            tag: tag.to_string(),
        }
    }
}

/// The mapping from raw issue strings to challenge tags, supplied as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeTable {
    pub rules: Vec<ChallengeRule>,
}

impl Default for ChallengeTable {
    fn default() -> Self {
        use IssueSource::*;

        Self {
            rules: vec![
                ChallengeRule::new(Condition, CONDITION_NO_WATER_ACCESS, ChallengeTag::NO_DRINKING_WATER_AVAILABLE),
                ChallengeRule::new(Water, "No Municipal Water", ChallengeTag::NO_DRINKING_WATER_AVAILABLE),
                ChallengeRule::new(Water, "No Well Access", ChallengeTag::NO_DRINKING_WATER_AVAILABLE),
                ChallengeRule::new(Environmental, "Water Quality Issues", ChallengeTag::NO_DRINKING_WATER_AVAILABLE),
                ChallengeRule::new(Water, "Low yield", ChallengeTag::VERY_LOW_SUPPLY),
                ChallengeRule::new(Environmental, "Water scarcity", ChallengeTag::VERY_LOW_SUPPLY),
                ChallengeRule::new(Environmental, "Drought conditions", ChallengeTag::VERY_LOW_SUPPLY),
                ChallengeRule::new(Water, "Seasonal", ChallengeTag::SEASONALLY_UNAVAILABLE_DRINKING_WATER),
                ChallengeRule::new(Environmental, "Water restrictions", ChallengeTag::SEASONALLY_UNAVAILABLE_DRINKING_WATER),
                ChallengeRule::new(Wastewater, "Septic issues", ChallengeTag::SEPTIC_ENVIRONMENTAL_CHALLENGES),
                ChallengeRule::new(Wastewater, "No connection available", ChallengeTag::SEPTIC_SPATIAL_CHALLENGES),
                ChallengeRule::new(Wastewater, "No Septic System", ChallengeTag::SEPTIC_SPATIAL_CHALLENGES),
            ],
        }
    }
}

impl ChallengeTable {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Every distinct tag the table can produce. Built-in tags come first in
    /// UI order, the rest follow sorted by key.
    pub fn tags(&self) -> Vec<ChallengeTag> {
        let present: BTreeSet<ChallengeTag> = self
            .rules
            .iter()
            .filter_map(|rule| ChallengeTag::new(&rule.tag))
            .collect();

        let known = KNOWN_CHALLENGES
            .iter()
            .filter_map(|(key, _)| present.iter().find(|tag| tag.as_str() == *key))
            .cloned();
        let extra = present
            .iter()
            .filter(|tag| !KNOWN_CHALLENGES.iter().any(|(key, _)| tag.as_str() == *key))
            .cloned();

        known.chain(extra).collect()
    }

    /// Rules whose tag is blank and can never match anything.
    pub fn invalid_rules(&self) -> impl Iterator<Item = &ChallengeRule> {
        self.rules
            .iter()
            .filter(|rule| ChallengeTag::new(&rule.tag).is_none() || rule.issue.trim().is_empty())
    }
}

fn issue_key(issue: &str) -> String {
    issue.trim().to_lowercase()
}

/// Derives a record's challenge set from its raw fields.
///
/// The classifier only ever looks rows up in its table: adding a category is a
/// table change, never a code change. Unmapped issue strings are ignored.
#[derive(Debug, Clone)]
pub struct ChallengeClassifier {
    lookup: HashMap<(IssueSource, String), Vec<ChallengeTag>>,
}

impl ChallengeClassifier {
    pub fn new(table: &ChallengeTable) -> Self {
        let mut lookup: HashMap<(IssueSource, String), Vec<ChallengeTag>> = HashMap::new();

        for rule in &table.rules {
            let Some(tag) = ChallengeTag::new(&rule.tag) else {
                warn!(issue = %rule.issue, "Skipping challenge rule with blank tag");
                continue;
            };
            let tags = lookup
                .entry((rule.source, issue_key(&rule.issue)))
                .or_default();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        Self { lookup }
    }

    pub fn derive_challenges(&self, record: &PropertyRecord) -> BTreeSet<ChallengeTag> {
        let water = &record.water_access;
        let wastewater = &record.wastewater_access;

        let conditions = [
            (record.has_no_water(), CONDITION_NO_WATER_ACCESS),
            (record.has_no_wastewater(), CONDITION_NO_WASTEWATER_ACCESS),
            (!water.has_water_rights, CONDITION_NO_WATER_RIGHTS),
        ]
        .into_iter()
        .filter(|(holds, _)| *holds)
        .map(|(_, key)| (IssueSource::Condition, key));

        let issues = water
            .water_issues
            .iter()
            .map(|i| (IssueSource::Water, i.as_str()))
            .chain(
                wastewater
                    .wastewater_issues
                    .iter()
                    .map(|i| (IssueSource::Wastewater, i.as_str())),
            )
            .chain(
                record
                    .environmental_issues
                    .iter()
                    .map(|i| (IssueSource::Environmental, i.as_str())),
            );

        conditions
            .chain(issues)
            .filter_map(|(source, issue)| self.lookup.get(&(source, issue_key(issue))))
            .flatten()
            .cloned()
            .collect()
    }
}

impl Default for ChallengeClassifier {
    fn default() -> Self {
        Self::new(&ChallengeTable::default())
    }
}
