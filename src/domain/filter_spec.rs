// src/domain/filter_spec.rs

use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::domain::challenges::ChallengeTag;
use crate::domain::property::ListingType;

/// A filter that cannot be evaluated. Reported before any record is looked at.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidFilterSpecError {
    #[error("price range minimum {min} is greater than maximum {max}")]
    InvertedPriceRange { min: f64, max: f64 },

    #[error("invalid price bound `{0}`")]
    InvalidPriceBound(String),

    #[error("unknown listing type `{0}`")]
    UnknownListingType(String),

    #[error("invalid value `{value}` for `{name}`")]
    InvalidFlag { name: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListingTypeFilter {
    #[default]
    All,
    Only(ListingType),
}

impl ListingTypeFilter {
    /// Accepts `all`, `on-market`, `off-market`, and the UI alias `listed`.
    pub fn parse(raw: &str) -> Result<Self, InvalidFilterSpecError> {
        let value = raw.trim().to_ascii_lowercase();
        match value.as_str() {
            "" | "all" => Ok(ListingTypeFilter::All),
            "listed" => Ok(ListingTypeFilter::Only(ListingType::OnMarket)),
            other => ListingType::parse(other)
                .map(ListingTypeFilter::Only)
                .ok_or_else(|| InvalidFilterSpecError::UnknownListingType(raw.to_string())),
        }
    }
}

/// Inclusive bounds. An unset bound is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl PriceRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, price: f64) -> bool {
        self.min.map_or(true, |min| min <= price) && self.max.map_or(true, |max| price <= max)
    }

    fn validate(&self) -> Result<(), InvalidFilterSpecError> {
        for bound in [self.min, self.max].into_iter().flatten() {
            if !bound.is_finite() || bound < 0.0 {
                return Err(InvalidFilterSpecError::InvalidPriceBound(bound.to_string()));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(InvalidFilterSpecError::InvertedPriceRange { min, max });
            }
        }
        Ok(())
    }
}

/// What the caller wants to see. `FilterSpec::default()` restricts nothing,
/// although the baseline eligibility rule still applies at evaluation.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub state: Option<String>,
    pub price_range: PriceRange,
    pub listing_type: ListingTypeFilter,
    pub require_no_water_access: bool,
    pub require_no_wastewater_access: bool,
    pub required_challenges: BTreeSet<ChallengeTag>,
}

impl FilterSpec {
    pub fn with_state(mut self, state: &str) -> Self {
        let state = state.trim();
        self.state = (!state.is_empty()).then(|| state.to_uppercase());
        self
    }

    pub fn with_price_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.price_range = PriceRange::new(min, max);
        self
    }

    pub fn with_listing_type(mut self, listing_type: ListingTypeFilter) -> Self {
        self.listing_type = listing_type;
        self
    }

    pub fn requiring_no_water_access(mut self) -> Self {
        self.require_no_water_access = true;
        self
    }

    pub fn requiring_no_wastewater_access(mut self) -> Self {
        self.require_no_wastewater_access = true;
        self
    }

    pub fn with_challenge(mut self, tag: &str) -> Self {
        if let Some(tag) = ChallengeTag::new(tag) {
            self.required_challenges.insert(tag);
        }
        self
    }

    /// The state restriction in effect, if any. Blank means none.
    pub fn state_code(&self) -> Option<&str> {
        self.state
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn validate(&self) -> Result<(), InvalidFilterSpecError> {
        self.price_range.validate()
    }

    /// Builds a spec from an `application/x-www-form-urlencoded` query string.
    pub fn from_query_string(query: &str) -> Result<Self, InvalidFilterSpecError> {
        Self::from_query_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    /// Recognised keys: `state`, `minPrice`, `maxPrice`, `priceRange=min,max`,
    /// `listingType` (or `propertyType`), `noWaterAccess`, `noWastewaterAccess`,
    /// and `challenges` (comma separated, may repeat). Others are ignored.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Result<Self, InvalidFilterSpecError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut spec = FilterSpec::default();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "state" => spec = spec.with_state(value),
                "minPrice" => spec.price_range.min = parse_bound(value)?,
                "maxPrice" => spec.price_range.max = parse_bound(value)?,
                "priceRange" => {
                    let (min, max) = value.split_once(',').ok_or_else(|| {
                        InvalidFilterSpecError::InvalidPriceBound(value.to_string())
                    })?;
                    spec.price_range = PriceRange::new(parse_bound(min)?, parse_bound(max)?);
                }
                "listingType" | "propertyType" => {
                    spec.listing_type = ListingTypeFilter::parse(value)?
                }
                "noWaterAccess" => spec.require_no_water_access = parse_flag(key, value)?,
                "noWastewaterAccess" => {
                    spec.require_no_wastewater_access = parse_flag(key, value)?
                }
                "challenges" | "challenge" => {
                    spec.required_challenges
                        .extend(value.split(',').filter_map(ChallengeTag::new));
                }
                _ => {}
            }
        }

        spec.validate()?;
        Ok(spec)
    }
}

fn parse_bound(raw: &str) -> Result<Option<f64>, InvalidFilterSpecError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| InvalidFilterSpecError::InvalidPriceBound(raw.to_string()))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, InvalidFilterSpecError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "" | "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(InvalidFilterSpecError::InvalidFlag {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}
