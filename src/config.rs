// src/config.rs

use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::challenges::ChallengeTable;

pub const ENV_DB_PATH: &str = "WATER_SCREEN_DB";
pub const ENV_ADDR: &str = "WATER_SCREEN_ADDR";
pub const ENV_WORKERS: &str = "WATER_SCREEN_WORKERS";
pub const ENV_CHALLENGE_TABLE: &str = "WATER_SCREEN_CHALLENGE_TABLE";
pub const ENV_MAP_LIMIT: &str = "WATER_SCREEN_MAP_LIMIT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {var}")]
    InvalidValue { var: &'static str, value: String },

    #[error("cannot read challenge table {path}: {source}")]
    ChallengeTableRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse challenge table {path}: {source}")]
    ChallengeTableParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("challenge table has {0} rule(s) with a blank issue or tag")]
    InvalidChallengeRules(usize),
}

/// Everything the engine and the API need to know about the product, passed
/// in explicitly instead of living in module-level constants.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub target_states: Vec<String>,
    pub assessor_urls: BTreeMap<String, String>,
    pub default_assessor_url: String,
    /// Price slider bounds offered to the UI.
    pub price_range_max: f64,
    pub price_range_default: (f64, f64),
    pub map_monthly_limit: i64,
    #[serde(skip)]
    pub challenge_table: ChallengeTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let assessor_urls = [
            ("WA", "https://www.kingcounty.gov/depts/assessor.aspx"),
            ("AZ", "https://www.maricopa.gov/1326/Assessor"),
            ("CA", "https://www.boe.ca.gov/proptaxes/"),
            ("CO", "https://www.colorado.gov/pacific/dola/property-tax"),
            ("ID", "https://tax.idaho.gov/i-1036.cfm"),
            ("MT", "https://mtrevenue.gov/property/"),
            ("NV", "https://www.washoecounty.us/assessor/"),
            ("NM", "https://www.tax.newmexico.gov/property-taxes/"),
            ("OR", "https://www.oregon.gov/dor/programs/property/Pages/default.aspx"),
            ("UT", "https://propertytax.utah.gov/"),
            ("WY", "https://revenue.wyo.gov/property-tax-division"),
        ]
        .into_iter()
        .map(|(state, url)| (state.to_string(), url.to_string()))
        .collect();

        Self {
            target_states: [
                "MT", "WY", "CO", "NM", "ID", "UT", "AZ", "NV", "CA", "OR", "WA",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            assessor_urls,
            default_assessor_url: "https://www.countyassessor.com".to_string(),
            price_range_max: 5_000_000.0,
            price_range_default: (0.0, 1_000_000.0),
            map_monthly_limit: 100_000,
            challenge_table: ChallengeTable::default(),
        }
    }
}

impl EngineConfig {
    /// County assessor link for a state, falling back to the generic one.
    pub fn assessor_url(&self, state: Option<&str>) -> &str {
        state
            .and_then(|s| self.assessor_urls.get(&s.to_uppercase()))
            .map(String::as_str)
            .unwrap_or(&self.default_assessor_url)
    }

    /// `(key, label)` pairs for the challenge checkboxes, one per tag the
    /// configured table can produce.
    pub fn challenge_vocabulary(&self) -> Vec<(String, String)> {
        self.challenge_table
            .tags()
            .into_iter()
            .map(|tag| {
                let label = tag.label();
                (tag.to_string(), label)
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    pub addr: SocketAddr,
    pub max_workers: usize,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from any variable source; `from_env` uses the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut engine = EngineConfig::default();

        let db_path = lookup(ENV_DB_PATH).unwrap_or_else(|| "water_screen.sqlite3".to_string());
        let addr = parse_var(&lookup, ENV_ADDR)?
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)));
        let max_workers = parse_var(&lookup, ENV_WORKERS)?.unwrap_or(8);

        if let Some(limit) = parse_var(&lookup, ENV_MAP_LIMIT)? {
            engine.map_monthly_limit = limit;
        }

        if let Some(path) = lookup(ENV_CHALLENGE_TABLE) {
            engine.challenge_table = load_challenge_table(PathBuf::from(path))?;
        }

        Ok(Self {
            db_path,
            addr,
            max_workers,
            engine,
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}

pub fn load_challenge_table(path: PathBuf) -> Result<ChallengeTable, ConfigError> {
    let json = std::fs::read_to_string(&path).map_err(|source| ConfigError::ChallengeTableRead {
        path: path.clone(),
        source,
    })?;
    let table = ChallengeTable::from_json(&json)
        .map_err(|source| ConfigError::ChallengeTableParse { path, source })?;

    let invalid = table.invalid_rules().count();
    if invalid > 0 {
        return Err(ConfigError::InvalidChallengeRules(invalid));
    }

    Ok(table)
}
