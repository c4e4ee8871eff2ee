// src/commands.rs

use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::config::EngineConfig;
use crate::db::properties::{self, import_documents, ImportSummary};
use crate::db::Database;
use crate::domain::evaluator::FilterEngine;
use crate::domain::filter_spec::{FilterSpec, InvalidFilterSpecError};
use crate::domain::view::PropertyList;
use crate::errors::ServerError;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{0} must hold a JSON array of documents or an object with a `properties` array")]
    Shape(PathBuf),

    #[error("invalid filter: {0}")]
    Filter(#[from] InvalidFilterSpecError),

    #[error(transparent)]
    Store(#[from] ServerError),

    #[error("cannot write output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Accepts either a bare array or `{ "properties": [...] }`.
fn documents(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(docs) => Some(docs),
        Value::Object(mut obj) => match obj.remove("properties") {
            Some(Value::Array(docs)) => Some(docs),
            _ => None,
        },
        _ => None,
    }
}

/// Loads a JSON file of listing documents into the store.
pub fn seed_from_file(db: &Database, path: &Path, replace: bool) -> Result<ImportSummary, CommandError> {
    let text = std::fs::read_to_string(path).map_err(|source| CommandError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| CommandError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let docs = documents(value).ok_or_else(|| CommandError::Shape(path.to_path_buf()))?;

    let summary = import_documents(db, &docs, replace)?;
    info!(
        file = %path.display(),
        inserted = summary.inserted,
        skipped = summary.skipped,
        replace,
        "Seeding completed"
    );

    Ok(summary)
}

/// Runs the engine over the store and returns the result list as JSON.
/// `query` uses the same keys as the search endpoint.
pub fn screen_store(
    db: &Database,
    engine: &FilterEngine,
    config: &EngineConfig,
    query: &str,
    include_approved: bool,
) -> Result<String, CommandError> {
    let spec = FilterSpec::from_query_string(query)?;
    let raws = if include_approved {
        properties::fetch_all(db)?
    } else {
        properties::fetch_pending(db)?
    };

    let outcome = engine.screen(&raws, &spec)?;
    info!(
        scanned = raws.len(),
        matched = outcome.eligible.len(),
        rejected = outcome.rejected.len(),
        "Screening completed"
    );

    let list = PropertyList::new(&outcome.eligible, &outcome.rejected, engine.classifier(), config);
    Ok(serde_json::to_string_pretty(&list)?)
}
