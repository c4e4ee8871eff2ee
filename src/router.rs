use crate::config::EngineConfig;
use crate::db::{map_usage, properties, Database};
use crate::domain::evaluator::FilterEngine;
use crate::domain::filter_spec::FilterSpec;
use crate::domain::geojson::feature_collection;
use crate::domain::property::{normalize, normalize_all};
use crate::domain::view::{PropertyList, PropertyView, RejectedDocument};
use crate::errors::ServerError;
use crate::responses::{json_response, ResultResp};
use crate::spreadsheets::export_properties_xlsx;
use astra::Request;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Everything a worker needs to answer a request. Shared read-only.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: FilterEngine,
    pub config: EngineConfig,
}

impl AppState {
    pub fn new(db: Database, config: EngineConfig, engine: FilterEngine) -> Self {
        Self { db, engine, config }
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

pub fn handle(req: Request, state: &AppState) -> ResultResp {
    let method = req.method().as_str();
    let path = req.uri().path().trim_end_matches('/');
    let query = req.uri().query().unwrap_or("");
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        ("GET", []) => json_response(200, &json!({ "message": "Water Real Estate Fund Agent API" })),
        ("GET", ["api", "config"]) => get_config(state),

        ("GET", ["api", "properties"]) => list_pending(state),
        ("GET", ["api", "properties", "search"]) => search(state, query),
        ("GET", ["api", "properties", "geojson"]) => search_geojson(state, query),
        ("GET", ["api", "properties", "export.xlsx"]) => export_xlsx(state, query),
        ("GET", ["api", "properties", id]) => get_property(state, id),
        ("PUT", ["api", "properties", id, "approve"]) => approve_property(state, id),
        ("DELETE", ["api", "properties", id]) => delete_property(state, id),

        ("GET", ["api", "map", "usage"]) => map_usage_summary(state),
        ("POST", ["api", "map", "load"]) => record_map_load(state),

        _ => Err(ServerError::NotFound),
    }
}

fn get_config(state: &AppState) -> ResultResp {
    let challenges: Vec<Value> = state
        .config
        .challenge_vocabulary()
        .into_iter()
        .map(|(key, label)| json!({ "key": key, "label": label }))
        .collect();

    let mut body = serde_json::to_value(&state.config).map_err(|_| ServerError::InternalError)?;
    body["challenges"] = Value::Array(challenges);

    json_response(200, &body)
}

/// Every pending document, normalized but not filtered.
fn list_pending(state: &AppState) -> ResultResp {
    let raws = properties::fetch_pending(&state.db)?;
    let batch = normalize_all(&raws);

    let list = PropertyList::new(
        &batch.records,
        &batch.errors,
        state.engine.classifier(),
        &state.config,
    );
    json_response(200, &list)
}

fn search(state: &AppState, query: &str) -> ResultResp {
    let spec = FilterSpec::from_query_string(query)?;
    let raws = properties::fetch_pending(&state.db)?;
    let outcome = state.engine.screen(&raws, &spec)?;

    info!(
        matched = outcome.eligible.len(),
        rejected = outcome.rejected.len(),
        "Property search"
    );

    let list = PropertyList::new(
        &outcome.eligible,
        &outcome.rejected,
        state.engine.classifier(),
        &state.config,
    );
    json_response(200, &list)
}

fn search_geojson(state: &AppState, query: &str) -> ResultResp {
    let spec = FilterSpec::from_query_string(query)?;
    let raws = properties::fetch_pending(&state.db)?;
    let outcome = state.engine.screen(&raws, &spec)?;

    json_response(
        200,
        &feature_collection(&outcome.eligible, state.engine.classifier()),
    )
}

fn export_xlsx(state: &AppState, query: &str) -> ResultResp {
    let spec = FilterSpec::from_query_string(query)?;
    let raws = properties::fetch_pending(&state.db)?;
    let outcome = state.engine.screen(&raws, &spec)?;

    let views: Vec<PropertyView<'_>> = outcome
        .eligible
        .iter()
        .map(|record| PropertyView::new(record, state.engine.classifier(), &state.config))
        .collect();

    info!(rows = views.len(), "Exporting properties workbook");
    export_properties_xlsx(&views, spec.state_code())
}

/// A single stored document. One that no longer normalizes is still returned,
/// raw, with the reason attached.
fn property_body(state: &AppState, raw: Value) -> ResultResp {
    match normalize(&raw) {
        Ok(record) => json_response(
            200,
            &PropertyView::new(&record, state.engine.classifier(), &state.config),
        ),
        Err(err) => {
            warn!(error = %err, "Stored property does not normalize");
            json_response(
                200,
                &json!({ "document": raw, "rejected": RejectedDocument::from(&err) }),
            )
        }
    }
}

fn get_property(state: &AppState, id: &str) -> ResultResp {
    let raw = properties::get_by_id(&state.db, id)?.ok_or(ServerError::NotFound)?;
    property_body(state, raw)
}

fn approve_property(state: &AppState, id: &str) -> ResultResp {
    let raw = properties::approve(&state.db, id)?;
    property_body(state, raw)
}

fn delete_property(state: &AppState, id: &str) -> ResultResp {
    properties::delete(&state.db, id)?;
    json_response(200, &json!({ "message": "Property deleted", "id": id }))
}

fn map_usage_summary(state: &AppState) -> ResultResp {
    let limit = state.config.map_monthly_limit;
    let usage = state
        .db
        .with_conn(|conn| map_usage::monthly_usage(conn, now_unix(), limit))?;

    json_response(200, &usage)
}

/// Loads past the monthly limit are still recorded; the client decides what
/// to do with the count.
fn record_map_load(state: &AppState) -> ResultResp {
    let limit = state.config.map_monthly_limit;
    let usage = state.db.with_conn(|conn| {
        let now = now_unix();
        map_usage::record_map_load(conn, now)?;
        map_usage::monthly_usage(conn, now, limit)
    })?;

    if usage.exhausted() {
        warn!(total = usage.total_loads, limit, "Monthly map load limit reached");
    }

    json_response(200, &json!({ "success": true, "remainingLoads": usage.remaining_loads }))
}
