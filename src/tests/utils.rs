use crate::config::EngineConfig;
use crate::db::connection::{init_db, Database};
use crate::db::properties::import_documents;
use crate::domain::evaluator::FilterEngine;
use crate::router::{handle, AppState};
use astra::{Body, Response};
use http::{Method, Request};
use serde_json::{json, Value};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_DB: AtomicUsize = AtomicUsize::new(0);

/// Initialize a fresh test DB using the production schema. Each call gets its
/// own file, so tests can run in parallel.
pub fn init_test_db() -> Database {
    let n = NEXT_DB.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!(
        "water_screen_test_{}_{n}.sqlite3",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);

    let db = Database::new(path.to_string_lossy().into_owned());
    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));
    db
}

pub fn test_state() -> AppState {
    AppState::new(init_test_db(), EngineConfig::default(), FilterEngine::default())
}

/// Same listings as the bundled sample file, with fixed ids and ages.
pub fn seeded_state() -> AppState {
    let state = test_state();
    import_documents(&state.db, &sample_documents(), false).expect("Failed to seed");
    state
}

pub fn sample_documents() -> Vec<Value> {
    vec![
        json!({
            "id": "wa-1",
            "address": { "street": "123 Waterfront Drive", "city": "Seattle", "state": "WA", "zipCode": "98101" },
            "coordinates": { "type": "Point", "coordinates": [-122.3321, 47.6062] },
            "listingType": "on-market",
            "price": 750000,
            "waterAccess": { "hasMunicipalWater": false, "hasWell": true },
            "wastewaterAccess": { "hasMunicipalSewer": false, "hasSeptic": false },
            "createdAt": "2024-01-01T00:00:00.000Z"
        }),
        json!({
            "id": "az-1",
            "address": { "street": "456 Desert Road", "city": "Phoenix", "state": "AZ", "zipCode": "85001" },
            "coordinates": { "type": "Point", "coordinates": [-112.074, 33.4484] },
            "listingType": "off-market",
            "price": 450000,
            "waterAccess": false,
            "wastewaterAccess": false,
            "waterIssues": ["No Municipal Water"],
            "wastewaterIssues": ["No Septic System"],
            "createdAt": "2024-01-02T00:00:00.000Z"
        }),
        json!({
            "id": "mt-1",
            "address": { "state": "MT" },
            "listingType": "off-market",
            "price": 90000,
            "waterAccess": { "hasMunicipalWater": true },
            "wastewaterAccess": { "wastewaterIssues": ["Septic issues"] },
            "createdAt": "2024-01-03T00:00:00.000Z"
        }),
        json!({
            "id": "served-1",
            "address": { "state": "WA" },
            "listingType": "on-market",
            "price": 300000,
            "waterAccess": { "hasMunicipalWater": true },
            "wastewaterAccess": { "hasMunicipalSewer": true },
            "createdAt": "2024-01-04T00:00:00.000Z"
        }),
        json!({
            "id": "broken-1",
            "listingType": "on-market",
            "createdAt": "2024-01-05T00:00:00.000Z"
        }),
    ]
}

pub fn send(state: &AppState, method: Method, uri: &str) -> Response {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    handle(req, state).unwrap_or_else(crate::responses::error_to_response)
}

pub fn read_body(resp: Response) -> Vec<u8> {
    let mut body = Vec::new();
    resp.into_body().reader().read_to_end(&mut body).unwrap();
    body
}

pub fn read_json(resp: Response) -> Value {
    serde_json::from_slice(&read_body(resp)).expect("Response is not JSON")
}

pub fn ids(body: &Value) -> Vec<String> {
    body["properties"]
        .as_array()
        .expect("No properties array")
        .iter()
        .map(|p| p["id"].as_str().unwrap_or_default().to_string())
        .collect()
}
