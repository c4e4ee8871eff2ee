use crate::config::EngineConfig;
use crate::db::properties::import_documents;
use crate::domain::challenges::{ChallengeClassifier, ChallengeTable};
use crate::domain::evaluator::FilterEngine;
use crate::responses::xlsx::XLSX_CONTENT_TYPE;
use crate::router::AppState;
use crate::tests::utils::{
    ids, init_test_db, read_body, read_json, seeded_state, send, test_state,
};
use http::Method;
use serde_json::json;

#[test]
fn home_returns_banner() {
    let state = test_state();
    let resp = send(&state, Method::GET, "/");

    assert_eq!(resp.status(), 200);
    assert_eq!(
        read_json(resp)["message"],
        "Water Real Estate Fund Agent API"
    );
}

#[test]
fn unknown_route_is_json_404() {
    let state = test_state();
    let resp = send(&state, Method::GET, "/nope");

    assert_eq!(resp.status(), 404);
    assert_eq!(
        resp.headers().get("Content-Type").unwrap(),
        "application/json"
    );
    assert_eq!(read_json(resp)["error"], "Not Found");
}

#[test]
fn config_exposes_vocabulary_and_slider_defaults() {
    let state = test_state();
    let body = read_json(send(&state, Method::GET, "/api/config"));

    assert_eq!(body["targetStates"].as_array().unwrap().len(), 11);
    assert_eq!(body["priceRangeMax"], 5_000_000.0);
    assert_eq!(body["mapMonthlyLimit"], 100_000);
    assert_eq!(body["challenges"].as_array().unwrap().len(), 5);
    assert_eq!(body["challenges"][0]["key"], "VERY_LOW_SUPPLY");
    assert_eq!(body["assessorUrls"]["AZ"], "https://www.maricopa.gov/1326/Assessor");
}

#[test]
fn custom_challenge_table_drives_vocabulary_and_search() {
    let table = ChallengeTable::from_json(
        r#"[{ "source": "environmental", "issue": "Wildfire zone", "tag": "FIRE_RISK" }]"#,
    )
    .unwrap();
    let engine = FilterEngine::new(ChallengeClassifier::new(&table));
    let config = EngineConfig {
        challenge_table: table,
        ..EngineConfig::default()
    };
    let state = AppState::new(init_test_db(), config, engine);

    let body = read_json(send(&state, Method::GET, "/api/config"));
    assert_eq!(
        body["challenges"],
        json!([{ "key": "FIRE_RISK", "label": "Fire Risk" }])
    );

    import_documents(
        &state.db,
        &[
            json!({ "id": "dry", "listingType": "off-market", "price": 1,
                    "waterAccess": false, "environmentalIssues": ["Wildfire zone"] }),
            json!({ "id": "wet", "listingType": "off-market", "price": 1,
                    "waterAccess": false, "environmentalIssues": ["Flood plain"] }),
        ],
        false,
    )
    .unwrap();

    let body = read_json(send(
        &state,
        Method::GET,
        "/api/properties/search?challenges=fire-risk",
    ));
    assert_eq!(ids(&body), ["dry"]);
}

#[test]
fn listing_is_unfiltered_newest_first_and_reports_bad_documents() {
    let state = seeded_state();
    let body = read_json(send(&state, Method::GET, "/api/properties"));

    // The fully served record is listed here; only searches apply the screen.
    assert_eq!(ids(&body), ["served-1", "mt-1", "az-1", "wa-1"]);
    assert_eq!(body["total"], 4);

    let rejected = body["rejected"].as_array().unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["id"], "broken-1");
    assert_eq!(rejected[0]["reason"], "missing required field `price`");
}

#[test]
fn search_without_filters_applies_the_baseline() {
    let state = seeded_state();
    let body = read_json(send(&state, Method::GET, "/api/properties/search"));

    assert_eq!(ids(&body), ["mt-1", "az-1", "wa-1"]);
}

#[test]
fn search_narrows_by_each_dimension() {
    let state = seeded_state();
    let search = |query: &str| {
        ids(&read_json(send(
            &state,
            Method::GET,
            &format!("/api/properties/search?{query}"),
        )))
    };

    assert_eq!(search("state=WA"), ["wa-1"]);
    assert_eq!(search("priceRange=0,500000"), ["mt-1", "az-1"]);
    assert_eq!(search("listingType=listed"), ["wa-1"]);
    assert_eq!(search("noWaterAccess=true"), ["az-1"]);
    assert_eq!(search("noWastewaterAccess=true"), ["mt-1", "az-1", "wa-1"]);
    assert_eq!(search("challenges=SEPTIC_SPATIAL_CHALLENGES"), ["az-1"]);
    assert_eq!(
        search("challenges=Septic%20Environmental%20Challenges&maxPrice=100000"),
        ["mt-1"]
    );
    assert!(search("state=TX").is_empty());
}

#[test]
fn search_views_carry_derived_fields() {
    let state = seeded_state();
    let body = read_json(send(&state, Method::GET, "/api/properties/search?state=AZ"));
    let az = &body["properties"][0];

    assert_eq!(az["assessorUrl"], "https://www.maricopa.gov/1326/Assessor");
    assert_eq!(
        az["challenges"],
        serde_json::json!(["NO_DRINKING_WATER_AVAILABLE", "SEPTIC_SPATIAL_CHALLENGES"])
    );
    assert_eq!(az["coordinates"]["type"], "Point");
}

#[test]
fn invalid_filters_are_rejected_before_evaluation() {
    let state = seeded_state();

    for query in [
        "minPrice=500000&maxPrice=100",
        "minPrice=cheap",
        "listingType=auction",
        "noWaterAccess=maybe",
    ] {
        let resp = send(
            &state,
            Method::GET,
            &format!("/api/properties/search?{query}"),
        );
        assert_eq!(resp.status(), 400, "{query} should be a bad request");
        assert!(read_json(resp)["error"].is_string());
    }
}

#[test]
fn geojson_omits_records_without_coordinates() {
    let state = seeded_state();
    let body = read_json(send(&state, Method::GET, "/api/properties/geojson"));

    assert_eq!(body["type"], "FeatureCollection");
    let features = body["features"].as_array().unwrap();
    let feature_ids: Vec<_> = features.iter().map(|f| f["id"].as_str().unwrap()).collect();
    assert_eq!(feature_ids, ["az-1", "wa-1"]);
}

#[test]
fn geojson_honours_filters() {
    let state = seeded_state();
    let body = read_json(send(
        &state,
        Method::GET,
        "/api/properties/geojson?listingType=off-market",
    ));

    assert_eq!(body["features"].as_array().unwrap().len(), 1);
    assert_eq!(body["features"][0]["properties"]["state"], "AZ");
}

#[test]
fn export_returns_a_workbook() {
    let state = seeded_state();
    let resp = send(&state, Method::GET, "/api/properties/export.xlsx?state=wa");

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("Content-Type").unwrap(), XLSX_CONTENT_TYPE);
    assert_eq!(
        resp.headers().get("Content-Disposition").unwrap(),
        "attachment; filename=\"properties_wa.xlsx\""
    );

    let body = read_body(resp);
    assert_eq!(&body[..2], b"PK");
}
