use crate::db::properties;
use crate::tests::utils::{ids, read_json, seeded_state, send, test_state};
use http::Method;
use serde_json::json;

#[test]
fn get_one_returns_the_view() {
    let state = seeded_state();
    let resp = send(&state, Method::GET, "/api/properties/wa-1");

    assert_eq!(resp.status(), 200);
    let body = read_json(resp);
    assert_eq!(body["id"], "wa-1");
    assert_eq!(body["approved"], false);
    assert_eq!(body["address"]["city"], "Seattle");
    assert_eq!(
        body["assessorUrl"],
        "https://www.kingcounty.gov/depts/assessor.aspx"
    );
}

#[test]
fn get_one_reports_a_malformed_document() {
    let state = seeded_state();
    let body = read_json(send(&state, Method::GET, "/api/properties/broken-1"));

    assert_eq!(body["rejected"]["id"], "broken-1");
    assert_eq!(body["document"]["listingType"], "on-market");
}

#[test]
fn missing_property_is_404() {
    let state = test_state();

    for (method, uri) in [
        (Method::GET, "/api/properties/ghost"),
        (Method::PUT, "/api/properties/ghost/approve"),
        (Method::DELETE, "/api/properties/ghost"),
    ] {
        let resp = send(&state, method.clone(), uri);
        assert_eq!(resp.status(), 404, "{method} {uri}");
    }
}

#[test]
fn approving_removes_it_from_the_pending_list() {
    let state = seeded_state();

    let resp = send(&state, Method::PUT, "/api/properties/az-1/approve");
    assert_eq!(resp.status(), 200);
    assert_eq!(read_json(resp)["approved"], true);

    let pending = read_json(send(&state, Method::GET, "/api/properties"));
    assert!(!ids(&pending).contains(&"az-1".to_string()));

    let search = read_json(send(&state, Method::GET, "/api/properties/search"));
    assert_eq!(ids(&search), ["mt-1", "wa-1"]);

    // Still reachable directly.
    let one = read_json(send(&state, Method::GET, "/api/properties/az-1"));
    assert_eq!(one["approved"], true);
}

#[test]
fn deleting_removes_it_everywhere() {
    let state = seeded_state();

    let resp = send(&state, Method::DELETE, "/api/properties/mt-1");
    assert_eq!(resp.status(), 200);
    assert_eq!(read_json(resp)["id"], "mt-1");

    assert_eq!(
        send(&state, Method::GET, "/api/properties/mt-1").status(),
        404
    );
    assert_eq!(
        send(&state, Method::DELETE, "/api/properties/mt-1").status(),
        404
    );
}

#[test]
fn import_assigns_ids_and_replace_clears_the_store() {
    let state = seeded_state();

    let summary = properties::import_documents(
        &state.db,
        &[
            json!({ "listingType": "off-market", "price": 1, "waterAccess": false }),
            json!("not a document"),
        ],
        true,
    )
    .unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.skipped, 1);

    let body = read_json(send(&state, Method::GET, "/api/properties"));
    let listed = ids(&body);
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].is_empty());
    assert!(body["rejected"].as_array().unwrap().is_empty());
}

#[test]
fn legacy_mongo_ids_are_kept() {
    let state = test_state();
    properties::import_documents(
        &state.db,
        &[json!({ "_id": { "$oid": "65a1f0c2e4b0a1b2c3d4e5f6" }, "listingType": "on-market", "price": 5 })],
        false,
    )
    .unwrap();

    let resp = send(&state, Method::GET, "/api/properties/65a1f0c2e4b0a1b2c3d4e5f6");
    assert_eq!(resp.status(), 200);
}

#[test]
fn document_named_like_a_route_gets_its_own_id() {
    let state = test_state();
    properties::import_documents(
        &state.db,
        &[json!({
            "id": "search",
            "listingType": "off-market",
            "price": 1000,
            "waterAccess": false
        })],
        false,
    )
    .unwrap();

    // The route still searches rather than fetching a document.
    let search = read_json(send(&state, Method::GET, "/api/properties/search"));
    let found = ids(&search);
    assert_eq!(found.len(), 1);
    assert_ne!(found[0], "search");

    let resp = send(&state, Method::GET, &format!("/api/properties/{}", found[0]));
    assert_eq!(resp.status(), 200);
    assert_eq!(read_json(resp)["price"], 1000.0);

    let resp = send(&state, Method::PUT, &format!("/api/properties/{}/approve", found[0]));
    assert_eq!(resp.status(), 200);
}
