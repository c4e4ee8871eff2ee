use crate::config::EngineConfig;
use crate::domain::evaluator::FilterEngine;
use crate::router::AppState;
use crate::tests::utils::{init_test_db, read_json, send, test_state};
use http::Method;

#[test]
fn usage_starts_empty() {
    let state = test_state();
    let body = read_json(send(&state, Method::GET, "/api/map/usage"));

    assert_eq!(body["totalLoads"], 0);
    assert_eq!(body["remainingLoads"], 100_000);
    assert_eq!(body["monthlyLimit"], 100_000);
}

#[test]
fn each_load_is_counted() {
    let state = test_state();

    for _ in 0..3 {
        let resp = send(&state, Method::POST, "/api/map/load");
        assert_eq!(resp.status(), 200);
        assert_eq!(read_json(resp)["success"], true);
    }

    let body = read_json(send(&state, Method::GET, "/api/map/usage"));
    assert_eq!(body["totalLoads"], 3);
    assert_eq!(body["remainingLoads"], 99_997);
}

#[test]
fn loads_past_the_limit_are_still_recorded() {
    let config = EngineConfig {
        map_monthly_limit: 1,
        ..EngineConfig::default()
    };
    let state = AppState::new(init_test_db(), config, FilterEngine::default());

    send(&state, Method::POST, "/api/map/load");
    let body = read_json(send(&state, Method::POST, "/api/map/load"));
    assert_eq!(body["remainingLoads"], 0);

    let usage = read_json(send(&state, Method::GET, "/api/map/usage"));
    assert_eq!(usage["totalLoads"], 2);
    assert_eq!(usage["remainingLoads"], 0);
}

#[test]
fn load_requires_post() {
    let state = test_state();
    assert_eq!(send(&state, Method::GET, "/api/map/load").status(), 404);
}
