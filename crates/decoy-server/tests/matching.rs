//! End-to-end matching tests: mapping files on disk through the loader into
//! the service, exercising the same decisions the HTTP transport would see.

use decoy_server::delay::TokioDelayer;
use decoy_server::mapping::{FileLoader, Request};
use decoy_server::matching::{ScenarioHandler, ScoringMatcher};
use decoy_server::service::{Service, MAPPING_FILE_HEADER, NO_MAPPING_FOUND_MESSAGE};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    service: Service,
    _mappings_dir: TempDir,
    _responses_dir: TempDir,
}

fn harness(mappings: &[(&str, &str)], responses: &[(&str, &str)]) -> Harness {
    let mappings_dir = TempDir::new().unwrap();
    let responses_dir = TempDir::new().unwrap();
    for (name, content) in mappings {
        fs::write(mappings_dir.path().join(name), content).unwrap();
    }
    for (name, content) in responses {
        fs::write(responses_dir.path().join(name), content).unwrap();
    }

    let loaded = FileLoader::new()
        .load(mappings_dir.path(), responses_dir.path())
        .unwrap();
    let cache = Arc::new(loaded.cache);
    let service = Service::new(
        Arc::new(loaded.mappings),
        Arc::new(ScoringMatcher::new(Arc::clone(&cache))),
        Arc::new(ScenarioHandler::new(loaded.scenarios, cache)),
        Arc::new(TokioDelayer),
    );
    Harness {
        service,
        _mappings_dir: mappings_dir,
        _responses_dir: responses_dir,
    }
}

fn request(method: &str, path: &str, headers: &[(&str, &str)], body: &str) -> Request {
    Request {
        id: "e2e-1".to_string(),
        method: method.to_string(),
        path: path.to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
        body: body.to_string(),
    }
}

const GET_PRODUCT: &str = r#"{
    "request": {
        "method": "GET",
        "path": {"exact": "/product/12345"},
        "headers": {"accept": {"exact": "application/json"}}
    },
    "response": {
        "statusCode": 200,
        "headers": {"content-type": "application/json"},
        "bodyFile": "get_product_12345_response.json"
    }
}"#;

const PRODUCT_BODY: &str = r#"{"id": "12345","name": "My Product","description": "This is it"}"#;

const POST_ORDER: &str = r#"{
    "request": {
        "method": "POST",
        "path": {"exact": "/order"},
        "headers": {"content-type": {"exact": "application/json"}},
        "body": {"exact": "{\"orderId\": \"999\"}"}
    },
    "response": {"statusCode": 200, "body": "order accepted"}
}"#;

#[tokio::test]
async fn get_product_with_matching_header_returns_mapped_response() {
    let harness = harness(
        &[("get_product_12345.json", GET_PRODUCT)],
        &[("get_product_12345_response.json", PRODUCT_BODY)],
    );

    let result = harness
        .service
        .match_request(&request(
            "GET",
            "/product/12345",
            &[("accept", "application/json")],
            "",
        ))
        .await;

    assert!(result.matched);
    assert_eq!(result.status_code, 200);
    assert_eq!(result.body, PRODUCT_BODY);
    assert!(result
        .headers
        .get(MAPPING_FILE_HEADER)
        .unwrap()
        .ends_with("get_product_12345.json"));
}

#[tokio::test]
async fn post_order_requires_all_three_criteria() {
    let harness = harness(&[("post_order.json", POST_ORDER)], &[]);

    let full = harness
        .service
        .match_request(&request(
            "POST",
            "/order",
            &[("content-type", "application/json")],
            r#"{"orderId": "999"}"#,
        ))
        .await;
    assert!(full.matched);
    assert_eq!(full.status_code, 200);
    assert_eq!(full.body, "order accepted");

    // Same request minus the content-type header: the best the rule can do
    // is a partial match, reported as a 404 with a closest-mapping hint.
    let partial = harness
        .service
        .match_request(&request("POST", "/order", &[], r#"{"orderId": "999"}"#))
        .await;
    assert!(!partial.matched);
    assert!(partial.partial);
    assert_eq!(partial.status_code, 404);

    let payload: serde_json::Value = serde_json::from_str(&partial.body).unwrap();
    assert_eq!(payload["message"], NO_MAPPING_FOUND_MESSAGE);
    assert_eq!(payload["closestMapping"]["path"]["exact"], "/order");
    assert!(partial
        .headers
        .get(MAPPING_FILE_HEADER)
        .unwrap()
        .ends_with("post_order.json"));
}

#[tokio::test]
async fn method_without_rules_is_a_plain_404() {
    let harness = harness(&[("get_product_12345.json", GET_PRODUCT)], &[]);

    let result = harness
        .service
        .match_request(&request("PATCH", "/product/12345", &[], ""))
        .await;

    assert!(!result.matched);
    assert!(!result.partial);
    assert_eq!(result.status_code, 404);
    assert!(!result.headers.contains_key(MAPPING_FILE_HEADER));

    let payload: serde_json::Value = serde_json::from_str(&result.body).unwrap();
    assert_eq!(payload["message"], NO_MAPPING_FOUND_MESSAGE);
    assert_eq!(payload["request"]["method"], "PATCH");
    assert!(payload.get("closestMapping").is_none());
}

#[tokio::test]
async fn scenario_sequence_advances_across_requests() {
    let step_one = r#"{
        "scenario": {"name": "order-flow", "newState": "placed"},
        "request": {"method": "POST", "path": {"exact": "/order"}},
        "response": {"statusCode": 201, "body": "placed"}
    }"#;
    let step_two = r#"{
        "scenario": {"name": "order-flow", "requiredState": "placed", "newState": "cancelled"},
        "request": {"method": "POST", "path": {"exact": "/order/cancel"}},
        "response": {"statusCode": 200, "body": "cancelled"}
    }"#;
    let harness = harness(
        &[("step_one.json", step_one), ("step_two.json", step_two)],
        &[],
    );

    // Cancelling before placing falls through: nothing else matches POST
    // /order/cancel, and the out-of-state scenario rule is not a candidate.
    let premature = harness
        .service
        .match_request(&request("POST", "/order/cancel", &[], ""))
        .await;
    assert!(!premature.matched);

    let placed = harness
        .service
        .match_request(&request("POST", "/order", &[], ""))
        .await;
    assert_eq!(placed.status_code, 201);
    assert_eq!(placed.body, "placed");

    let cancelled = harness
        .service
        .match_request(&request("POST", "/order/cancel", &[], ""))
        .await;
    assert_eq!(cancelled.status_code, 200);
    assert_eq!(cancelled.body, "cancelled");
}

#[tokio::test]
async fn earlier_file_wins_score_ties() {
    // Both rules partially match (path only); files load in path order, so
    // the one sorting first supplies the closest-mapping diagnostic.
    let with_header = |name: &str| {
        format!(
            r#"{{
                "request": {{
                    "method": "GET",
                    "path": {{"exact": "/tied"}},
                    "headers": {{"x-key": {{"exact": "{name}"}}}}
                }},
                "response": {{"statusCode": 200}}
            }}"#
        )
    };
    let first = with_header("a");
    let second = with_header("b");
    let harness = harness(
        &[
            ("a_first.json", first.as_str()),
            ("b_second.json", second.as_str()),
        ],
        &[],
    );

    let result = harness
        .service
        .match_request(&request("GET", "/tied", &[], ""))
        .await;
    assert!(result.partial);
    assert!(result
        .headers
        .get(MAPPING_FILE_HEADER)
        .unwrap()
        .ends_with("a_first.json"));
}
