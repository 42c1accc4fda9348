//! Type definitions for mapping files and the in-memory rule set.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// State every scenario starts in before any rule has advanced it.
pub const SCENARIO_STARTED: &str = "Started";

/// Rule set keyed by HTTP method. The vector order is declaration order and
/// drives both the full-match scan and the tie-break between equal scores.
/// Built once at load time and shared read-only afterwards.
pub type Mappings = HashMap<String, Vec<Arc<Mapping>>>;

/// One request-matching specification plus its canned response.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    /// Binds this rule to a named scenario state machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<ScenarioMapping>,
    pub request: RequestMapping,
    #[serde(default)]
    pub response: ResponseMapping,
    /// Originating file, set by the loader. Not part of the mapping schema.
    #[serde(skip)]
    pub file_path: String,
}

impl Mapping {
    /// Highest score this mapping can reach: the path criterion always
    /// counts, headers and body only when declared.
    pub fn max_score(&self) -> u8 {
        1 + u8::from(self.request.has_headers()) + u8::from(self.request.has_body())
    }
}

/// The request side of a mapping.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestMapping {
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Criterion::is_absent")]
    pub path: Criterion,
    /// Header name (lower-cased at load) to the criterion its value must meet.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, Criterion>,
    #[serde(default, skip_serializing_if = "Criterion::is_absent")]
    pub body: Criterion,
}

impl RequestMapping {
    pub fn has_headers(&self) -> bool {
        self.headers.values().any(Criterion::is_present)
    }

    pub fn has_body(&self) -> bool {
        self.body.is_present()
    }
}

/// One request field criterion: a literal value or a list of regex patterns
/// satisfied when any of them matches. Declaring both on the same field is
/// rejected at load time.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct Criterion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pattern: Vec<String>,
}

impl Criterion {
    /// A criterion exists once it declares an exact value or a pattern.
    pub fn is_present(&self) -> bool {
        self.exact.is_some() || !self.pattern.is_empty()
    }

    pub fn is_absent(&self) -> bool {
        !self.is_present()
    }
}

/// Scenario membership of a rule: the state the scenario must be in for the
/// rule to be considered, and the state a full match moves it to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioMapping {
    pub name: String,
    #[serde(default = "default_required_state")]
    pub required_state: String,
    /// Absent means a match leaves the scenario where it is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_state: Option<String>,
}

fn default_required_state() -> String {
    SCENARIO_STARTED.to_string()
}

/// The response side of a mapping.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMapping {
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// File under the responses directory; the loader reads it into `body`
    /// when no inline body is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<ResponseDelay>,
}

fn default_status_code() -> u16 {
    200
}

impl Default for ResponseMapping {
    fn default() -> Self {
        Self {
            status_code: default_status_code(),
            headers: HashMap::new(),
            body: None,
            body_file: None,
            delay: None,
        }
    }
}

/// Simulated response latency.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ResponseDelay {
    /// Fixed delay in milliseconds
    Fixed(u64),
    /// Random delay within range, drawn per request
    Range {
        #[serde(rename = "min")]
        min_ms: u64,
        #[serde(rename = "max")]
        max_ms: u64,
    },
}

/// Inbound request as reconstructed by the transport layer. Header keys are
/// lower-cased; `id` is unique per call.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: String,
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_score_counts_declared_criteria() {
        let mut mapping = Mapping::default();
        assert_eq!(mapping.max_score(), 1);

        mapping.request.path.exact = Some("/orders".to_string());
        assert_eq!(mapping.max_score(), 1);

        mapping.request.headers.insert(
            "accept".to_string(),
            Criterion {
                exact: Some("application/json".to_string()),
                pattern: vec![],
            },
        );
        assert_eq!(mapping.max_score(), 2);

        mapping.request.body.pattern = vec![r"\d+".to_string()];
        assert_eq!(mapping.max_score(), 3);
    }

    #[test]
    fn test_empty_header_criterion_does_not_count() {
        let mut mapping = Mapping::default();
        mapping
            .request
            .headers
            .insert("x-debug".to_string(), Criterion::default());
        assert!(!mapping.request.has_headers());
        assert_eq!(mapping.max_score(), 1);
    }

    #[test]
    fn test_mapping_deserialization() {
        let json = r#"{
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
        let mapping: Mapping = serde_json::from_str(json).unwrap();
        assert_eq!(mapping.request.method, "GET");
        assert_eq!(
            mapping.request.path.exact.as_deref(),
            Some("/product/12345")
        );
        assert_eq!(
            mapping.request.headers["accept"].exact.as_deref(),
            Some("application/json")
        );
        assert_eq!(mapping.response.status_code, 200);
        assert_eq!(
            mapping.response.body_file.as_deref(),
            Some("get_product_12345_response.json")
        );
        assert!(mapping.scenario.is_none());
    }

    #[test]
    fn test_status_code_defaults_to_200() {
        let json = r#"{"request": {"method": "GET"}}"#;
        let mapping: Mapping = serde_json::from_str(json).unwrap();
        assert_eq!(mapping.response.status_code, 200);
    }

    #[test]
    fn test_scenario_required_state_defaults_to_started() {
        let json = r#"{
            "scenario": {"name": "checkout", "newState": "cart_full"},
            "request": {"method": "POST", "path": {"exact": "/cart"}}
        }"#;
        let mapping: Mapping = serde_json::from_str(json).unwrap();
        let scenario = mapping.scenario.unwrap();
        assert_eq!(scenario.name, "checkout");
        assert_eq!(scenario.required_state, SCENARIO_STARTED);
        assert_eq!(scenario.new_state.as_deref(), Some("cart_full"));
    }

    #[test]
    fn test_response_delay_serde() {
        let json = r#"{"delay": 100}"#;
        let response: ResponseMapping = serde_json::from_str(json).unwrap();
        assert!(matches!(response.delay, Some(ResponseDelay::Fixed(100))));

        let json = r#"{"delay": {"min": 100, "max": 200}}"#;
        let response: ResponseMapping = serde_json::from_str(json).unwrap();
        assert!(matches!(
            response.delay,
            Some(ResponseDelay::Range {
                min_ms: 100,
                max_ms: 200
            })
        ));
    }
}
