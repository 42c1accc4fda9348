//! Request orchestration: scenario handler first, general matcher second,
//! then response construction, delay, and trace annotation.

use crate::delay::Delayer;
use crate::mapping::{Mapping, Mappings, Request, RequestMapping};
use crate::matching::{Match, Matcher, ScenarioHandler};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{field, Instrument};

/// Response header naming the mapping file that produced the response.
pub const MAPPING_FILE_HEADER: &str = "X-Mapping-File";

pub const NO_MAPPING_FOUND_MESSAGE: &str = "No mapping found for the request";

/// The outward-facing decision for one request. Every request terminates in
/// one of these; non-matches are ordinary results, never errors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub matched: bool,
    pub partial: bool,
}

/// 404 payload echoing the request and, when something almost matched, the
/// request pattern of the closest rule.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotFoundResponse<'a> {
    message: &'static str,
    request: &'a Request,
    #[serde(skip_serializing_if = "Option::is_none")]
    closest_mapping: Option<&'a RequestMapping>,
}

impl MatchResult {
    fn full(mapping: &Mapping) -> Self {
        let mut headers = mapping.response.headers.clone();
        headers.insert(MAPPING_FILE_HEADER.to_string(), mapping.file_path.clone());

        MatchResult {
            status_code: mapping.response.status_code,
            headers,
            body: mapping.response.body.clone().unwrap_or_default(),
            matched: true,
            partial: false,
        }
    }

    fn not_found(request: &Request, closest: Option<&Mapping>) -> Self {
        let payload = NotFoundResponse {
            message: NO_MAPPING_FOUND_MESSAGE,
            request,
            closest_mapping: closest.map(|mapping| &mapping.request),
        };

        let mut headers = HashMap::from([(
            "content-type".to_string(),
            "application/json".to_string(),
        )]);
        if let Some(mapping) = closest {
            headers.insert(MAPPING_FILE_HEADER.to_string(), mapping.file_path.clone());
        }

        MatchResult {
            status_code: 404,
            headers,
            body: serde_json::to_string(&payload).unwrap_or_default(),
            matched: false,
            partial: closest.is_some(),
        }
    }
}

/// Combines the scenario handler, the matcher, and the delayer into a single
/// decision per request.
pub struct Service {
    mappings: Arc<Mappings>,
    matcher: Arc<dyn Matcher>,
    scenarios: Arc<ScenarioHandler>,
    delayer: Arc<dyn Delayer>,
}

impl Service {
    pub fn new(
        mappings: Arc<Mappings>,
        matcher: Arc<dyn Matcher>,
        scenarios: Arc<ScenarioHandler>,
        delayer: Arc<dyn Delayer>,
    ) -> Self {
        Self {
            mappings,
            matcher,
            scenarios,
            delayer,
        }
    }

    /// Decide the response for one request. Scenario rules take precedence;
    /// the general rule set is the fallback. Delays apply to full matches
    /// only, after scenario state has been committed.
    pub async fn match_request(&self, request: &Request) -> MatchResult {
        let span = tracing::info_span!(
            "match_request",
            request_id = %request.id,
            matched = field::Empty,
            delay_ms = field::Empty,
        );

        async {
            let outcome = match self.scenarios.match_scenario(request) {
                Some(mapping) => Match::Full(mapping),
                None => self.matcher.match_request(request, &self.mappings),
            };

            let span = tracing::Span::current();
            let result = match outcome {
                Match::Full(mapping) => {
                    let applied = self.delayer.apply(mapping.response.delay.as_ref()).await;
                    span.record("delay_ms", applied.as_millis() as u64);
                    MatchResult::full(&mapping)
                }
                Match::Partial(mapping) => MatchResult::not_found(request, Some(&mapping)),
                Match::None => MatchResult::not_found(request, None),
            };
            span.record("matched", result.matched);
            result
        }
        .instrument(span)
        .await
    }
}
