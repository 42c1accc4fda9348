//! Scoring-based request matching.
//!
//! Every candidate rule for the request's method is scored against the
//! request; a rule that satisfies every criterion it declares wins outright,
//! otherwise the best incomplete scorer is reported as a partial match.

use crate::mapping::{Criterion, Mapping, Mappings, Request};
use crate::matching::RegexCache;
use std::sync::Arc;
use tracing::error;

/// Outcome of matching one request against a rule set.
#[derive(Debug, Clone)]
pub enum Match {
    /// A rule satisfied every criterion it declares.
    Full(Arc<Mapping>),
    /// Best-scoring rule among those that fell short of their maximum.
    Partial(Arc<Mapping>),
    /// No rule scored above zero.
    None,
}

impl Match {
    pub fn is_full(&self) -> bool {
        matches!(self, Match::Full(_))
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Match::Partial(_))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Match::None)
    }
}

/// Request matching capability. The production implementation is
/// [`ScoringMatcher`]; tests substitute fakes.
pub trait Matcher: Send + Sync {
    fn match_request(&self, request: &Request, mappings: &Mappings) -> Match;
}

/// Production matcher backed by the load-time regex cache.
pub struct ScoringMatcher {
    cache: Arc<RegexCache>,
}

impl ScoringMatcher {
    pub fn new(cache: Arc<RegexCache>) -> Self {
        Self { cache }
    }
}

impl Matcher for ScoringMatcher {
    fn match_request(&self, request: &Request, mappings: &Mappings) -> Match {
        let Some(candidates) = mappings.get(&request.method) else {
            return Match::None;
        };
        best_match(request, candidates, &self.cache)
    }
}

/// Scan candidates in declaration order, returning the first rule that
/// reaches its maximum score. Ties between incomplete scorers keep the
/// earliest rule (strict `>`); a best score of zero means no match.
///
/// Shared between the general matcher and the scenario handler.
pub(crate) fn best_match(
    request: &Request,
    candidates: &[Arc<Mapping>],
    cache: &RegexCache,
) -> Match {
    let mut best: Option<(&Arc<Mapping>, u8)> = None;

    for mapping in candidates {
        let score = score(request, mapping, cache);
        if score == mapping.max_score() {
            return Match::Full(Arc::clone(mapping));
        }
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((mapping, score));
        }
    }

    match best {
        Some((mapping, _)) => Match::Partial(Arc::clone(mapping)),
        None => Match::None,
    }
}

fn score(request: &Request, mapping: &Mapping, cache: &RegexCache) -> u8 {
    let criteria = &mapping.request;
    let mut score = 0;

    if criteria.path.is_absent() || satisfies(&criteria.path, &request.path, cache) {
        score += 1;
    }

    if criteria.has_headers() && headers_satisfied(request, mapping, cache) {
        score += 1;
    }

    if criteria.has_body() && satisfies(&criteria.body, &request.body, cache) {
        score += 1;
    }

    score
}

/// Every declared header criterion must hold; a header the request does not
/// carry is unsatisfied.
fn headers_satisfied(request: &Request, mapping: &Mapping, cache: &RegexCache) -> bool {
    mapping
        .request
        .headers
        .iter()
        .filter(|(_, criterion)| criterion.is_present())
        .all(|(name, criterion)| match request.headers.get(name) {
            Some(value) => satisfies(criterion, value, cache),
            None => false,
        })
}

/// Exact takes the literal-equality path; otherwise any pattern in the list
/// matching is enough.
fn satisfies(criterion: &Criterion, value: &str, cache: &RegexCache) -> bool {
    if let Some(exact) = &criterion.exact {
        return value == exact;
    }
    criterion
        .pattern
        .iter()
        .any(|pattern| match cache.lookup(pattern) {
            Some(regex) => regex.is_match(value),
            None => {
                // Unreachable against a rule set that passed load-time
                // validation.
                error!(pattern = %pattern, "pattern missing from regex cache");
                false
            }
        })
}
