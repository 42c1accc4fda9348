//! Stateful scenario matching.
//!
//! Mappings carrying a `scenario` block form named state machines. A rule is
//! only a candidate while its scenario sits in the rule's required state; a
//! full match advances the scenario to the rule's new state. Scenario
//! matches are never partial: a request either advances a scenario crisply
//! or falls through to the general matcher.

use crate::mapping::{Mapping, Request, SCENARIO_STARTED};
use crate::matching::matcher::best_match;
use crate::matching::{Match, RegexCache};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// All rules of one scenario, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ScenarioGroup {
    pub name: String,
    pub rules: Vec<Arc<Mapping>>,
}

pub struct ScenarioHandler {
    /// Declaration order is kept so overlapping scenarios resolve
    /// deterministically.
    scenarios: Vec<ScenarioGroup>,
    /// Scenario name to its current state. Guarded by one lock; the
    /// read-filter-score-transition sequence runs entirely under it.
    states: Mutex<HashMap<String, String>>,
    cache: Arc<RegexCache>,
}

impl ScenarioHandler {
    pub fn new(scenarios: Vec<ScenarioGroup>, cache: Arc<RegexCache>) -> Self {
        Self {
            scenarios,
            states: Mutex::new(HashMap::new()),
            cache,
        }
    }

    /// Match the request against every scenario's state-eligible rules,
    /// advancing the owning scenario on a full match.
    ///
    /// The state lock is held across scoring and the transition, so two
    /// requests racing for one scenario serialize: exactly one observes the
    /// pre-transition state and performs the transition.
    pub fn match_scenario(&self, request: &Request) -> Option<Arc<Mapping>> {
        if self.scenarios.is_empty() {
            return None;
        }

        let mut states = self.states.lock();
        for group in &self.scenarios {
            let current = states
                .get(&group.name)
                .cloned()
                .unwrap_or_else(|| SCENARIO_STARTED.to_string());

            let eligible: Vec<Arc<Mapping>> = group
                .rules
                .iter()
                .filter(|mapping| {
                    mapping.request.method == request.method
                        && mapping
                            .scenario
                            .as_ref()
                            .is_some_and(|s| s.required_state == current)
                })
                .cloned()
                .collect();
            if eligible.is_empty() {
                continue;
            }

            if let Match::Full(mapping) = best_match(request, &eligible, &self.cache) {
                if let Some(new_state) = mapping.scenario.as_ref().and_then(|s| s.new_state.clone())
                {
                    debug!(
                        scenario = %group.name,
                        from = %current,
                        to = %new_state,
                        "scenario advanced"
                    );
                    states.insert(group.name.clone(), new_state);
                }
                return Some(mapping);
            }
        }
        None
    }

    /// Current state of a scenario; `Started` when nothing has advanced it.
    pub fn current_state(&self, scenario: &str) -> String {
        self.states
            .lock()
            .get(scenario)
            .cloned()
            .unwrap_or_else(|| SCENARIO_STARTED.to_string())
    }

    /// Drop all recorded state, returning every scenario to `Started`.
    pub fn reset(&self) {
        self.states.lock().clear();
    }
}
