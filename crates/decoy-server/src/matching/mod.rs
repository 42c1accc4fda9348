//! Request matching: regex cache, scoring matcher, and scenario handling.

mod matcher;
mod regex_cache;
mod scenario;

pub use matcher::{Match, Matcher, ScoringMatcher};
pub use regex_cache::{PatternCompileError, RegexCache};
pub use scenario::{ScenarioGroup, ScenarioHandler};
