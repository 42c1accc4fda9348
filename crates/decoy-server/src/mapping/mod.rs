//! Mapping schema types and the file loader.

mod loader;
mod types;

pub use loader::{FileLoader, Loaded, LoaderError, ValidationError, ValidationErrors};
pub use types::{
    Criterion, Mapping, Mappings, Request, RequestMapping, ResponseDelay, ResponseMapping,
    ScenarioMapping, SCENARIO_STARTED,
};
