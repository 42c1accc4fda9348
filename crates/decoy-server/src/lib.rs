//! Decoy: a declarative HTTP mock server.
//!
//! JSON mapping files describe request criteria and canned responses; the
//! matching engine scores every candidate rule per request and returns the
//! best one, with scenario state machines for multi-step interactions and
//! simulated response latency.

pub mod delay;
pub mod mapping;
pub mod matching;
pub mod server;
pub mod service;
