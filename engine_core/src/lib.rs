//! Process-wide services shared by the map tooling: logging and failure reporting.
#![forbid(unsafe_code)]

pub mod logging;
pub mod observability;
