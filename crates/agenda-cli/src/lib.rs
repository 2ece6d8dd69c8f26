//! Front-ends of the Agenda calendar: the HTTP API and the configuration
//! and input parsing shared with the `agenda` binary.

pub mod api;
pub mod config;
pub mod parser;
