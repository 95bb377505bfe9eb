//! Record a Recall: a server-rendered wizard that walks a caseworker through
//! recording (or editing) the recall of a released offender to custody.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
