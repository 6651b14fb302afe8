//! Grade aggregation and academic progression engine.
//!
//! The engine modules (`grading`, `semester`, `risk`, `report`) are pure
//! functions over in-memory snapshots. `service` validates requests and pulls
//! snapshots from a [`service::RecordSource`]; `db` is the Postgres source.

pub mod config;
pub mod db;
pub mod error;
pub mod grading;
pub mod models;
pub mod report;
pub mod risk;
pub mod semester;
pub mod service;

pub use error::EngineError;
pub use grading::{classify_approval, compute_final_grade, PASSING_GRADE};
pub use report::assemble_report_data;
pub use risk::evaluate_progression;
pub use semester::aggregate_by_semester;
