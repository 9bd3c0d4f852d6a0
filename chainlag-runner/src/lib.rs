//! ChainLag Runner — configuration, source wiring, run orchestration, artifacts.
//!
//! This crate builds on `chainlag-core` to provide:
//! - TOML analysis config with API key resolution and a content-hashed run id
//! - Construction of the shared fetcher and the metric/price adapters
//! - A single-run entry point producing an `AnalysisReport`
//! - CSV and JSON artifact export

pub mod config;
pub mod export;
pub mod runner;

pub use config::{AnalysisConfig, ConfigError, MetricKind, RunId, API_KEY_ENV};
pub use export::{
    export_report_json, export_table_csv, import_report_json, load_report, save_artifacts,
};
pub use runner::{
    build_fetcher, build_sources, run_analysis, verify_api_key, AnalysisReport, RunError,
    RunOutcome, Sources, SCHEMA_VERSION,
};
