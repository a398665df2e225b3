pub mod classify;
pub mod config;
pub mod db;
pub mod eligibility;
pub mod error;
pub mod ingest;
pub mod models;
pub mod report;
pub mod workflow;
