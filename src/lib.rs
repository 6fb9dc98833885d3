pub mod advisory;
pub mod aggregation;
pub mod api;
pub mod config;
pub mod error;
pub mod format;
pub mod geo;
pub mod report;
pub mod state;
pub mod store;
