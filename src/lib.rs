//! Barangay heat risk service.
//!
//! Scores each barangay on a 1..K heat risk scale from daily temperature,
//! facility access and population density: the observation history is
//! smoothed per barangay, scaled, clustered with seeded k-means, and the
//! clusters are ranked by a weighted severity score.
//!
//! - `pipeline`: the scoring pipeline.
//! - `ingest`: CSV tables, history appends and the backend fetcher.
//! - `publish`: optional report upload.
//! - `config`, `logging`, `model`: shared plumbing.

pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod publish;
