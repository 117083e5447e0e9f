//! # fwbackup
//!
//! Receives configuration backups uploaded by pfSense and OPNsense
//! firewalls, works out which host each one belongs to, and files it under a
//! per-host directory with a timestamped name.
//!
//! ## Architecture
//!
//! ```text
//!  POST /upload          ┌──────────────────── IntakePipeline ─────────────────────┐
//! ┌──────────┐  bytes +  │ ┌───────────┐  ┌─────────┐  ┌─────────┐  ┌───────────┐ │
//! │  server  │──client──▶│ │ SizeGuard │─▶│ dialect │─▶│ extract │─▶│   store   │ │
//! └──────────┘           │ └───────────┘  └─────────┘  └─────────┘  └─────┬─────┘ │
//!                        └──────────────────────────────────────────────────┼───────┘
//!                                                                           ▼
//!                                            <root>/<host>/<host>-<timestamp>.xml
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Failure taxonomy |
//! | [`size_guard`] | Upload size limit |
//! | [`dialect`] | Root-marker dialect detection |
//! | [`extract`] | Hostname extraction from XML |
//! | [`store`] | Per-host backup files |
//! | [`pipeline`] | Orchestration of the stages above |
//! | [`server`] | HTTP server |
//! | [`telemetry`] | Tracing setup |

pub mod config;
pub mod dialect;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod size_guard;
pub mod store;
pub mod telemetry;
