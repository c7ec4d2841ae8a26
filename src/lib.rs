//! # AI Tutor
//!
//! Back-office service for an AI-tutor education platform: the relational
//! store for programs, students, curriculum and learning records, a
//! session-gated admin gateway over it, and reversible schema migrations.
//!
//! | Module | Role |
//! |--------|------|
//! | [`domain`] | Closed value sets and field validators |
//! | [`db`] | PostgreSQL repository, one submodule per aggregate |
//! | [`migrations`] | Versioned up/down schema steps and schema snapshots |
//! | [`config`] | Server settings and admin credentials |
//! | [`admin`] | Axum router, admin gateway and public API |
//! | [`prom_metrics`] | Prometheus registry |

pub mod admin;
pub mod config;
pub mod db;
pub mod domain;
pub mod migrations;
pub mod prom_metrics;
