//! Application Scenario Tests
//!
//! Whole-application flows through the `appstruct` facade: commands with
//! argument objects, synced events, logs across shards, verified values,
//! rate limits, configuration files and view projections.

#[path = "../common/mod.rs"]
mod common;

mod commands;
mod configuration;
mod limits;
mod logs;
mod projections;
mod verified_values;
