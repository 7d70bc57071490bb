//! Solar string monitor: simulates panel health along series strings and
//! serves the resulting plant documents over HTTP.

pub mod api;
pub mod config;
pub mod controller;
pub mod domain;
pub mod repo;
pub mod simulation;
pub mod telemetry;
