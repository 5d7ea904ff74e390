//! Vending service library crate.
//!
//! # Purpose
//! Exposes the HTTP API, configuration and observability wiring of the
//! credential vending service for use by the binaries and tests.
//!
//! # Notes
//! Module boundaries mirror the HTTP API; vending logic lives in
//! `warden-vendor`.
pub mod api;
pub mod app;
pub mod config;
pub mod observability;
