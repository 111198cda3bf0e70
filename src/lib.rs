//! Render Worker Library
//!
//! Core functionality for the HTML render worker service: it consumes
//! render jobs from a Redis queue, renders their HTML to PDF or image bytes
//! in a headless Chromium process, uploads the output to object storage and
//! persists a result descriptor for the producer.
//!
//! ## Module Overview
//!
//! - `job`: job and result wire types, state transitions
//! - `options`: render option resolution (defaults merging)
//! - `clip`: capture-region selection for image rendering
//! - `engine`: render engine traits and launch/capture parameter types
//! - `chromium`: chromiumoxide-backed engine implementation
//! - `renderer`: per-job engine session orchestration
//! - `storage`: blob store boundary and upload adapter
//! - `processor`: job pipeline (render, upload, result assembly)
//! - `queue`: Redis-based job queue with backoff retries
//! - `config`: environment-variable configuration
//! - `telemetry`: OpenTelemetry integration and structured logging
//! - `error`: engine and storage error types

pub mod chromium;
pub mod clip;
pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod options;
pub mod processor;
pub mod queue;
pub mod renderer;
pub mod storage;
pub mod telemetry;
