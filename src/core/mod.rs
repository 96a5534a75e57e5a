// src/core/mod.rs

// The `core` module holds everything that does not depend on how requests arrive:
// input validation, the probes and classifiers, and delivery to the bus.

/// Error type shared by every check.
pub mod error;

/// Lookup table that turns a finding into an explanation and a remediation.
pub mod knowledge_base;

/// Requests, observations and the findings produced from them.
pub mod models;

/// Message bus delivery with bounded retries.
pub mod publisher;

/// Probes, the per-check classifiers and the engine that dispatches them.
pub mod scanner;

pub mod validator;
