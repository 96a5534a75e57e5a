// src/lib.rs

//! HTTPS posture scanner.
//!
//! Given a domain, runs one of six checks (certificate chain, HTTPS enforcement, HSTS,
//! HTTPS implementation, TLS version, cipher suite), publishes the finding to a
//! message bus and returns it to the caller.

pub mod config;
pub mod core;
pub mod logging;
pub mod server;
