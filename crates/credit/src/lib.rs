//! Credit proposal service.
//!
//! Library half of the `credit` binary: configuration resolution and the
//! wiring of API, store and decision worker into one process.

pub mod config;
pub mod service;
