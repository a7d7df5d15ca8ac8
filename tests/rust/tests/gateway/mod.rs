//! Gateway integration tests
//!
//! Drive the full router in-process over mock repositories.

mod auth_gate;
mod token_cache;
