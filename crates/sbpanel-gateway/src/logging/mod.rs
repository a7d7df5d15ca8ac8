//! Centralized Logging Infrastructure
//!
//! Provides structured logging with:
//! - Trace IDs for request correlation
//! - An in-memory ring of recent lines for the `logs` action

mod log_buffer;
mod trace_context;

pub use log_buffer::{LogBuffer, LogBufferWriter};
pub use trace_context::{generate_trace_id, RequestSpan, TraceContext};
