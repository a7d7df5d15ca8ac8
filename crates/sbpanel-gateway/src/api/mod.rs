//! Panel API surface
//!
//! - actions: the POST/GET action tables
//! - envelope: `{status, message, data}` responses
//! - handlers: name-dispatched routes
//! - clients: fixed client-mutation routes

mod actions;
pub mod clients;
mod envelope;
pub mod handlers;

pub use actions::{GetAction, PostAction, Section};
pub use envelope::{Envelope, EnvelopeStatus};
