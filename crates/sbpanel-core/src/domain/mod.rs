//! Domain entities and value objects
//!
//! This module contains all domain-level types for sbpanel:
//! - Entities (Inbound, Client, User, ApiToken, ConfigObject)
//! - Records (ChangeRecord, StatsRecord)

mod change;
mod config_object;
mod inbound;
mod stats;
mod token;
mod user;

pub use change::*;
pub use config_object::*;
pub use inbound::*;
pub use stats::*;
pub use token::*;
pub use user::*;
