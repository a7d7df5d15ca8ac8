//! # sbpanel Core Library
//!
//! Domain logic, entities, and business rules for the sbpanel control plane.
//!
//! ## Modules
//!
//! - `domain` - Core entities (Inbound, Client, User, ApiToken, ChangeRecord, StatsRecord)
//! - `repository` - Data access traits
//! - `service` - Domain services (ClientRegistry)
//! - `error` - Typed registry errors

pub mod domain;
pub mod error;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use domain::*;
pub use error::RegistryError;
pub use repository::*;
pub use service::*;

/// Product name used in logs, cookies and default paths
pub const APP_NAME: &str = "sbpanel";
