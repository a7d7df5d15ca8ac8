//! sbpanel Gateway
//!
//! Control-plane HTTP API of the proxy panel:
//! - Session cookie and API token authentication
//! - Name-dispatched action tables with a uniform envelope
//! - Fixed client-mutation routes backed by the client registry
//! - Token cache kept in step with addToken/deleteToken
//! - Dependency Injection for clean architecture

pub mod api;
pub mod auth;
pub mod logging;
pub mod server;
pub mod services;

pub use api::{Envelope, GetAction, PostAction, Section};
pub use logging::LogBuffer;
pub use server::{
    DependenciesBuilder, GatewayConfig, GatewayDependencies, GatewayServer, ServiceContainer,
    SessionStore, StartupOrchestrator, StartupReport, TokenCache,
};
pub use services::{ApiService, CommandCoreController, CoreController, CoreStatus, ServiceError};
