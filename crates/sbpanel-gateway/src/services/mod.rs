//! Gateway services
//!
//! The collaborators behind name-dispatched actions:
//! - ApiService: every action of the two action tables
//! - CoreController: proxy engine lifecycle
//! - link_convert: share link parsing

mod api_service;
mod core_controller;
pub mod link_convert;

pub use api_service::{
    AddTokenRequest, ApiService, ChangePassRequest, ChangesParams, DeleteTokenRequest,
    KeypairsParams, LinkConvertRequest, LoginRequest, LogsParams, SaveRequest, ServiceError,
    ServiceResult, StatsParams,
};
pub use core_controller::{CommandCoreController, CoreController, CoreStatus};
pub use link_convert::LinkError;
