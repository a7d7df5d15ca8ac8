//! Repository implementations using SQLite.

mod change_repository;
mod config_object_repository;
mod inbound_repository;
mod settings_repository;
mod stats_repository;
mod token_repository;
mod user_repository;

pub use change_repository::SqliteChangeRepository;
pub use config_object_repository::SqliteConfigObjectRepository;
pub use inbound_repository::SqliteInboundRepository;
pub use settings_repository::SqliteSettingsRepository;
pub use stats_repository::SqliteStatsRepository;
pub use token_repository::SqliteTokenRepository;
pub use user_repository::SqliteUserRepository;
