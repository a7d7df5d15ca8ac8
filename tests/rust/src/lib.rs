//! Shared test utilities and fixtures for sbpanel integration tests.

pub use sbpanel_core::domain::{ApiToken, Client, Inbound, Protocol, User};

/// Mock repository implementations
pub mod mocks;
pub use mocks::MockRepositories;

/// Test fixture utilities
pub mod fixtures {
    use super::*;
    use uuid::Uuid;

    /// A vless client with a fresh uuid
    pub fn vless_client(id: &str) -> Client {
        Client::new(id).with_uuid(Uuid::new_v4().to_string())
    }

    /// A password-based client (trojan, shadowsocks, hysteria2)
    pub fn password_client(id: &str) -> Client {
        Client::new(id).with_password(format!("{}-secret", id))
    }

    /// A vless inbound carrying the given client ids
    pub fn vless_inbound(tag: &str, port: u16, client_ids: &[&str]) -> Inbound {
        client_ids
            .iter()
            .fold(Inbound::new(tag, Protocol::Vless, port), |inbound, id| {
                inbound.with_client(vless_client(id))
            })
    }

    /// A trojan inbound carrying the given client ids
    pub fn trojan_inbound(tag: &str, port: u16, client_ids: &[&str]) -> Inbound {
        client_ids
            .iter()
            .fold(Inbound::new(tag, Protocol::Trojan, port), |inbound, id| {
                inbound.with_client(password_client(id))
            })
    }
}

/// Database test helpers
pub mod db {
    use sbpanel_storage::{Database, DATABASE_FILE};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    /// Create a temporary database for testing
    pub struct TestDatabase {
        pub db: Database,
        _temp_dir: TempDir,
        db_path: PathBuf,
    }

    impl TestDatabase {
        /// Create a new test database in a temporary directory
        pub fn new() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let db_path = temp_dir.path().join(DATABASE_FILE);
            let db = Database::open(&db_path).expect("Failed to open test database");
            Self {
                db,
                db_path,
                _temp_dir: temp_dir,
            }
        }

        /// Create an in-memory database for fast tests
        pub fn in_memory() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let db = Database::open_in_memory().expect("Failed to open in-memory database");
            Self {
                db,
                db_path: PathBuf::new(),
                _temp_dir: temp_dir,
            }
        }

        /// Get the database directory path
        pub fn path(&self) -> &Path {
            self._temp_dir.path()
        }

        /// Get the full database file path
        pub fn db_path(&self) -> &Path {
            &self.db_path
        }
    }

    impl Default for TestDatabase {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Shared in-memory database, the way repositories receive it
    pub fn shared_in_memory() -> Arc<Mutex<Database>> {
        Arc::new(Mutex::new(
            Database::open_in_memory().expect("Failed to open in-memory database"),
        ))
    }
}

/// In-process gateway driven through `tower::ServiceExt::oneshot`
pub mod app {
    use super::mocks::MockRepositories;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use sbpanel_gateway::{
        DependenciesBuilder, GatewayConfig, GatewayDependencies, GatewayServer,
    };
    use sbpanel_storage::Database;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    pub const ADMIN_USER: &str = "admin";
    pub const ADMIN_PASSWORD: &str = "admin";

    /// How a request authenticates
    #[derive(Debug, Clone)]
    pub enum Auth {
        None,
        /// `Cookie` header value, e.g. `sbpanel_session=...`
        Cookie(String),
        /// `Token` header value
        Token(String),
    }

    /// Decoded response
    #[derive(Debug)]
    pub struct TestResponse {
        pub status: StatusCode,
        pub set_cookie: Option<String>,
        pub body: Value,
        /// Raw body, for binary downloads
        pub bytes: Vec<u8>,
    }

    impl TestResponse {
        /// `status` field of an envelope
        pub fn envelope_status(&self) -> &str {
            self.body["status"].as_str().unwrap_or_default()
        }

        pub fn message(&self) -> &str {
            self.body["message"].as_str().unwrap_or_default()
        }
    }

    pub struct TestApp {
        pub server: GatewayServer,
        pub router: Router,
        pub mocks: MockRepositories,
        pub restart: CancellationToken,
    }

    impl TestApp {
        /// Gateway over empty mocks, started (admin account created)
        pub async fn new() -> Self {
            Self::with_mocks(MockRepositories::new()).await
        }

        pub async fn with_mocks(mocks: MockRepositories) -> Self {
            let deps = mocks
                .dependencies_builder()
                .with_admin_password(ADMIN_PASSWORD)
                .build()
                .expect("Failed to build dependencies");
            Self::with_dependencies(mocks, deps, GatewayConfig::default()).await
        }

        /// Gateway whose repositories all live in `database`; only the core is mocked
        pub async fn with_database(database: Arc<Mutex<Database>>) -> Self {
            let mocks = MockRepositories::new();
            let deps = DependenciesBuilder::new()
                .with_database(database)
                .with_core(mocks.core.clone())
                .with_admin_password(ADMIN_PASSWORD)
                .build()
                .expect("Failed to build dependencies");
            Self::with_dependencies(mocks, deps, GatewayConfig::default()).await
        }

        pub async fn with_dependencies(
            mocks: MockRepositories,
            deps: GatewayDependencies,
            config: GatewayConfig,
        ) -> Self {
            let restart = CancellationToken::new();
            let server = GatewayServer::new(config, deps, restart.clone());
            server.start().await.expect("Gateway startup failed");
            let router = server.router();
            Self {
                server,
                router,
                mocks,
                restart,
            }
        }

        pub async fn request(
            &self,
            method: Method,
            path: &str,
            body: Option<Vec<u8>>,
            auth: &Auth,
        ) -> TestResponse {
            let mut builder = Request::builder().method(method).uri(path);
            match auth {
                Auth::None => {}
                Auth::Cookie(cookie) => builder = builder.header(header::COOKIE, cookie),
                Auth::Token(token) => builder = builder.header("Token", token),
            }
            let body = match body {
                Some(bytes) => {
                    builder = builder.header(header::CONTENT_TYPE, "application/json");
                    Body::from(bytes)
                }
                None => Body::empty(),
            };

            let response = self
                .router
                .clone()
                .oneshot(builder.body(body).expect("Failed to build request"))
                .await
                .expect("Router error");

            let status = response.status();
            let set_cookie = response
                .headers()
                .get(header::SET_COOKIE)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let bytes = response
                .into_body()
                .collect()
                .await
                .expect("Failed to read body")
                .to_bytes();
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

            TestResponse {
                status,
                set_cookie,
                body,
                bytes: bytes.to_vec(),
            }
        }

        pub async fn post(&self, path: &str, body: Value, auth: &Auth) -> TestResponse {
            let bytes = serde_json::to_vec(&body).expect("Failed to encode body");
            self.request(Method::POST, path, Some(bytes), auth).await
        }

        pub async fn get(&self, path: &str, auth: &Auth) -> TestResponse {
            self.request(Method::GET, path, None, auth).await
        }

        pub async fn post_raw(&self, path: &str, bytes: Vec<u8>, auth: &Auth) -> TestResponse {
            self.request(Method::POST, path, Some(bytes), auth).await
        }

        /// Log in and return the `Cookie` header to send back
        pub async fn login(&self, username: &str, password: &str) -> Option<Auth> {
            let response = self
                .post(
                    "/api/login",
                    json!({ "username": username, "password": password }),
                    &Auth::None,
                )
                .await;
            let set_cookie = response.set_cookie?;
            let pair = set_cookie.split(';').next()?.trim().to_string();
            Some(Auth::Cookie(pair))
        }

        pub async fn admin(&self) -> Auth {
            self.login(ADMIN_USER, ADMIN_PASSWORD)
                .await
                .expect("Admin login failed")
        }
    }
}

/// Async test helpers
pub mod async_helpers {
    use std::time::Duration;
    use tokio::time::timeout;

    /// Run an async operation with a timeout
    pub async fn with_timeout<F, T>(duration: Duration, f: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        timeout(duration, f).await.expect("Operation timed out")
    }

    /// Default test timeout (5 seconds)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
}
