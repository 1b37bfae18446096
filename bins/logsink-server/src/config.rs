use std::path::{Path, PathBuf};

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use logsink_api_server::DEFAULT_MAX_BODY_BYTES;

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "logsink-server", about = "HTTP log ingestion endpoint")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Accept log batches on /logs until Ctrl+C
    Serve(ServeArgs),
}

/// Flags and environment. Anything left unset falls back to the TOML file,
/// then to the built-in default.
#[derive(Args, Clone, Debug, Default)]
pub struct ServeArgs {
    /// Optional TOML config file
    #[arg(long, env = "LOGSINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen port
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Shared secret expected in `?token=` or `Authorization: Bearer`
    #[arg(long, env = "API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// `memory://[?max_records=N]`, `file:///dir` or a bare directory path
    #[arg(long, env = "STORE_URI")]
    pub store_uri: Option<String>,

    #[arg(long, env = "STORE_DB_NAME")]
    pub db_name: Option<String>,

    #[arg(long, env = "STORE_LOG_COLLECTION")]
    pub log_collection: Option<String>,

    #[arg(long, env = "STORE_USER_COLLECTION")]
    pub user_collection: Option<String>,

    /// Drop records whose user_id is not in the user collection
    #[arg(long, env = "VALIDATE_USERS", value_parser = BoolishValueParser::new())]
    pub validate_users: Option<bool>,

    /// Request body cap in bytes
    #[arg(long, env = "MAX_BODY_BYTES")]
    pub max_body_bytes: Option<usize>,
}

// ---- TOML Config ----

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub api_token: Option<String>,
    pub store_uri: Option<String>,
    pub db_name: Option<String>,
    pub log_collection: Option<String>,
    pub user_collection: Option<String>,
    pub validate_users: Option<bool>,
    pub max_body_bytes: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::config("read", format!("'{}': {e}", path.display())))?;
        Self::parse(&content).map_err(|e| match e {
            ServerError::Config { context, detail } => ServerError::Config {
                context,
                detail: format!("'{}': {detail}", path.display()),
            },
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, ServerError> {
        toml::from_str(content).map_err(|e| ServerError::config("parse", e.to_string()))
    }
}

// ---- Resolved settings ----

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_NAME: &str = "logs";
const DEFAULT_LOG_COLLECTION: &str = "docker_logs";
const DEFAULT_USER_COLLECTION: &str = "users";

#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub api_token: String,
    pub store_uri: String,
    pub db_name: String,
    pub log_collection: String,
    pub user_collection: String,
    pub validate_users: bool,
    pub max_body_bytes: usize,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("port", &self.port)
            .field("api_token", &"<redacted>")
            .field("store_uri", &self.store_uri)
            .field("db_name", &self.db_name)
            .field("log_collection", &self.log_collection)
            .field("user_collection", &self.user_collection)
            .field("validate_users", &self.validate_users)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

impl Settings {
    /// Read the TOML file named by `--config` (if any) and merge.
    pub fn resolve(args: ServeArgs) -> Result<Self, ServerError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    /// CLI/env over file over defaults.
    pub fn merge(args: ServeArgs, file: FileConfig) -> Result<Self, ServerError> {
        let api_token = args
            .api_token
            .or(file.api_token)
            .ok_or_else(|| ServerError::config("api_token", "missing (set --api-token or API_TOKEN)"))?;
        if api_token.trim().is_empty() {
            return Err(ServerError::config("api_token", "must not be empty"));
        }

        let store_uri = args
            .store_uri
            .or(file.store_uri)
            .ok_or_else(|| ServerError::config("store_uri", "missing (set --store-uri or STORE_URI)"))?;

        let max_body_bytes = args
            .max_body_bytes
            .or(file.max_body_bytes)
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);
        if max_body_bytes == 0 {
            return Err(ServerError::config("max_body_bytes", "must be greater than zero"));
        }

        Ok(Self {
            port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
            api_token,
            store_uri,
            db_name: args.db_name.or(file.db_name).unwrap_or_else(|| DEFAULT_DB_NAME.into()),
            log_collection: args
                .log_collection
                .or(file.log_collection)
                .unwrap_or_else(|| DEFAULT_LOG_COLLECTION.into()),
            user_collection: args
                .user_collection
                .or(file.user_collection)
                .unwrap_or_else(|| DEFAULT_USER_COLLECTION.into()),
            validate_users: args.validate_users.or(file.validate_users).unwrap_or(true),
            max_body_bytes,
        })
    }
}
