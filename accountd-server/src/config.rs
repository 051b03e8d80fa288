//! Command-line and environment configuration

use accountd_core::{NewAccount, TokenConfig};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// accountd server configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "accountd-server", version, about = "User account service")]
pub struct ServerConfig {
    /// Bind address
    #[arg(long, env = "ACCOUNTD_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Data directory path
    #[arg(long, env = "ACCOUNTD_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// HS256 signing secret, at least 32 bytes.
    /// Without one, a random key is generated and sessions end with the process.
    #[arg(long, env = "ACCOUNTD_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Session token lifetime in seconds
    #[arg(long, env = "ACCOUNTD_TOKEN_TTL_SECS", default_value_t = 3600)]
    pub token_ttl_secs: u64,

    /// Issuer claim written into and required of every token
    #[arg(long, env = "ACCOUNTD_TOKEN_ISSUER", default_value = "accountd")]
    pub token_issuer: String,

    #[arg(long, env = "ACCOUNTD_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Email of an ADMIN account to create at startup if it does not exist
    #[arg(long, env = "ACCOUNTD_BOOTSTRAP_ADMIN_EMAIL", requires = "bootstrap_admin_password")]
    pub bootstrap_admin_email: Option<String>,

    #[arg(
        long,
        env = "ACCOUNTD_BOOTSTRAP_ADMIN_PASSWORD",
        hide_env_values = true,
        requires = "bootstrap_admin_email"
    )]
    pub bootstrap_admin_password: Option<String>,
}

impl ServerConfig {
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            issuer: self.token_issuer.clone(),
            ttl: Duration::from_secs(self.token_ttl_secs),
            ..TokenConfig::default()
        }
    }

    /// The bootstrap admin account, when both halves were supplied
    pub fn bootstrap_admin(&self) -> Option<NewAccount> {
        match (&self.bootstrap_admin_email, &self.bootstrap_admin_password) {
            (Some(email), Some(password)) => Some(NewAccount {
                email: email.clone(),
                password: password.clone(),
                name: "Administrator".to_string(),
            }),
            _ => None,
        }
    }
}
