use std::env;
use std::path::PathBuf;

const DEFAULT_TOKEN_SECRET: &str = "insecure-dev-secret-change-me";

pub struct Config {
    pub database_path: PathBuf,
    pub bind_addr: String,
    pub token_secret: String,
}

impl Config {
    pub fn from_env() -> Self {
        let database_path = env::var("BONIFATUS_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("bonifatus.sqlite3"));
        let bind_addr =
            env::var("BONIFATUS_ADDR").unwrap_or_else(|_| "127.0.0.1:8372".to_string());
        let token_secret = env::var("BONIFATUS_TOKEN_SECRET").unwrap_or_else(|_| {
            tracing::warn!("BONIFATUS_TOKEN_SECRET not set; using insecure default");
            DEFAULT_TOKEN_SECRET.to_string()
        });
        Config {
            database_path,
            bind_addr,
            token_secret,
        }
    }
}
