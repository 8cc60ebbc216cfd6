//! Updock Configuration Module
//! Reads server and storage settings from environment variables at startup.
//!
//! The resulting struct is built once in `main` and handed to the storage
//! client; no engine component reads the environment after startup.

use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub s3: S3Config,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Connection settings for the S3-compatible release bucket.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

fn default_port() -> u16 {
    8743
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::MissingVar(var))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("UPDOCK_PORT") {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidVar {
                var: "UPDOCK_PORT",
                value,
            })?,
            Err(_) => default_port(),
        };

        Ok(Self {
            server: ServerConfig {
                host: env::var("UPDOCK_HOST").unwrap_or_else(|_| default_host()),
                port,
            },
            s3: S3Config {
                endpoint: required("UPDOCK_S3_ENDPOINT")?,
                bucket: required("UPDOCK_S3_BUCKET")?,
                region: env::var("UPDOCK_S3_REGION").unwrap_or_else(|_| default_region()),
                access_key: required("UPDOCK_S3_ACCESS_KEY")?,
                secret_key: required("UPDOCK_S3_SECRET_KEY")?,
            },
        })
    }
}
