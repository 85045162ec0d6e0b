//! Server configuration
//!
//! Read once at startup from flags or environment variables, then validated
//! so a missing API key stops the process instead of failing every request.

use clap::Parser;
use secrecy::SecretString;
use std::fmt;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
    #[error("max body size must be greater than zero")]
    InvalidBodyLimit,
}

/// Command line / environment arguments for `pdfrows-server`
#[derive(Parser, Clone)]
#[command(name = "pdfrows-server", version, about = "PDF to product rows extraction API")]
pub struct Args {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Address to listen on
    #[arg(long, env = "PDFROWS_BIND", default_value = DEFAULT_BIND)]
    pub bind: String,

    /// Gemini model used for extraction
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub gemini_model: String,

    /// Base URL of the Gemini API
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub gemini_base_url: Url,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "PDFROWS_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,
}

// Keeps the key out of Debug output.
impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("bind", &self.bind)
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url.as_str())
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini_api_key: SecretString,
    pub bind: String,
    pub gemini_model: String,
    pub gemini_base_url: Url,
    pub max_body_bytes: usize,
}

impl Settings {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let api_key = args
            .gemini_api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        if args.max_body_bytes == 0 {
            return Err(ConfigError::InvalidBodyLimit);
        }

        Ok(Self {
            gemini_api_key: SecretString::from(api_key),
            bind: args.bind,
            gemini_model: args.gemini_model,
            gemini_base_url: args.gemini_base_url,
            max_body_bytes: args.max_body_bytes,
        })
    }
}
