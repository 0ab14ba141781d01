use std::env;

use anyhow::{anyhow, Context, Result};

/// Process-wide configuration, read once at startup. No component reads
/// ambient environment state after this point; everything is passed by
/// reference into constructors.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub line_channel_secret: String,
    pub line_channel_access_token: String,
    pub openai_api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub gate_enabled: bool,
    pub gate_threshold: f64,
    /// Maximum accepted raw request body size in bytes (None => unlimited)
    pub max_request_bytes: Option<usize>,
    /// Transport timeout applied to both outbound clients.
    pub http_timeout_ms: u64,
    pub line_api_base: String,
    pub openai_api_base: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let line_channel_secret = require_var("LINE_CHANNEL_SECRET")?;
        let line_channel_access_token = require_var("LINE_CHANNEL_ACCESS_TOKEN")?;
        let openai_api_key = require_var("OPENAI_API_KEY")?;

        let model = env::var("RELAY_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let temperature = parse_optional_f64("RELAY_TEMPERATURE")?.unwrap_or(0.7);
        let max_tokens = parse_optional_u64("RELAY_MAX_TOKENS")?.unwrap_or(300) as u32;

        let gate_enabled = parse_bool_env("RELAY_GATE")?.unwrap_or(true);
        let gate_threshold = parse_optional_f64("RELAY_GATE_THRESHOLD")?.unwrap_or(0.6);
        if !(0.0..=1.0).contains(&gate_threshold) {
            return Err(anyhow!("RELAY_GATE_THRESHOLD must be within 0..=1"));
        }

        let max_request_bytes = parse_optional_u64("RELAY_MAX_REQUEST_BYTES")?.map(|v| v as usize);
        let http_timeout_ms = parse_optional_u64("RELAY_HTTP_TIMEOUT_MS")?.unwrap_or(10_000);

        let line_api_base =
            env::var("LINE_API_BASE").unwrap_or_else(|_| "https://api.line.me".to_string());
        let openai_api_base =
            env::var("OPENAI_API_BASE").unwrap_or_else(|_| "https://api.openai.com".to_string());

        Ok(Self {
            line_channel_secret,
            line_channel_access_token,
            openai_api_key,
            model,
            temperature,
            max_tokens,
            gate_enabled,
            gate_threshold,
            max_request_bytes,
            http_timeout_ms,
            line_api_base,
            openai_api_base,
        })
    }
}

fn require_var(var: &str) -> Result<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .with_context(|| format!("{} must be set", var))
}

fn parse_optional_u64(var: &str) -> Result<Option<u64>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a positive integer", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_optional_f64(var: &str) -> Result<Option<f64>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a number", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_bool_env(var: &str) -> Result<Option<bool>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value)
            .map(Some)
            .ok_or_else(|| anyhow!("{} must be a boolean (true/false/1/0)", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
