use anyhow::{Context, Result};

const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    /// Base used to build public asset URLs for the web app.
    pub s3_public_url: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub telegram_bot_token: String,
    pub telegram_webhook_secret: Option<String>,
    pub telegram_polling: bool,
    pub web_app_url: String,
    pub session_ttl_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3_endpoint = require_env("S3_ENDPOINT")?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_public_url: std::env::var("S3_PUBLIC_URL").unwrap_or_else(|_| s3_endpoint.clone()),
            s3_endpoint,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            telegram_bot_token: require_env("TELEGRAM_BOT_TOKEN")?,
            telegram_webhook_secret: std::env::var("TELEGRAM_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            telegram_polling: parse_flag(std::env::var("TELEGRAM_POLLING").ok().as_deref())
                .context("TELEGRAM_POLLING must be true or false")?,
            web_app_url: require_env("WEB_APP_URL")?
                .trim_end_matches('/')
                .to_string(),
            session_ttl_secs: parse_ttl(std::env::var("SESSION_TTL_SECS").ok().as_deref())
                .context("SESSION_TTL_SECS must be a positive whole number of seconds")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Redis refuses `SET EX 0`, so a zero TTL is rejected here rather than on
/// the first saved draft.
fn parse_ttl(value: Option<&str>) -> Result<u64> {
    let secs = match value.map(str::trim) {
        None | Some("") => DEFAULT_SESSION_TTL_SECS,
        Some(v) => v.parse::<u64>()?,
    };
    anyhow::ensure!(secs > 0, "session TTL of 0 seconds would expire drafts at once");
    Ok(secs)
}

fn parse_flag(value: Option<&str>) -> Result<bool> {
    match value.map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
        Some(v) => anyhow::bail!("unrecognised flag value '{v}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ttl_rejects_zero() {
        assert_eq!(parse_ttl(None).unwrap(), DEFAULT_SESSION_TTL_SECS);
        assert_eq!(parse_ttl(Some(" 600 ")).unwrap(), 600);
        assert!(parse_ttl(Some("0")).is_err());
        assert!(parse_ttl(Some("-5")).is_err());
        assert!(parse_ttl(Some("soon")).is_err());
    }

    #[test]
    fn test_parse_flag_defaults_to_false() {
        assert!(!parse_flag(None).unwrap());
        assert!(!parse_flag(Some("")).unwrap());
    }

    #[test]
    fn test_parse_flag_accepts_common_spellings() {
        assert!(parse_flag(Some("TRUE")).unwrap());
        assert!(parse_flag(Some("1")).unwrap());
        assert!(!parse_flag(Some("false")).unwrap());
    }

    #[test]
    fn test_parse_flag_rejects_garbage() {
        assert!(parse_flag(Some("maybe")).is_err());
    }
}
