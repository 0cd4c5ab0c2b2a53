use std::env;

/// Credentials for the Paystack gateway. Both secrets may be absent; operations
/// that need them fail with `AppError::NotConfigured` instead of refusing to boot.
#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub secret_key: Option<String>,
    /// Paystack signs webhooks with the account secret key unless overridden.
    pub webhook_secret: Option<String>,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    pub paystack: PaystackConfig,
    pub default_currency: String,
    /// Course dashboard root; the verified callback redirects to `{dashboard_url}/{slug}`.
    pub dashboard_url: String,
    /// E-book library root; the verified callback redirects to `{library_url}/{slug}`.
    pub library_url: String,
    /// Days to keep the webhook event log (0 = keep forever)
    pub webhook_event_retention_days: i64,
    pub rate_limit: RateLimitConfig,
    pub dev_mode: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub strict_rpm: u32,
    pub standard_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            strict_rpm: 10,
            standard_rpm: 30,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("LECTERN_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = parse_var("PORT", 3000);

        let base_url = non_empty_var("BASE_URL")
            .unwrap_or_else(|| format!("http://{}:{}", host, port))
            .trim_end_matches('/')
            .to_string();

        let secret_key = non_empty_var("PAYSTACK_SECRET_KEY");
        let webhook_secret = non_empty_var("PAYSTACK_WEBHOOK_SECRET").or_else(|| secret_key.clone());

        if secret_key.is_none() {
            tracing::warn!("PAYSTACK_SECRET_KEY not set - checkout and verification will be unavailable");
        }

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "lectern.db".to_string()),
            paystack: PaystackConfig {
                secret_key,
                webhook_secret,
                api_base: non_empty_var("PAYSTACK_API_BASE")
                    .unwrap_or_else(|| "https://api.paystack.co".to_string()),
            },
            default_currency: non_empty_var("DEFAULT_CURRENCY")
                .unwrap_or_else(|| "GHS".to_string())
                .to_uppercase(),
            dashboard_url: non_empty_var("DASHBOARD_URL")
                .unwrap_or_else(|| format!("{}/dashboard", base_url)),
            library_url: non_empty_var("LIBRARY_URL")
                .unwrap_or_else(|| format!("{}/library", base_url)),
            base_url,
            webhook_event_retention_days: parse_var("WEBHOOK_EVENT_RETENTION_DAYS", 30),
            rate_limit: RateLimitConfig {
                strict_rpm: parse_var("RATE_LIMIT_STRICT_RPM", 10),
                standard_rpm: parse_var("RATE_LIMIT_STANDARD_RPM", 30),
            },
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
