use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_endpoint: String,
    pub model_temperature: f32,
    pub model_max_output_tokens: u32,
    pub model_timeout_secs: u64,
    pub weather_api_key: Option<String>,
    pub exchange_rate_api_key: Option<String>,
    pub weather_api_url: String,
    pub dictionary_api_url: String,
    pub exchange_rate_api_url: String,
    pub wikipedia_url: String,
    pub http_timeout_secs: u64,
    pub agent_max_steps: usize,
    pub strict_plan_validation: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let gemini_api_key = var("GEMINI_API_KEY")
            .or_else(|| var("GOOGLE_API_KEY"))
            .context("GEMINI_API_KEY not found. Please set it in your .env file.")?;

        Ok(Config {
            port: or("PORT", "8080").parse().context("PORT must be a port number")?,
            log_level: or("LOG_LEVEL", "info"),
            gemini_api_key,
            gemini_model: or("GEMINI_MODEL", "gemini-2.5-flash-lite"),
            gemini_endpoint: or(
                "GEMINI_ENDPOINT",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            model_temperature: or("MODEL_TEMPERATURE", "0.1")
                .parse()
                .context("MODEL_TEMPERATURE must be a number")?,
            model_max_output_tokens: or("MODEL_MAX_OUTPUT_TOKENS", "1000")
                .parse()
                .context("MODEL_MAX_OUTPUT_TOKENS must be an integer")?,
            model_timeout_secs: or("MODEL_TIMEOUT_SECS", "60")
                .parse()
                .context("MODEL_TIMEOUT_SECS must be an integer")?,
            weather_api_key: var("WEATHER_API_KEY"),
            exchange_rate_api_key: var("EXCHANGE_RATE_API_KEY"),
            weather_api_url: or("WEATHER_API_URL", "http://api.weatherapi.com/v1/current.json"),
            dictionary_api_url: or(
                "DICTIONARY_API_URL",
                "https://api.dictionaryapi.dev/api/v2/entries/en",
            ),
            exchange_rate_api_url: or("EXCHANGE_RATE_API_URL", "https://v6.exchangerate-api.com/v6"),
            wikipedia_url: or("WIKIPEDIA_URL", "https://en.wikipedia.org"),
            http_timeout_secs: or("HTTP_TIMEOUT_SECS", "10")
                .parse()
                .context("HTTP_TIMEOUT_SECS must be an integer")?,
            agent_max_steps: or("AGENT_MAX_STEPS", "25")
                .parse()
                .context("AGENT_MAX_STEPS must be an integer")?,
            strict_plan_validation: matches!(
                or("STRICT_PLAN_VALIDATION", "false").to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
        })
    }
}
