use serde::{Deserialize, Serialize};

use crate::domain::booking::BookingDetails;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

/// Remote ledger backend. Disabled by default; the server then keeps the
/// ledger in process memory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_snapshot_ttl")]
    pub snapshot_ttl_secs: u64,
    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_api_base_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_timeout(),
            snapshot_ttl_secs: default_snapshot_ttl(),
            max_cache_entries: default_max_cache_entries(),
        }
    }
}

/// Defaults pre-filled into a new booking. Rates are percentages, utility
/// costs are euros per night.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
    #[serde(default = "default_fee_rate")]
    pub fee_rate_pct: f64,
    #[serde(default = "default_tax_rate")]
    pub tax_rate_pct: f64,
    #[serde(default = "default_water_per_night")]
    pub water_per_night: f64,
    #[serde(default = "default_electricity_per_night")]
    pub electricity_per_night: f64,
    #[serde(default = "default_nights")]
    pub default_nights: u32,
    #[serde(default = "default_adults")]
    pub default_adults: u32,
}

impl PricingConfig {
    pub fn booking_template(&self) -> BookingDetails {
        BookingDetails {
            adults: self.default_adults,
            children: 0,
            nights: self.default_nights,
            nightly_gross: 0.0,
            fee_rate_pct: self.fee_rate_pct,
            tax_rate_pct: self.tax_rate_pct,
            water_per_night: self.water_per_night,
            electricity_per_night: self.electricity_per_night,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            fee_rate_pct: default_fee_rate(),
            tax_rate_pct: default_tax_rate(),
            water_per_night: default_water_per_night(),
            electricity_per_night: default_electricity_per_night(),
            default_nights: default_nights(),
            default_adults: default_adults(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzerConfig {
    /// Environment variable holding the Gemini API key. The key itself
    /// never goes in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_analyzer_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_analyzer_base_url(),
            request_timeout_secs: default_timeout(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8888/.netlify/functions".into()
}

fn default_user_agent() -> String {
    concat!("mcp-gite/", env!("CARGO_PKG_VERSION")).into()
}

fn default_timeout() -> u64 {
    30
}

fn default_snapshot_ttl() -> u64 {
    60
}

fn default_max_cache_entries() -> usize {
    16
}

fn default_fee_rate() -> f64 {
    3.0
}

fn default_tax_rate() -> f64 {
    17.2
}

fn default_water_per_night() -> f64 {
    2.0
}

fn default_electricity_per_night() -> f64 {
    3.5
}

fn default_nights() -> u32 {
    2
}

fn default_adults() -> u32 {
    2
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}

fn default_model() -> String {
    "gemini-2.5-flash".into()
}

fn default_analyzer_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
