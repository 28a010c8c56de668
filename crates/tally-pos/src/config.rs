//! # POS Configuration
//!
//! Settings for the order pipeline, layered from defaults, a TOML file and
//! environment variables.
//!
//! ## Load Order (later overrides earlier)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   defaults ──► pos.toml ──► TALLY_* env ──► validate()                  │
//! │                                                                         │
//! │   pos.toml lives in the platform config dir:                            │
//! │   • macOS:   ~/Library/Application Support/com.tally.pos/pos.toml       │
//! │   • Windows: %APPDATA%\tally\pos\config\pos.toml                        │
//! │   • Linux:   ~/.config/tally-pos/pos.toml                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Environment Variables
//! - `TALLY_CASH_METHOD`: payment method that may return change
//! - `TALLY_PAYMENT_METHODS`: comma-separated list of accepted methods
//! - `TALLY_DEFAULT_DOCUMENT`: document type used when a request names none
//! - `TALLY_CURRENCY_SYMBOL` / `TALLY_CURRENCY_DECIMALS`: display format
//! - `TALLY_DB_PATH`: database file
//! - `TALLY_TOKEN_HISTORY`: consumed tokens remembered per session
//! - `TALLY_MAX_LINES`: line cap per order

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tally_core::money::{div_round_half_even, CURRENCY_DECIMALS};
use tally_core::{DocumentKind, Money, MAX_ORDER_LINES};

use crate::error::{PosError, PosResult};

// =============================================================================
// Sales Settings
// =============================================================================

/// How sales are built and paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesSettings {
    /// The one method allowed to return change.
    #[serde(default = "default_cash_method")]
    pub cash_method: String,

    /// Methods accepted at the terminal. Empty accepts anything.
    #[serde(default = "default_payment_methods")]
    pub payment_methods: Vec<String>,

    /// Document type code used when a request names none.
    #[serde(default = "default_document")]
    pub default_document: String,

    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
}

fn default_cash_method() -> String {
    "CASH".to_string()
}
fn default_payment_methods() -> Vec<String> {
    vec!["CASH".to_string(), "CARD".to_string()]
}
fn default_document() -> String {
    DocumentKind::Invoice.code().to_string()
}
fn default_max_lines() -> usize {
    MAX_ORDER_LINES
}

impl Default for SalesSettings {
    fn default() -> Self {
        SalesSettings {
            cash_method: default_cash_method(),
            payment_methods: default_payment_methods(),
            default_document: default_document(),
            max_lines: default_max_lines(),
        }
    }
}

// =============================================================================
// Display Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    /// Digits shown after the decimal point (0..=2).
    #[serde(default = "default_currency_decimals")]
    pub currency_decimals: u8,
}

fn default_currency_symbol() -> String {
    "$".to_string()
}
fn default_currency_decimals() -> u8 {
    CURRENCY_DECIMALS as u8
}

impl Default for DisplaySettings {
    fn default() -> Self {
        DisplaySettings {
            currency_symbol: default_currency_symbol(),
            currency_decimals: default_currency_decimals(),
        }
    }
}

// =============================================================================
// Storage & Security Settings
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Database file. `None` uses the platform data dir.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecuritySettings {
    /// Consumed tokens remembered per session for replay detection.
    #[serde(default = "default_token_history")]
    pub token_history: usize,
}

fn default_token_history() -> usize {
    256
}

impl Default for SecuritySettings {
    fn default() -> Self {
        SecuritySettings {
            token_history: default_token_history(),
        }
    }
}

// =============================================================================
// Main POS Configuration
// =============================================================================

/// Complete POS configuration.
///
/// ## Example Config File
/// ```toml
/// [sales]
/// cash_method = "CASH"
/// payment_methods = ["CASH", "CARD", "VOUCHER"]
/// default_document = "invoice"
/// max_lines = 200
///
/// [display]
/// currency_symbol = "€"
/// currency_decimals = 2
///
/// [storage]
/// database_path = "/var/lib/tally/tally.db"
///
/// [security]
/// token_history = 256
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PosConfig {
    #[serde(default)]
    pub sales: SalesSettings,

    #[serde(default)]
    pub display: DisplaySettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub security: SecuritySettings,
}

impl PosConfig {
    /// Loads configuration from file, environment, and defaults.
    pub fn load(config_path: Option<PathBuf>) -> PosResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading POS config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| PosError::Config(format!("{}: {}", path.display(), e)))?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load POS config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml(contents: &str) -> PosResult<Self> {
        toml::from_str(contents).map_err(|e| PosError::Config(e.to_string()))
    }

    pub fn validate(&self) -> PosResult<()> {
        if self.sales.cash_method.trim().is_empty() {
            return Err(PosError::Config("cash_method must not be empty".into()));
        }

        if !self.sales.payment_methods.is_empty() && !self.accepts_method(&self.sales.cash_method)
        {
            return Err(PosError::Config(format!(
                "payment_methods must include the cash method '{}'",
                self.sales.cash_method
            )));
        }

        DocumentKind::from_code(&self.sales.default_document)
            .map_err(|e| PosError::Config(e.to_string()))?;

        if self.sales.max_lines == 0 || self.sales.max_lines > MAX_ORDER_LINES {
            return Err(PosError::Config(format!(
                "max_lines must be between 1 and {}",
                MAX_ORDER_LINES
            )));
        }

        if u32::from(self.display.currency_decimals) > CURRENCY_DECIMALS {
            return Err(PosError::Config(format!(
                "currency_decimals must be at most {}",
                CURRENCY_DECIMALS
            )));
        }

        if self.security.token_history == 0 {
            return Err(PosError::Config("token_history must be greater than 0".into()));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(method) = std::env::var("TALLY_CASH_METHOD") {
            debug!(method = %method, "Overriding cash method from environment");
            self.sales.cash_method = method;
        }

        if let Ok(methods) = std::env::var("TALLY_PAYMENT_METHODS") {
            self.sales.payment_methods = methods
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Ok(kind) = std::env::var("TALLY_DEFAULT_DOCUMENT") {
            self.sales.default_document = kind;
        }

        if let Ok(symbol) = std::env::var("TALLY_CURRENCY_SYMBOL") {
            self.display.currency_symbol = symbol;
        }

        if let Ok(decimals) = std::env::var("TALLY_CURRENCY_DECIMALS") {
            match decimals.parse::<u8>() {
                Ok(d) => self.display.currency_decimals = d,
                Err(_) => warn!(value = %decimals, "Ignoring invalid TALLY_CURRENCY_DECIMALS"),
            }
        }

        if let Ok(path) = std::env::var("TALLY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.storage.database_path = Some(PathBuf::from(path));
        }

        if let Ok(history) = std::env::var("TALLY_TOKEN_HISTORY") {
            if let Ok(h) = history.parse::<usize>() {
                self.security.token_history = h;
            }
        }

        if let Ok(max) = std::env::var("TALLY_MAX_LINES") {
            if let Ok(m) = max.parse::<usize>() {
                self.sales.max_lines = m;
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "pos")
            .map(|dirs| dirs.config_dir().join("pos.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Resolved database file: configured path, platform data dir, or `./tally.db`.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.storage.database_path {
            return path.clone();
        }

        directories::ProjectDirs::from("com", "tally", "pos")
            .map(|dirs| dirs.data_dir().join("tally.db"))
            .unwrap_or_else(|| PathBuf::from("./tally.db"))
    }

    /// Document kind for requests that name none.
    pub fn default_kind(&self) -> DocumentKind {
        DocumentKind::from_code(&self.sales.default_document).unwrap_or_default()
    }

    pub fn is_cash(&self, method: &str) -> bool {
        method.trim().eq_ignore_ascii_case(self.sales.cash_method.trim())
    }

    pub fn accepts_method(&self, method: &str) -> bool {
        self.sales.payment_methods.is_empty()
            || self
                .sales
                .payment_methods
                .iter()
                .any(|m| m.trim().eq_ignore_ascii_case(method.trim()))
    }

    /// Formats an amount for display.
    ///
    /// With fewer than two decimals the amount is rounded half-to-even,
    /// the same rule the totals use.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::Money;
    /// use tally_pos::PosConfig;
    ///
    /// let config = PosConfig::default();
    /// assert_eq!(config.format_currency(Money::from_cents(1234)), "$12.34");
    /// ```
    pub fn format_currency(&self, amount: Money) -> String {
        let decimals = u32::from(self.display.currency_decimals).min(CURRENCY_DECIMALS);
        let step = 10_i128.pow(CURRENCY_DECIMALS - decimals);
        let units = div_round_half_even(i128::from(amount.cents()), step);

        let divisor = 10_i128.pow(decimals);
        let whole = (units / divisor).abs();
        let frac = (units % divisor).abs();

        format!(
            "{}{}{}",
            if units < 0 { "-" } else { "" },
            self.display.currency_symbol,
            if decimals > 0 {
                format!("{}.{:0width$}", whole, frac, width = decimals as usize)
            } else {
                whole.to_string()
            }
        )
    }
}
