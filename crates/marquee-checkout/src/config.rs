//! # Checkout Configuration
//!
//! Configuration management for the checkout layer.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MARQUEE_HOLD_SECS=120                                              │
//! │     MARQUEE_POLL_SECS=3                                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     checkout.toml, path supplied by the host application               │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     300s hold, 3s poll, 1,000/point, 10,000/earned point               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # checkout.toml
//! [hold]
//! duration_secs = 300
//!
//! [gateway]
//! poll_interval_secs = 3
//!
//! [loyalty]
//! point_rate = 1000
//! earn_divisor = 10000
//!
//! [credential]
//! grace_secs = 900
//!
//! [prices]
//! standard = 100000
//! elevated = 120000
//! premium = 150000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use marquee_core::{Money, PriceTable};

use crate::error::{CheckoutError, CheckoutResult};

// =============================================================================
// Hold Settings
// =============================================================================

/// Reservation hold settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldSettings {
    /// Exclusive hold window granted at session creation (seconds).
    /// Fixed once set; cart activity does not extend it.
    #[serde(default = "default_hold_duration")]
    pub duration_secs: u64,
}

fn default_hold_duration() -> u64 {
    300
}

impl Default for HoldSettings {
    fn default() -> Self {
        HoldSettings {
            duration_secs: default_hold_duration(),
        }
    }
}

// =============================================================================
// Gateway Settings
// =============================================================================

/// Payment gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Interval between status-poll cycles (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    3
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

// =============================================================================
// Loyalty Settings
// =============================================================================

/// Loyalty point settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltySettings {
    /// Monetary value of one redeemed point.
    #[serde(default = "default_point_rate")]
    pub point_rate: i64,

    /// One point is earned per this amount of settled total.
    #[serde(default = "default_earn_divisor")]
    pub earn_divisor: i64,
}

fn default_point_rate() -> i64 {
    1_000
}

fn default_earn_divisor() -> i64 {
    10_000
}

impl Default for LoyaltySettings {
    fn default() -> Self {
        LoyaltySettings {
            point_rate: default_point_rate(),
            earn_divisor: default_earn_divisor(),
        }
    }
}

// =============================================================================
// Credential Settings
// =============================================================================

/// QR credential settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSettings {
    /// Fallback validity window when the credential backend does not
    /// communicate one (seconds).
    #[serde(default = "default_grace")]
    pub grace_secs: u64,
}

fn default_grace() -> u64 {
    900
}

impl Default for CredentialSettings {
    fn default() -> Self {
        CredentialSettings {
            grace_secs: default_grace(),
        }
    }
}

// =============================================================================
// Seat Price Bands
// =============================================================================

/// Per-tier seat prices in the smallest currency unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSettings {
    #[serde(default = "default_standard_price")]
    pub standard: i64,

    #[serde(default = "default_elevated_price")]
    pub elevated: i64,

    #[serde(default = "default_premium_price")]
    pub premium: i64,
}

fn default_standard_price() -> i64 {
    100_000
}

fn default_elevated_price() -> i64 {
    120_000
}

fn default_premium_price() -> i64 {
    150_000
}

impl Default for PriceSettings {
    fn default() -> Self {
        PriceSettings {
            standard: default_standard_price(),
            elevated: default_elevated_price(),
            premium: default_premium_price(),
        }
    }
}

// =============================================================================
// Main Checkout Configuration
// =============================================================================

/// Complete checkout configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Reservation hold settings.
    #[serde(default)]
    pub hold: HoldSettings,

    /// Gateway polling settings.
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Loyalty point settings.
    #[serde(default)]
    pub loyalty: LoyaltySettings,

    /// Credential settings.
    #[serde(default)]
    pub credential: CredentialSettings,

    /// Seat price bands.
    #[serde(default)]
    pub prices: PriceSettings,
}

impl CheckoutConfig {
    /// Creates a config with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (checkout.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> CheckoutResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path {
            if path.exists() {
                info!(?path, "Loading checkout config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Applies `MARQUEE_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(secs) = std::env::var("MARQUEE_HOLD_SECS") {
            if let Ok(secs) = secs.parse() {
                self.hold.duration_secs = secs;
            }
        }

        if let Ok(secs) = std::env::var("MARQUEE_POLL_SECS") {
            if let Ok(secs) = secs.parse() {
                self.gateway.poll_interval_secs = secs;
            }
        }

        if let Ok(rate) = std::env::var("MARQUEE_POINT_RATE") {
            if let Ok(rate) = rate.parse() {
                self.loyalty.point_rate = rate;
            }
        }

        if let Ok(divisor) = std::env::var("MARQUEE_EARN_DIVISOR") {
            if let Ok(divisor) = divisor.parse() {
                self.loyalty.earn_divisor = divisor;
            }
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CheckoutResult<()> {
        if self.hold.duration_secs == 0 {
            return Err(CheckoutError::InvalidConfig(
                "hold.duration_secs must be positive".into(),
            ));
        }

        if self.gateway.poll_interval_secs == 0 {
            return Err(CheckoutError::InvalidConfig(
                "gateway.poll_interval_secs must be positive".into(),
            ));
        }

        if self.loyalty.point_rate <= 0 {
            return Err(CheckoutError::InvalidConfig(
                "loyalty.point_rate must be positive".into(),
            ));
        }

        if self.loyalty.earn_divisor <= 0 {
            return Err(CheckoutError::InvalidConfig(
                "loyalty.earn_divisor must be positive".into(),
            ));
        }

        if self.prices.standard <= 0 || self.prices.elevated <= 0 || self.prices.premium <= 0 {
            return Err(CheckoutError::InvalidConfig(
                "all seat price bands must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Builds the pricing engine's seat price table.
    pub fn price_table(&self) -> PriceTable {
        PriceTable {
            standard: Money::new(self.prices.standard),
            elevated: Money::new(self.prices.elevated),
            premium: Money::new(self.prices.premium),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
