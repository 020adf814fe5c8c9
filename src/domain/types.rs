//! Shared domain enumerations for native checkout rendering.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Payment brand a native renderer is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundingSource {
    Paypal,
    Venmo,
}

impl FundingSource {
    pub const ALL: [FundingSource; 2] = [FundingSource::Paypal, FundingSource::Venmo];

    pub fn as_str(self) -> &'static str {
        match self {
            FundingSource::Paypal => "paypal",
            FundingSource::Venmo => "venmo",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            FundingSource::Paypal => "PayPal",
            FundingSource::Venmo => "Venmo",
        }
    }

    /// Path segment under `/smart/checkout/` serving this funding source.
    pub fn route_segment(self) -> &'static str {
        match self {
            FundingSource::Paypal => "native",
            FundingSource::Venmo => "venmo",
        }
    }

    /// Root domains whose pages may embed the native flow for this brand.
    pub fn authorized_root_domains(self) -> &'static [&'static str] {
        match self {
            FundingSource::Paypal | FundingSource::Venmo => &["paypal.com"],
        }
    }
}

impl fmt::Display for FundingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which page variant a renderer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Popup,
    Fallback,
}

impl RenderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Popup => "popup",
            RenderMode::Fallback => "fallback",
        }
    }

    pub fn bundle_file(self) -> &'static str {
        match self {
            RenderMode::Popup => "smart-payment-buttons.native.js",
            RenderMode::Fallback => "smart-payment-buttons.native-fallback.js",
        }
    }

    pub fn setup_function(self) -> &'static str {
        match self {
            RenderMode::Popup => "setupNativePopup",
            RenderMode::Fallback => "setupNativeFallback",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checkout environment requested by the button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutEnv {
    #[default]
    Production,
    Sandbox,
    Stage,
    Local,
    Test,
}

impl CheckoutEnv {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckoutEnv::Production => "production",
            CheckoutEnv::Sandbox => "sandbox",
            CheckoutEnv::Stage => "stage",
            CheckoutEnv::Local => "local",
            CheckoutEnv::Test => "test",
        }
    }
}

impl FromStr for CheckoutEnv {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "production" => Ok(CheckoutEnv::Production),
            "sandbox" => Ok(CheckoutEnv::Sandbox),
            "stage" => Ok(CheckoutEnv::Stage),
            "local" => Ok(CheckoutEnv::Local),
            "test" => Ok(CheckoutEnv::Test),
            other => Err(DomainError::invalid_parameter("env", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_segments_are_distinct() {
        assert_ne!(
            FundingSource::Paypal.route_segment(),
            FundingSource::Venmo.route_segment()
        );
    }

    #[test]
    fn env_rejects_unknown_values() {
        assert_eq!(
            "sandbox".parse::<CheckoutEnv>().expect("sandbox"),
            CheckoutEnv::Sandbox
        );
        assert!("prod".parse::<CheckoutEnv>().is_err());
    }
}
