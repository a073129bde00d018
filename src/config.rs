//! Run configuration: return address, recipient style, and policies.
//!
//! Values come from an optional JSON file and are then overridden by
//! `ENVELOPES_*` environment variables. Nothing deployment-specific is
//! compiled in: the default return address is empty.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;
use crate::model::PageGeometry;

pub const DEFAULT_USPS_URL: &str = "https://secure.shippingapis.com/ShippingAPI.dll";

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub page: PageGeometry,
    pub return_address: ReturnAddressConfig,
    pub recipient: RecipientStyle,
    pub row_errors: RowErrorPolicy,
    pub verification: VerificationConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReturnAddressConfig {
    pub lines: Vec<String>,
    pub font: String,
    pub font_size: f32,
    pub line_height: f32,
    /// Left edge of the logo (or of the text when there is no logo).
    pub origin_x: f32,
    /// Baseline of the first return-address line, from the page bottom.
    pub origin_y: f32,
    pub logo: Option<LogoConfig>,
}

impl Default for ReturnAddressConfig {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            font: "Helvetica".into(),
            font_size: 12.0,
            line_height: 12.0,
            origin_x: 20.0,
            origin_y: 270.0,
            logo: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LogoConfig {
    pub path: PathBuf,
    /// Display height in points; width follows the image's aspect ratio.
    #[serde(default = "default_logo_height")]
    pub height: f32,
    /// Space between the logo and the return-address text.
    #[serde(default = "default_logo_gap")]
    pub gap: f32,
}

fn default_logo_height() -> f32 {
    28.0
}

fn default_logo_gap() -> f32 {
    5.0
}

impl LogoConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            height: default_logo_height(),
            gap: default_logo_gap(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecipientStyle {
    pub font: String,
    pub font_size: f32,
    pub line_height: f32,
    /// Placed between city and state on the last line, e.g. ", " or " ".
    pub city_separator: String,
}

impl Default for RecipientStyle {
    fn default() -> Self {
        Self {
            font: "Helvetica".into(),
            font_size: 16.0,
            line_height: 14.0,
            city_separator: ", ".into(),
        }
    }
}

/// What to do with a row that cannot be formatted or placed.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RowErrorPolicy {
    #[default]
    Abort,
    Skip,
}

/// What to do with a recipient whose address did not verify.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerifyFailurePolicy {
    #[default]
    Render,
    Skip,
    Abort,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct VerificationConfig {
    pub enabled: bool,
    pub user_id: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub on_failure: VerifyFailurePolicy,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            user_id: None,
            base_url: DEFAULT_USPS_URL.into(),
            timeout_secs: 30,
            on_failure: VerifyFailurePolicy::default(),
        }
    }
}

impl Config {
    /// Load from an optional JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("failed to read {}: {e}", path.display()))
                })?;
                Self::from_json_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply `ENVELOPES_*` overrides using `lookup` to read variables.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("ENVELOPES_RETURN_ADDRESS") {
            self.return_address.lines = val
                .split('|')
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(val) = lookup("ENVELOPES_LOGO") {
            let val = val.trim();
            if val.is_empty() {
                self.return_address.logo = None;
            } else {
                match self.return_address.logo.as_mut() {
                    Some(logo) => logo.path = PathBuf::from(val),
                    None => self.return_address.logo = Some(LogoConfig::new(val)),
                }
            }
        }
        if let Some(val) = lookup("ENVELOPES_USPS_USER_ID")
            && !val.trim().is_empty()
        {
            self.verification.user_id = Some(val.trim().to_string());
        }
        if let Some(val) = lookup("ENVELOPES_USPS_URL")
            && !val.trim().is_empty()
        {
            self.verification.base_url = val.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        let ra = &self.return_address;
        if ra.font_size <= 0.0 || ra.line_height <= 0.0 {
            return Err(Error::Config(
                "return address font size and line height must be positive".into(),
            ));
        }
        if let Some(logo) = &ra.logo
            && logo.height <= 0.0
        {
            return Err(Error::Config("logo height must be positive".into()));
        }
        let rs = &self.recipient;
        if rs.font_size <= 0.0 || rs.line_height <= 0.0 {
            return Err(Error::Config(
                "recipient font size and line height must be positive".into(),
            ));
        }
        if self.verification.enabled && self.verification.user_id.is_none() {
            return Err(Error::Config(
                "verification is enabled but no USPS user id is set (ENVELOPES_USPS_USER_ID)"
                    .into(),
            ));
        }
        if ra.lines.is_empty() {
            log::warn!("No return address configured (set ENVELOPES_RETURN_ADDRESS)");
        }
        Ok(())
    }
}
