//! Settings of the caching layer and the engines.

use serde::Deserialize;

use crate::{
    engine::{ladder::LadderConfig, visits::VisitsConfig},
    runtime::handle::RefreshConfig,
};

/// Every section is optional; missing values fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub refresh: RefreshConfig,
    pub ladder: LadderConfig,
    pub visits: VisitsConfig,
}

impl Config {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
