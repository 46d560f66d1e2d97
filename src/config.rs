//! Destination configuration.
//!
//! The destination list is loaded once at startup and never mutated
//! afterwards; workers only ever see it through shared references.

use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

/// One traffic target: a gateway endpoint plus the parameter pools used to
/// synthesize messages against it.
#[derive(Debug, Clone, Deserialize)]
pub struct Destination {
    /// Endpoint URL the blasters POST to.
    pub url: String,
    /// Service shortcodes; one is chosen uniformly per message.
    pub shortcodes: Vec<u32>,
    /// Candidate message texts; one is chosen uniformly per message.
    pub messages: Vec<String>,
}

/// Top-level configuration: the full destination list and how many of its
/// leading entries actively receive traffic.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Number of leading destinations that participate in random selection.
    /// Defaults to the whole list.
    pub active: Option<usize>,
    /// The configured destinations, in file order.
    #[serde(rename = "destination")]
    pub destinations: Vec<Destination>,
}

impl Config {
    /// Reads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Config =
            toml::from_str(&contents).with_context(|| format!("parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.destinations.is_empty(), "no destinations configured");
        if let Some(active) = self.active {
            ensure!(active >= 1, "active must be at least 1");
            ensure!(
                active <= self.destinations.len(),
                "active ({active}) exceeds configured destinations ({})",
                self.destinations.len()
            );
        }
        for dest in &self.destinations {
            reqwest::Url::parse(&dest.url)
                .with_context(|| format!("invalid destination url {}", dest.url))?;
            ensure!(!dest.shortcodes.is_empty(), "destination {} has no shortcodes", dest.url);
            ensure!(!dest.messages.is_empty(), "destination {} has no messages", dest.url);
        }
        Ok(())
    }

    /// The leading slice of destinations that participates in traffic.
    pub fn active_destinations(&self) -> &[Destination] {
        match self.active {
            Some(n) => &self.destinations[..n.min(self.destinations.len())],
            None => &self.destinations,
        }
    }
}
