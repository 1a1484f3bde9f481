//! Feed source types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable integer identity of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(u32);

impl SourceId {
    /// Creates a source ID from its raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the identity following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SourceId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|e| format!("invalid source id '{s}': {e}"))
    }
}

/// Where an article from the source is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOpenTarget {
    /// Render the feed content locally.
    #[default]
    Local,
    /// Load the full web page.
    Webpage,
    /// Hand off to the system browser.
    External,
}

impl SourceOpenTarget {
    /// Returns the target as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Webpage => "webpage",
            Self::External => "external",
        }
    }

    /// Parses a target from a string, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" => Some(Self::Local),
            "webpage" | "web" => Some(Self::Webpage),
            "external" | "browser" => Some(Self::External),
            _ => None,
        }
    }
}

impl fmt::Display for SourceOpenTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A feed subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Stable identity, assigned on creation.
    pub sid: SourceId,
    /// Fetch endpoint.
    pub url: String,
    /// Display name.
    pub name: String,
    /// Favicon URL, if one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    /// Open-target preference.
    #[serde(default)]
    pub open_target: SourceOpenTarget,
    /// Minimum minutes between fetches (0 = no limit).
    #[serde(default)]
    pub fetch_frequency: u32,
}

impl Source {
    /// Creates a source with default fetch behavior.
    #[must_use]
    pub fn new(sid: SourceId, url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            sid,
            url: url.into(),
            name: name.into(),
            icon_url: None,
            open_target: SourceOpenTarget::default(),
            fetch_frequency: 0,
        }
    }

    /// Sets the favicon URL.
    #[must_use]
    pub fn with_icon_url(mut self, icon_url: impl Into<String>) -> Self {
        self.icon_url = Some(icon_url.into());
        self
    }

    /// Sets the open-target preference.
    #[must_use]
    pub const fn with_open_target(mut self, target: SourceOpenTarget) -> Self {
        self.open_target = target;
        self
    }
}

/// All known sources, keyed by identity.
pub type SourceTable = BTreeMap<SourceId, Source>;

/// Request handed to a source creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    /// Endpoint to subscribe to (already trimmed).
    pub url: String,
    /// Display name, if the caller has one.
    pub name: Option<String>,
    /// Open-target preference; the default applies when unset.
    pub open_target: Option<SourceOpenTarget>,
    /// Favicon URL, if already known.
    pub icon_url: Option<String>,
    /// Suppress per-source user notifications (batch imports).
    pub silent: bool,
}

impl SourceRequest {
    /// Creates a request for the given endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
            open_target: None,
            icon_url: None,
            silent: false,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the open-target preference.
    #[must_use]
    pub const fn with_open_target(mut self, target: SourceOpenTarget) -> Self {
        self.open_target = Some(target);
        self
    }

    /// Sets the favicon URL.
    #[must_use]
    pub fn with_icon_url(mut self, icon_url: impl Into<String>) -> Self {
        self.icon_url = Some(icon_url.into());
        self
    }

    /// Marks the request as silent.
    #[must_use]
    pub const fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id_parse() {
        assert_eq!("7".parse::<SourceId>(), Ok(SourceId::new(7)));
        assert_eq!(" 12 ".parse::<SourceId>(), Ok(SourceId::new(12)));
        assert!("seven".parse::<SourceId>().is_err());
    }

    #[test]
    fn test_open_target_parse() {
        assert_eq!(SourceOpenTarget::parse("WEBPAGE"), Some(SourceOpenTarget::Webpage));
        assert_eq!(SourceOpenTarget::parse("browser"), Some(SourceOpenTarget::External));
        assert_eq!(SourceOpenTarget::parse("nowhere"), None);
    }

    #[test]
    fn test_source_serde_defaults() {
        let json = r#"{"sid": 3, "url": "https://a.example/feed", "name": "A"}"#;
        let source: Source = serde_json::from_str(json).unwrap();
        assert_eq!(source.sid, SourceId::new(3));
        assert_eq!(source.open_target, SourceOpenTarget::Local);
        assert_eq!(source.fetch_frequency, 0);
        assert!(source.icon_url.is_none());
    }
}
