//! Video records delivered by the catalog.

use std::collections::BTreeMap;
use std::fmt;

/// First local hour (inclusive) counted as day.
pub const DAY_START_HOUR: u32 = 7;
/// First local hour (inclusive) counted as night.
pub const NIGHT_START_HOUR: u32 = 19;

/// Day/night tag carried by some catalog entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeOfDay {
    Day,
    Night,
}

impl TimeOfDay {
    /// Lenient parse: anything other than "day" or "night" is untagged.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "day" => Some(TimeOfDay::Day),
            "night" => Some(TimeOfDay::Night),
            _ => None,
        }
    }

    /// Bracket for a local hour: day is [7, 19), night otherwise.
    pub fn at_hour(hour: u32) -> Self {
        if (DAY_START_HOUR..NIGHT_START_HOUR).contains(&hour) {
            TimeOfDay::Day
        } else {
            TimeOfDay::Night
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Day => "day",
            TimeOfDay::Night => "night",
        }
    }
}

/// A resolved, playable reference to a video's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable catalog record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Video {
    label: String,
    /// Locators keyed by quality/source option.
    sources: BTreeMap<String, Locator>,
    /// Locator used when the requested option has no dedicated entry.
    fallback: Option<Locator>,
    time_tag: Option<TimeOfDay>,
}

impl Video {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Sentinel used when the catalog is empty: no label, nothing resolves.
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, option: impl Into<String>, locator: Locator) -> Self {
        self.sources.insert(option.into(), locator);
        self
    }

    pub fn with_fallback(mut self, locator: Locator) -> Self {
        self.fallback = Some(locator);
        self
    }

    pub fn with_time_tag(mut self, tag: Option<TimeOfDay>) -> Self {
        self.time_tag = tag;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn time_tag(&self) -> Option<TimeOfDay> {
        self.time_tag
    }

    #[cfg(test)]
    pub fn is_blank(&self) -> bool {
        self.label.is_empty() && self.sources.is_empty() && self.fallback.is_none()
    }

    /// Resolve the locator for a quality/source option.
    ///
    /// Returns `None` when the video does not support the option; callers
    /// must skip such videos instead of trying to play them.
    pub fn resolve(&self, option: &str) -> Option<Locator> {
        self.sources
            .get(option)
            .or(self.fallback.as_ref())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_bracket_boundaries() {
        assert_eq!(TimeOfDay::at_hour(6), TimeOfDay::Night);
        assert_eq!(TimeOfDay::at_hour(7), TimeOfDay::Day);
        assert_eq!(TimeOfDay::at_hour(18), TimeOfDay::Day);
        assert_eq!(TimeOfDay::at_hour(19), TimeOfDay::Night);
        assert_eq!(TimeOfDay::at_hour(0), TimeOfDay::Night);
    }

    #[test]
    fn parse_is_lenient() {
        assert_eq!(TimeOfDay::parse(" Night "), Some(TimeOfDay::Night));
        assert_eq!(TimeOfDay::parse("DAY"), Some(TimeOfDay::Day));
        assert_eq!(TimeOfDay::parse("sunset"), None);
    }

    #[test]
    fn resolve_prefers_dedicated_source() {
        let video = Video::new("Greenland")
            .with_source("4k_hevc", Locator::new("https://cdn/4k.mov"))
            .with_fallback(Locator::new("https://cdn/1080.mov"));

        assert_eq!(
            video.resolve("4k_hevc").as_ref().map(Locator::as_str),
            Some("https://cdn/4k.mov")
        );
        assert_eq!(
            video.resolve("1080_h264").as_ref().map(Locator::as_str),
            Some("https://cdn/1080.mov")
        );
    }

    #[test]
    fn unsupported_option_is_absent() {
        let video = Video::new("Hawaii").with_source("4k_hevc", Locator::new("a"));
        assert!(video.resolve("1080_h264").is_none());
    }

    #[test]
    fn blank_resolves_nothing() {
        let blank = Video::blank();
        assert!(blank.is_blank());
        assert_eq!(blank.label(), "");
        assert!(blank.resolve("1080_h264").is_none());
    }
}
