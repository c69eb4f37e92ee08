//! Browsing context and feature extraction.
//!
//! Activity capture hands the engine a [`BrowsingContext`] on every
//! navigation/focus/blur/scroll/click event. Scoring never works on the raw
//! context: it works on a [`FeatureTuple`] extracted fresh per evaluation and
//! never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ValidationError;

/// Closed set of site categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteCategory {
    SocialMedia,
    VideoStreaming,
    News,
    Productivity,
    Other,
}

impl SiteCategory {
    /// Stable name used as a weight-table key fragment.
    pub fn name(&self) -> &'static str {
        match self {
            SiteCategory::SocialMedia => "social-media",
            SiteCategory::VideoStreaming => "video-streaming",
            SiteCategory::News => "news",
            SiteCategory::Productivity => "productivity",
            SiteCategory::Other => "other",
        }
    }
}

/// How the user has been moving between pages recently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationPattern {
    SinglePage,
    SameSite,
    DomainHopping,
    MixedBrowsing,
}

impl NavigationPattern {
    pub fn name(&self) -> &'static str {
        match self {
            NavigationPattern::SinglePage => "single-page",
            NavigationPattern::SameSite => "same-site",
            NavigationPattern::DomainHopping => "domain-hopping",
            NavigationPattern::MixedBrowsing => "mixed-browsing",
        }
    }
}

/// Snapshot of the user's current browsing activity.
///
/// Supplied by the activity-capture collaborator. `recent_history` holds up
/// to the last 5 URLs, most recent last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowsingContext {
    pub url: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    /// Local hour, 0-23.
    pub hour: u8,
    /// Local weekday, 0-6 with 0 = Sunday.
    pub weekday: u8,
    #[serde(default)]
    pub recent_history: Vec<String>,
    #[serde(default)]
    pub session_minutes: u32,
    /// Minutes since the last productive signal.
    #[serde(default)]
    pub idle_productive_minutes: u32,
}

impl BrowsingContext {
    /// Reject malformed input before any state mutates.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::EmptyField("url"));
        }
        if self.hour > 23 {
            return Err(ValidationError::InvalidHour(self.hour));
        }
        if self.weekday > 6 {
            return Err(ValidationError::InvalidWeekday(self.weekday));
        }
        Ok(())
    }

    /// Host portion of the current URL.
    pub fn domain(&self) -> String {
        domain_of(&self.url)
    }
}

/// Strip scheme, path, port and auth from a URL, leaving the host.
pub fn domain_of(url: &str) -> String {
    let rest = url
        .trim()
        .strip_prefix("https://")
        .or_else(|| url.trim().strip_prefix("http://"))
        .unwrap_or_else(|| url.trim());
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host = host.rsplit('@').next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);
    host.trim_start_matches("www.").to_ascii_lowercase()
}

const SOCIAL_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "reddit.com",
    "tiktok.com",
    "linkedin.com",
    "threads.net",
];

const VIDEO_DOMAINS: &[&str] = &[
    "youtube.com",
    "netflix.com",
    "twitch.tv",
    "hulu.com",
    "vimeo.com",
    "disneyplus.com",
];

const NEWS_DOMAINS: &[&str] = &[
    "cnn.com",
    "bbc.com",
    "bbc.co.uk",
    "nytimes.com",
    "theguardian.com",
    "reuters.com",
    "news.ycombinator.com",
];

/// Domains the rule cascade treats as known-productive.
pub const PRODUCTIVITY_DOMAINS: &[&str] = &[
    "github.com",
    "gitlab.com",
    "stackoverflow.com",
    "docs.google.com",
    "notion.so",
    "linear.app",
    "figma.com",
    "jira.",
    "confluence.",
];

/// Map a URL to its site category.
pub fn categorize(url: &str) -> SiteCategory {
    let host = domain_of(url);
    let matches = |set: &[&str]| set.iter().any(|d| host.contains(d));
    if matches(PRODUCTIVITY_DOMAINS) {
        SiteCategory::Productivity
    } else if matches(SOCIAL_DOMAINS) {
        SiteCategory::SocialMedia
    } else if matches(VIDEO_DOMAINS) {
        SiteCategory::VideoStreaming
    } else if matches(NEWS_DOMAINS) {
        SiteCategory::News
    } else {
        SiteCategory::Other
    }
}

/// Derive the navigation pattern from the recent history.
///
/// Empty or single-entry history reads as a single page. A history that
/// stays on one domain is same-site; one where every entry is a different
/// domain is domain-hopping; anything in between is mixed browsing.
pub fn navigation_pattern(recent_history: &[String]) -> NavigationPattern {
    if recent_history.len() <= 1 {
        return NavigationPattern::SinglePage;
    }
    let domains: Vec<String> = recent_history.iter().map(|u| domain_of(u)).collect();
    let distinct: HashSet<&String> = domains.iter().collect();
    if distinct.len() == 1 {
        NavigationPattern::SameSite
    } else if distinct.len() == domains.len() {
        NavigationPattern::DomainHopping
    } else {
        NavigationPattern::MixedBrowsing
    }
}

/// Work hours are Monday-Friday, 9:00-17:00.
pub fn is_work_hours(hour: u8, weekday: u8) -> bool {
    (1..=5).contains(&weekday) && (9..17).contains(&hour)
}

/// Late night wraps midnight: 23:00-05:00.
pub fn is_late_night(hour: u8) -> bool {
    hour >= 23 || hour < 5
}

/// Rabbit-hole detection: rapid navigation within a narrow category set.
///
/// Velocity is navigations per session minute (0 when the session has no
/// measured length). Flagged when the history holds at least 3 entries, the
/// session is at least 5 minutes old, velocity exceeds 1, and the last 5
/// URLs span at most 2 categories.
pub fn detect_rabbit_hole(ctx: &BrowsingContext) -> bool {
    if ctx.recent_history.len() < 3 || ctx.session_minutes < 5 {
        return false;
    }
    let velocity = if ctx.session_minutes == 0 {
        0.0
    } else {
        ctx.recent_history.len() as f64 / ctx.session_minutes as f64
    };
    if velocity <= 1.0 {
        return false;
    }
    let categories: HashSet<SiteCategory> = ctx
        .recent_history
        .iter()
        .rev()
        .take(5)
        .map(|u| categorize(u))
        .collect();
    categories.len() <= 2
}

/// Fixed-shape summary of the current context used for scoring.
///
/// Derived fresh per evaluation; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTuple {
    pub hour: u8,
    pub weekday: u8,
    pub category: SiteCategory,
    pub navigation: NavigationPattern,
    pub session_minutes: u32,
    pub idle_productive_minutes: u32,
    /// Derived at extraction time; needs the raw history, which the tuple
    /// itself does not carry.
    pub rabbit_hole: bool,
}

impl FeatureTuple {
    pub fn extract(ctx: &BrowsingContext) -> Self {
        Self {
            hour: ctx.hour,
            weekday: ctx.weekday,
            category: categorize(&ctx.url),
            navigation: navigation_pattern(&ctx.recent_history),
            session_minutes: ctx.session_minutes,
            idle_productive_minutes: ctx.idle_productive_minutes,
            rabbit_hole: detect_rabbit_hole(ctx),
        }
    }

    pub fn is_work_hours(&self) -> bool {
        is_work_hours(self.hour, self.weekday)
    }

    pub fn is_late_night(&self) -> bool {
        is_late_night(self.hour)
    }

    /// Session longer than an hour with no productive signal for half of it.
    pub fn is_long_unproductive_session(&self) -> bool {
        self.session_minutes > 60 && self.idle_productive_minutes > 30
    }
}
