//! Deterministic user-agent classification.
//!
//! Substring matching, first match wins, in a fixed check order — not a full
//! UA-parser grammar. This keeps device/os/browser values stable across
//! releases, which matters because they are stored on immutable click rows.

/// Parsed user-agent fields. Every field is always populated; unmatched
/// strings classify as `"Unknown"` / `"Desktop"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UaInfo {
    pub browser: String,
    pub os: String,
    pub device: String,
}

const BROWSERS: &[(&str, &str)] = &[
    ("Chrome", "Chrome"),
    ("Firefox", "Firefox"),
    ("Safari", "Safari"),
    ("Edge", "Edge"),
    ("MSIE", "Internet Explorer"),
    ("Trident", "Internet Explorer"),
];

const OSES: &[(&str, &str)] = &[
    ("Windows", "Windows"),
    ("Mac OS", "Mac OS"),
    ("Linux", "Linux"),
    ("Android", "Android"),
    ("iOS", "iOS"),
];

pub fn parse_user_agent(user_agent: &str) -> UaInfo {
    let browser = BROWSERS
        .iter()
        .find(|(needle, _)| user_agent.contains(needle))
        .map(|(_, name)| *name)
        .unwrap_or("Unknown");

    let os = OSES
        .iter()
        .find(|(needle, _)| user_agent.contains(needle))
        .map(|(_, name)| *name)
        .unwrap_or("Unknown");

    // Tablet before Mobile: tablet UAs frequently carry both keywords.
    let device = if user_agent.contains("Tablet") || user_agent.contains("iPad") {
        "Tablet"
    } else if user_agent.contains("Mobile") {
        "Mobile"
    } else {
        "Desktop"
    };

    UaInfo {
        browser: browser.to_string(),
        os: os.to_string(),
        device: device.to_string(),
    }
}
