//! Commit Message Classification
//!
//! Only selects alert wording; it never influences dedup or suppression.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Kind of change a deploy shipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Automated or manual dependency version bump
    DependencyUpdate,
    /// Anything else
    Regular,
}

/// Commits that only configure the update bots themselves
const TOOLING_MARKERS: &[&str] = &[
    "dependabot.yml",
    "dependabot-automerge",
    "renovate.json",
    "renovate-config",
    "configure dependabot",
    "configure renovate",
    "enable dependabot",
    "add dependabot",
    "update dependabot",
    "automerge",
];

static DEPENDENCY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bbump\b[^\n]*\bfrom\b[^\n]*\bto\b",
        r"(?i)^(chore|build|fix)\(deps[^)]*\):",
        r"(?i)\b(update|upgrade) (dependency|dependencies)\b[^\n]*\bto\b",
        r"(?i)\bsecurity (upgrade|update)\b[^\n]*\bto\b",
        r"(?i)merge pull request #\d+.*dependabot(/|\b)",
        r"(?i)dependabot/(npm_and_yarn|pip|bundler|go_modules|gomod|cargo|nuget|composer|pub|maven|gradle)",
        r"(?i)^renovate\b.*(update|pin|rollback).*dependenc",
        r"(?i)\brenovate/",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Classify a commit message as a dependency update or a regular change
pub fn classify_commit(message: Option<&str>) -> ChangeKind {
    let Some(text) = message.map(str::trim).filter(|t| !t.is_empty()) else {
        return ChangeKind::Regular;
    };

    let lower = text.to_lowercase();
    if TOOLING_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return ChangeKind::Regular;
    }

    if DEPENDENCY_PATTERNS.iter().any(|re| re.is_match(text)) {
        ChangeKind::DependencyUpdate
    } else {
        ChangeKind::Regular
    }
}
