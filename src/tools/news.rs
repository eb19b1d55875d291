//! Fantasy Premier League news aggregation
//!
//! Pulls headlines from the r/FantasyPL hot listing and the next gameweek
//! deadline from the official game API, then groups them by urgency.
//! A source that fails is logged and skipped.

use super::trait_def::Tool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

const REDDIT_URL: &str = "https://www.reddit.com/r/FantasyPL/hot.json?limit=10";
const FPL_BOOTSTRAP_URL: &str = "https://fantasy.premierleague.com/api/bootstrap-static/";
const FPL_HOME: &str = "https://fantasy.premierleague.com/";
const USER_AGENT: &str = concat!("stagehand/", env!("CARGO_PKG_VERSION"));

const BREAKING: &[&str] = &[
    "injury",
    "banned",
    "suspended",
    "confirmed",
    "official",
    "deadline",
    "team news",
    "press conference",
    "breaking",
    "ruled out",
];
const VIRAL: &[&str] = &[
    "wildcard",
    "free hit",
    "triple captain",
    "chip",
    "price change",
    "riser",
    "faller",
    "hamstring",
    "benched",
    "rant",
    "discussion",
];
const NOTABLE: &[&str] = &[
    "captain",
    "scout picks",
    "differentials",
    "gameweek",
    "gw",
    "transfer",
    "fixtures",
    "analysis",
    "guide",
];
const SURPRISING: &[&str] = &[
    "shock",
    "surprise",
    "unexpected",
    "record",
    "insane",
    "crazy",
    "unbelievable",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub source: String,
    pub title: String,
    pub link: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsCategory {
    Breaking,
    Viral,
    Notable,
    Surprising,
    Other,
}

impl NewsCategory {
    /// Sections in display order
    const RANKED: [NewsCategory; 4] = [
        NewsCategory::Breaking,
        NewsCategory::Viral,
        NewsCategory::Notable,
        NewsCategory::Surprising,
    ];

    fn heading(&self) -> &'static str {
        match self {
            NewsCategory::Breaking => "1) Breaking news and major developments",
            NewsCategory::Viral => "2) Viral stories getting significant attention",
            NewsCategory::Notable => "3) Notable events affecting many people",
            NewsCategory::Surprising => "4) Surprising or unusual stories gaining traction",
            NewsCategory::Other => "Other News",
        }
    }

    /// Keyword match on the lowercased title. Surprising is tested before
    /// notable so "record transfer" lands in surprising.
    pub fn of(title: &str) -> Self {
        let title = title.to_lowercase();
        let hit = |keywords: &[&str]| keywords.iter().any(|k| title.contains(k));

        if hit(BREAKING) {
            NewsCategory::Breaking
        } else if hit(VIRAL) {
            NewsCategory::Viral
        } else if hit(SURPRISING) {
            NewsCategory::Surprising
        } else if hit(NOTABLE) {
            NewsCategory::Notable
        } else {
            NewsCategory::Other
        }
    }
}

/// Reads non-stickied posts out of a Reddit listing document.
pub fn parse_reddit_listing(listing: &Value) -> Vec<NewsItem> {
    let Some(children) = listing.pointer("/data/children").and_then(Value::as_array) else {
        return Vec::new();
    };

    children
        .iter()
        .filter_map(|child| child.get("data"))
        .filter(|post| !post.get("stickied").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|post| {
            let title = post.get("title")?.as_str()?;
            let permalink = post.get("permalink").and_then(Value::as_str).unwrap_or("");
            Some(NewsItem {
                source: "Reddit r/FantasyPL".to_string(),
                title: title.to_string(),
                link: format!("https://www.reddit.com{}", permalink),
            })
        })
        .collect()
}

/// Builds the "next deadline" item from the game's bootstrap document.
pub fn parse_next_deadline(bootstrap: &Value) -> Option<NewsItem> {
    let next = bootstrap
        .get("events")?
        .as_array()?
        .iter()
        .find(|event| event.get("is_next").and_then(Value::as_bool) == Some(true))?;

    let gameweek = next.get("id")?.as_u64()?;
    let epoch = next.get("deadline_time_epoch")?.as_i64()?;
    let deadline = DateTime::<Utc>::from_timestamp(epoch, 0)?;

    Some(NewsItem {
        source: "Official FPL".to_string(),
        title: format!(
            "Gameweek {} Deadline: {}",
            gameweek,
            deadline.format("%Y-%m-%d %H:%M UTC")
        ),
        link: FPL_HOME.to_string(),
    })
}

fn lines_in(grouped: &[(NewsCategory, String)], category: NewsCategory, limit: usize) -> Vec<&str> {
    grouped
        .iter()
        .filter(|(c, _)| *c == category)
        .map(|(_, line)| line.as_str())
        .take(limit)
        .collect()
}

/// Groups unique headlines by category and renders the digest.
pub fn format_digest(items: &[NewsItem]) -> String {
    let mut seen = HashSet::new();
    let mut grouped: Vec<(NewsCategory, String)> = Vec::new();
    for item in items {
        if seen.insert(item.title.as_str()) {
            grouped.push((
                NewsCategory::of(&item.title),
                format!("- [{}] {}", item.source, item.title),
            ));
        }
    }

    let mut lines = vec!["=== FANTASY PREMIER LEAGUE NEWS ===".to_string()];
    for category in NewsCategory::RANKED {
        lines.push(String::new());
        lines.push(format!("{}:", category.heading()));
        let stories = lines_in(&grouped, category, 5);
        if stories.is_empty() {
            lines.push("- No major stories found in this category today.".to_string());
        } else {
            lines.extend(stories.into_iter().map(str::to_string));
        }
    }

    let other = lines_in(&grouped, NewsCategory::Other, 3);
    if !other.is_empty() {
        lines.push(String::new());
        lines.push(format!("{}:", NewsCategory::Other.heading()));
        lines.extend(other.into_iter().map(str::to_string));
    }

    lines.join("\n")
}

pub struct FplNewsTool {
    http_client: Client,
}

impl FplNewsTool {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client for news tool")?;
        Ok(Self { http_client })
    }

    async fn fetch_json(&self, url: &str) -> Result<Option<Value>> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
            warn!(url, status = %status, "Source refused the request, skipping");
            return Ok(None);
        }

        let body = response
            .error_for_status()
            .with_context(|| format!("{} returned an error status", url))?
            .json::<Value>()
            .await
            .with_context(|| format!("{} returned invalid JSON", url))?;
        Ok(Some(body))
    }

    async fn reddit(&self) -> Vec<NewsItem> {
        match self.fetch_json(REDDIT_URL).await {
            Ok(Some(listing)) => parse_reddit_listing(&listing),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Reddit source unavailable");
                Vec::new()
            }
        }
    }

    async fn deadline(&self) -> Vec<NewsItem> {
        match self.fetch_json(FPL_BOOTSTRAP_URL).await {
            Ok(Some(bootstrap)) => parse_next_deadline(&bootstrap).into_iter().collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Official FPL source unavailable");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Tool for FplNewsTool {
    fn name(&self) -> &'static str {
        "fpl_news"
    }

    fn description(&self) -> &'static str {
        "Latest Fantasy Premier League news and the next gameweek deadline"
    }

    fn cacheable(&self) -> bool {
        true
    }

    async fn invoke(&self) -> Result<String> {
        info!("Fetching FPL news");
        let (mut items, deadline) = tokio::join!(self.reddit(), self.deadline());
        items.extend(deadline);

        if items.is_empty() {
            return Ok(
                "No news found. Please check your internet connection or the source websites."
                    .to_string(),
            );
        }

        Ok(format_digest(&items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use yare::parameterized;

    fn item(title: &str) -> NewsItem {
        NewsItem {
            source: "Test".to_string(),
            title: title.to_string(),
            link: String::new(),
        }
    }

    #[parameterized(
        injury = { "Saka injury update", NewsCategory::Breaking },
        chip = { "When to play your Wildcard", NewsCategory::Viral },
        surprise_beats_notable = { "Record transfer fee paid", NewsCategory::Surprising },
        notable = { "Gameweek 5 captain picks", NewsCategory::Notable },
        other = { "Weekly meme thread", NewsCategory::Other },
    )]
    fn test_category(title: &str, expected: NewsCategory) {
        assert_eq!(NewsCategory::of(title), expected);
    }

    #[test]
    fn test_reddit_listing_skips_stickied() {
        let listing = json!({"data": {"children": [
            {"data": {"title": "Daily discussion", "permalink": "/r/x/1", "stickied": true}},
            {"data": {"title": "Haaland benched?", "permalink": "/r/x/2", "stickied": false}},
            {"data": {"permalink": "/r/x/3"}}
        ]}});

        let items = parse_reddit_listing(&listing);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Haaland benched?");
        assert_eq!(items[0].link, "https://www.reddit.com/r/x/2");
    }

    #[test]
    fn test_next_deadline() {
        let bootstrap = json!({"events": [
            {"id": 4, "is_next": false, "deadline_time_epoch": 0},
            {"id": 5, "is_next": true, "deadline_time_epoch": 1_700_000_000}
        ]});

        let deadline = parse_next_deadline(&bootstrap).unwrap();
        assert_eq!(deadline.title, "Gameweek 5 Deadline: 2023-11-14 22:13 UTC");
        assert!(parse_next_deadline(&json!({"events": []})).is_none());
    }

    #[test]
    fn test_digest_deduplicates_and_fills_empty_sections() {
        let items = vec![
            item("Team news: Salah ruled out"),
            item("Team news: Salah ruled out"),
            item("Weekly meme thread"),
        ];

        let digest = format_digest(&items);

        assert_eq!(digest.matches("Salah ruled out").count(), 1);
        assert!(digest.contains("2) Viral stories getting significant attention:\n- No major stories"));
        assert!(digest.ends_with("Other News:\n- [Test] Weekly meme thread"));
    }
}
