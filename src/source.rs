//! Loading the week's ranked creatives.
//!
//! Accepts either a plain JSON array of [`VideoItem`]s or the channel-grouped
//! export of the ad-intelligence fetcher:
//!
//! ```json
//! { "applovin": [ { "ad_id": "...", "app_name": "...", "video_url": "...", "rank": 1 } ],
//!   "facebook": [ ... ],
//!   "monitored_apps": [ ... ] }
//! ```

use crate::models::{Platform, VideoItem};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Upper bound on items per weekly run.
pub const DEFAULT_MAX_ITEMS: usize = 60;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SourceDocument {
    Items(Vec<VideoItem>),
    Grouped(BTreeMap<String, Value>),
}

/// One creative as exported by the fetcher.
#[derive(Debug, Deserialize)]
struct FetchedCreative {
    ad_id: String,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    rank: Option<u32>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// Read and validate the items in `path`.
pub fn load_items(path: &Path, max_items: usize) -> Result<Vec<VideoItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    let items = parse_items(&content)
        .with_context(|| format!("Failed to parse input file: {}", path.display()))?;
    validate(&items, max_items)?;
    info!("Loaded {} video items from {}", items.len(), path.display());
    Ok(items)
}

/// Parse either supported document shape.
pub fn parse_items(content: &str) -> Result<Vec<VideoItem>> {
    let document: SourceDocument =
        serde_json::from_str(content).context("Input is neither an item list nor a channel map")?;

    match document {
        SourceDocument::Items(items) => Ok(items),
        SourceDocument::Grouped(groups) => {
            let mut items = Vec::new();
            for (channel, entries) in groups {
                let platform = Platform::from(channel.as_str());
                if platform == Platform::Other {
                    debug!("Skipping non-channel section '{}'", channel);
                    continue;
                }
                let creatives: Vec<FetchedCreative> = serde_json::from_value(entries)
                    .with_context(|| format!("Invalid creatives in section '{channel}'"))?;
                items.extend(convert_channel(&channel, platform, creatives));
            }
            Ok(items)
        }
    }
}

/// Ad IDs are only unique within one network, so the identity key carries
/// the channel name. The raw ID stays in the metadata as `ad_id`.
fn convert_channel(channel: &str, platform: Platform, creatives: Vec<FetchedCreative>) -> Vec<VideoItem> {
    let channel = channel.to_lowercase();
    let mut items = Vec::new();
    for (index, creative) in creatives.into_iter().enumerate() {
        let Some(video_url) = creative.video_url.filter(|u| !u.trim().is_empty()) else {
            warn!(channel = %channel, ad_id = %creative.ad_id, "creative has no video URL, skipping");
            continue;
        };
        // The fetcher ranks by position when it does not stamp a rank.
        let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
        let mut metadata = creative.extra;
        metadata.insert("ad_id".to_string(), Value::String(creative.ad_id.clone()));
        items.push(VideoItem {
            key: format!("{channel}:{}", creative.ad_id),
            platform,
            rank: creative.rank.unwrap_or(position),
            media_reference: video_url,
            metadata,
        });
    }
    items
}

/// Reject inputs that would break identity matching or the size bound.
pub fn validate(items: &[VideoItem], max_items: usize) -> Result<()> {
    if items.len() > max_items {
        bail!(
            "Input has {} items, more than the limit of {}",
            items.len(),
            max_items
        );
    }

    let mut seen = HashSet::new();
    for item in items {
        if item.key.trim().is_empty() {
            bail!("Item at rank {} has an empty identity key", item.rank);
        }
        if !seen.insert(item.key.as_str()) {
            bail!("Duplicate identity key: {}", item.key);
        }
        if item.rank == 0 {
            bail!("Item {} has rank 0; ranks start at 1", item.key);
        }
    }

    Ok(())
}
