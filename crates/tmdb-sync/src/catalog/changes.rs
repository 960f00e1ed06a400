//! Changes feed windowing and paging
//!
//! The feed only answers for the last [`SyncPolicy::max_lookback_days`] days
//! and at most [`SyncPolicy::max_pages`] pages per query, so wide ranges are
//! split into narrow windows and the IDs are merged.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::config::SyncPolicy;
use crate::fetch::{FetchEngine, FetchOutcome};
use crate::media::MediaKind;

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeEntry {
    pub id: i64,
    #[serde(default)]
    pub adult: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangesPage {
    #[serde(default)]
    pub results: Vec<ChangeEntry>,
    #[serde(default = "first_page")]
    pub total_pages: u32,
}

fn first_page() -> u32 {
    1
}

/// Inclusive date range for one changes query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ChangeWindow {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Whether a full sweep ran recently enough that changes sync has nothing to add.
pub fn should_skip(last_full_sweep: Option<DateTime<Utc>>, now: DateTime<Utc>, policy: &SyncPolicy) -> bool {
    match last_full_sweep {
        Some(at) => now - at < Duration::hours(policy.full_sweep_grace_hours),
        None => false,
    }
}

/// Start of the sync range: the newer watermark, never older than the feed's lookback.
pub fn sync_window_start(
    last_changes_sync: Option<DateTime<Utc>>,
    last_full_sweep: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    policy: &SyncPolicy,
) -> DateTime<Utc> {
    let floor = now - Duration::days(policy.max_lookback_days);
    match last_changes_sync.max(last_full_sweep) {
        Some(mark) if mark > floor => mark.min(now),
        _ => floor,
    }
}

/// Split `[start, end]` into windows of `chunk_days` once it exceeds the threshold.
pub fn plan_windows(start: NaiveDate, end: NaiveDate, policy: &SyncPolicy) -> Vec<ChangeWindow> {
    let end = end.max(start);
    let span = (end - start).num_days();

    if span <= policy.chunking_threshold_days {
        return vec![ChangeWindow { start, end }];
    }

    let step = Duration::days(policy.chunk_days.max(1));
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next = (cursor + step).min(end);
        windows.push(ChangeWindow { start: cursor, end: next });
        cursor = next;
    }
    windows
}

async fn fetch_page(engine: &FetchEngine, url: &str) -> Result<ChangesPage> {
    match engine.fetch_one(url).await {
        FetchOutcome::Found(body) => {
            serde_json::from_value(body).with_context(|| format!("Invalid changes page from {url}"))
        },
        FetchOutcome::NotFound => bail!("Changes endpoint returned 404: {url}"),
        FetchOutcome::Failed => bail!("Failed to fetch changes page: {url}"),
    }
}

/// Collect the non-adult IDs changed in `window`, following pagination up to `max_pages`.
pub async fn fetch_window_ids(
    engine: &FetchEngine,
    kind: MediaKind,
    window: ChangeWindow,
    max_pages: u32,
    ids: &mut BTreeSet<i64>,
) -> Result<()> {
    let client = engine.client();
    let mut page = 1u32;
    let mut last_page = 1u32;

    loop {
        let url = client.changes_url(kind, window.start, window.end, page);
        let body = fetch_page(engine, &url).await?;

        if page == 1 {
            last_page = body.total_pages.min(max_pages.max(1));
            if body.total_pages > max_pages {
                warn!(
                    kind = %kind,
                    start = %window.start,
                    end = %window.end,
                    total_pages = body.total_pages,
                    max_pages,
                    "Changes window exceeds the page ceiling, results truncated"
                );
            }
        }

        ids.extend(
            body.results
                .iter()
                .filter(|entry| entry.adult != Some(true))
                .map(|entry| entry.id),
        );

        if page >= last_page {
            break;
        }
        page += 1;
    }

    debug!(kind = %kind, start = %window.start, end = %window.end, pages = last_page, "Changes window fetched");
    Ok(())
}

/// IDs changed across all `windows`, deduplicated.
pub async fn fetch_changed_ids(
    engine: &FetchEngine,
    kind: MediaKind,
    windows: &[ChangeWindow],
    max_pages: u32,
) -> Result<BTreeSet<i64>> {
    let mut ids = BTreeSet::new();
    for window in windows {
        fetch_window_ids(engine, kind, *window, max_pages, &mut ids).await?;
    }
    info!(kind = %kind, windows = windows.len(), changed = ids.len(), "Collected changed ids");
    Ok(ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy() -> SyncPolicy {
        SyncPolicy::default()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_short_range_is_one_window() {
        let windows = plan_windows(date(2025, 5, 1), date(2025, 5, 3), &policy());
        assert_eq!(windows, vec![ChangeWindow { start: date(2025, 5, 1), end: date(2025, 5, 3) }]);
    }

    #[test]
    fn test_ten_day_range_is_chunked_daily() {
        let start = date(2025, 5, 1);
        let end = date(2025, 5, 11);
        let windows = plan_windows(start, end, &policy());

        assert!(windows.len() >= 10);
        assert!(windows.iter().all(|w| w.days() <= 1 && w.days() >= 0));
        assert_eq!(windows.first().unwrap().start, start);
        assert_eq!(windows.last().unwrap().end, end);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_window_start_clamped_to_lookback() {
        let now = Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap();
        let stale = now - Duration::days(40);
        assert_eq!(sync_window_start(Some(stale), None, now, &policy()), now - Duration::days(14));
        assert_eq!(sync_window_start(None, None, now, &policy()), now - Duration::days(14));
    }

    #[test]
    fn test_window_start_uses_newest_watermark() {
        let now = Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap();
        let changes = now - Duration::days(5);
        let sweep = now - Duration::days(2);
        assert_eq!(sync_window_start(Some(changes), Some(sweep), now, &policy()), sweep);
    }

    #[test]
    fn test_skip_within_grace_period() {
        let now = Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap();
        assert!(should_skip(Some(now - Duration::hours(3)), now, &policy()));
        assert!(!should_skip(Some(now - Duration::hours(30)), now, &policy()));
        assert!(!should_skip(None, now, &policy()));
    }

    #[test]
    fn test_changes_page_defaults() {
        let page: ChangesPage = serde_json::from_str(r#"{"results":[{"id":1,"adult":null},{"id":2}]}"#).unwrap();
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].adult, None);
    }
}
