//! Batch driver: walks the configured index range window by window, running
//! fetch, archive and load strictly in sequence on one open connection.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::AnyConnection;
use tracing::{error, info, warn};

use crate::archive::Archiver;
use crate::config::WindowConfig;
use crate::loader::{load_batch, BatchLoader, RowCounts};

/// Inclusive record index range requested in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub from: u64,
    pub to: u64,
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// Consecutive windows of `size` covering `[start, end]`; the last one is
/// cut off at `end`.
pub fn windows(start: u64, end: u64, size: u64) -> impl Iterator<Item = Window> {
    let size = size.max(1);
    let mut next = Some(start).filter(|s| *s <= end);
    std::iter::from_fn(move || {
        let from = next?;
        let to = from.saturating_add(size - 1).min(end);
        next = to.checked_add(1).filter(|n| *n <= end);
        Some(Window { from, to })
    })
}

/// Where a window's payload comes from. `None` means "no data for this
/// window"; the driver moves on to the next one.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, window: Window) -> Option<Value>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub windows: u64,
    pub fetched: u64,
    pub empty: u64,
    pub archived: u64,
    pub archive_failures: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub rows: RowCounts,
}

/// Run every window of `range`. Errors stay local to their window.
pub async fn run(
    conn: &mut AnyConnection,
    source: &dyn RecordSource,
    archiver: &Archiver,
    loader: &dyn BatchLoader,
    range: WindowConfig,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for window in windows(range.start, range.end, range.batch_size) {
        summary.windows += 1;
        info!(%window, "fetching records from {} to {}", window.from, window.to);

        let Some(payload) = source.fetch(window).await else {
            summary.empty += 1;
            warn!(%window, "no data for window; continuing");
            continue;
        };
        summary.fetched += 1;

        match archiver.write(window, &payload) {
            Ok(_) => summary.archived += 1,
            Err(err) => {
                summary.archive_failures += 1;
                error!(%window, error = %format!("{err:#}"), "failed to archive payload");
            }
        }

        match load_batch(conn, loader, &payload).await {
            Ok(counts) => {
                summary.committed += 1;
                summary.rows.merge(&counts);
            }
            Err(err) => {
                summary.rolled_back += 1;
                error!(
                    %window,
                    table = err.table().unwrap_or("-"),
                    error = %err,
                    "batch not loaded"
                );
            }
        }
    }

    info!(
        windows = summary.windows,
        fetched = summary.fetched,
        empty = summary.empty,
        archived = summary.archived,
        committed = summary.committed,
        rolled_back = summary.rolled_back,
        rows = summary.rows.total(),
        "run complete"
    );
    for (table, n) in summary.rows.iter() {
        info!(table, rows = n, "rows written");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::test_support::{count, sqlite_with};
    use crate::loader::{Layout, NormalizedLoader};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[test]
    fn windows_tile_the_range() {
        let all: Vec<Window> = windows(1, 250, 100).collect();
        assert_eq!(
            all,
            vec![
                Window { from: 1, to: 100 },
                Window { from: 101, to: 200 },
                Window { from: 201, to: 250 },
            ]
        );

        for (start, end, size) in [(1, 1, 1), (1, 100, 100), (7, 1000, 13), (5, 6, 50)] {
            let ws: Vec<Window> = windows(start, end, size).collect();
            assert_eq!(ws.first().unwrap().from, start);
            assert_eq!(ws.last().unwrap().to, end);
            for pair in ws.windows(2) {
                assert_eq!(pair[1].from, pair[0].to + 1);
            }
            for w in &ws[..ws.len() - 1] {
                assert_eq!(w.to - w.from + 1, size);
            }
        }
    }

    #[test]
    fn windows_handle_edges() {
        assert_eq!(windows(10, 9, 5).count(), 0);
        let top: Vec<Window> = windows(u64::MAX - 1, u64::MAX, 10).collect();
        assert_eq!(
            top,
            vec![Window {
                from: u64::MAX - 1,
                to: u64::MAX
            }]
        );
    }

    struct Canned {
        by_from: HashMap<u64, Value>,
        seen: Mutex<Vec<Window>>,
    }

    #[async_trait]
    impl RecordSource for Canned {
        async fn fetch(&self, window: Window) -> Option<Value> {
            self.seen.lock().unwrap().push(window);
            self.by_from.get(&window.from).cloned()
        }
    }

    fn hotel(code: &str) -> Value {
        json!({
            "code": code,
            "name": {"content": "Inn"},
            "categoryCode": "3EST",
            "accommodationTypeCode": "HTL",
            "lastUpdate": "2024-01-01",
            "ranking": 1
        })
    }

    #[tokio::test]
    async fn failures_stay_local_to_their_window() {
        let mut db = sqlite_with(Layout::Normalized).await;
        let dir = tempfile::tempdir().unwrap();
        let archiver = Archiver::new(dir.path(), "hotel_data");

        let mut broken = hotel("C2");
        broken.as_object_mut().unwrap().remove("ranking");
        let source = Canned {
            by_from: HashMap::from([
                (1, json!({ "hotels": [hotel("A1"), hotel("A2")] })),
                // window 3 has no data
                (5, json!({ "hotels": [hotel("C1"), broken] })),
                (7, json!({ "hotels": [hotel("D1")] })),
            ]),
            seen: Mutex::new(Vec::new()),
        };
        let range = WindowConfig {
            start: 1,
            end: 7,
            batch_size: 2,
        };

        let summary = run(&mut db.conn, &source, &archiver, &NormalizedLoader, range).await;

        assert_eq!(summary.windows, 4);
        assert_eq!(summary.fetched, 3);
        assert_eq!(summary.empty, 1);
        assert_eq!(summary.archived, 3);
        assert_eq!(summary.committed, 2);
        assert_eq!(summary.rolled_back, 1);
        assert_eq!(summary.rows.get("hb_hotel_general_info"), 3);

        let seen = source.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                Window { from: 1, to: 2 },
                Window { from: 3, to: 4 },
                Window { from: 5, to: 6 },
                Window { from: 7, to: 7 },
            ]
        );

        let codes: Vec<String> =
            sqlx::query_scalar("SELECT hotel_code FROM hb_hotel_general_info ORDER BY id")
                .fetch_all(&mut db.conn)
                .await
                .unwrap();
        assert_eq!(codes, vec!["A1", "A2", "D1"]);

        for name in ["hotel_data_1_2.json", "hotel_data_5_6.json", "hotel_data_7_7.json"] {
            assert!(dir.path().join(name).exists(), "{name}");
        }
        assert!(!dir.path().join("hotel_data_3_4.json").exists());
    }

    #[tokio::test]
    async fn rerunning_a_window_duplicates_rows() {
        let mut db = sqlite_with(Layout::Normalized).await;
        let dir = tempfile::tempdir().unwrap();
        let archiver = Archiver::new(dir.path(), "hotel_data");
        let source = Canned {
            by_from: HashMap::from([(1, json!({ "hotels": [hotel("H1")] }))]),
            seen: Mutex::new(Vec::new()),
        };
        let range = WindowConfig {
            start: 1,
            end: 1,
            batch_size: 100,
        };

        run(&mut db.conn, &source, &archiver, &NormalizedLoader, range).await;
        run(&mut db.conn, &source, &archiver, &NormalizedLoader, range).await;

        assert_eq!(count(&mut db.conn, "hb_hotel_general_info").await, 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
