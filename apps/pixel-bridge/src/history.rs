use std::fmt;

use chrono::{DateTime, Local};
use pixel_bridge_core::CanvasUpdate;

use crate::store::{ClearReport, UpdateLog};

/// Human-readable line items describing one stored update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawingSummary {
    /// 1-based position in arrival order.
    pub ordinal: usize,
    pub timestamp: i64,
    pub pixel_count: usize,
    pub width: u32,
    pub height: u32,
}

impl DrawingSummary {
    pub fn from_update(ordinal: usize, update: &CanvasUpdate) -> Self {
        Self {
            ordinal,
            timestamp: update.timestamp,
            pixel_count: update.pixel_count(),
            width: update.width,
            height: update.height,
        }
    }

    pub fn formatted_timestamp(&self) -> String {
        format_timestamp(self.timestamp)
    }
}

impl fmt::Display for DrawingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Drawing {}:", self.ordinal)?;
        writeln!(f, "  Timestamp: {}", self.formatted_timestamp())?;
        writeln!(f, "  Pixels: {}", self.pixel_count)?;
        writeln!(f, "  Canvas: {}x{}", self.width, self.height)?;
        write!(f, "  ---")
    }
}

/// Summaries of every stored update, in arrival order.
pub async fn list_summaries(log: &UpdateLog) -> Vec<DrawingSummary> {
    log.snapshot()
        .await
        .iter()
        .enumerate()
        .map(|(index, update)| DrawingSummary::from_update(index + 1, update))
        .collect()
}

/// Deletes the whole history. `removed` is the record count just before the
/// clear.
pub async fn clear_all(log: &UpdateLog) -> ClearReport {
    log.clear().await
}

/// Local time as `YYYY-MM-DD HH:MM:SS`; timestamps outside chrono's range
/// fall back to the raw millisecond value.
pub fn format_timestamp(millis: i64) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => format!("{millis} ms"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixel_bridge_core::Pixel;

    fn update(pixels: usize, width: u32, height: u32) -> CanvasUpdate {
        CanvasUpdate {
            pixels: (0..pixels as i64).map(|x| Pixel::new(x, 0, 0)).collect(),
            timestamp: 1_700_000_000_000,
            width,
            height,
        }
    }

    #[test_timeout::tokio_timeout_test]
    async fn summaries_follow_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = UpdateLog::load_in(dir.path()).await.unwrap();
        log.append(update(3, 32, 32)).await.unwrap();
        log.append(update(1, 16, 8)).await.unwrap();
        log.append(update(7, 64, 64)).await.unwrap();

        let summaries = list_summaries(&log).await;
        let projected: Vec<_> = summaries
            .iter()
            .map(|s| (s.ordinal, s.pixel_count, s.width, s.height))
            .collect();
        assert_eq!(
            projected,
            vec![(1, 3, 32, 32), (2, 1, 16, 8), (3, 7, 64, 64)]
        );
    }

    #[test_timeout::tokio_timeout_test]
    async fn clear_all_reports_prior_count() {
        let dir = tempfile::tempdir().unwrap();
        let log = UpdateLog::load_in(dir.path()).await.unwrap();
        log.append(update(1, 4, 4)).await.unwrap();
        log.append(update(2, 4, 4)).await.unwrap();

        assert_eq!(clear_all(&log).await.removed, 2);
        assert!(list_summaries(&log).await.is_empty());
        assert_eq!(clear_all(&log).await.removed, 0);
    }

    #[test_timeout::timeout]
    fn summary_block_layout() {
        let summary = DrawingSummary::from_update(2, &update(5, 32, 16));
        let text = summary.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Drawing 2:");
        assert!(lines[1].starts_with("  Timestamp: "));
        assert_eq!(lines[2], "  Pixels: 5");
        assert_eq!(lines[3], "  Canvas: 32x16");
        assert_eq!(lines[4], "  ---");
    }

    #[test_timeout::timeout]
    fn out_of_range_timestamp_falls_back_to_millis() {
        assert_eq!(format_timestamp(i64::MAX), format!("{} ms", i64::MAX));
        assert_eq!(format_timestamp(0).len(), "1970-01-01 00:00:00".len());
    }
}
