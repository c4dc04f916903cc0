//! Rolled-up compression metrics derived from the event log

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::event_log::CompressionEvent;
use super::CompressionStrategy;

const DAILY_BUCKETS: i64 = 7;
const WEEKLY_BUCKETS: i64 = 4;
/// Events at or above this accuracy count as lossless
const LOSSLESS_ACCURACY: f64 = 0.99;

/// Compressions and savings for one day or week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryBucket {
    pub period_start: NaiveDate,
    pub compressions: usize,
    pub tokens_saved: i64,
}

impl HistoryBucket {
    fn empty(period_start: NaiveDate) -> Self {
        Self {
            period_start,
            compressions: 0,
            tokens_saved: 0,
        }
    }
}

/// Daily and weekly series, oldest bucket first, no gaps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionHistory {
    pub daily: Vec<HistoryBucket>,
    pub weekly: Vec<HistoryBucket>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionStatistics {
    pub total_compressions: usize,
    pub compressions_by_type: BTreeMap<CompressionStrategy, usize>,
    pub average_compression_ratio: f64,
    pub total_tokens_saved: i64,
    /// Share of events that were lossless, 0 to 100
    pub lossless_percentage: f64,
    pub average_accuracy: f64,
    pub most_effective_strategy: Option<CompressionStrategy>,
    pub recent_compressions: Vec<CompressionEvent>,
    pub compression_history: CompressionHistory,
}

impl CompressionStatistics {
    /// Derive statistics from chronological events.
    ///
    /// `now` anchors the history buckets.
    pub fn from_events<'a, I>(events: I, recent_limit: usize, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a CompressionEvent>,
    {
        let events: Vec<&CompressionEvent> = events.into_iter().collect();
        let total = events.len();

        let mut by_type: BTreeMap<CompressionStrategy, usize> =
            CompressionStrategy::ALL.iter().map(|s| (*s, 0)).collect();
        let mut ratio_sum = 0.0;
        let mut accuracy_sum = 0.0;
        let mut tokens_saved = 0i64;
        let mut lossless = 0usize;
        // Cumulative savings per strategy, in order of first appearance
        let mut savings: Vec<(CompressionStrategy, i64)> = Vec::new();

        for event in &events {
            *by_type.entry(event.strategy).or_insert(0) += 1;
            ratio_sum += event.compression_ratio;
            accuracy_sum += event.accuracy;
            tokens_saved += event.tokens_saved();

            if event.strategy == CompressionStrategy::Lossless || event.accuracy >= LOSSLESS_ACCURACY {
                lossless += 1;
            }

            match savings.iter_mut().find(|(s, _)| *s == event.strategy) {
                Some((_, saved)) => *saved += event.tokens_saved(),
                None => savings.push((event.strategy, event.tokens_saved())),
            }
        }

        let mean = |sum: f64| if total == 0 { 0.0 } else { sum / total as f64 };

        let mut most_effective: Option<(CompressionStrategy, i64)> = None;
        for (strategy, saved) in savings {
            if most_effective.map_or(true, |(_, best)| saved > best) {
                most_effective = Some((strategy, saved));
            }
        }

        let recent = events
            .iter()
            .skip(total.saturating_sub(recent_limit))
            .map(|e| (*e).clone())
            .collect();

        Self {
            total_compressions: total,
            compressions_by_type: by_type,
            average_compression_ratio: mean(ratio_sum),
            total_tokens_saved: tokens_saved,
            lossless_percentage: mean(lossless as f64) * 100.0,
            average_accuracy: mean(accuracy_sum),
            most_effective_strategy: most_effective.map(|(s, _)| s),
            recent_compressions: recent,
            compression_history: build_history(&events, now.date_naive()),
        }
    }
}

/// First day (Sunday) of the week containing `date`
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

fn build_history(events: &[&CompressionEvent], today: NaiveDate) -> CompressionHistory {
    let mut daily: Vec<HistoryBucket> = (0..DAILY_BUCKETS)
        .rev()
        .map(|offset| HistoryBucket::empty(today - Duration::days(offset)))
        .collect();

    let this_week = week_start(today);
    let mut weekly: Vec<HistoryBucket> = (0..WEEKLY_BUCKETS)
        .rev()
        .map(|offset| HistoryBucket::empty(this_week - Duration::weeks(offset)))
        .collect();

    for event in events {
        let day = event.timestamp.date_naive();

        if let Some(bucket) = daily.iter_mut().find(|b| b.period_start == day) {
            bucket.compressions += 1;
            bucket.tokens_saved += event.tokens_saved();
        }

        let week = week_start(day);
        if let Some(bucket) = weekly.iter_mut().find(|b| b.period_start == week) {
            bucket.compressions += 1;
            bucket.tokens_saved += event.tokens_saved();
        }
    }

    CompressionHistory { daily, weekly }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event_at(
        strategy: CompressionStrategy,
        original: u32,
        compressed: u32,
        accuracy: f64,
        timestamp: DateTime<Utc>,
    ) -> CompressionEvent {
        CompressionEvent::new(strategy, original, compressed, 0.5, accuracy, None, 1, timestamp)
    }

    // Wednesday
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_statistics() {
        let stats = CompressionStatistics::from_events(&[], 10, now());
        assert_eq!(stats.total_compressions, 0);
        assert_eq!(stats.average_compression_ratio, 0.0);
        assert_eq!(stats.average_accuracy, 0.0);
        assert_eq!(stats.lossless_percentage, 0.0);
        assert_eq!(stats.most_effective_strategy, None);
        assert_eq!(stats.compressions_by_type.len(), 4);
        assert!(stats.compressions_by_type.values().all(|c| *c == 0));
        assert_eq!(stats.compression_history.daily.len(), 7);
        assert_eq!(stats.compression_history.weekly.len(), 4);
    }

    #[test]
    fn test_aggregates() {
        let t = now();
        let events = vec![
            event_at(CompressionStrategy::Lossless, 100, 80, 1.0, t),
            event_at(CompressionStrategy::Semantic, 100, 50, 0.63, t),
            event_at(CompressionStrategy::Summary, 100, 10, 0.7, t),
            event_at(CompressionStrategy::Hybrid, 100, 120, 0.99, t),
        ];

        let stats = CompressionStatistics::from_events(&events, 10, t);
        assert_eq!(stats.total_compressions, 4);
        assert_eq!(stats.total_tokens_saved, 20 + 50 + 90 - 20);
        assert_eq!(stats.average_compression_ratio, 0.5);
        // Lossless strategy plus the 0.99 hybrid event
        assert_eq!(stats.lossless_percentage, 50.0);
        assert_eq!(stats.most_effective_strategy, Some(CompressionStrategy::Summary));
        assert!(stats.compressions_by_type.values().all(|c| *c == 1));
        assert_eq!(
            stats.compressions_by_type.values().sum::<usize>(),
            stats.total_compressions
        );
    }

    #[test]
    fn test_most_effective_tie_keeps_first_seen() {
        let t = now();
        let events = vec![
            event_at(CompressionStrategy::Semantic, 50, 0, 0.6, t),
            event_at(CompressionStrategy::Lossless, 50, 0, 1.0, t),
        ];

        let stats = CompressionStatistics::from_events(&events, 10, t);
        assert_eq!(stats.most_effective_strategy, Some(CompressionStrategy::Semantic));
    }

    #[test]
    fn test_recent_keeps_last_n_in_order() {
        let t = now();
        let events: Vec<_> = (0..15)
            .map(|i| event_at(CompressionStrategy::Lossless, i, 0, 1.0, t))
            .collect();

        let stats = CompressionStatistics::from_events(&events, 10, t);
        let originals: Vec<u32> = stats
            .recent_compressions
            .iter()
            .map(|e| e.original_tokens)
            .collect();
        assert_eq!(originals, (5..15).collect::<Vec<u32>>());
    }

    #[test]
    fn test_daily_buckets() {
        let t = now();
        let events = vec![
            event_at(CompressionStrategy::Lossless, 10, 5, 1.0, t),
            event_at(CompressionStrategy::Lossless, 10, 5, 1.0, t - Duration::days(2)),
            // Outside the 7-day window
            event_at(CompressionStrategy::Lossless, 10, 5, 1.0, t - Duration::days(9)),
        ];

        let stats = CompressionStatistics::from_events(&events, 10, t);
        let daily = &stats.compression_history.daily;
        assert_eq!(daily[0].period_start, NaiveDate::from_ymd_opt(2024, 5, 9).unwrap());
        assert_eq!(daily[6].period_start, NaiveDate::from_ymd_opt(2024, 5, 15).unwrap());
        assert_eq!(daily[6].compressions, 1);
        assert_eq!(daily[6].tokens_saved, 5);
        assert_eq!(daily[4].compressions, 1);
        assert_eq!(daily.iter().map(|b| b.compressions).sum::<usize>(), 2);
    }

    #[test]
    fn test_weekly_buckets_start_on_sunday() {
        let t = now();
        let events = vec![
            event_at(CompressionStrategy::Summary, 30, 10, 0.7, t),
            // Previous Saturday belongs to the prior week
            event_at(CompressionStrategy::Summary, 30, 10, 0.7, t - Duration::days(4)),
            event_at(CompressionStrategy::Summary, 30, 10, 0.7, t - Duration::days(40)),
        ];

        let stats = CompressionStatistics::from_events(&events, 10, t);
        let weekly = &stats.compression_history.weekly;
        assert_eq!(weekly[3].period_start, NaiveDate::from_ymd_opt(2024, 5, 12).unwrap());
        assert_eq!(weekly[0].period_start, NaiveDate::from_ymd_opt(2024, 4, 21).unwrap());
        assert_eq!(weekly[3].compressions, 1);
        assert_eq!(weekly[2].compressions, 1);
        assert_eq!(weekly[2].tokens_saved, 20);
        assert_eq!(weekly.iter().map(|b| b.compressions).sum::<usize>(), 2);
    }

    #[test]
    fn test_serializes_camel_case() {
        let stats = CompressionStatistics::from_events(&[], 10, now());
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["compressionsByType"]["lossless"], 0);
        assert!(json["compressionHistory"]["daily"][0]["periodStart"].is_string());
    }
}
