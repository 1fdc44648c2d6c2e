// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Concurrent last-known-value cache.
//!
//! [`ValueStore`] maps display names to their latest [`Sample`]. Entries are
//! sharded and locked individually, so a reader holds a lock only for the
//! time it takes to clone one sample. The session task is the only caller
//! of [`ValueStore::update`]; the staleness sweeper only downgrades quality.
//!
//! # Ordering
//!
//! A sample older than the stored one is discarded. `observed_at` never
//! goes backwards for a given display name.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

// =============================================================================
// Value
// =============================================================================

/// A point payload.
///
/// Serialized without a tag, so JSON readers see plain scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value.
    Boolean(bool),
    /// Integer value (all OPC UA integer widths widen to i64).
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl Value {
    /// Rounds floating point values to the given number of decimals.
    ///
    /// Non-finite floats and other variants are returned unchanged.
    pub fn rounded(&self, decimals: u32) -> Value {
        match self {
            Value::Float(v) if v.is_finite() => {
                let factor = 10f64.powi(decimals as i32);
                Value::Float((v * factor).round() / factor)
            }
            other => other.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

// =============================================================================
// Quality
// =============================================================================

/// Confidence in a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Quality {
    /// Reported good by the server and fresh.
    Good,
    /// Not refreshed within the staleness threshold.
    Stale,
    /// Reported bad by the server.
    Bad,
    /// Uncertain, or never observed.
    #[default]
    Unknown,
}

impl Quality {
    /// Severity bits of an OPC UA status code.
    const SEVERITY_MASK: u32 = 0xC000_0000;
    const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;

    /// Maps an OPC UA status code to a quality.
    pub fn from_status_code(status_code: u32) -> Self {
        match status_code & Self::SEVERITY_MASK {
            0 => Quality::Good,
            Self::SEVERITY_UNCERTAIN => Quality::Unknown,
            _ => Quality::Bad,
        }
    }

    /// Returns the display name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Quality::Good => "Good",
            Quality::Stale => "Stale",
            Quality::Bad => "Bad",
            Quality::Unknown => "Unknown",
        }
    }

    /// Returns `true` if the quality is good.
    #[inline]
    pub fn is_good(&self) -> bool {
        matches!(self, Quality::Good)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sample
// =============================================================================

/// The latest observation of one point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Payload; `None` until a notification carried one.
    pub value: Option<Value>,
    /// Quality flag.
    pub quality: Quality,
    /// Wall-clock time of the notification that produced this sample.
    pub observed_at: DateTime<Utc>,
    /// Monotonic time at which the sample was stored.
    #[serde(skip)]
    pub received_at: Instant,
}

/// Result of [`ValueStore::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// First sample for this display name.
    Inserted,
    /// Existing sample replaced.
    Updated,
    /// Older than the stored sample; ignored.
    Discarded,
}

// =============================================================================
// ValueStore
// =============================================================================

/// Display name to latest sample.
#[derive(Debug, Default)]
pub struct ValueStore {
    samples: DashMap<String, Sample>,
}

impl ValueStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts the sample for a display name.
    ///
    /// A notification without a payload keeps the previous value and only
    /// refreshes quality and timestamps.
    pub fn update(
        &self,
        display_name: &str,
        value: Option<Value>,
        quality: Quality,
        observed_at: DateTime<Utc>,
    ) -> UpdateOutcome {
        let received_at = Instant::now();

        if let Some(mut current) = self.samples.get_mut(display_name) {
            return refresh(&mut current, value, quality, observed_at, received_at);
        }

        match self.samples.entry(display_name.to_string()) {
            Entry::Occupied(mut entry) => {
                refresh(entry.get_mut(), value, quality, observed_at, received_at)
            }
            Entry::Vacant(entry) => {
                entry.insert(Sample {
                    value,
                    quality,
                    observed_at,
                    received_at,
                });
                UpdateOutcome::Inserted
            }
        }
    }

    /// Returns a copy of the sample for a display name.
    pub fn get(&self, display_name: &str) -> Option<Sample> {
        self.samples.get(display_name).map(|entry| entry.value().clone())
    }

    /// Returns a copy of every sample.
    pub fn snapshot(&self) -> HashMap<String, Sample> {
        self.samples
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Marks every sample not refreshed within `threshold` of `now` as
    /// Stale, keeping its last value. Returns the number of samples
    /// downgraded.
    pub fn mark_stale_if_older_than(&self, threshold: Duration, now: Instant) -> usize {
        let mut marked = 0;
        for mut entry in self.samples.iter_mut() {
            let sample = entry.value_mut();
            if sample.quality != Quality::Stale
                && now.saturating_duration_since(sample.received_at) > threshold
            {
                sample.quality = Quality::Stale;
                marked += 1;
            }
        }
        marked
    }

    /// Returns the number of observed points.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if nothing has been observed yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Applies a notification to an existing sample unless it is older.
fn refresh(
    current: &mut Sample,
    value: Option<Value>,
    quality: Quality,
    observed_at: DateTime<Utc>,
    received_at: Instant,
) -> UpdateOutcome {
    if observed_at < current.observed_at {
        return UpdateOutcome::Discarded;
    }
    if value.is_some() {
        current.value = value;
    }
    current.quality = quality;
    current.observed_at = observed_at;
    current.received_at = received_at;
    UpdateOutcome::Updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_quality_from_status_code() {
        assert_eq!(Quality::from_status_code(0), Quality::Good);
        assert_eq!(Quality::from_status_code(0x0000_0001), Quality::Good);
        assert_eq!(Quality::from_status_code(0x4093_0000), Quality::Unknown);
        assert_eq!(Quality::from_status_code(0x8034_0000), Quality::Bad);
        assert_eq!(Quality::from_status_code(0xC000_0000), Quality::Bad);
    }

    #[test]
    fn test_value_serializes_plain() {
        assert_eq!(serde_json::to_string(&Value::Float(12.4)).unwrap(), "12.4");
        assert_eq!(serde_json::to_string(&Value::Boolean(true)).unwrap(), "true");
        assert_eq!(serde_json::to_string(&Value::from("on")).unwrap(), "\"on\"");
    }

    #[test]
    fn test_value_rounded() {
        assert_eq!(Value::Float(12.3456).rounded(2), Value::Float(12.35));
        assert_eq!(Value::Integer(7).rounded(2), Value::Integer(7));
        assert!(matches!(Value::Float(f64::NAN).rounded(2), Value::Float(v) if v.is_nan()));
    }

    #[tokio::test]
    async fn test_update_insert_then_update() {
        let store = ValueStore::new();
        assert_eq!(store.update("Flow", Some(Value::Float(12.4)), Quality::Good, at(0)), UpdateOutcome::Inserted);
        assert_eq!(store.update("Flow", Some(Value::Float(13.1)), Quality::Good, at(1)), UpdateOutcome::Updated);

        let sample = store.get("Flow").unwrap();
        assert_eq!(sample.value, Some(Value::Float(13.1)));
        assert_eq!(sample.observed_at, at(1));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_update_discards_older() {
        let store = ValueStore::new();
        store.update("Flow", Some(Value::Float(3.0)), Quality::Good, at(3));
        assert_eq!(store.update("Flow", Some(Value::Float(1.0)), Quality::Good, at(1)), UpdateOutcome::Discarded);

        let sample = store.get("Flow").unwrap();
        assert_eq!(sample.value, Some(Value::Float(3.0)));
        assert_eq!(sample.observed_at, at(3));
    }

    #[tokio::test]
    async fn test_update_without_payload_keeps_value() {
        let store = ValueStore::new();
        store.update("Flow", Some(Value::Float(5.0)), Quality::Good, at(0));
        store.update("Flow", None, Quality::Bad, at(1));

        let sample = store.get("Flow").unwrap();
        assert_eq!(sample.value, Some(Value::Float(5.0)));
        assert_eq!(sample.quality, Quality::Bad);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_stale() {
        let store = ValueStore::new();
        store.update("Flow", Some(Value::Float(1.0)), Quality::Good, at(0));
        store.update("Valve", Some(Value::Boolean(true)), Quality::Bad, at(0));

        assert_eq!(store.mark_stale_if_older_than(Duration::from_secs(5), Instant::now()), 0);

        tokio::time::advance(Duration::from_secs(6)).await;
        store.update("Level", Some(Value::Integer(2)), Quality::Unknown, at(6));

        assert_eq!(store.mark_stale_if_older_than(Duration::from_secs(5), Instant::now()), 2);
        assert_eq!(store.get("Flow").unwrap().quality, Quality::Stale);
        assert_eq!(store.get("Flow").unwrap().value, Some(Value::Float(1.0)));
        assert_eq!(store.get("Valve").unwrap().quality, Quality::Stale);
        assert_eq!(store.get("Valve").unwrap().value, Some(Value::Boolean(true)));
        assert_eq!(store.get("Level").unwrap().quality, Quality::Unknown);
        assert_eq!(store.len(), 3);

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(store.mark_stale_if_older_than(Duration::from_secs(5), Instant::now()), 1);
        assert_eq!(store.get("Level").unwrap().quality, Quality::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_sample_goes_stale() {
        let store = ValueStore::new();
        store.update("Level", Some(Value::Float(2.0)), Quality::Bad, at(0));

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(store.mark_stale_if_older_than(Duration::from_secs(5), Instant::now()), 1);

        let sample = store.get("Level").unwrap();
        assert_eq!(sample.quality, Quality::Stale);
        assert_eq!(sample.value, Some(Value::Float(2.0)));
    }

    #[tokio::test]
    async fn test_repeated_updates_keep_one_entry() {
        let store = ValueStore::new();
        assert_eq!(
            store.update("Flow", Some(Value::Float(1.0)), Quality::Good, at(0)),
            UpdateOutcome::Inserted
        );
        for i in 1..=5 {
            assert_eq!(
                store.update("Flow", Some(Value::Float(i as f64)), Quality::Good, at(i)),
                UpdateOutcome::Updated
            );
        }
        assert_eq!(
            store.update("Flow", Some(Value::Float(0.5)), Quality::Good, at(2)),
            UpdateOutcome::Discarded
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("Flow").unwrap().value, Some(Value::Float(5.0)));
    }

    #[tokio::test]
    async fn test_snapshot() {
        let store = ValueStore::new();
        assert!(store.snapshot().is_empty());
        store.update("A", Some(Value::Integer(1)), Quality::Good, at(0));
        store.update("B", Some(Value::from("x")), Quality::Good, at(0));
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["B"].value, Some(Value::Text("x".into())));
    }
}
