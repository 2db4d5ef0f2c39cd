//! Period aggregation: buckets dated records by week, month, or year and sums their values.
//!
//! Bucket labels and their ordering follow the farm app's long-standing conventions:
//! Sunday-based week numbers (see [`crate::time::farm_calendar::week_of_year`]) and buckets
//! sorted by label in descending byte order. The byte order puts "Week 9, 2024" ahead of
//! "Week 10, 2024"; callers that want calendar order can use [`order_chronologically`].

mod record;

pub use record::{AggregationSkip, DatedRecord, SkipReason};

use crate::time::farm_calendar::{start_of_month, start_of_week, start_of_year, week_of_year};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

const MAX_LOGGED_SKIPS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Week,
    Month,
    Year,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Week, Granularity::Month, Granularity::Year];

    pub fn label(self, date: NaiveDate) -> String {
        match self {
            Granularity::Week => format!("Week {}, {}", week_of_year(date), date.year()),
            Granularity::Month => date.format("%B %Y").to_string(),
            Granularity::Year => date.year().to_string(),
        }
    }

    pub fn period_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Week => start_of_week(date),
            Granularity::Month => start_of_month(date),
            Granularity::Year => start_of_year(date),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown granularity {0:?} (expected week, month, or year)")]
pub struct ParseGranularityError(String);

impl FromStr for Granularity {
    type Err = ParseGranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            "year" | "yearly" => Ok(Granularity::Year),
            _ => Err(ParseGranularityError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodBucket {
    pub period_label: String,
    pub period_start: NaiveDate,
    pub totals: BTreeMap<String, f64>,
    pub group_totals: BTreeMap<String, f64>,
    pub records: Vec<DatedRecord>,
}

impl PeriodBucket {
    fn seeded(period_label: String, period_start: NaiveDate, known: &BTreeSet<String>) -> Self {
        Self {
            period_label,
            period_start,
            totals: BTreeMap::new(),
            group_totals: known.iter().map(|k| (k.clone(), 0.0)).collect(),
            records: Vec::new(),
        }
    }

    pub fn total(&self, field: &str) -> f64 {
        self.totals.get(field).copied().unwrap_or(0.0)
    }

    pub fn group_total(&self, key: &str) -> Option<f64> {
        self.group_totals.get(key).copied()
    }

    /// Sum of every field total in the bucket.
    pub fn total_all(&self) -> f64 {
        self.totals.values().sum()
    }

    fn absorb(&mut self, record: &DatedRecord, known: &BTreeSet<String>) {
        for (field, value) in &record.values {
            *self.totals.entry(field.clone()).or_insert(0.0) += value.unwrap_or(0.0);
        }

        if let Some(key) = record.group_key.as_deref() {
            if known.is_empty() || known.contains(key) {
                *self.group_totals.entry(key.to_string()).or_insert(0.0) += record.value_sum();
            } else {
                tracing::debug!(
                    group_key = key,
                    period = %self.period_label,
                    "group key not among known keys; counted in field totals only"
                );
            }
        }

        self.records.push(record.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub granularity: Granularity,
    pub buckets: Vec<PeriodBucket>,
    pub skipped: Vec<AggregationSkip>,
}

impl Aggregation {
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Sum of a field across all buckets.
    pub fn total(&self, field: &str) -> f64 {
        self.buckets.iter().map(|b| b.total(field)).sum()
    }

    pub fn bucket(&self, label: &str) -> Option<&PeriodBucket> {
        self.buckets.iter().find(|b| b.period_label == label)
    }
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    granularity: Granularity,
    known_group_keys: BTreeSet<String>,
}

impl Aggregator {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            known_group_keys: BTreeSet::new(),
        }
    }

    /// Every bucket gets a zero entry for each known key, and only known keys are credited.
    pub fn with_known_group_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_group_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn aggregate(&self, records: &[DatedRecord]) -> Aggregation {
        let mut buckets: Vec<PeriodBucket> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut skipped = Vec::new();

        for (index, record) in records.iter().enumerate() {
            let date = match record.check() {
                Ok(date) => date,
                Err(reason) => {
                    skipped.push(AggregationSkip {
                        index,
                        id: record.id.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let label = self.granularity.label(date);
            let slot = match slots.get(&label) {
                Some(&slot) => slot,
                None => {
                    buckets.push(PeriodBucket::seeded(
                        label.clone(),
                        self.granularity.period_start(date),
                        &self.known_group_keys,
                    ));
                    slots.insert(label, buckets.len() - 1);
                    buckets.len() - 1
                }
            };
            buckets[slot].absorb(record, &self.known_group_keys);
        }

        buckets.sort_by(|a, b| b.period_label.cmp(&a.period_label));
        log_skips(&skipped, self.granularity);

        Aggregation {
            granularity: self.granularity,
            buckets,
            skipped,
        }
    }
}

pub fn aggregate(
    records: &[DatedRecord],
    granularity: Granularity,
    known_group_keys: &BTreeSet<String>,
) -> Aggregation {
    Aggregator::new(granularity)
        .with_known_group_keys(known_group_keys.iter().cloned())
        .aggregate(records)
}

/// Newest period first, by calendar date rather than label.
pub fn order_chronologically(buckets: &mut [PeriodBucket]) {
    buckets.sort_by(|a, b| b.period_start.cmp(&a.period_start));
}

fn log_skips(skipped: &[AggregationSkip], granularity: Granularity) {
    if skipped.is_empty() {
        return;
    }

    for skip in skipped.iter().take(MAX_LOGGED_SKIPS) {
        tracing::debug!(
            index = skip.index,
            id = ?skip.id,
            reason = %skip.reason,
            %granularity,
            "record excluded from aggregation"
        );
    }

    tracing::warn!(
        skipped = skipped.len(),
        %granularity,
        "malformed records excluded from aggregation"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn cost(date: NaiveDate, v: f64) -> DatedRecord {
        DatedRecord::on(date).with_value("cost", v)
    }

    fn mixed_records() -> Vec<DatedRecord> {
        vec![
            cost(d(2023, 12, 30), 4.0),
            cost(d(2024, 1, 1), 10.0),
            cost(d(2024, 1, 9), 2.5),
            DatedRecord::new(None).with_value("cost", 99.0),
            cost(d(2024, 2, 14), 7.0),
            cost(d(2024, 3, 2), 1.25),
            DatedRecord::on(d(2024, 3, 3)).with_missing_value("cost"),
            cost(d(2024, 3, 20), 3.0),
        ]
    }

    #[test]
    fn same_year_records_share_one_bucket() {
        let records = vec![cost(d(2024, 1, 1), 10.0), cost(d(2024, 1, 1), 5.0)];
        let agg = aggregate(&records, Granularity::Year, &BTreeSet::new());

        assert_eq!(agg.buckets.len(), 1);
        assert_eq!(agg.buckets[0].period_label, "2024");
        assert_eq!(agg.buckets[0].total("cost"), 15.0);
        assert_eq!(agg.buckets[0].records.len(), 2);
    }

    #[test]
    fn months_are_separate_and_sorted_descending() {
        let records = vec![
            cost(d(2024, 1, 3), 10.0),
            cost(d(2024, 2, 5), 4.0),
            cost(d(2024, 1, 20), 1.0),
        ];
        let agg = aggregate(&records, Granularity::Month, &BTreeSet::new());

        let labels: Vec<_> = agg.buckets.iter().map(|b| b.period_label.as_str()).collect();
        assert_eq!(labels, ["January 2024", "February 2024"]);
        assert_eq!(agg.bucket("January 2024").unwrap().total("cost"), 11.0);
        assert_eq!(agg.bucket("February 2024").unwrap().total("cost"), 4.0);
    }

    #[test]
    fn empty_input_yields_no_buckets() {
        let agg = aggregate(&[], Granularity::Week, &BTreeSet::new());
        assert!(agg.is_empty());
        assert!(agg.skipped.is_empty());
    }

    #[test]
    fn known_keys_are_zero_filled() {
        let known: BTreeSet<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
        let records = vec![
            DatedRecord::on(d(2024, 4, 2))
                .with_value("morningMilk", 6.0)
                .with_value("eveningMilk", 4.0)
                .with_group("A"),
            DatedRecord::on(d(2024, 4, 3))
                .with_value("morningMilk", 5.0)
                .with_value("eveningMilk", 5.0)
                .with_group("A"),
        ];
        let agg = aggregate(&records, Granularity::Month, &known);

        let bucket = &agg.buckets[0];
        assert_eq!(bucket.group_total("A"), Some(20.0));
        assert_eq!(bucket.group_total("B"), Some(0.0));
        assert_eq!(bucket.total("morningMilk"), 11.0);
        assert_eq!(bucket.total_all(), 20.0);
    }

    #[test]
    fn unknown_group_keys_count_only_in_field_totals() {
        let records = vec![
            cost(d(2024, 4, 2), 3.0).with_group("A"),
            cost(d(2024, 4, 2), 2.0).with_group("ghost"),
        ];
        let agg = Aggregator::new(Granularity::Year)
            .with_known_group_keys(["A"])
            .aggregate(&records);

        let bucket = &agg.buckets[0];
        assert_eq!(bucket.total("cost"), 5.0);
        assert_eq!(bucket.group_total("A"), Some(3.0));
        assert_eq!(bucket.group_total("ghost"), None);
        assert_eq!(bucket.records.len(), 2);
    }

    #[test]
    fn open_group_breakdown_without_known_keys() {
        let records = vec![
            cost(d(2024, 4, 2), 3.0).with_group("A"),
            cost(d(2024, 4, 9), 2.0).with_group("B"),
        ];
        let agg = aggregate(&records, Granularity::Year, &BTreeSet::new());
        assert_eq!(agg.buckets[0].group_total("A"), Some(3.0));
        assert_eq!(agg.buckets[0].group_total("B"), Some(2.0));
    }

    #[test]
    fn malformed_records_are_reported_not_fatal() {
        let records = mixed_records();
        let agg = aggregate(&records, Granularity::Month, &BTreeSet::new());

        assert_eq!(agg.skipped.len(), 2);
        assert_eq!(agg.skipped[0].index, 3);
        assert_eq!(agg.skipped[0].reason, SkipReason::BadTimestamp);
        assert_eq!(agg.skipped[1].index, 6);
        assert!(agg
            .buckets
            .iter()
            .all(|b| b.records.iter().all(DatedRecord::is_well_formed)));
    }

    #[test]
    fn totals_are_conserved_for_every_granularity() {
        let records = mixed_records();
        let expected: f64 = records
            .iter()
            .filter(|r| r.is_well_formed())
            .filter_map(|r| r.value("cost"))
            .sum();

        for granularity in Granularity::ALL {
            let agg = aggregate(&records, granularity, &BTreeSet::new());
            assert_eq!(agg.total("cost"), expected, "granularity {granularity}");
        }
    }

    #[test]
    fn every_well_formed_record_lands_in_exactly_one_bucket() {
        let records = mixed_records();
        let well_formed = records.iter().filter(|r| r.is_well_formed()).count();

        for granularity in Granularity::ALL {
            let agg = aggregate(&records, granularity, &BTreeSet::new());
            let placed: usize = agg.buckets.iter().map(|b| b.records.len()).sum();
            assert_eq!(placed, well_formed);

            for record in records.iter().filter(|r| r.is_well_formed()) {
                let holders = agg
                    .buckets
                    .iter()
                    .filter(|b| b.records.contains(record))
                    .count();
                assert_eq!(holders, 1);
            }
        }
    }

    #[test]
    fn aggregation_is_repeatable() {
        let records = mixed_records();
        let aggregator = Aggregator::new(Granularity::Week).with_known_group_keys(["A"]);
        assert_eq!(aggregator.aggregate(&records), aggregator.aggregate(&records));
    }

    #[test]
    fn member_records_keep_input_order() {
        let records = vec![
            cost(d(2024, 6, 20), 1.0).with_id("late"),
            cost(d(2024, 6, 2), 2.0).with_id("early"),
        ];
        let agg = aggregate(&records, Granularity::Month, &BTreeSet::new());
        let ids: Vec<_> = agg.buckets[0]
            .records
            .iter()
            .map(|r| r.id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, ["late", "early"]);
    }

    #[test]
    fn week_labels_sort_by_bytes_not_by_number() {
        let records = vec![
            cost(d(2024, 3, 4), 1.0),
            cost(d(2024, 2, 26), 1.0),
            cost(d(2024, 2, 20), 1.0),
        ];
        let agg = aggregate(&records, Granularity::Week, &BTreeSet::new());
        let labels: Vec<_> = agg.buckets.iter().map(|b| b.period_label.as_str()).collect();
        assert_eq!(labels, ["Week 9, 2024", "Week 8, 2024", "Week 10, 2024"]);

        let mut chrono_order = agg.buckets.clone();
        order_chronologically(&mut chrono_order);
        let labels: Vec<_> = chrono_order
            .iter()
            .map(|b| b.period_label.as_str())
            .collect();
        assert_eq!(labels, ["Week 10, 2024", "Week 9, 2024", "Week 8, 2024"]);
    }

    #[test]
    fn parses_granularity_names() {
        assert_eq!("Week".parse::<Granularity>(), Ok(Granularity::Week));
        assert_eq!("monthly".parse::<Granularity>(), Ok(Granularity::Month));
        assert_eq!("year".parse::<Granularity>(), Ok(Granularity::Year));
        assert!("daily".parse::<Granularity>().is_err());
    }
}
