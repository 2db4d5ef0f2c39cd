//! Summary presenter: grand totals, daily series, and plain-text tables.

use crate::aggregate::{Aggregation, DatedRecord, Granularity};
use crate::domain::records::{FeedRecord, MilkRecord};
use crate::time::farm_calendar::parse_record_date;
use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// What to read from each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure<'a> {
    Field(&'a str),
    /// Sum of every value field.
    Sum,
}

impl Measure<'_> {
    fn of(&self, record: &DatedRecord) -> f64 {
        match self {
            Measure::Field(f) => record.value(f).unwrap_or(0.0),
            Measure::Sum => record.value_sum(),
        }
    }
}

/// Sum over well-formed records only.
pub fn grand_total(records: &[DatedRecord], measure: Measure<'_>) -> f64 {
    records
        .iter()
        .filter(|r| r.is_well_formed())
        .map(|r| measure.of(r))
        .sum()
}

pub fn record_count(records: &[DatedRecord]) -> usize {
    records.iter().filter(|r| r.is_well_formed()).count()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeedSummary {
    pub total_feeds: usize,
    pub total_quantity: f64,
    pub total_cost: f64,
}

impl FeedSummary {
    pub fn from_records(records: &[DatedRecord]) -> Self {
        Self {
            total_feeds: record_count(records),
            total_quantity: grand_total(records, Measure::Field("quantity")),
            total_cost: grand_total(records, Measure::Field("cost")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MilkSummary {
    pub record_count: usize,
    pub grand_total: f64,
}

impl MilkSummary {
    pub fn from_records(records: &[DatedRecord]) -> Self {
        Self {
            record_count: record_count(records),
            grand_total: grand_total(records, Measure::Sum),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Per-day sums, oldest day first. Malformed records are left out.
pub fn daily_series(records: &[DatedRecord], measure: Measure<'_>) -> Vec<SeriesPoint> {
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in records {
        if let Ok(date) = record.check() {
            *days.entry(date).or_insert(0.0) += measure.of(record);
        }
    }
    days.into_iter()
        .map(|(date, value)| SeriesPoint { date, value })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesAnalytics {
    pub milk_liters: Vec<SeriesPoint>,
    pub feed_cost: Vec<SeriesPoint>,
    pub total_milk_liters: f64,
    pub total_feed_cost: f64,
}

impl SalesAnalytics {
    pub fn build(milk: &[DatedRecord], feed: &[DatedRecord]) -> Self {
        Self {
            milk_liters: daily_series(milk, Measure::Sum),
            feed_cost: daily_series(feed, Measure::Field("cost")),
            total_milk_liters: grand_total(milk, Measure::Sum),
            total_feed_cost: grand_total(feed, Measure::Field("cost")),
        }
    }
}

pub fn format_amount(v: f64) -> String {
    format!("{v:.2}")
}

pub fn format_money(v: f64) -> String {
    format!("Ksh.{v:.2}")
}

/// Aligned plain-text table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub title: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub empty_message: String,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: None,
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            empty_message: "No records found.".to_string(),
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn when_empty(mut self, message: impl Into<String>) -> Self {
        self.empty_message = message.into();
        self
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(title) = &self.title {
            out.push_str(title);
            out.push('\n');
        }

        if self.rows.is_empty() {
            out.push_str(&self.empty_message);
            out.push('\n');
            return out;
        }

        let columns = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);
        let mut widths = vec![0usize; columns];
        for row in std::iter::once(&self.headers).chain(self.rows.iter()) {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let line = |cells: &[String]| -> String {
            let padded: Vec<String> = (0..columns)
                .map(|i| {
                    let cell = cells.get(i).map(String::as_str).unwrap_or("");
                    format!("{cell:<width$}", width = widths[i])
                })
                .collect();
            padded.join("  ").trim_end().to_string()
        };

        out.push_str(&line(self.headers.as_slice()));
        out.push('\n');
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&rule.join("  "));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&line(row.as_slice()));
            out.push('\n');
        }
        out
    }
}

fn period_heading(agg: &Aggregation) -> &'static str {
    match agg.granularity {
        Granularity::Week => "Week",
        Granularity::Month => "Month",
        Granularity::Year => "Year",
    }
}

fn summary_title(agg: &Aggregation) -> &'static str {
    match agg.granularity {
        Granularity::Week => "Weekly Summary",
        Granularity::Month => "Monthly Summary",
        Granularity::Year => "Yearly Summary",
    }
}

fn empty_message(agg: &Aggregation) -> String {
    let adverb = match agg.granularity {
        Granularity::Week => "weekly",
        Granularity::Month => "monthly",
        Granularity::Year => "yearly",
    };
    format!("No {adverb} records found.")
}

pub fn feed_bucket_table(agg: &Aggregation) -> Table {
    let mut table = Table::new([period_heading(agg), "Total Quantity(kgs)", "Total Cost"])
        .titled(summary_title(agg))
        .when_empty(empty_message(agg));
    for bucket in &agg.buckets {
        table.push(vec![
            bucket.period_label.clone(),
            format_amount(bucket.total("quantity")),
            format_money(bucket.total("cost")),
        ]);
    }
    table
}

/// One column per rostered animal, headed by its tag, then the bucket total.
pub fn milk_bucket_table(agg: &Aggregation, roster: &BTreeMap<String, String>) -> Table {
    let mut headers = vec![period_heading(agg).to_string()];
    headers.extend(roster.values().map(|tag| format!("{tag} (L)")));
    headers.push("Total (L)".to_string());

    let mut table = Table::new(headers)
        .titled(summary_title(agg))
        .when_empty(empty_message(agg));
    for bucket in &agg.buckets {
        let mut row = vec![bucket.period_label.clone()];
        row.extend(
            roster
                .keys()
                .map(|id| format_amount(bucket.group_total(id).unwrap_or(0.0))),
        );
        row.push(format_amount(bucket.total_all()));
        table.push(row);
    }
    table
}

fn date_cell(raw: Option<&str>, offset: FixedOffset) -> String {
    raw.and_then(|s| parse_record_date(s, offset))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| raw.unwrap_or("-").to_string())
}

fn opt_amount(v: Option<f64>) -> String {
    v.map(format_amount).unwrap_or_else(|| "-".to_string())
}

pub fn feed_records_table(records: &[FeedRecord], offset: FixedOffset) -> Table {
    let mut table = Table::new(["ID", "Date", "Name", "Quantity", "Unit", "Cost"])
        .titled("Feed Records")
        .when_empty("No feeds found.");
    for feed in records {
        table.push(vec![
            feed.id.clone().unwrap_or_default(),
            date_cell(feed.date_purchased.as_deref(), offset),
            feed.name.clone(),
            opt_amount(feed.quantity),
            feed.unit.clone(),
            feed.cost
                .map(format_money)
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}

pub fn milk_records_table(
    records: &[MilkRecord],
    roster: &BTreeMap<String, String>,
    offset: FixedOffset,
) -> Table {
    let mut table = Table::new([
        "ID",
        "Date",
        "Animal Tag",
        "Morning (L)",
        "Evening (L)",
        "Total (L)",
    ])
    .titled("Daily Records");
    for milk in records {
        let tag = milk
            .animal_id
            .as_ref()
            .map(|a| {
                roster
                    .get(a.id())
                    .cloned()
                    .unwrap_or_else(|| a.id().to_string())
            })
            .unwrap_or_else(|| "-".to_string());
        table.push(vec![
            milk.id.clone().unwrap_or_default(),
            date_cell(milk.date.as_deref(), offset),
            tag,
            opt_amount(milk.morning_milk),
            opt_amount(milk.evening_milk),
            opt_amount(milk.total()),
        ]);
    }
    table
}
