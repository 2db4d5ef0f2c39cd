use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A dated record after type coercion.
///
/// Coercion never fails: a timestamp that did not parse is stored as `None`, and so is a value
/// that was not a finite number. The aggregator decides what to do with such records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatedRecord {
    pub id: Option<String>,
    pub timestamp: Option<NaiveDate>,
    pub values: BTreeMap<String, Option<f64>>,
    pub group_key: Option<String>,
}

impl DatedRecord {
    pub fn new(timestamp: Option<NaiveDate>) -> Self {
        Self {
            id: None,
            timestamp,
            values: BTreeMap::new(),
            group_key: None,
        }
    }

    pub fn on(date: NaiveDate) -> Self {
        Self::new(Some(date))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_value(mut self, field: impl Into<String>, value: f64) -> Self {
        let value = value.is_finite().then_some(value);
        self.values.insert(field.into(), value);
        self
    }

    pub fn with_missing_value(mut self, field: impl Into<String>) -> Self {
        self.values.insert(field.into(), None);
        self
    }

    pub fn with_group(mut self, key: impl Into<String>) -> Self {
        self.group_key = Some(key.into());
        self
    }

    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied().flatten()
    }

    /// Sum of every value field; what a record contributes to its group's total.
    pub fn value_sum(&self) -> f64 {
        self.values.values().flatten().sum()
    }

    /// Returns the record's date when the record is well-formed.
    pub fn check(&self) -> Result<NaiveDate, SkipReason> {
        let date = self.timestamp.ok_or(SkipReason::BadTimestamp)?;
        if self.values.is_empty() {
            return Err(SkipReason::NoValues);
        }
        if let Some((field, _)) = self.values.iter().find(|(_, v)| v.is_none()) {
            return Err(SkipReason::NonNumeric {
                field: field.clone(),
            });
        }
        Ok(date)
    }

    pub fn is_well_formed(&self) -> bool {
        self.check().is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    BadTimestamp,
    NonNumeric { field: String },
    NoValues,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BadTimestamp => write!(f, "missing or unparsable timestamp"),
            SkipReason::NonNumeric { field } => write!(f, "field {field} is not numeric"),
            SkipReason::NoValues => write!(f, "record has no value fields"),
        }
    }
}

/// A record left out of aggregation. Not an error: the batch still aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationSkip {
    pub index: usize,
    pub id: Option<String>,
    #[serde(flatten)]
    pub reason: SkipReason,
}
