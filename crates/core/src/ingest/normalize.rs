use crate::aggregate::DatedRecord;
use crate::domain::lenient::{coerce_id, coerce_number};
use crate::ingest::error::FetchError;
use crate::time::farm_calendar::{date_from_epoch_millis, parse_record_date};
use chrono::{FixedOffset, NaiveDate};
use serde_json::Value;

/// Which raw fields hold a record's date, its summed values, and its group key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSchema {
    pub name: &'static str,
    pub date_field: &'static str,
    pub value_fields: &'static [&'static str],
    pub group_field: Option<&'static str>,
}

impl RecordSchema {
    pub const FEED: RecordSchema = RecordSchema {
        name: "feed",
        date_field: "datePurchased",
        value_fields: &["quantity", "cost"],
        group_field: None,
    };

    pub const MILK: RecordSchema = RecordSchema {
        name: "milk",
        date_field: "date",
        value_fields: &["morningMilk", "eveningMilk"],
        group_field: Some("animalId"),
    };

    pub fn normalize(&self, raw: &Value, offset: FixedOffset) -> DatedRecord {
        let mut record = DatedRecord::new(raw.get(self.date_field).and_then(|v| date_of(v, offset)));

        if let Some(id) = raw.get("_id").and_then(coerce_id) {
            record = record.with_id(id);
        }

        for field in self.value_fields {
            record = match raw.get(*field).and_then(coerce_number) {
                Some(v) => record.with_value(*field, v),
                None => record.with_missing_value(*field),
            };
        }

        if let Some(key) = self
            .group_field
            .and_then(|f| raw.get(f))
            .and_then(coerce_id)
        {
            record = record.with_group(key);
        }

        record
    }

    pub fn normalize_all(&self, rows: &[Value], offset: FixedOffset) -> Vec<DatedRecord> {
        rows.iter().map(|row| self.normalize(row, offset)).collect()
    }
}

fn date_of(v: &Value, offset: FixedOffset) -> Option<NaiveDate> {
    match v {
        Value::String(s) => parse_record_date(s, offset),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| date_from_epoch_millis(ms, offset)),
        _ => None,
    }
}

/// Applies a schema to a payload that must be a JSON array.
pub fn normalize_json(
    schema: &RecordSchema,
    payload: &Value,
    offset: FixedOffset,
) -> Result<Vec<DatedRecord>, FetchError> {
    let rows = payload.as_array().ok_or_else(|| {
        FetchError::Malformed(format!("{} payload is not an array", schema.name))
    })?;
    Ok(schema.normalize_all(rows, offset))
}
