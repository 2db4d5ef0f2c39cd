use crate::aggregate::DatedRecord;
use crate::auth::Credentials;
use crate::domain::records::Animal;
use crate::ingest::client::DairyApiClient;
use crate::ingest::error::FetchError;
use crate::ingest::normalize::RecordSchema;
use crate::ingest::resources::Resource;
use chrono::{FixedOffset, NaiveDate};
use serde_json::Value;
use std::collections::BTreeMap;

/// Where raw record rows come from. The HTTP client is the production source; tests and the
/// summary service can substitute their own.
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_rows(
        &self,
        credentials: &Credentials,
        resource: Resource,
    ) -> Result<Vec<Value>, FetchError>;
}

#[async_trait::async_trait]
impl RecordSource for DairyApiClient {
    fn source_name(&self) -> &'static str {
        "dairy_http_json"
    }

    async fn fetch_rows(
        &self,
        credentials: &Credentials,
        resource: Resource,
    ) -> Result<Vec<Value>, FetchError> {
        self.get_json(&resource.list_path(), Some(credentials))
            .await
    }
}

/// Inclusive client-side date filter. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Fetches a collection and normalizes it into dated records.
///
/// Records whose date did not parse are kept so the aggregator can report them; the range only
/// drops records with a valid date outside it.
pub async fn fetch_dated(
    source: &dyn RecordSource,
    credentials: &Credentials,
    resource: Resource,
    schema: &RecordSchema,
    offset: FixedOffset,
    range: DateRange,
) -> Result<Vec<DatedRecord>, FetchError> {
    let rows = source.fetch_rows(credentials, resource).await?;
    let fetched = rows.len();

    let records: Vec<DatedRecord> = schema
        .normalize_all(&rows, offset)
        .into_iter()
        .filter(|r| r.timestamp.map_or(true, |d| range.contains(d)))
        .collect();

    tracing::info!(
        source = source.source_name(),
        %resource,
        fetched,
        kept = records.len(),
        "fetched records"
    );
    Ok(records)
}

/// Animal id to tag id, for animals that have both. Rows that do not look like animals are
/// ignored rather than failing the load.
pub async fn fetch_animal_roster(
    source: &dyn RecordSource,
    credentials: &Credentials,
) -> Result<BTreeMap<String, String>, FetchError> {
    let rows = source.fetch_rows(credentials, Resource::Animals).await?;
    let roster: BTreeMap<String, String> = rows
        .into_iter()
        .filter_map(|row| serde_json::from_value::<Animal>(row).ok())
        .filter(Animal::is_valid)
        .map(|a| (a.id, a.tag_id))
        .collect();
    Ok(roster)
}
