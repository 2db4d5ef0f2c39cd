use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use chrono::NaiveDate;
use dairy_core::aggregate::{order_chronologically, AggregationSkip, Aggregator, Granularity, PeriodBucket};
use dairy_core::auth::Credentials;
use dairy_core::ingest::{fetch_animal_roster, fetch_dated, DateRange, RecordSchema, Resource};
use dairy_core::report::{FeedSummary, MilkSummary, SalesAnalytics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DEFAULT_GRANULARITY: Granularity = Granularity::Week;

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub granularity: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// `chronological` orders buckets by period start instead of by label.
    pub order: Option<String>,
}

impl SummaryQuery {
    fn granularity(&self) -> Result<Granularity, ApiError> {
        match self.granularity.as_deref() {
            None => Ok(DEFAULT_GRANULARITY),
            Some(raw) => raw
                .parse::<Granularity>()
                .map_err(|e| ApiError::bad_request(e.to_string())),
        }
    }

    fn range(&self) -> Result<DateRange, ApiError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ApiError::bad_request(format!(
                    "from ({from}) is after to ({to})"
                )));
            }
        }
        Ok(DateRange {
            from: self.from,
            to: self.to,
        })
    }

    fn chronological(&self) -> Result<bool, ApiError> {
        match self.order.as_deref() {
            None | Some("label") => Ok(false),
            Some("chronological") => Ok(true),
            Some(other) => Err(ApiError::bad_request(format!(
                "unknown order {other:?} (expected label or chronological)"
            ))),
        }
    }
}

fn bearer(headers: &HeaderMap) -> Result<Credentials, ApiError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Authorization header is required"))?;
    let raw = raw
        .to_str()
        .map_err(|_| ApiError::unauthorized("Authorization header is not valid text"))?;
    Credentials::from_authorization(raw)
        .ok_or_else(|| ApiError::unauthorized("Authorization must be a bearer token"))
}

pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub struct FeedSummaryResponse {
    pub granularity: Granularity,
    pub summary: FeedSummary,
    pub buckets: Vec<PeriodBucket>,
    pub skipped: Vec<AggregationSkip>,
}

pub async fn feed_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<FeedSummaryResponse>, ApiError> {
    let credentials = bearer(&headers)?;
    let granularity = query.granularity()?;
    let chronological = query.chronological()?;

    let records = fetch_dated(
        state.source.as_ref(),
        &credentials,
        Resource::Feed,
        &RecordSchema::FEED,
        state.offset,
        query.range()?,
    )
    .await?;

    let mut agg = Aggregator::new(granularity).aggregate(&records);
    if chronological {
        order_chronologically(&mut agg.buckets);
    }

    Ok(Json(FeedSummaryResponse {
        granularity,
        summary: FeedSummary::from_records(&records),
        buckets: agg.buckets,
        skipped: agg.skipped,
    }))
}

#[derive(Debug, Serialize)]
pub struct MilkSummaryResponse {
    pub granularity: Granularity,
    pub summary: MilkSummary,
    /// Animal id to tag id; every bucket carries a total for each of these ids.
    pub animals: BTreeMap<String, String>,
    pub buckets: Vec<PeriodBucket>,
    pub skipped: Vec<AggregationSkip>,
}

pub async fn milk_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<MilkSummaryResponse>, ApiError> {
    let credentials = bearer(&headers)?;
    let granularity = query.granularity()?;
    let chronological = query.chronological()?;
    let range = query.range()?;

    let (animals, records) = tokio::try_join!(
        fetch_animal_roster(state.source.as_ref(), &credentials),
        fetch_dated(
            state.source.as_ref(),
            &credentials,
            Resource::Milk,
            &RecordSchema::MILK,
            state.offset,
            range,
        ),
    )?;

    let mut agg = Aggregator::new(granularity)
        .with_known_group_keys(animals.keys().cloned())
        .aggregate(&records);
    if chronological {
        order_chronologically(&mut agg.buckets);
    }

    Ok(Json(MilkSummaryResponse {
        granularity,
        summary: MilkSummary::from_records(&records),
        animals,
        buckets: agg.buckets,
        skipped: agg.skipped,
    }))
}

pub async fn sales_analytics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SalesAnalytics>, ApiError> {
    let credentials = bearer(&headers)?;
    let range = query.range()?;

    let (milk, feed) = tokio::try_join!(
        fetch_dated(
            state.source.as_ref(),
            &credentials,
            Resource::Milk,
            &RecordSchema::MILK,
            state.offset,
            range,
        ),
        fetch_dated(
            state.source.as_ref(),
            &credentials,
            Resource::Feed,
            &RecordSchema::FEED,
            state.offset,
            range,
        ),
    )?;

    Ok(Json(SalesAnalytics::build(&milk, &feed)))
}
