use crate::{image_path_name, parse_key_val, render, Ctx, RangeArgs, SummaryArgs};
use anyhow::Context;
use clap::Subcommand;
use dairy_core::aggregate::{order_chronologically, Aggregation, Aggregator, DatedRecord};
use dairy_core::auth::Credentials;
use dairy_core::domain::records::{AnimalUpdate, HealthKind, HealthRecord};
use dairy_core::ingest::{
    fetch_animal_roster, fetch_dated, DateRange, RecordSchema, RecordSource, Resource,
};
use dairy_core::report::{
    feed_bucket_table, feed_records_table, format_amount, format_money, milk_bucket_table,
    milk_records_table, FeedSummary, MilkSummary, SalesAnalytics, Table,
};
use dairy_core::validate::{
    validate_animal_update, AnimalForm, FeedForm, HealthForm, ImageFile, MilkForm,
    ValidationErrors,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Subcommand)]
pub enum AnimalAction {
    List,
    /// Register an animal with its photo.
    Add {
        #[arg(long)]
        tag: String,
        #[arg(long)]
        breed: String,
        /// JPEG, PNG or GIF, at most 5 MB.
        #[arg(long)]
        image: PathBuf,
    },
    Update {
        id: String,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        breed: Option<String>,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct FeedArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub quantity: String,
    #[arg(long, default_value = "kgs")]
    pub unit: String,
    #[arg(long)]
    pub cost: String,
    /// Purchase date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum FeedAction {
    List(RangeArgs),
    /// Totals per week, month, or year.
    Summary(SummaryArgs),
    Add(FeedArgs),
    Update {
        id: String,
        #[command(flatten)]
        entry: FeedArgs,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct MilkArgs {
    /// Animal id or tag.
    #[arg(long)]
    pub animal: String,
    /// Morning yield in liters.
    #[arg(long)]
    pub morning: String,
    /// Evening yield in liters.
    #[arg(long)]
    pub evening: String,
    /// Production date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum MilkAction {
    List(RangeArgs),
    /// Per-animal totals per week, month, or year.
    Summary(SummaryArgs),
    Add(MilkArgs),
    Update {
        id: String,
        #[command(flatten)]
        entry: MilkArgs,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct HealthArgs {
    #[arg(long)]
    pub tag: String,
    /// Record date (YYYY-MM-DD); the breeding date for reproductive health.
    #[arg(long)]
    pub date: String,
    /// Kind-specific detail, e.g. `--field vaccine=FMD`. Repeatable.
    #[arg(long = "field", value_parser = parse_key_val)]
    pub fields: Vec<(String, String)>,
}

impl HealthArgs {
    fn form(self, kind: HealthKind) -> HealthForm {
        HealthForm {
            kind,
            tag_id: self.tag,
            date: self.date,
            fields: self.fields.into_iter().collect(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum HealthAction {
    /// Every kind when --kind is omitted.
    List {
        #[arg(long)]
        kind: Option<HealthKind>,
    },
    Add {
        #[arg(long)]
        kind: HealthKind,
        #[command(flatten)]
        entry: HealthArgs,
    },
    Update {
        #[arg(long)]
        kind: HealthKind,
        id: String,
        #[command(flatten)]
        entry: HealthArgs,
    },
    Delete {
        #[arg(long)]
        kind: HealthKind,
        id: String,
    },
}

fn pretty<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    serde_json::to_string_pretty(value).context("failed to encode JSON output")
}

/// Rows whose date falls in `range`; rows without a readable date are kept.
fn rows_in_range(
    rows: Vec<Value>,
    schema: &RecordSchema,
    ctx: &Ctx,
    range: DateRange,
) -> (Vec<Value>, Vec<DatedRecord>) {
    let normalized = schema.normalize_all(&rows, ctx.offset);
    rows.into_iter()
        .zip(normalized)
        .filter(|(_, rec)| rec.timestamp.map_or(true, |d| range.contains(d)))
        .unzip()
}

fn typed<T: DeserializeOwned>(rows: Vec<Value>, resource: Resource) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<T>(row) {
            Ok(v) => Some(v),
            Err(err) => {
                tracing::warn!(%resource, error = %err, "dropping unreadable record");
                None
            }
        })
        .collect()
}

fn aggregate(args: &SummaryArgs, aggregator: Aggregator, records: &[DatedRecord]) -> Aggregation {
    let mut agg = aggregator.aggregate(records);
    if args.chronological {
        order_chronologically(&mut agg.buckets);
    }
    agg
}

fn skipped_note(agg: &Aggregation) -> Option<String> {
    match agg.skipped.len() {
        0 => None,
        1 => Some("1 record skipped (missing date or value).".to_string()),
        n => Some(format!("{n} records skipped (missing date or value).")),
    }
}

fn sections(tables: Vec<(Table, Option<String>)>, footer: String) -> String {
    let mut parts = Vec::new();
    for (table, note) in tables {
        let mut text = table.render();
        if let Some(note) = note {
            text.push('\n');
            text.push_str(&note);
        }
        parts.push(text);
    }
    parts.push(footer);
    parts.join("\n\n")
}

pub async fn animals(ctx: &Ctx, action: AnimalAction) -> anyhow::Result<()> {
    let credentials = ctx.credentials().await?;
    match action {
        AnimalAction::List => {
            let animals = ctx.api.animals(&credentials).await?;
            if ctx.json {
                println!("{}", pretty(&animals)?);
            } else {
                render::print_table(&render::animals_table(&animals, &ctx.api));
            }
        }
        AnimalAction::Add { tag, breed, image } => {
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("failed to read image {}", image.display()))?;
            let animal = AnimalForm {
                tag_id: tag,
                breed,
                image: Some(ImageFile {
                    file_name: image_path_name(&image),
                    bytes,
                }),
            }
            .validate()?;
            let ack = ctx.api.add_animal(&credentials, animal).await?;
            render::print_ack(&ack, "Animal added successfully.");
        }
        AnimalAction::Update { id, tag, breed } => {
            let update = validate_animal_update(AnimalUpdate { tag_id: tag, breed })?;
            let ack = ctx.api.update_animal(&credentials, &id, &update).await?;
            render::print_ack(&ack, "Animal updated successfully.");
        }
        AnimalAction::Delete { id } => {
            let ack = ctx.api.delete(&credentials, Resource::Animals, &id).await?;
            render::print_ack(&ack, "Animal deleted successfully.");
        }
    }
    Ok(())
}

fn feed_form(ctx: &Ctx, args: FeedArgs) -> FeedForm {
    FeedForm {
        name: args.name,
        quantity: args.quantity,
        unit: args.unit,
        cost: args.cost,
        date_purchased: args.date.unwrap_or_else(|| ctx.today().to_string()),
    }
}

pub async fn feed(ctx: &Ctx, action: FeedAction) -> anyhow::Result<()> {
    match action {
        FeedAction::List(range) => {
            let credentials = ctx.credentials().await?;
            println!("{}", feed_listing(ctx, &credentials, range.range()?).await?);
        }
        FeedAction::Summary(args) => println!("{}", feed_summary(ctx, &args).await?),
        FeedAction::Add(args) => {
            let entry = feed_form(ctx, args).validate(ctx.today())?;
            let credentials = ctx.credentials().await?;
            let ack = ctx.api.add_feed(&credentials, &entry).await?;
            render::print_ack(&ack, "Feed added successfully.");
        }
        FeedAction::Update { id, entry } => {
            let entry = feed_form(ctx, entry).validate(ctx.today())?;
            let credentials = ctx.credentials().await?;
            let ack = ctx.api.update_feed(&credentials, &id, &entry).await?;
            render::print_ack(&ack, "Feed updated successfully.");
        }
        FeedAction::Delete { id } => {
            let credentials = ctx.credentials().await?;
            let ack = ctx.api.delete(&credentials, Resource::Feed, &id).await?;
            render::print_ack(&ack, "Feed deleted successfully.");
        }
    }
    Ok(())
}

fn feed_totals(summary: &FeedSummary) -> String {
    render::totals(&[
        ("Total Feeds", summary.total_feeds.to_string()),
        (
            "Total Quantity",
            format!("{} kgs", format_amount(summary.total_quantity)),
        ),
        ("Total Cost", format_money(summary.total_cost)),
    ])
}

async fn feed_listing(
    ctx: &Ctx,
    credentials: &Credentials,
    range: DateRange,
) -> anyhow::Result<String> {
    let rows = ctx.api.fetch_rows(credentials, Resource::Feed).await?;
    let (rows, records) = rows_in_range(rows, &RecordSchema::FEED, ctx, range);
    let summary = FeedSummary::from_records(&records);
    let feeds = typed(rows, Resource::Feed);

    if ctx.json {
        return pretty(&json!({ "summary": summary, "feeds": feeds }));
    }
    Ok(sections(
        vec![(feed_records_table(&feeds, ctx.offset), None)],
        feed_totals(&summary),
    ))
}

pub async fn feed_summary(ctx: &Ctx, args: &SummaryArgs) -> anyhow::Result<String> {
    let credentials = ctx.credentials().await?;
    let records = fetch_dated(
        &ctx.api,
        &credentials,
        Resource::Feed,
        &RecordSchema::FEED,
        ctx.offset,
        args.range.range()?,
    )
    .await?;
    let summary = FeedSummary::from_records(&records);

    let aggs: Vec<Aggregation> = args
        .granularities()
        .into_iter()
        .map(|g| aggregate(args, Aggregator::new(g), &records))
        .collect();

    if ctx.json {
        return pretty(&json!({ "summary": summary, "periods": aggs }));
    }
    let tables = aggs
        .iter()
        .map(|agg| (feed_bucket_table(agg), skipped_note(agg)))
        .collect();
    Ok(sections(tables, feed_totals(&summary)))
}

/// Accepts an animal id or, failing that, a tag.
fn resolve_animal(roster: &BTreeMap<String, String>, raw: &str) -> Result<String, ValidationErrors> {
    let raw = raw.trim();
    if raw.is_empty() || roster.contains_key(raw) {
        return Ok(raw.to_string());
    }
    roster
        .iter()
        .find(|(_, tag)| tag.eq_ignore_ascii_case(raw))
        .map(|(id, _)| id.clone())
        .ok_or_else(|| ValidationErrors::single("animalId", format!("No animal with id or tag {raw:?}")))
}

async fn milk_form(
    ctx: &Ctx,
    credentials: &Credentials,
    args: MilkArgs,
) -> anyhow::Result<MilkForm> {
    let roster = fetch_animal_roster(&ctx.api, credentials).await?;
    Ok(MilkForm {
        animal_id: resolve_animal(&roster, &args.animal)?,
        morning_milk: args.morning,
        evening_milk: args.evening,
        date: args.date.unwrap_or_else(|| ctx.today().to_string()),
    })
}

pub async fn milk(ctx: &Ctx, action: MilkAction) -> anyhow::Result<()> {
    match action {
        MilkAction::List(range) => {
            let credentials = ctx.credentials().await?;
            println!("{}", milk_listing(ctx, &credentials, range.range()?).await?);
        }
        MilkAction::Summary(args) => println!("{}", milk_summary(ctx, &args).await?),
        MilkAction::Add(args) => {
            let credentials = ctx.credentials().await?;
            let entry = milk_form(ctx, &credentials, args)
                .await?
                .validate(ctx.today())?;
            let ack = ctx.api.add_milk(&credentials, &entry).await?;
            render::print_ack(&ack, "Milk record added successfully.");
        }
        MilkAction::Update { id, entry } => {
            let credentials = ctx.credentials().await?;
            let entry = milk_form(ctx, &credentials, entry)
                .await?
                .validate(ctx.today())?;
            let ack = ctx.api.update_milk(&credentials, &id, &entry).await?;
            render::print_ack(&ack, "Milk record updated successfully.");
        }
        MilkAction::Delete { id } => {
            let credentials = ctx.credentials().await?;
            let ack = ctx.api.delete(&credentials, Resource::Milk, &id).await?;
            render::print_ack(&ack, "Milk record deleted successfully.");
        }
    }
    Ok(())
}

fn milk_totals(summary: &MilkSummary) -> String {
    render::totals(&[("Total Milk Production", render::liters(summary.grand_total))])
}

async fn milk_listing(
    ctx: &Ctx,
    credentials: &Credentials,
    range: DateRange,
) -> anyhow::Result<String> {
    let (roster, rows) = tokio::try_join!(
        fetch_animal_roster(&ctx.api, credentials),
        ctx.api.fetch_rows(credentials, Resource::Milk),
    )?;
    let (rows, records) = rows_in_range(rows, &RecordSchema::MILK, ctx, range);
    let summary = MilkSummary::from_records(&records);
    let milk = typed(rows, Resource::Milk);

    if ctx.json {
        return pretty(&json!({ "summary": summary, "animals": roster, "records": milk }));
    }
    let table = milk_records_table(&milk, &roster, ctx.offset);
    Ok(sections(vec![(table, None)], milk_totals(&summary)))
}

pub async fn milk_summary(ctx: &Ctx, args: &SummaryArgs) -> anyhow::Result<String> {
    let credentials = ctx.credentials().await?;
    let range = args.range.range()?;
    let (roster, records) = tokio::try_join!(
        fetch_animal_roster(&ctx.api, &credentials),
        fetch_dated(
            &ctx.api,
            &credentials,
            Resource::Milk,
            &RecordSchema::MILK,
            ctx.offset,
            range,
        ),
    )?;
    let summary = MilkSummary::from_records(&records);

    let aggs: Vec<Aggregation> = args
        .granularities()
        .into_iter()
        .map(|g| {
            let aggregator = Aggregator::new(g).with_known_group_keys(roster.keys().cloned());
            aggregate(args, aggregator, &records)
        })
        .collect();

    if ctx.json {
        return pretty(&json!({
            "summary": summary,
            "animals": roster,
            "periods": aggs,
        }));
    }
    let tables = aggs
        .iter()
        .map(|agg| (milk_bucket_table(agg, &roster), skipped_note(agg)))
        .collect();
    Ok(sections(tables, milk_totals(&summary)))
}

pub async fn health(ctx: &Ctx, action: HealthAction) -> anyhow::Result<()> {
    let credentials = ctx.credentials().await?;
    match action {
        HealthAction::List { kind } => {
            let kinds = kind.map(|k| vec![k]).unwrap_or_else(|| HealthKind::ALL.to_vec());
            let mut by_kind: BTreeMap<String, Vec<HealthRecord>> = BTreeMap::new();
            for kind in kinds {
                let records = ctx.api.health_records(&credentials, kind).await?;
                if !ctx.json {
                    render::print_table(&render::health_table(kind, &records, ctx.offset));
                    println!();
                }
                by_kind.insert(kind.resource().to_string(), records);
            }
            if ctx.json {
                println!("{}", pretty(&by_kind)?);
            }
        }
        HealthAction::Add { kind, entry } => {
            let entry = entry.form(kind).validate()?;
            let ack = ctx.api.add_health_record(&credentials, kind, &entry).await?;
            render::print_ack(&ack, &format!("{} record added successfully.", kind.title()));
        }
        HealthAction::Update { kind, id, entry } => {
            let entry = entry.form(kind).validate()?;
            let ack = ctx
                .api
                .update_health_record(&credentials, kind, &id, &entry)
                .await?;
            render::print_ack(&ack, &format!("{} record updated successfully.", kind.title()));
        }
        HealthAction::Delete { kind, id } => {
            let ack = ctx.api.delete(&credentials, Resource::Health(kind), &id).await?;
            render::print_ack(&ack, &format!("{} record deleted successfully.", kind.title()));
        }
    }
    Ok(())
}

pub async fn sales(ctx: &Ctx, range: &RangeArgs) -> anyhow::Result<()> {
    println!("{}", sales_report(ctx, range).await?);
    Ok(())
}

pub async fn sales_report(ctx: &Ctx, range: &RangeArgs) -> anyhow::Result<String> {
    let credentials = ctx.credentials().await?;
    let range = range.range()?;
    let (milk, feed) = tokio::try_join!(
        fetch_dated(
            &ctx.api,
            &credentials,
            Resource::Milk,
            &RecordSchema::MILK,
            ctx.offset,
            range,
        ),
        fetch_dated(
            &ctx.api,
            &credentials,
            Resource::Feed,
            &RecordSchema::FEED,
            ctx.offset,
            range,
        ),
    )?;
    let analytics = SalesAnalytics::build(&milk, &feed);
    if ctx.json {
        return pretty(&analytics);
    }

    let mut milk_table = Table::new(["Date", "Milk (L)"])
        .titled("Daily Milk Production")
        .when_empty("No milk records found.");
    for point in &analytics.milk_liters {
        milk_table.push(vec![point.date.to_string(), format_amount(point.value)]);
    }
    let mut feed_table = Table::new(["Date", "Feed Cost"])
        .titled("Daily Feed Cost")
        .when_empty("No feed records found.");
    for point in &analytics.feed_cost {
        feed_table.push(vec![point.date.to_string(), format_money(point.value)]);
    }

    let footer = render::totals(&[
        ("Total Milk", render::liters(analytics.total_milk_liters)),
        ("Total Feed Cost", format_money(analytics.total_feed_cost)),
    ]);
    Ok(sections(vec![(milk_table, None), (feed_table, None)], footer))
}
