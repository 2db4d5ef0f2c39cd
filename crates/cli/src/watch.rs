use crate::{records, Ctx, RangeArgs, SummaryArgs};
use dairy_core::aggregate::Granularity;
use dairy_core::ingest::FetchError;
use dairy_core::view::{LoadTicket, ViewGuard};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum View {
    Feed,
    Milk,
    Sales,
}

#[derive(Debug, clap::Args)]
pub struct WatchArgs {
    #[arg(value_enum)]
    pub view: View,
    /// week, month, or year. All three when omitted.
    #[arg(long, short)]
    pub granularity: Option<Granularity>,
    #[arg(long)]
    pub chronological: bool,
    /// Seconds between refreshes.
    #[arg(long, default_value_t = 30)]
    pub interval: u64,
    /// Stop after this many refreshes.
    #[arg(long)]
    pub count: Option<u32>,
}

async fn load(ctx: &Ctx, view: View, summary: &SummaryArgs) -> anyhow::Result<String> {
    match view {
        View::Feed => records::feed_summary(ctx, summary).await,
        View::Milk => records::milk_summary(ctx, summary).await,
        View::Sales => records::sales_report(ctx, &summary.range).await,
    }
}

type Loaded = (LoadTicket, anyhow::Result<String>);

/// Refreshes `args.view` every interval. A load that finishes after a newer one started is
/// dropped, so the screen never goes back to older data.
pub async fn run(ctx: &Ctx, args: WatchArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.interval > 0, "--interval must be at least 1 second");
    if let Some(0) = args.count {
        return Ok(());
    }

    let ctx = Arc::new(ctx.clone());
    let summary = Arc::new(SummaryArgs {
        granularity: args.granularity,
        chronological: args.chronological,
        range: RangeArgs::default(),
    });

    let guard = ViewGuard::new();
    let (tx, mut rx) = mpsc::channel::<Loaded>(4);
    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut started: u32 = 0;
    let more = |started: u32| args.count.map_or(true, |n| started < n);

    let outcome = loop {
        tokio::select! {
            _ = ticker.tick(), if more(started) => {
                started += 1;
                let ticket = guard.begin();
                tracing::debug!(generation = ticket.generation(), view = ?args.view, "refreshing");

                let (ctx, summary, tx) = (Arc::clone(&ctx), Arc::clone(&summary), tx.clone());
                let view = args.view;
                tokio::spawn(async move {
                    let result = load(&ctx, view, &summary).await;
                    let _ = tx.send((ticket, result)).await;
                });
            }
            Some((ticket, result)) = rx.recv() => {
                let Some(result) = ticket.accept(result) else {
                    continue;
                };
                match result {
                    Ok(text) => {
                        let now = chrono::Utc::now().with_timezone(&ctx.offset);
                        println!("── {} ──", now.format("%Y-%m-%d %H:%M:%S"));
                        println!("{text}\n");
                    }
                    Err(err) => match err.downcast_ref::<FetchError>() {
                        Some(fetch) if !matches!(fetch, FetchError::Auth) => {
                            tracing::warn!(kind = fetch.kind(), error = %fetch, "refresh failed");
                            eprintln!("{}", fetch.user_message());
                        }
                        _ => break Err(err),
                    },
                }
                if !more(started) {
                    break Ok(());
                }
            }
            _ = &mut shutdown => {
                tracing::info!("watch interrupted");
                break Ok(());
            }
        }
    };

    guard.leave();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        watch: WatchArgs,
    }

    #[test]
    fn watch_defaults() {
        let h = Harness::try_parse_from(["watch", "milk", "-g", "month"]).unwrap();
        assert_eq!(h.watch.view, View::Milk);
        assert_eq!(h.watch.granularity, Some(Granularity::Month));
        assert_eq!(h.watch.interval, 30);
        assert_eq!(h.watch.count, None);
    }

    #[test]
    fn unknown_view_is_rejected() {
        assert!(Harness::try_parse_from(["watch", "health"]).is_err());
    }
}
