use anyhow::Context;
use chrono::{FixedOffset, NaiveDate};
use clap::{Parser, Subcommand};
use dairy_core::aggregate::Granularity;
use dairy_core::auth::{resolve_credentials, Credentials, TokenStore};
use dairy_core::config::Settings;
use dairy_core::ingest::{DairyApiClient, DateRange, FetchError};
use dairy_core::time::farm_calendar;
use dairy_core::validate::ValidationErrors;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod account;
mod chat;
mod records;
mod render;
mod watch;

#[derive(Debug, Parser)]
#[command(name = "dairy", about = "Keep dairy farm records from the terminal")]
struct Args {
    /// Backend base URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Print summaries as JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and store the session token.
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted.
        #[arg(long, env = "DAIRY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session token.
    Logout,
    /// Check that the stored token is still accepted.
    Status,
    Register(account::RegisterArgs),
    /// Email a one-time code for resetting the password.
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    /// Exchange the emailed code for a reset token.
    VerifyOtp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        otp: String,
    },
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long, env = "DAIRY_NEW_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    Profile {
        #[command(subcommand)]
        action: Option<account::ProfileAction>,
    },
    Animals {
        #[command(subcommand)]
        action: records::AnimalAction,
    },
    Feed {
        #[command(subcommand)]
        action: records::FeedAction,
    },
    Milk {
        #[command(subcommand)]
        action: records::MilkAction,
    },
    Health {
        #[command(subcommand)]
        action: records::HealthAction,
    },
    /// Daily milk output and feed spend.
    Sales {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Ask the farm assistant. Starts an interactive session without a prompt.
    Chat { prompt: Option<String> },
    /// Refresh a summary on an interval until interrupted.
    Watch(watch::WatchArgs),
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct RangeArgs {
    /// First day to include (YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

impl RangeArgs {
    pub fn range(&self) -> anyhow::Result<DateRange> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            anyhow::ensure!(from <= to, "--from ({from}) is after --to ({to})");
        }
        Ok(DateRange {
            from: self.from,
            to: self.to,
        })
    }
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct SummaryArgs {
    /// week, month, or year. All three when omitted.
    #[arg(long, short)]
    pub granularity: Option<Granularity>,
    /// Order periods by date instead of by label.
    #[arg(long)]
    pub chronological: bool,
    #[command(flatten)]
    pub range: RangeArgs,
}

impl SummaryArgs {
    pub fn granularities(&self) -> Vec<Granularity> {
        match self.granularity {
            Some(g) => vec![g],
            None => Granularity::ALL.to_vec(),
        }
    }
}

/// Everything a command needs to reach the backend.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub settings: Settings,
    pub api: DairyApiClient,
    pub store: TokenStore,
    pub offset: FixedOffset,
    pub json: bool,
}

impl Ctx {
    fn new(mut settings: Settings, base_url: Option<String>, json: bool) -> anyhow::Result<Self> {
        if let Some(url) = base_url {
            settings.api_base_url = url;
        }
        Ok(Self {
            api: DairyApiClient::from_settings(&settings)?,
            store: TokenStore::from_settings(&settings)?,
            offset: settings.farm_offset()?,
            settings,
            json,
        })
    }

    pub async fn credentials(&self) -> anyhow::Result<Credentials> {
        resolve_credentials(&self.settings, &self.store).await
    }

    pub fn today(&self) -> NaiveDate {
        farm_calendar::today(self.offset)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let ctx = Ctx::new(settings, args.base_url, args.json)?;

    match run(&ctx, args.command).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            report_failure(&ctx, &err).await;
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(ctx: &Ctx, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => account::login(ctx, email, password).await,
        Command::Logout => account::logout(ctx).await,
        Command::Status => account::status(ctx).await,
        Command::Register(args) => account::register(ctx, args).await,
        Command::ForgotPassword { email } => account::forgot_password(ctx, &email).await,
        Command::VerifyOtp { email, otp } => account::verify_otp(ctx, email, otp).await,
        Command::ResetPassword {
            token,
            password,
            confirm,
        } => account::reset_password(ctx, token, password, confirm).await,
        Command::Profile { action } => account::profile(ctx, action).await,
        Command::Animals { action } => records::animals(ctx, action).await,
        Command::Feed { action } => records::feed(ctx, action).await,
        Command::Milk { action } => records::milk(ctx, action).await,
        Command::Health { action } => records::health(ctx, action).await,
        Command::Sales { range } => records::sales(ctx, &range).await,
        Command::Chat { prompt } => chat::run(ctx, prompt).await,
        Command::Watch(args) => watch::run(ctx, args).await,
    }
}

/// Prints what the user can act on; the full chain goes to the log and Sentry.
async fn report_failure(ctx: &Ctx, err: &anyhow::Error) {
    if let Some(errors) = err.downcast_ref::<ValidationErrors>() {
        print_validation(errors);
        return;
    }

    match err.downcast_ref::<FetchError>() {
        Some(FetchError::Validation(errors)) => print_validation(errors),
        Some(fetch) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("{}", fetch.user_message());
            if matches!(fetch, FetchError::Auth) && ctx.settings.api_token.is_none() {
                if let Ok(true) = ctx.store.clear().await {
                    eprintln!("Stored session removed. Run `dairy login` to sign in again.");
                }
            }
            if !fetch.should_retry() && !matches!(fetch, FetchError::Auth) {
                sentry_anyhow::capture_anyhow(err);
            }
        }
        None => {
            sentry_anyhow::capture_anyhow(err);
            eprintln!("error: {err:#}");
        }
    }
}

fn print_validation(errors: &ValidationErrors) {
    eprintln!("Please fix the following:");
    for (field, message) in errors.fields() {
        eprintln!("  {field}: {message}");
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

/// Reads one trimmed line from stdin, after printing `prompt` to stderr.
pub async fn read_line(prompt: &str) -> anyhow::Result<Option<String>> {
    use tokio::io::AsyncBufReadExt;

    eprint!("{prompt}");
    let mut line = String::new();
    let n = tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read from stdin")?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Parses `KEY=VALUE` pairs given to repeated flags.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    let k = k.trim();
    if k.is_empty() {
        return Err(format!("missing key in {s:?}"));
    }
    Ok((k.to_string(), v.to_string()))
}

pub fn image_path_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_summary_flags() {
        let args = Args::try_parse_from([
            "dairy",
            "feed",
            "summary",
            "--granularity",
            "monthly",
            "--from",
            "2024-01-01",
        ])
        .unwrap();
        match args.command {
            Command::Feed {
                action: records::FeedAction::Summary(summary),
            } => {
                assert_eq!(summary.granularities(), vec![Granularity::Month]);
                assert_eq!(summary.range.from, NaiveDate::from_ymd_opt(2024, 1, 1));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_granularity() {
        assert!(Args::try_parse_from(["dairy", "milk", "summary", "-g", "daily"]).is_err());
    }

    #[test]
    fn key_value_pairs() {
        assert_eq!(
            parse_key_val("vaccine=FMD").unwrap(),
            ("vaccine".to_string(), "FMD".to_string())
        );
        assert_eq!(
            parse_key_val("notes=a=b").unwrap(),
            ("notes".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let range = RangeArgs {
            from: NaiveDate::from_ymd_opt(2024, 2, 1),
            to: NaiveDate::from_ymd_opt(2024, 1, 1),
        };
        assert!(range.range().is_err());
    }
}
