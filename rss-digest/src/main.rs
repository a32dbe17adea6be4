use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use email_delivery::SmtpMailer;
use rss_digest::schedule::{self, parse_schedule_time, parse_schedule_tz};
use rss_digest::{
    DigestCycle, DigestRenderer, HttpFeedSource, ItemStore, MailTransport, OutgoingMail, Settings,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rss-digest", about = "Fetch RSS feeds and mail per-group digests")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one ingest + dispatch cycle and exit
    Run,
    /// Run a cycle now, then every day at the given time in SCHEDULE_TZ
    Schedule {
        /// HH:MM, defaults to SCHEDULE_TIME
        #[arg(long)]
        at: Option<String>,
    },
    /// Send a test message to the first group that has recipients
    SendTest,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("Failed to load configuration")?;

    if !settings.smtp.is_complete() {
        bail!("SMTP settings are incomplete; set SMTP_HOST and SMTP_SENDER (or SMTP_USER) to send mail.");
    }
    let mailer = SmtpMailer::new(settings.smtp.clone()).context("Failed to set up SMTP transport")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::SendTest => send_test(&settings, &mailer).await,
        Command::Run => {
            let cycle = build_cycle(settings, mailer).await?;
            let report = cycle.run_once().await.context("Cycle failed")?;
            for feed in report.failed_feeds() {
                warn!("Feed {} ({}) failed: {:?}", feed.url, feed.group, feed.result);
            }
            for group in report.failed_groups() {
                warn!("Group {} not delivered: {:?}", group.group, group.status);
            }
            for group in report.skipped_groups() {
                warn!("Group {} skipped: no recipients", group.group);
            }
            println!("{}", serde_json::to_string(&report.result)?);
            Ok(())
        }
        Command::Schedule { at } => {
            let raw = at.unwrap_or_else(|| settings.schedule_time.clone());
            let at = parse_schedule_time(&raw).unwrap_or_else(|| {
                error!("Error parsing schedule time '{}'; falling back to 08:30", raw);
                chrono::NaiveTime::from_hms_opt(8, 30, 0).unwrap_or_default()
            });
            let tz_name = settings.schedule_tz.clone();
            let cycle = build_cycle(settings, mailer).await?;
            match parse_schedule_tz(&tz_name) {
                Some(tz) => {
                    info!("Scheduling in time zone {}", tz);
                    schedule::run_daily(&cycle, at, tz).await;
                }
                None => {
                    if !tz_name.trim().is_empty() {
                        warn!("Unknown SCHEDULE_TZ '{}'; using local time", tz_name);
                    }
                    schedule::run_daily(&cycle, at, chrono::Local).await;
                }
            }
            Ok(())
        }
    }
}

async fn build_cycle(settings: Settings, mailer: SmtpMailer) -> anyhow::Result<DigestCycle> {
    info!("Connecting to database: {}", settings.database_url);
    let store = ItemStore::connect(&settings.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", settings.database_url))?;

    let source = HttpFeedSource::new(settings.fetch.clone()).context("Failed to build HTTP client")?;
    info!(
        "Loaded {} groups over {} feeds",
        settings.groups.groups().len(),
        settings.groups.unique_urls().len()
    );

    Ok(DigestCycle::new(
        Arc::new(settings),
        store,
        Arc::new(source),
        Arc::new(mailer),
    ))
}

async fn send_test(settings: &Settings, mailer: &SmtpMailer) -> anyhow::Result<()> {
    let first = settings
        .groups
        .names()
        .find_map(|name| {
            settings
                .recipients
                .resolve(name)
                .ok()
                .filter(|r| !r.is_empty())
                .map(|r| (name, r))
        });

    let Some((group, recipients)) = first else {
        bail!("No configured group has any recipients; cannot send test email.");
    };

    let message = DigestRenderer::new(settings.options.subject_prefix.clone()).render_test(Utc::now());
    let mail = OutgoingMail {
        recipients: recipients.clone(),
        subject: message.subject,
        html_body: message.html_body,
        text_body: message.text_body,
    };

    info!("Sending test email for group {} to {:?}", group, recipients.to);
    mailer.send(&mail).await.context("Test email failed")?;
    info!("Test email sent");
    Ok(())
}
