//! Mailblast - Bulk personalized email campaigns from the command line

mod campaign_file;
mod driver;

use anyhow::{bail, Result};
use campaign_file::CampaignFile;
use clap::{Args, Parser, Subcommand};
use mailblast_common::config::{Config, LoggingConfig};
use mailblast_common::types::{CheckReport, Credential};
use mailblast_core::reconcile::export_csv;
use mailblast_core::{
    CampaignConfig, CampaignService, CampaignSession, ConfigLibrary, HttpCampaignService,
    ReviewReport,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "mailblast", version, about = "Bulk personalized email campaigns")]
struct Cli {
    /// Configuration file. Defaults to $MAILBLAST_CONFIG, ./mailblast.toml,
    /// then /etc/mailblast/config.toml
    #[clap(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check the campaign service and, given a campaign file, the SMTP login
    Check {
        campaign: Option<PathBuf>,

        /// Run the full connection diagnosis
        #[clap(long)]
        diagnose: bool,

        #[command(flatten)]
        auth: Auth,
    },

    /// Render subject and body for one recipient
    Preview {
        campaign: PathBuf,

        /// Recipient to render for. Defaults to the first one.
        #[clap(long)]
        email: Option<String>,
    },

    /// Send a campaign
    Send {
        campaign: PathBuf,

        #[command(flatten)]
        auth: Auth,

        /// Write per-recipient results to this CSV file
        #[clap(long)]
        export: Option<PathBuf>,

        /// Re-send to the failed recipients up to this many times
        #[clap(long, default_value_t = 0)]
        retry_rounds: u32,
    },

    /// Manage saved templates
    Templates {
        #[command(subcommand)]
        action: LibraryAction,
    },

    /// Manage saved sender profiles and provider presets
    Profiles {
        #[command(subcommand)]
        action: LibraryAction,
    },

    /// Save the blank recipient spreadsheet
    ImportTemplate {
        #[clap(default_value = "recipients-template.xlsx")]
        output: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum LibraryAction {
    List,
    /// Save the campaign file's draft or sender settings under a name
    Save { campaign: PathBuf, name: String },
    Delete { id: String },
}

#[derive(Debug, Args)]
struct Auth {
    /// SMTP password or authorization code
    #[clap(long, env = "MAILBLAST_SMTP_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl Auth {
    fn credential(&self) -> Option<Credential> {
        self.password.as_deref().map(Credential::new)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    init_logging(&config.logging);

    if let Err(e) = run(cli.command, config).await {
        if let Some(hint) = e
            .downcast_ref::<mailblast_common::Error>()
            .and_then(|e| e.hint())
        {
            eprintln!("hint: {}", hint);
        }
        return Err(e);
    }
    Ok(())
}

async fn run(command: Command, config: Config) -> Result<()> {
    let service: Arc<dyn CampaignService> =
        Arc::new(HttpCampaignService::new(config.service.clone())?);
    let new_session = || {
        CampaignSession::new(
            Arc::clone(&service),
            CampaignConfig::new(config.defaults.profile()),
        )
    };

    match command {
        Command::Check {
            campaign,
            diagnose,
            auth,
        } => {
            let health = service.health().await?;
            println!("service: {} {}", health.status, health.message);
            if !health.is_ok() {
                bail!("campaign service is not healthy");
            }

            let Some(campaign) = campaign else {
                return Ok(());
            };
            let session = new_session();
            let file = CampaignFile::load(&campaign)?;
            driver::prepare(&session, &file, auth.credential()).await?;

            let check = session.test_connection().await?;
            println!("smtp: {} {}", if check.ok { "ok" } else { "failed" }, check.message);
            if let Some(hint) = &check.hint {
                println!("  hint: {}", hint);
            }

            if diagnose {
                let diagnosis = session.diagnose().await?;
                print_check("network", &diagnosis.network);
                print_check("port", &diagnosis.port);
                print_check("ssl/tls", &diagnosis.ssl_tls);
                print_check("authentication", &diagnosis.authentication);
                for recommendation in &diagnosis.recommendations {
                    println!("  - {}", recommendation);
                }
            }
        }

        Command::Preview { campaign, email } => {
            let session = new_session();
            let file = CampaignFile::load(&campaign)?;
            driver::prepare(&session, &file, None).await?;

            let message = session.preview(email.as_deref()).await?;
            println!("To: {}", message.email);
            println!("Subject: {}", message.subject);
            println!();
            println!("{}", message.body);
        }

        Command::Send {
            campaign,
            auth,
            export,
            retry_rounds,
        } => {
            let session = new_session();
            let file = CampaignFile::load(&campaign)?;
            driver::prepare(&session, &file, auth.credential()).await?;
            info!(session = %session.id(), "Campaign prepared");

            let run = driver::send(&session, retry_rounds).await?;
            for (round, report) in run.reports.iter().enumerate() {
                print_report(round, report);
            }

            if let Some(path) = export {
                export_csv(&run.results, &path)?;
                println!("results written to {}", path.display());
            }

            let failed = run.still_failed();
            if failed > 0 {
                bail!("{} recipient(s) still failed", failed);
            }
        }

        Command::Templates { action } => {
            let library = ConfigLibrary::new(Arc::clone(&service));
            match action {
                LibraryAction::List => {
                    for template in library.templates().await? {
                        println!(
                            "{}\t{}\t{}\t{}",
                            template.id, template.name, template.content_mode, template.subject
                        );
                    }
                }
                LibraryAction::Save { campaign, name } => {
                    let session = new_session();
                    driver::prepare(&session, &CampaignFile::load(&campaign)?, None).await?;
                    let created = session.save_template(&name).await?;
                    println!("saved template {} ({})", name, created.id);
                }
                LibraryAction::Delete { id } => {
                    library.delete_template(&id).await?;
                    println!("deleted template {}", id);
                }
            }
        }

        Command::Profiles { action } => {
            let library = ConfigLibrary::new(Arc::clone(&service));
            match action {
                LibraryAction::List => {
                    for profile in library.sender_profiles().await? {
                        println!(
                            "{}\t{}\t{}:{}\t{}",
                            profile.id,
                            profile.name,
                            profile.profile.host,
                            profile.profile.port,
                            profile.profile.address
                        );
                    }
                }
                LibraryAction::Save { campaign, name } => {
                    let session = new_session();
                    driver::prepare(&session, &CampaignFile::load(&campaign)?, None).await?;
                    let created = session.save_sender_profile(&name).await?;
                    println!("saved sender profile {} ({})", name, created.id);
                }
                LibraryAction::Delete { id } => {
                    library.delete_sender_profile(&id).await?;
                    println!("deleted sender profile {}", id);
                }
            }
        }

        Command::ImportTemplate { output } => {
            let bytes = service.download_import_template().await?;
            tokio::fs::write(&output, bytes).await?;
            println!("template written to {}", output.display());
        }
    }

    Ok(())
}

fn print_check(name: &str, check: &CheckReport) {
    println!("{:<16}{:<9}{}", name, check.status.to_string(), check.message);
}

fn print_report(round: usize, report: &ReviewReport) {
    let summary = &report.summary;
    let label = if round == 0 {
        "send".to_string()
    } else {
        format!("retry {}", round)
    };

    println!(
        "{}: {} total, {} sent, {} failed, {} skipped ({}%){}",
        label,
        summary.total,
        summary.success,
        summary.fail_count(),
        summary.skipped_count(),
        report.rate,
        report
            .batch_id
            .as_deref()
            .map(|id| format!(" [batch {}]", id))
            .unwrap_or_default()
    );
    if !report.message.is_empty() {
        println!("  {}", report.message);
    }
    if !report.summary_consistent {
        warn!("Reported summary counts do not add up");
    }
    if !report.missing.is_empty() {
        println!(
            "  no result returned for: {}",
            report.missing.join(", ")
        );
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
