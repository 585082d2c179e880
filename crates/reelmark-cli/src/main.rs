mod logging;
mod output;
mod snapshot;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::{info, warn};

use reelmark_core::config::AppConfig;
use reelmark_core::history::{HistoryQuery, HistoryTab, SortOrder};
use reelmark_core::models::{Platform, Rating, RecordKey};
use reelmark_parse::clean_title;
use reelmark_runtime::{
    AuthService, MetadataCatalog, RecordStore, RelayMessage, Runtime, SignUpOutcome, ViewingRelay,
};

#[derive(Parser)]
#[command(name = "reelmark")]
#[command(about = "Keep track of what you watch on streaming services")]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file to use instead of the user config
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Session, totals and recent pipeline events
    Status,
    /// List watched titles
    History {
        /// Case-insensitive title filter
        #[arg(long)]
        search: Option<String>,
        /// all, unrated or favorites
        #[arg(long, default_value = "all")]
        tab: HistoryTab,
        #[arg(long)]
        platform: Option<Platform>,
        /// newest, oldest or alphabetical
        #[arg(long, default_value = "newest")]
        sort: SortOrder,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rate a title from 1 to 5 stars (0 clears the rating)
    Rate {
        title: String,
        #[arg(long)]
        platform: Platform,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=5))]
        stars: u8,
    },
    /// Delete one title
    Delete {
        title: String,
        #[arg(long)]
        platform: Platform,
    },
    /// Delete every title, locally and remotely
    Clear {
        /// Required to actually delete
        #[arg(long)]
        yes: bool,
    },
    /// Pull remote records and push local ones
    Sync,
    /// Look up missing cover art
    Covers {
        /// Maximum titles to look up
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Resolve the title on a captured page
    Detect {
        /// JSON snapshot: {"href": ..., "texts": {selector: text}}
        snapshot: PathBuf,
    },
    /// Record a viewing by hand
    Record {
        title: String,
        #[arg(long)]
        platform: Platform,
        #[arg(long)]
        url: Option<String>,
    },
    /// Track a snapshot file until interrupted
    Watch { snapshot: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::load()?,
    };
    let log_dir = config.logging.file.then(|| AppConfig::data_dir().join("logs"));
    let _guard = logging::init_logging(
        cli.verbose,
        cli.quiet,
        &config.logging.filter,
        log_dir.as_deref(),
    )?;

    let rt = Runtime::open(config)?;

    match cli.command {
        Commands::Login { email, password } => {
            let password = password_or_prompt(password)?;
            let session = rt.sign_in(&email, &password).await?;
            println!(
                "Signed in as {}",
                session.user.email.as_deref().unwrap_or(session.user_id())
            );
            match rt.sync().await {
                Ok(report) => {
                    info!(added = report.added, updated = report.updated, "Initial sync done")
                }
                Err(e) => warn!(error = %e, "Initial sync failed"),
            }
        }
        Commands::Signup { email, password } => {
            let password = password_or_prompt(password)?;
            match rt.sign_up(&email, &password).await? {
                SignUpOutcome::Created => println!("Account created. You can sign in now."),
                SignUpOutcome::ConfirmationRequired => {
                    println!("Check your email to confirm the account, then sign in.")
                }
            }
        }
        Commands::Logout => {
            rt.sign_out().await?;
            println!("Signed out.");
        }
        Commands::Status => output::print_status(&rt.status().await?),
        Commands::History {
            search,
            tab,
            platform,
            sort,
            json,
        } => {
            let query = HistoryQuery {
                search,
                tab,
                platform,
                sort,
            };
            let (records, counts) = rt.history(&query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                output::print_records(&records);
                output::print_counts(&counts);
            }
        }
        Commands::Rate {
            title,
            platform,
            stars,
        } => {
            let rating = match stars {
                0 => None,
                n => Some(Rating::new(n)?),
            };
            let record = rt.rate(RecordKey::new(title, platform), rating).await?;
            output::print_records(std::slice::from_ref(&record));
        }
        Commands::Delete { title, platform } => {
            let record = rt.delete(RecordKey::new(title, platform)).await?;
            println!("Deleted {}", record.title);
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("this deletes every record; pass --yes to confirm");
            }
            rt.clear_all().await?;
            println!("All records deleted.");
        }
        Commands::Sync => {
            let report = rt.sync().await?;
            println!(
                "{} added, {} updated, {} linked",
                report.added, report.updated, report.linked
            );
        }
        Commands::Covers { limit } => {
            let filled = rt.backfill_covers(limit).await?;
            println!("Found {filled} cover(s).");
        }
        Commands::Record {
            title,
            platform,
            url,
        } => {
            let (relay, background) = rt.start_background();
            let response = relay.emit(RelayMessage::save(title, platform, url)).await;
            background.shutdown().await;
            let response = response?;
            match response.view_count {
                Some(count) if !response.new_entry => println!("Updated, watched {count} times."),
                _ => println!("Saved."),
            }
        }
        Commands::Watch { snapshot } => {
            let page = Arc::new(snapshot::SnapshotPage::open(snapshot)?);
            let (relay, background) = rt.start_background();
            let tracker = rt.start_tracker(page, Arc::new(relay));
            if rt.session().await.is_none() {
                println!("Not signed in; detection starts once you sign in.");
            }
            println!("Watching. Press Ctrl-C to stop.");
            tokio::signal::ctrl_c().await?;
            tracker.stop();
            background.shutdown().await;
        }
        Commands::Detect { snapshot } => detect(&rt, &snapshot)?,
    }

    Ok(())
}

fn detect<B, M>(rt: &Runtime<B, M>, path: &Path) -> Result<()>
where
    B: AuthService + RecordStore + 'static,
    M: MetadataCatalog + 'static,
{
    let page = snapshot::load(path)?;
    match rt.registry().resolve_page(&page) {
        Some(found) => {
            let cleaned = clean_title(&found.title);
            println!("{}: {}", found.platform.display_name(), found.title);
            if cleaned.changed() {
                println!("series: {}", cleaned.title);
            }
        }
        None => println!("No title on this page."),
    }
    Ok(())
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => Ok(rpassword::prompt_password("Password: ")?),
    }
}
