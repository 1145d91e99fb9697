use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use jobdeck_client::{ClientConfig, JobDeck, Listing, TransportMode};
use jobdeck_core::job::Job;
use jobdeck_core::listing::{JobFilter, SortDirection, SortKey, StatusCounts};
use jobdeck_core::status::{JobPriority, JobStatus};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "jobdeck")]
#[command(version)]
#[command(about = "Watch and manage jobdeck background jobs")]
#[command(propagate_version = true)]
struct Args {
    /// Transport: mock, rest or hub (overrides JOBDECK_TRANSPORT)
    #[arg(long, short = 't', global = true)]
    transport: Option<String>,

    /// REST base URL (overrides JOBDECK_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Hub WebSocket URL (overrides JOBDECK_HUB_URL)
    #[arg(long, global = true)]
    hub_url: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List jobs
    List {
        /// Only jobs in this status (name or code)
        #[arg(long, short = 's')]
        status: Option<String>,

        /// Case-insensitive name substring
        #[arg(long)]
        search: Option<String>,

        /// Sort by created_at, name, status, priority or progress
        #[arg(long, default_value = "created_at")]
        sort: String,

        /// Ascending instead of descending
        #[arg(long)]
        asc: bool,
    },

    /// Show job counts per status
    Counts,

    /// Create a job
    Create {
        name: String,

        /// regular or high
        #[arg(long, short = 'p', default_value = "regular")]
        priority: String,
    },

    /// Stop a queued or running job
    Stop { id: String },

    /// Restart a failed or stopped job
    Restart { id: String },

    /// Delete a completed, failed or stopped job
    Delete { id: String },

    /// Delete every job in a status (completed, failed or stopped)
    Purge { status: String },

    /// Print the job list every time it changes
    Watch {
        /// Stop after this many seconds (default: until Ctrl+C)
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobdeck_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(transport) = &args.transport {
        config.transport = transport.parse::<TransportMode>()?;
    }
    if let Some(url) = args.api_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(url) = args.hub_url {
        config.hub_url = url;
    }
    let ready_timeout = config.request_timeout;

    let deck = JobDeck::new(config)?;
    let result = run(&deck, args.command, args.output, ready_timeout).await;
    deck.shutdown().await;
    result
}

async fn run(
    deck: &JobDeck,
    command: Commands,
    output: OutputFormat,
    ready_timeout: Duration,
) -> anyhow::Result<()> {
    let mut sub = deck.subscribe();
    deck.connect().await?;
    let first = tokio::time::timeout(ready_timeout, sub.recv())
        .await
        .context("timed out waiting for the job list")?
        .context("client closed before the job list arrived")?;

    match command {
        Commands::List {
            status,
            search,
            sort,
            asc,
        } => {
            let filter = JobFilter {
                status: status.as_deref().map(str::parse::<JobStatus>).transpose()?,
                search,
                sort_by: sort.parse::<SortKey>()?,
                direction: if asc {
                    SortDirection::Asc
                } else {
                    SortDirection::Desc
                },
            };
            print_jobs(&filter.apply(&first.jobs), output)?;
        }
        Commands::Counts => {
            let counts = StatusCounts::from_jobs(&first.jobs);
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&counts)?),
                OutputFormat::Table => {
                    println!("{:<10} {:>5}", "TOTAL", counts.total);
                    for status in JobStatus::ALL {
                        println!("{:<10} {:>5}", status.name(), counts.get(*status));
                    }
                }
            }
        }
        Commands::Create { name, priority } => {
            let priority = priority.parse::<JobPriority>()?;
            let job = deck.create(&name, priority).await?;
            print_jobs(std::slice::from_ref(&job), output)?;
        }
        Commands::Stop { id } => println!("{}", deck.stop(&id).await?),
        Commands::Restart { id } => println!("{}", deck.restart(&id).await?),
        Commands::Delete { id } => {
            deck.delete(&id).await?;
            println!("Job deleted successfully");
        }
        Commands::Purge { status } => {
            let status = status.parse::<JobStatus>()?;
            let deleted = deck.delete_by_status(status).await?;
            println!("Deleted {deleted} {status} job(s)");
        }
        Commands::Watch { seconds } => watch(deck, first, sub, seconds, output).await?,
    }
    Ok(())
}

async fn watch(
    deck: &JobDeck,
    first: Listing,
    mut sub: jobdeck_client::Subscription,
    seconds: Option<u64>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let mut state = deck.watch_connection();
    let deadline = async {
        match seconds {
            Some(s) => tokio::time::sleep(Duration::from_secs(s)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    print_listing(&first, output)?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                eprintln!("-- connection {}", *state.borrow_and_update());
            }
            listing = sub.recv() => match listing {
                Some(listing) => print_listing(&listing, output)?,
                None => break,
            },
        }
    }
    Ok(())
}

fn print_listing(listing: &Listing, output: OutputFormat) -> anyhow::Result<()> {
    if matches!(output, OutputFormat::Table) {
        println!("-- revision {} ({} jobs)", listing.revision, listing.jobs.len());
    }
    print_jobs(&JobFilter::default().apply(&listing.jobs), output)
}

fn print_jobs(jobs: &[Job], output: OutputFormat) -> anyhow::Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(jobs)?),
        OutputFormat::Table => {
            println!(
                "{:<38} {:<28} {:<10} {:<8} {:>5}  {}",
                "ID", "NAME", "STATUS", "PRIORITY", "PROG", "CREATED"
            );
            for job in jobs {
                println!(
                    "{:<38} {:<28} {:<10} {:<8} {:>4}%  {}",
                    job.id,
                    truncate(&job.name, 28),
                    job.status.name(),
                    job.priority.name(),
                    job.progress,
                    job.created_at.format("%Y-%m-%d %H:%M:%S"),
                );
                if let Some(err) = &job.error_message {
                    println!("{:<38} ! {err}", "");
                }
            }
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}
