mod error;
mod fetch;
mod passport;
mod pipeline;
mod settings;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};

use fetch::HttpFetcher;
use passport::export::Snapshot;
use passport::router::{self, passport_link, target_location};
use passport::search::{filter, filter_catalog, result_summary};
use passport::tabular::to_csv;
use passport::view::{render, Tab, ViewState};
use settings::{index_url, Settings};

#[derive(Parser)]
#[command(name = "passport_viewer", about = "Battery passport viewer over a static passport site")]
struct Cli {
    /// Site root (overrides PASSPORT_BASE_URL), e.g. https://example.com/passports/ or file:///srv/site/
    #[arg(long, global = true)]
    base: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List units in the product index
    List {
        /// Filter by UID, GTIN, serial number, model or category
        query: Option<String>,
        /// Print matching index rows as CSV
        #[arg(long)]
        csv: bool,
    },
    /// Show the composed passport for a unit
    Show {
        /// Passport location (URL, /p/<uid>, ?uid=<uid>) or a bare UID
        target: String,
        /// Only show fields containing this text
        #[arg(short, long, default_value = "")]
        query: String,
        /// Show the restricted tab instead of the public one
        #[arg(long)]
        restricted: bool,
        /// Print the view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the passport snapshot JSON (index row, sources and composition)
    Export {
        target: String,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Print the UID, link and URL a target resolves to
    Resolve { target: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load().context("Failed to read PASSPORT_* settings")?;
    if let Some(base) = cli.base {
        settings.base_url = base;
    }
    let base = settings.base()?;
    let fetcher = HttpFetcher::new(Duration::from_secs(settings.timeout_secs))?;

    match cli.command {
        Commands::List { query, csv } => {
            let index = index_url(&base, &settings.index_path)?;
            let records = pipeline::load_index(&fetcher, &index).await?;
            let hits = filter_catalog(&records, query.as_deref().unwrap_or(""));

            if csv {
                let header = records.first().map(|r| r.columns()).unwrap_or_default();
                print!("{}", to_csv(&header, hits.iter().copied()));
                return Ok(());
            }

            if hits.is_empty() {
                println!("找不到符合的護照資料。 / No matching passports.");
            } else {
                println!(
                    "{:>3} | {:<36} | {:<12} | {:<12} | {:<20} | {:<14}",
                    "#", "UID", "Model", "Serial", "Category", "GTIN"
                );
                println!("{}", "-".repeat(112));
                for (i, r) in hits.iter().enumerate() {
                    println!(
                        "{:>3} | {:<36} | {:<12} | {:<12} | {:<20} | {:<14}",
                        i + 1,
                        truncate(r.text("uid"), 36),
                        truncate(r.text("modelId"), 12),
                        truncate(r.text("serialNumber"), 12),
                        truncate(r.text("category"), 20),
                        r.text("gtin"),
                    );
                    println!("    {}", passport_link(r.text("uid")));
                }
            }
            println!("\n{}", result_summary(hits.len()));
        }
        Commands::Show { target, query, restricted, json } => {
            let location = target_location(&base, &target)?;
            let loaded = pipeline::load_passport(&fetcher, &location, &settings.index_path).await?;
            let view = loaded.view();

            if json {
                let out = serde_json::json!({
                    "location": loaded.location.as_str(),
                    "view": view,
                    "visibility": filter(&view, &query),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                let tab = if restricted { Tab::Restricted } else { Tab::Public };
                print!("{}", render(&view, &ViewState { query, tab }));
            }
        }
        Commands::Export { target, out } => {
            let location = target_location(&base, &target)?;
            let loaded = pipeline::load_passport(&fetcher, &location, &settings.index_path).await?;
            let snapshot = Snapshot::new(
                &loaded.record,
                loaded.unit.as_ref(),
                loaded.model.as_ref(),
                &loaded.composed,
                chrono::Utc::now(),
            );
            let path = out.join(snapshot.file_name());
            std::fs::write(&path, snapshot.to_json()?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        Commands::Resolve { target } => {
            let location = target_location(&base, &target)?;
            let uid = router::extract_uid(&location);
            if uid.is_empty() {
                return Err(error::PassportError::MissingIdentifier.into());
            }
            let site = router::site_base(&location);
            println!("UID:      {}", uid);
            println!("Link:     {}", passport_link(&uid));
            println!("Passport: {}", router::absolute_passport_url(&site, &uid)?);
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
