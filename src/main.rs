use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use restaurant_scraper_lib::normalizer::Normalizer;
use restaurant_scraper_lib::pipeline::{self, Checkpoints, RunSummary};
use restaurant_scraper_lib::swiggy::SwiggyScraper;
use restaurant_scraper_lib::{input_loader, logger, resume_manager};
use restaurant_scraper_lib::{Browser, Chrome, Pipeline, Progress, RunLogger, Settings, Site};

#[derive(Parser)]
#[command(name = "restaurant_scraper")]
#[command(about = "Scrapes restaurant listings and menus from Zomato and Swiggy into CSV")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect restaurants from a listing (Zomato URL or Swiggy location) and scrape them
    Run {
        /// zomato or swiggy
        site: Site,

        /// Listing URL for Zomato, location query for Swiggy
        source: String,

        /// How many restaurants to collect
        #[arg(default_value_t = 10)]
        count: usize,

        /// Keep restaurants already in the raw journal
        #[arg(long)]
        resume: bool,
    },

    /// Scrape the restaurants listed in a CSV with a `url` column
    Details {
        site: Site,

        urls: PathBuf,

        #[arg(long)]
        resume: bool,
    },

    /// Normalize a raw journal into the cleaned CSV without a browser
    Clean { site: Site, raw: PathBuf },

    /// List Swiggy location suggestions for a query
    Locations {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
}

/// Progress goes to the log.
struct LogProgress;

impl Progress for LogProgress {
    fn begin(&mut self, total: usize) {
        info!("Fetching details for {} restaurants", total);
    }

    fn percent(&mut self, pct: u8) {
        info!("Progress: {}%", pct);
    }

    fn log(&mut self, msg: &str) {
        info!("{}", msg);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    logger::init();

    let cli = Cli::parse();
    let settings = Settings::load();

    match cli.command {
        Commands::Run { site, source, count, resume } => {
            let summary = with_browser(&settings, |browser| {
                let scraper = site.scraper(browser, settings.timing(), RunLogger::new(site.name()));
                Pipeline::new(scraper.as_ref(), &settings.output_dir)
                    .resume(resume)
                    .run(&source, count, &mut LogProgress)
                    .map_err(Into::into)
            })?;
            report(&summary);
        }
        Commands::Details { site, urls, resume } => {
            let refs = input_loader::load_item_refs(&urls);
            if refs.is_empty() {
                error!("No URLs found in {:?}. The file needs a `url` column.", urls);
                return Ok(());
            }
            let summary = with_browser(&settings, |browser| {
                let scraper = site.scraper(browser, settings.timing(), RunLogger::new(site.name()));
                Pipeline::new(scraper.as_ref(), &settings.output_dir)
                    .resume(resume)
                    .run_from_refs(&refs, &mut LogProgress)
                    .map_err(Into::into)
            })?;
            report(&summary);
        }
        Commands::Clean { site, raw } => {
            let records = resume_manager::load(&raw)?;
            let normalizer = Normalizer::new(RunLogger::new(site.name()));
            let table = pipeline::normalize_all(records, |r| site.normalize(&normalizer, r));
            let out = Checkpoints::new(&settings.output_dir, site.name()).cleaned;
            table.write_csv(&out)?;
            info!("Cleaned {} restaurants into {:?}", table.len(), out);
        }
        Commands::Locations { query } => {
            let query = query.join(" ");
            let labels = with_browser(&settings, |browser| {
                let scraper = SwiggyScraper::new(browser, settings.timing(), RunLogger::new("swiggy"));
                scraper.search_locations(&query).map_err(Into::into)
            })?;
            if labels.is_empty() {
                warn!("No locations suggested for {:?}", query);
            }
            for label in labels {
                println!("{}", label);
            }
        }
    }
    Ok(())
}

/// Runs `f` with a fresh browser session and closes it afterwards, whether
/// `f` succeeded or not.
fn with_browser<T, F>(settings: &Settings, f: F) -> Result<T, Box<dyn Error>>
where
    F: FnOnce(&dyn Browser) -> Result<T, Box<dyn Error>>,
{
    info!("Launching Chrome");
    let browser = Chrome::launch(settings)?;
    let result = f(&browser);
    if let Err(e) = browser.close() {
        warn!("Failed to close browser session: {}", e);
    }
    result
}

fn report(summary: &RunSummary) {
    info!(
        "Scraping completed. {} of {} restaurants scraped, {} resumed, {} rows cleaned{}.",
        summary.extracted,
        summary.requested,
        summary.skipped,
        summary.rows,
        if summary.stopped { " (stopped early)" } else { "" }
    );
}
