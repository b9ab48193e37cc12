//! Runs one site end to end: collect references, extract each item, normalize,
//! and write a checkpoint after every phase.
//!
//! Checkpoints, all under the output directory:
//! - `<site>_restaurant_urls.csv` once collection is done
//! - `<site>_raw_restaurant_data.jsonl` appended per item
//! - `<site>_uncleaned_restaurant_data.csv` once extraction is done
//! - `<site>_cleaned_restaurant_data.csv` once normalization is done

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::browser::Browser;
use crate::config::Timing;
use crate::error::SinkError;
use crate::logger::RunLogger;
use crate::normalizer::Normalizer;
use crate::record::{ItemRef, Record, Value};
use crate::resume_manager::Journal;
use crate::swiggy::SwiggyScraper;
use crate::table::{self, Table};
use crate::zomato::ZomatoScraper;

/// What the pipeline needs from one site.
pub trait SiteScraper {
    fn name(&self) -> &'static str;

    /// Keys every extracted record carries, found or not.
    fn expected_fields(&self) -> &'static [&'static str];

    fn logger(&self) -> &RunLogger;

    /// Up to `count` item references from `source` (a listing URL or a
    /// location, depending on the site).
    fn collect_item_references(&self, source: &str, count: usize) -> Vec<ItemRef>;

    /// One raw record. Never fails: unresolved fields are missing values and
    /// a page that does not load yields a placeholder.
    fn extract_detail(&self, item: &ItemRef) -> Record;

    /// Normalizes in place. Steps that cannot apply are skipped.
    fn normalize(&self, record: &mut Record);
}

/// Progress reporting for long runs. Frontends implement what they show.
pub trait Progress {
    /// Called once the number of items to extract is known.
    fn begin(&mut self, _total: usize) {}

    /// Overall completion, 0..=100.
    fn percent(&mut self, _pct: u8) {}

    /// Free-form status line for human eyes.
    fn log(&mut self, _msg: &str) {}

    /// Called after item `index` (0-based) is extracted or skipped.
    fn item_done(&mut self, _index: usize) {}

    /// Checked between items; `false` ends the extraction phase early.
    fn should_continue(&self) -> bool {
        true
    }

    /// Called at the end, successful or not.
    fn finish(&mut self) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Zomato,
    Swiggy,
}

impl Site {
    pub fn name(self) -> &'static str {
        match self {
            Site::Zomato => crate::zomato::SITE,
            Site::Swiggy => crate::swiggy::SITE,
        }
    }

    pub fn scraper<'a>(self, browser: &'a dyn Browser, timing: Timing, log: RunLogger) -> Box<dyn SiteScraper + 'a> {
        match self {
            Site::Zomato => Box::new(ZomatoScraper::new(browser, timing, log)),
            Site::Swiggy => Box::new(SwiggyScraper::new(browser, timing, log)),
        }
    }

    /// Offline normalization, for records read back from a journal.
    pub fn normalize(self, normalizer: &Normalizer, record: &mut Record) {
        match self {
            Site::Zomato => normalizer.zomato(record),
            Site::Swiggy => normalizer.swiggy(record),
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Site {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zomato" => Ok(Site::Zomato),
            "swiggy" => Ok(Site::Swiggy),
            other => Err(format!("unknown site `{other}`, expected zomato or swiggy")),
        }
    }
}

/// Checkpoint file locations for one site.
#[derive(Debug, Clone)]
pub struct Checkpoints {
    pub urls: PathBuf,
    pub raw: PathBuf,
    pub uncleaned: PathBuf,
    pub cleaned: PathBuf,
}

impl Checkpoints {
    pub fn new(dir: &Path, site: &str) -> Self {
        Checkpoints {
            urls: dir.join(format!("{site}_restaurant_urls.csv")),
            raw: dir.join(format!("{site}_raw_restaurant_data.jsonl")),
            uncleaned: dir.join(format!("{site}_uncleaned_restaurant_data.csv")),
            cleaned: dir.join(format!("{site}_cleaned_restaurant_data.csv")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub requested: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub rows: usize,
    pub stopped: bool,
}

pub struct Pipeline<'a> {
    scraper: &'a dyn SiteScraper,
    checkpoints: Checkpoints,
    resume: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(scraper: &'a dyn SiteScraper, output_dir: &Path) -> Self {
        Pipeline {
            checkpoints: Checkpoints::new(output_dir, scraper.name()),
            scraper,
            resume: false,
        }
    }

    /// Keep items already in the raw journal instead of starting it over.
    pub fn resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn checkpoints(&self) -> &Checkpoints {
        &self.checkpoints
    }

    pub fn run(&self, source: &str, count: usize, progress: &mut dyn Progress) -> Result<RunSummary, SinkError> {
        let log = self.scraper.logger();
        log.info(format!("Collecting up to {count} restaurants from {source}"));
        progress.log(&format!("Collecting restaurant URLs from {source}"));

        let refs = self.scraper.collect_item_references(source, count);
        table::write_refs(&self.checkpoints.urls, &refs)?;
        progress.log(&format!("Found {} restaurants", refs.len()));
        progress.percent(33);

        self.run_from_refs(&refs, progress)
    }

    /// Extraction and normalization for references collected earlier.
    pub fn run_from_refs(&self, refs: &[ItemRef], progress: &mut dyn Progress) -> Result<RunSummary, SinkError> {
        let log = self.scraper.logger();
        let mut summary = RunSummary { requested: refs.len(), ..Default::default() };
        let mut journal = Journal::open(&self.checkpoints.raw, self.resume)?;
        progress.begin(refs.len());

        for (i, item) in refs.iter().enumerate() {
            if !progress.should_continue() {
                log.warn(format!("Run stopped after {i} of {} restaurants", refs.len()));
                summary.stopped = true;
                break;
            }
            if journal.contains(item) {
                log.info(format!("Skipping {item}, already scraped"));
                summary.skipped += 1;
            } else {
                log.info(format!("Scraping restaurant {}/{}: {item}", i + 1, refs.len()));
                progress.log(&format!("Scraping {}/{}: {item}", i + 1, refs.len()));
                let mut detail = self.scraper.extract_detail(item);
                for key in self.scraper.expected_fields() {
                    if !detail.contains(key) {
                        detail.insert(key, Value::Missing);
                    }
                }
                journal.append(
                    Record::new()
                        .with("url", item.as_str())
                        .with("restaurant_data", detail),
                )?;
                summary.extracted += 1;
            }
            progress.item_done(i);
            progress.percent(detail_percent(i + 1, refs.len()));
        }

        let records = journal.into_records_for(refs);
        let uncleaned: Table = records.iter().cloned().collect();
        uncleaned.write_csv(&self.checkpoints.uncleaned)?;
        progress.percent(66);

        summary.rows = self.clean(records, progress)?;
        log.info(format!(
            "Run finished: {} scraped, {} resumed, {} rows written",
            summary.extracted, summary.skipped, summary.rows
        ));
        Ok(summary)
    }

    fn clean(&self, records: Vec<Record>, progress: &mut dyn Progress) -> Result<usize, SinkError> {
        progress.log("Cleaning data");
        let cleaned = normalize_all(records, |r| self.scraper.normalize(r));
        progress.percent(70);
        cleaned.write_csv(&self.checkpoints.cleaned)?;
        progress.percent(100);
        progress.finish();
        Ok(cleaned.len())
    }
}

/// Normalizes every record into one table.
pub fn normalize_all<F>(records: Vec<Record>, normalize: F) -> Table
where
    F: Fn(&mut Record),
{
    records
        .into_iter()
        .map(|mut r| {
            normalize(&mut r);
            r
        })
        .collect()
}

fn detail_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 66;
    }
    (33 + 33 * done.min(total) / total) as u8
}
