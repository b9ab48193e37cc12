//! Raw-record journal: one JSON line per extracted item, appended as soon as
//! the item is done. It is the checkpoint of the detail phase and what a
//! resumed run reads to skip items it already has.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::error::SinkError;
use crate::record::{ItemRef, Record, Value};

pub struct Journal {
    path: PathBuf,
    records: Vec<Record>,
    done: HashSet<String>,
}

impl Journal {
    /// Opens the journal at `path`. With `resume`, records already in it are
    /// kept; otherwise it starts empty.
    pub fn open(path: &Path, resume: bool) -> Result<Self, SinkError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let records = if resume && path.exists() {
            let records = load(path)?;
            info!("Resumed previous session: {} restaurants already scraped.", records.len());
            records
        } else {
            File::create(path)?;
            Vec::new()
        };
        let done = records.iter().filter_map(item_url).collect();
        Ok(Journal { path: path.to_path_buf(), records, done })
    }

    pub fn contains(&self, item: &ItemRef) -> bool {
        self.done.contains(item.as_str())
    }

    /// Appends one record and flushes it to disk.
    pub fn append(&mut self, record: Record) -> Result<(), SinkError> {
        let line = serde_json::to_string(&record)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        if let Some(url) = item_url(&record) {
            self.done.insert(url);
        }
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// The journaled records for `refs`, in journal order. Items a resumed
    /// journal holds from other runs are left out.
    pub fn into_records_for(self, refs: &[ItemRef]) -> Vec<Record> {
        let wanted: HashSet<&str> = refs.iter().map(ItemRef::as_str).collect();
        self.records
            .into_iter()
            .filter(|r| item_url(r).is_some_and(|url| wanted.contains(url.as_str())))
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Every readable record of a journal file. Lines that do not parse (a run
/// killed mid-write) are logged and skipped.
pub fn load(path: &Path) -> Result<Vec<Record>, SinkError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(&line) {
            Ok(record) => records.push(record),
            Err(e) => error!("Skipping unreadable journal line {} in {:?}: {}", n + 1, path, e),
        }
    }
    if records.is_empty() {
        warn!("No records in journal {:?}", path);
    }
    Ok(records)
}

fn item_url(record: &Record) -> Option<String> {
    match record.get("url") {
        Some(Value::Text(url)) => Some(url.clone()),
        _ => None,
    }
}
