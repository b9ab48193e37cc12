use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use log::{error, info, warn};
use serde::Deserialize;

use crate::record::ItemRef;

#[derive(Debug, Deserialize)]
struct UrlRow {
    #[serde(rename = "url", alias = "URL", alias = "Url", alias = "link")]
    url: String,
}

/// Item references from a URL checkpoint CSV (header `url`). Blank and
/// repeated rows are dropped; a missing or unreadable file gives nothing.
pub fn load_item_refs<P: AsRef<Path>>(filename: P) -> Vec<ItemRef> {
    let path = filename.as_ref();
    let mut refs = Vec::new();

    if !path.exists() {
        error!("Input file {:?} does not exist.", path);
        return refs;
    }
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            error!("Could not open CSV file: {}", e);
            return refs;
        }
    };

    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let mut seen = HashSet::new();
    for result in rdr.deserialize::<UrlRow>() {
        match result {
            Ok(row) if row.url.is_empty() => {}
            Ok(row) => {
                if seen.insert(row.url.clone()) {
                    refs.push(ItemRef::new(row.url));
                } else {
                    warn!("Duplicate URL skipped: {}", row.url);
                }
            }
            Err(e) => error!("Error parsing CSV record: {}", e),
        }
    }
    info!("Loaded {} URLs from CSV {:?}", refs.len(), path);
    refs
}
