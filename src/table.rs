//! Tabular sink. Columns are whatever keys the rows carry, in first-seen
//! order; a row lacking a column gets the missing-value cell.

use std::fs;
use std::path::Path;

use log::info;

use crate::error::SinkError;
use crate::record::{ItemRef, Record, MISSING_CELL};

#[derive(Debug, Default, Clone)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: Record) {
        for key in row.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.to_string());
            }
        }
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Overwrites `path` with the table, header first.
    pub fn write_csv(&self, path: &Path) -> Result<(), SinkError> {
        create_parent(path)?;
        if self.columns.is_empty() {
            fs::write(path, "")?;
            info!("Wrote empty table to {:?}", path);
            return Ok(());
        }

        let mut wtr = csv::WriterBuilder::new().from_path(path)?;
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|c| row.get(c).map(|v| v.to_cell()).unwrap_or_else(|| MISSING_CELL.to_string()))
                .collect();
            wtr.write_record(&cells)?;
        }
        wtr.flush()?;
        info!("Wrote {} rows to {:?}", self.rows.len(), path);
        Ok(())
    }
}

impl FromIterator<Record> for Table {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut table = Table::new();
        for row in iter {
            table.push(row);
        }
        table
    }
}

/// Writes item references as a one-column (`url`) CSV.
pub fn write_refs(path: &Path, refs: &[ItemRef]) -> Result<(), SinkError> {
    create_parent(path)?;
    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    wtr.write_record(["url"])?;
    for r in refs {
        wtr.write_record([r.as_str()])?;
    }
    wtr.flush()?;
    info!("Saved {} URLs to {:?}", refs.len(), path);
    Ok(())
}

fn create_parent(path: &Path) -> Result<(), SinkError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(fs::create_dir_all(dir)?),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    #[test]
    fn columns_are_union_in_first_seen_order() {
        let table: Table = vec![
            Record::new().with("url", "u1").with("name", "A"),
            Record::new().with("url", "u2").with("rating", 4.5).with("name", "B"),
        ]
        .into_iter()
        .collect();
        assert_eq!(table.columns(), &["url", "name", "rating"]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn csv_fills_gaps_with_missing_cell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("table.csv");
        let table: Table = vec![
            Record::new().with("name", "Dosa Point").with("time", Value::Missing),
            Record::new().with("name", "Chai, Co").with("category", Value::List(vec!["Cafe".into()])),
        ]
        .into_iter()
        .collect();
        table.write_csv(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "name,time,category");
        assert_eq!(lines[1], "Dosa Point,Not specified,Not specified");
        assert_eq!(lines[2], r#""Chai, Co",Not specified,"[""Cafe""]""#);
    }

    #[test]
    fn refs_written_under_url_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.csv");
        write_refs(&path, &[ItemRef::new("https://z/1"), ItemRef::new("https://z/2")]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "url\nhttps://z/1\nhttps://z/2\n");
    }

    #[test]
    fn empty_table_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        Table::new().write_csv(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
