use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::mem;
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::buffer_pool::BufferPool;
use crate::config::Config;
use crate::cursor::Cursor;
use crate::error::{EngineError, Result};
use crate::page::{Page, Row};

/// Location of a row inside a table's pages, stable until the next
/// structural mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLocation {
    pub page: usize,
    pub row: usize,
}

/// Per-column index: sorted map from a column value to every row location
/// holding that value. Keeping a list per key is what makes indexed
/// search agree with a linear scan when values repeat.
pub type ColumnIndex = BTreeMap<i32, Vec<RowLocation>>;

/// All information about a loaded table: schema, block metadata, indices
/// and the source CSV it came from. A table is permanent when its source
/// file lives directly in the data directory; temporary tables lose their
/// source file and page files on unload.
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub source_file: PathBuf,
    pub row_count: u64,
    pub block_count: usize,
    pub max_rows_per_block: usize,
    pub rows_per_block_count: Vec<usize>,
    pub indices: HashMap<String, ColumnIndex>,
    /// Distinct values seen per column during blockify, kept as statistics.
    pub distinct_counts: Vec<u64>,
}

fn rows_per_block(block_bytes: usize, column_count: usize) -> usize {
    let row_bytes = mem::size_of::<i32>() * column_count.max(1);
    (block_bytes / row_bytes).max(1)
}

impl Table {
    /// A table backed by an existing CSV in the data directory. Call
    /// `load` afterwards to read the header and blockify the rows.
    pub fn open(name: &str, config: &Config) -> Table {
        Table {
            name: name.to_string(),
            columns: Vec::new(),
            source_file: config.data_dir.join(format!("{name}.csv")),
            row_count: 0,
            block_count: 0,
            max_rows_per_block: 0,
            rows_per_block_count: Vec::new(),
            indices: HashMap::new(),
            distinct_counts: Vec::new(),
        }
    }

    /// A new, empty table with the given schema. Writes the header line
    /// to a temporary CSV which rows are then appended to.
    pub fn create(name: &str, columns: Vec<String>, config: &Config) -> Result<Table> {
        let source_file = config.temp_dir.join(format!("{name}.csv"));
        let mut writer = csv::Writer::from_path(&source_file)?;
        writer.write_record(&columns)?;
        writer.flush()?;

        Ok(Table {
            name: name.to_string(),
            max_rows_per_block: rows_per_block(config.block_bytes, columns.len()),
            columns,
            source_file,
            row_count: 0,
            block_count: 0,
            rows_per_block_count: Vec::new(),
            indices: HashMap::new(),
            distinct_counts: Vec::new(),
        })
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_column(&self, column_name: &str) -> bool {
        self.columns.iter().any(|c| c == column_name)
    }

    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column_name)
    }

    pub fn is_permanent(&self, config: &Config) -> bool {
        self.source_file.starts_with(&config.data_dir)
            && !self.source_file.starts_with(&config.temp_dir)
    }

    /// Read the header, then blockify the data rows. Used by LOAD.
    pub fn load(&mut self, pool: &mut BufferPool, config: &Config) -> Result<()> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.source_file)?;
        let headers = reader.headers()?.clone();
        self.extract_column_names(&headers)?;
        self.max_rows_per_block = rows_per_block(config.block_bytes, self.column_count());
        drop(reader);

        self.blockify(pool)
    }

    /// Derive the column list from the CSV header. Names must be
    /// non-empty and unique.
    fn extract_column_names(&mut self, headers: &csv::StringRecord) -> Result<()> {
        self.columns.clear();
        let mut seen = HashSet::new();
        for name in headers {
            let name = name.trim();
            if name.is_empty() {
                return Err(EngineError::Data(format!(
                    "empty column name in header of '{}'",
                    self.name
                )));
            }
            if !seen.insert(name.to_string()) {
                return Err(EngineError::Data(format!(
                    "duplicate column name '{name}' in header of '{}'",
                    self.name
                )));
            }
            self.columns.push(name.to_string());
        }
        if self.columns.is_empty() {
            return Err(EngineError::Data(format!(
                "no columns in header of '{}'",
                self.name
            )));
        }
        Ok(())
    }

    /// Split the source CSV into page files of `max_rows_per_block` rows,
    /// updating the block metadata and distinct-value statistics.
    /// Malformed rows are counted and skipped, not fatal.
    pub fn blockify(&mut self, pool: &mut BufferPool) -> Result<()> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&self.source_file)?;

        self.row_count = 0;
        self.block_count = 0;
        self.rows_per_block_count.clear();

        let column_count = self.column_count();
        let mut distinct: Vec<HashSet<i32>> = vec![HashSet::new(); column_count];
        let mut page_rows: Vec<Row> = Vec::with_capacity(self.max_rows_per_block);
        let mut skipped: u64 = 0;

        for (line, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    warn!("{}: unreadable row {}: {err}", self.name, line + 2);
                    skipped += 1;
                    continue;
                }
            };
            if record.len() != column_count {
                warn!(
                    "{}: row {} has {} values, expected {}; skipping",
                    self.name,
                    line + 2,
                    record.len(),
                    column_count
                );
                skipped += 1;
                continue;
            }

            let mut row = Vec::with_capacity(column_count);
            let mut bad = false;
            for field in &record {
                if field.is_empty() {
                    warn!("{}: empty value on row {}, treating as 0", self.name, line + 2);
                    row.push(0);
                    continue;
                }
                match field.parse::<i32>() {
                    Ok(value) => row.push(value),
                    Err(_) => {
                        warn!(
                            "{}: non-integer value '{field}' on row {}; skipping row",
                            self.name,
                            line + 2
                        );
                        bad = true;
                        break;
                    }
                }
            }
            if bad {
                skipped += 1;
                continue;
            }

            for (column, value) in row.iter().enumerate() {
                distinct[column].insert(*value);
            }
            self.row_count += 1;
            page_rows.push(row);

            if page_rows.len() == self.max_rows_per_block {
                let rows = mem::take(&mut page_rows);
                self.rows_per_block_count.push(rows.len());
                pool.write_page(&self.name, self.block_count, rows)?;
                self.block_count += 1;
                page_rows.reserve(self.max_rows_per_block);
            }
        }

        if !page_rows.is_empty() {
            self.rows_per_block_count.push(page_rows.len());
            pool.write_page(&self.name, self.block_count, page_rows)?;
            self.block_count += 1;
        }

        // The sets are only needed to produce the counts.
        self.distinct_counts = distinct.iter().map(|set| set.len() as u64).collect();

        if skipped > 0 {
            info!("{}: skipped {skipped} malformed rows during blockify", self.name);
        }
        debug!(
            "{}: blockified into {} blocks, {} rows",
            self.name, self.block_count, self.row_count
        );
        Ok(())
    }

    /// Fetch one of this table's pages through the pool.
    pub fn fetch_page(&self, pool: &mut BufferPool, page_index: usize) -> Result<Page> {
        let expected = self.rows_per_block_count.get(page_index).copied().unwrap_or(0);
        pool.get_page(&self.name, page_index, self.column_count(), expected)
    }

    /// Build a sorted index on every column in a single pass over the
    /// pages. Each value maps to the list of locations holding it.
    pub fn build_indices(&mut self, pool: &mut BufferPool) -> Result<()> {
        let mut indices: Vec<ColumnIndex> = vec![BTreeMap::new(); self.column_count()];

        for page_index in 0..self.block_count {
            let page = self.fetch_page(pool, page_index)?;
            for row_index in 0..page.row_count() {
                let Some(row) = page.row(row_index) else { continue };
                let location = RowLocation { page: page_index, row: row_index };
                for (column, value) in row.iter().enumerate() {
                    if column < indices.len() {
                        indices[column].entry(*value).or_default().push(location);
                    }
                }
            }
        }

        self.indices = self
            .columns
            .iter()
            .cloned()
            .zip(indices)
            .collect();
        debug!("{}: built indices on all {} columns", self.name, self.column_count());
        Ok(())
    }

    /// Drop all per-column indices. Required after any structural or
    /// row-level mutation that invalidates locations.
    pub fn clear_indices(&mut self) {
        if !self.indices.is_empty() {
            debug!("{}: clearing {} column indices", self.name, self.indices.len());
            self.indices.clear();
        }
    }

    pub fn is_indexed(&self, column_name: &str) -> bool {
        self.indices.contains_key(column_name)
    }

    /// Rename a column, re-keying its index map (if any) without
    /// rebuilding it. The caller has already validated both names.
    pub fn rename_column(&mut self, from: &str, to: &str) {
        if let Some(position) = self.column_index(from) {
            if let Some(index) = self.indices.remove(from) {
                self.indices.insert(to.to_string(), index);
            }
            self.columns[position] = to.to_string();
        } else {
            warn!("{}: no column '{from}' to rename", self.name);
        }
    }

    /// Print the header and up to `limit` rows, then the total row count.
    pub fn print(&self, pool: &mut BufferPool, limit: usize) -> Result<()> {
        println!("{}", self.columns.join(", "));
        let mut cursor = self.cursor(pool)?;
        let mut printed: u64 = 0;
        while printed < limit as u64 {
            match cursor.next(self, pool)? {
                Some(row) => {
                    println!("{}", format_row(&row));
                    printed += 1;
                }
                None => break,
            }
        }
        println!("\nRow Count: {}", self.row_count);
        Ok(())
    }

    /// Write the table out as a permanent CSV in the data directory
    /// (EXPORT). A temporary prior source file is deleted; page files are
    /// kept.
    pub fn make_permanent(&mut self, pool: &mut BufferPool, config: &Config) -> Result<()> {
        let target = config.data_dir.join(format!("{}.csv", self.name));
        let was_temporary = !self.is_permanent(config);
        let old_source = self.source_file.clone();

        let mut writer = csv::Writer::from_path(&target)?;
        writer.write_record(&self.columns)?;

        let mut cursor = self.cursor(pool)?;
        let mut written: u64 = 0;
        while let Some(row) = cursor.next(self, pool)? {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
            written += 1;
        }
        writer.flush()?;

        if written != self.row_count {
            warn!(
                "{}: exported {written} rows but metadata says {}",
                self.name, self.row_count
            );
        }

        self.source_file = target;
        if was_temporary && old_source != self.source_file {
            if let Err(err) = fs::remove_file(&old_source) {
                warn!(
                    "{}: could not delete temporary source {}: {err}",
                    self.name,
                    old_source.display()
                );
            }
        }
        Ok(())
    }

    /// Delete all page files, drop indices, and delete the source file if
    /// it is temporary. Called when the table leaves the catalogue.
    pub fn unload(&mut self, pool: &mut BufferPool, config: &Config) {
        pool.delete_table_pages(&self.name, self.block_count);
        if !self.is_permanent(config) {
            if let Err(err) = fs::remove_file(&self.source_file) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        "{}: could not delete temporary source {}: {err}",
                        self.name,
                        self.source_file.display()
                    );
                }
            }
        }
        self.clear_indices();
    }

    /// A fresh cursor at the table's start.
    pub fn cursor(&self, pool: &mut BufferPool) -> Result<Cursor> {
        Cursor::new(self, pool)
    }

    /// Appender for streaming rows into this table's source CSV before a
    /// blockify. Call `finish` to flush.
    pub fn row_writer(&self) -> Result<RowWriter> {
        let file = OpenOptions::new().append(true).open(&self.source_file)?;
        Ok(RowWriter {
            writer: csv::WriterBuilder::new().has_headers(false).from_writer(file),
        })
    }
}

/// Scoped row appender over the table's source CSV.
pub struct RowWriter {
    writer: csv::Writer<File>,
}

impl RowWriter {
    pub fn write_row(&mut self, row: &[i32]) -> Result<()> {
        self.writer.write_record(row.iter().map(|v| v.to_string()))?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

pub fn format_row(row: &[i32]) -> String {
    row.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
