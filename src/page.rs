use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::Result;

/// A row is an ordered sequence of signed 32-bit integers, one per column
/// of the owning table.
pub type Row = Vec<i32>;

/// In-memory image of one on-disk block.
///
/// The page file holds one row per line, values separated by single
/// spaces. A page knows its own file path (derived from the table name
/// and page index) but nothing about the buffer pool.
#[derive(Debug, Clone)]
pub struct Page {
    table_name: String,
    page_index: usize,
    column_count: usize,
    rows: Vec<Row>,
}

impl Page {
    /// A page with no rows, used when a read misses entirely.
    pub fn empty(table_name: &str, page_index: usize, column_count: usize) -> Self {
        Page {
            table_name: table_name.to_string(),
            page_index,
            column_count,
            rows: Vec::new(),
        }
    }

    pub fn new(table_name: &str, page_index: usize, rows: Vec<Row>) -> Self {
        let column_count = rows.first().map_or(0, |row| row.len());
        Page {
            table_name: table_name.to_string(),
            page_index,
            column_count,
            rows,
        }
    }

    /// `{table}_Page{index}`, the identity of this page in the pool.
    pub fn page_name(table_name: &str, page_index: usize) -> String {
        format!("{table_name}_Page{page_index}")
    }

    pub fn file_path(temp_dir: &Path, table_name: &str, page_index: usize) -> PathBuf {
        temp_dir.join(Self::page_name(table_name, page_index))
    }

    pub fn name(&self) -> String {
        Self::page_name(&self.table_name, self.page_index)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Row by index. Out-of-range indices yield `None`, never a panic.
    pub fn row(&self, row_index: usize) -> Option<&[i32]> {
        self.rows.get(row_index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Row> {
        &mut self.rows
    }

    /// Read a page from disk. `expected_rows` comes from the owning
    /// table's `rows_per_block_count`; reading fewer rows than expected
    /// truncates the page and logs, reading more discards the excess.
    pub fn read_from_disk(
        temp_dir: &Path,
        table_name: &str,
        page_index: usize,
        column_count: usize,
        expected_rows: usize,
    ) -> Result<Page> {
        let path = Self::file_path(temp_dir, table_name, page_index);
        let file = File::open(&path)?;
        let reader = BufReader::new(file);

        let mut rows = Vec::with_capacity(expected_rows);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if rows.len() == expected_rows {
                warn!(
                    "page {}: more data than the expected {} rows, discarding the rest",
                    Self::page_name(table_name, page_index),
                    expected_rows
                );
                break;
            }
            let mut row = Vec::with_capacity(column_count);
            for field in line.split_whitespace() {
                match field.parse::<i32>() {
                    Ok(value) => row.push(value),
                    Err(_) => {
                        warn!(
                            "page {}: non-integer value '{}' in row {}, stopping the row here",
                            Self::page_name(table_name, page_index),
                            field,
                            rows.len()
                        );
                        break;
                    }
                }
            }
            if row.len() != column_count {
                warn!(
                    "page {}: row {} has {} values, expected {}",
                    Self::page_name(table_name, page_index),
                    rows.len(),
                    row.len(),
                    column_count
                );
                // Degrade to a well-formed row rather than poisoning readers.
                row.resize(column_count, 0);
            }
            rows.push(row);
        }

        if rows.len() < expected_rows {
            warn!(
                "page {}: read {} rows, expected {}",
                Self::page_name(table_name, page_index),
                rows.len(),
                expected_rows
            );
        }

        Ok(Page {
            table_name: table_name.to_string(),
            page_index,
            column_count,
            rows,
        })
    }

    /// Write the page to its file, truncating any previous contents. A
    /// row whose length disagrees with the declared column count is
    /// logged and written as-is.
    pub fn write_to_disk(&self, temp_dir: &Path) -> Result<()> {
        let path = Self::file_path(temp_dir, &self.table_name, self.page_index);
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);

        for (row_index, row) in self.rows.iter().enumerate() {
            if row.len() != self.column_count {
                warn!(
                    "page {}: row {} has {} values, expected {}; writing what is there",
                    self.name(),
                    row_index,
                    row.len(),
                    self.column_count
                );
            }
            let mut first = true;
            for value in row {
                if !first {
                    write!(writer, " ")?;
                }
                write!(writer, "{value}")?;
                first = false;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Delete this page's file. A missing file is not an error.
    pub fn delete_file(temp_dir: &Path, table_name: &str, page_index: usize) {
        let path = Self::file_path(temp_dir, table_name, page_index);
        if let Err(err) = fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("could not delete page file {}: {err}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trip() {
        let dir = tempdir().unwrap();
        let rows = vec![vec![1, 2, 3], vec![4, 5, 6]];
        let page = Page::new("t", 0, rows.clone());
        page.write_to_disk(dir.path()).unwrap();

        let read = Page::read_from_disk(dir.path(), "t", 0, 3, 2).unwrap();
        assert_eq!(read.rows(), rows.as_slice());
        assert_eq!(read.row_count(), 2);
        assert_eq!(read.column_count(), 3);
    }

    #[test]
    fn short_file_truncates_row_count() {
        let dir = tempdir().unwrap();
        let page = Page::new("t", 0, vec![vec![7, 8]]);
        page.write_to_disk(dir.path()).unwrap();

        // Metadata claims 3 rows but the file only has 1.
        let read = Page::read_from_disk(dir.path(), "t", 0, 2, 3).unwrap();
        assert_eq!(read.row_count(), 1);
        assert_eq!(read.row(0), Some(&[7, 8][..]));
    }

    #[test]
    fn long_file_discards_excess() {
        let dir = tempdir().unwrap();
        let page = Page::new("t", 0, vec![vec![1], vec![2], vec![3]]);
        page.write_to_disk(dir.path()).unwrap();

        let read = Page::read_from_disk(dir.path(), "t", 0, 1, 2).unwrap();
        assert_eq!(read.row_count(), 2);
    }

    #[test]
    fn out_of_range_row_is_none() {
        let page = Page::new("t", 0, vec![vec![1, 2]]);
        assert!(page.row(0).is_some());
        assert!(page.row(1).is_none());
        assert!(page.row(100).is_none());
    }

    #[test]
    fn delete_missing_file_is_quiet() {
        let dir = tempdir().unwrap();
        Page::delete_file(dir.path(), "nope", 0);
    }
}
