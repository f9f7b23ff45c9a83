use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::{debug, warn};

use crate::error::{EngineError, Result};
use crate::page::{Page, Row};

/// Fixed-capacity LRU cache of pages. Every data-page access goes through
/// the pool: it is both the read-through cache and the write buffer, and
/// the sole mutator of on-disk page files.
///
/// Entries live in a deque, least recently used at the front. Lookups are
/// a linear scan by page name; the pool is small (a handful of slots) and
/// the O(capacity) hit path is part of the contract.
pub struct BufferPool {
    pages: VecDeque<Page>,
    capacity: usize,
    temp_dir: PathBuf,
}

impl BufferPool {
    pub fn new(capacity: usize, temp_dir: impl Into<PathBuf>) -> Self {
        BufferPool {
            pages: VecDeque::with_capacity(capacity),
            capacity,
            temp_dir: temp_dir.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, page_name: &str) -> bool {
        self.pages.iter().any(|page| page.name() == page_name)
    }

    /// Fetch a page, loading it from disk on a miss. A hit moves the
    /// entry to the most-recently-used end. The caller supplies the
    /// owning table's metadata for the read.
    ///
    /// A missing page file degrades to an empty page with a warning; the
    /// caller treats that as "no such page".
    pub fn get_page(
        &mut self,
        table_name: &str,
        page_index: usize,
        column_count: usize,
        expected_rows: usize,
    ) -> Result<Page> {
        let page_name = Page::page_name(table_name, page_index);

        if let Some(pos) = self.pages.iter().position(|page| page.name() == page_name) {
            let page = self.pages.remove(pos).expect("position came from the deque");
            let copy = page.clone();
            self.pages.push_back(page);
            return Ok(copy);
        }

        debug!("pool miss, loading {page_name}");
        let page = match Page::read_from_disk(
            &self.temp_dir,
            table_name,
            page_index,
            column_count,
            expected_rows,
        ) {
            Ok(page) => page,
            Err(EngineError::Io(err)) if err.kind() == ErrorKind::NotFound => {
                warn!("page file {page_name} does not exist, serving an empty page");
                return Ok(Page::empty(table_name, page_index, column_count));
            }
            Err(err) => return Err(err),
        };

        self.evict_if_full();
        self.pages.push_back(page.clone());
        Ok(page)
    }

    /// Mutable handle to a resident page, if any. Does not touch the LRU
    /// order.
    pub fn find_page(&mut self, page_name: &str) -> Option<&mut Page> {
        self.pages.iter_mut().find(|page| page.name() == page_name)
    }

    /// Insert a page, replacing any resident page with the same name.
    pub fn insert_into_pool(&mut self, page: Page) {
        let page_name = page.name();
        if let Some(pos) = self.pages.iter().position(|p| p.name() == page_name) {
            self.pages.remove(pos);
        }
        self.evict_if_full();
        self.pages.push_back(page);
    }

    /// Construct a page from `rows` and write it through to disk,
    /// refreshing any stale resident copy. Used by operators writing
    /// destination relations and by in-place mutators.
    pub fn write_page(&mut self, table_name: &str, page_index: usize, rows: Vec<Row>) -> Result<()> {
        let page = Page::new(table_name, page_index, rows);
        page.write_to_disk(&self.temp_dir)?;
        let page_name = page.name();
        if let Some(resident) = self.find_page(&page_name) {
            *resident = page;
        }
        Ok(())
    }

    /// Flush every resident page. Invoked on shutdown. Write failures are
    /// logged and do not poison the pool.
    pub fn write_all_pages(&mut self) {
        debug!("flushing {} resident pages", self.pages.len());
        for page in &self.pages {
            if let Err(err) = page.write_to_disk(&self.temp_dir) {
                warn!("failed to flush page {}: {err}", page.name());
            }
        }
    }

    /// Remove a page from the pool if present and delete its file.
    pub fn delete_page(&mut self, table_name: &str, page_index: usize) {
        let page_name = Page::page_name(table_name, page_index);
        if let Some(pos) = self.pages.iter().position(|page| page.name() == page_name) {
            self.pages.remove(pos);
        }
        Page::delete_file(&self.temp_dir, table_name, page_index);
    }

    /// Delete every page of a table, pool entries and files alike.
    pub fn delete_table_pages(&mut self, table_name: &str, block_count: usize) {
        self.clear_pool_for_table(table_name);
        for page_index in 0..block_count {
            Page::delete_file(&self.temp_dir, table_name, page_index);
        }
    }

    /// Evict, without writing, every pool entry belonging to a table.
    /// Used after bulk mutations so stale copies are not served.
    pub fn clear_pool_for_table(&mut self, table_name: &str) {
        self.pages.retain(|page| page.table_name() != table_name);
    }

    fn evict_if_full(&mut self) {
        while self.pages.len() >= self.capacity {
            if let Some(victim) = self.pages.pop_front() {
                debug!("evicting {}", victim.name());
                if let Err(err) = victim.write_to_disk(&self.temp_dir) {
                    warn!("failed to write back evicted page {}: {err}", victim.name());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pool_with(capacity: usize) -> (BufferPool, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let pool = BufferPool::new(capacity, dir.path().to_path_buf());
        (pool, dir)
    }

    #[test]
    fn capacity_is_enforced() {
        let (mut pool, _dir) = pool_with(2);
        for i in 0..4 {
            pool.write_page("t", i, vec![vec![i as i32]]).unwrap();
            pool.get_page("t", i, 1, 1).unwrap();
        }
        assert_eq!(pool.len(), 2);
        assert!(pool.contains("t_Page2"));
        assert!(pool.contains("t_Page3"));
    }

    #[test]
    fn hit_moves_entry_to_mru_end() {
        let (mut pool, _dir) = pool_with(2);
        for i in 0..2 {
            pool.write_page("t", i, vec![vec![i as i32]]).unwrap();
            pool.get_page("t", i, 1, 1).unwrap();
        }
        // Touch page 0 so page 1 becomes the LRU victim.
        pool.get_page("t", 0, 1, 1).unwrap();
        pool.write_page("t", 2, vec![vec![2]]).unwrap();
        pool.get_page("t", 2, 1, 1).unwrap();

        assert!(pool.contains("t_Page0"));
        assert!(!pool.contains("t_Page1"));
    }

    #[test]
    fn no_duplicate_entries_for_same_page() {
        let (mut pool, _dir) = pool_with(4);
        pool.write_page("t", 0, vec![vec![1]]).unwrap();
        pool.get_page("t", 0, 1, 1).unwrap();
        pool.get_page("t", 0, 1, 1).unwrap();
        pool.insert_into_pool(Page::new("t", 0, vec![vec![9]]));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn missing_page_degrades_to_empty() {
        let (mut pool, _dir) = pool_with(2);
        let page = pool.get_page("ghost", 0, 3, 5).unwrap();
        assert_eq!(page.row_count(), 0);
        // Phantom pages are not cached.
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn write_page_refreshes_resident_copy() {
        let (mut pool, _dir) = pool_with(2);
        pool.write_page("t", 0, vec![vec![1]]).unwrap();
        pool.get_page("t", 0, 1, 1).unwrap();
        pool.write_page("t", 0, vec![vec![42]]).unwrap();

        let page = pool.get_page("t", 0, 1, 1).unwrap();
        assert_eq!(page.row(0), Some(&[42][..]));
    }

    #[test]
    fn clear_pool_for_table_is_exact_on_names() {
        let (mut pool, _dir) = pool_with(4);
        pool.write_page("t", 0, vec![vec![1]]).unwrap();
        pool.get_page("t", 0, 1, 1).unwrap();
        pool.write_page("t2", 0, vec![vec![2]]).unwrap();
        pool.get_page("t2", 0, 1, 1).unwrap();

        pool.clear_pool_for_table("t");
        assert!(!pool.contains("t_Page0"));
        assert!(pool.contains("t2_Page0"));
    }

    #[test]
    fn delete_table_pages_removes_files() {
        let (mut pool, dir) = pool_with(4);
        pool.write_page("t", 0, vec![vec![1]]).unwrap();
        pool.write_page("t", 1, vec![vec![2]]).unwrap();
        pool.delete_table_pages("t", 2);

        assert!(!dir.path().join("t_Page0").exists());
        assert!(!dir.path().join("t_Page1").exists());
        assert_eq!(pool.len(), 0);
    }
}
