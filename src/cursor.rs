use crate::buffer_pool::BufferPool;
use crate::error::Result;
use crate::page::{Page, Row};
use crate::table::Table;

/// Forward iterator over a table's rows, page by page. Single-owner,
/// forward-only, never mutates rows. The owning table and the pool are
/// passed into `next` explicitly; the cursor itself only remembers where
/// it is.
pub struct Cursor {
    table_name: String,
    page_index: usize,
    row_in_page: usize,
    page: Page,
}

impl Cursor {
    /// Position a cursor at the start of the table, eagerly fetching
    /// page 0.
    pub fn new(table: &Table, pool: &mut BufferPool) -> Result<Cursor> {
        let page = if table.block_count > 0 {
            table.fetch_page(pool, 0)?
        } else {
            Page::empty(&table.name, 0, table.column_count())
        };
        Ok(Cursor {
            table_name: table.name.clone(),
            page_index: 0,
            row_in_page: 0,
            page,
        })
    }

    /// The next row, or `None` at the end of the table. Pages emptied by
    /// DELETE are skipped.
    pub fn next(&mut self, table: &Table, pool: &mut BufferPool) -> Result<Option<Row>> {
        loop {
            if let Some(row) = self.page.row(self.row_in_page) {
                self.row_in_page += 1;
                return Ok(Some(row.to_vec()));
            }
            if self.page_index + 1 >= table.block_count {
                return Ok(None);
            }
            self.seek_page(table, pool, self.page_index + 1)?;
        }
    }

    /// Jump to a specific page and continue reading from its first row.
    pub fn seek_page(&mut self, table: &Table, pool: &mut BufferPool, page_index: usize) -> Result<()> {
        debug_assert_eq!(table.name, self.table_name);
        self.page = table.fetch_page(pool, page_index)?;
        self.page_index = page_index;
        self.row_in_page = 0;
        Ok(())
    }
}
