//! `SORT T BY c1, ..., ck IN d1, ..., dk` — in-place external K-way
//! merge sort.
//!
//! Phase 1 reads the table's pages in groups of `pool_capacity` blocks,
//! sorts each group in memory with the multi-key comparator and writes it
//! out as a run of temporary pages. Phase 2 merges up to
//! `pool_capacity - 1` runs at a time through a min-heap keyed by the
//! same comparator, over as many passes as it takes to get down to a
//! single run. That run is streamed back into the table's own page
//! files; the block metadata is refreshed, the pool entries for the
//! table are dropped and the indices rebuilt.
//!
//! Every temporary run page is recorded when it is written, and deleted
//! from that record whether the sort succeeds or fails.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::mem;

use log::debug;

use crate::ast::{SortKey, SortOrder};
use crate::buffer_pool::BufferPool;
use crate::error::Result;
use crate::executor::{require_column, require_table_mut};
use crate::instance::Context;
use crate::page::Row;
use crate::table::Table;

pub fn run(ctx: &mut Context, table_name: &str, keys: &[SortKey]) -> Result<()> {
    let Context { catalog, pool, config } = ctx;
    let table = require_table_mut(catalog, table_name)?;
    let spec = SortSpec::resolve(table, keys)?;

    if table.block_count == 0 {
        println!("Relation '{table_name}' is empty. Nothing to sort.");
        return Ok(());
    }

    let blocks_per_run = config.pool_capacity;
    let fan_in = merge_fan_in(config.pool_capacity);
    let mut scratch = Scratch::new();

    let outcome = sort_in_place(pool, table, &spec, blocks_per_run, fan_in, &mut scratch);
    scratch.delete_all(pool);
    outcome?;

    pool.clear_pool_for_table(&table.name);
    table.build_indices(pool)?;
    println!("Sorted relation '{table_name}'.");
    Ok(())
}

fn sort_in_place(
    pool: &mut BufferPool,
    table: &mut Table,
    spec: &SortSpec,
    blocks_per_run: usize,
    fan_in: usize,
    scratch: &mut Scratch,
) -> Result<()> {
    let runs = form_runs(pool, table, spec, blocks_per_run, scratch)?;
    let run = reduce_to_single_run(pool, &table.name, table.max_rows_per_block, spec, runs, fan_in, scratch)?
        .expect("a non-empty table forms at least one run");

    // Stream the final run back over the table's own pages.
    let mut writer = PageWriter::new(&table.name, table.max_rows_per_block, table.column_count());
    merge_runs(pool, spec, std::slice::from_ref(&run), &mut writer)?;
    let rewritten = writer.finish(pool)?;

    let old_block_count = table.block_count;
    table.rows_per_block_count = rewritten.page_rows;
    table.block_count = table.rows_per_block_count.len();
    // Sorted output packs pages full; pages a DELETE had emptied may fall off the end.
    for page_index in table.block_count..old_block_count {
        pool.delete_page(&table.name, page_index);
    }
    Ok(())
}

/// Merge at most `pool_capacity - 1` runs per pass; a capacity-2 pool
/// still merges pairwise rather than stalling.
pub(crate) fn merge_fan_in(pool_capacity: usize) -> usize {
    (pool_capacity.saturating_sub(1)).max(2)
}

/// The resolved sort keys: column positions plus directions.
pub(crate) struct SortSpec {
    keys: Vec<(usize, SortOrder)>,
}

impl SortSpec {
    pub(crate) fn resolve(table: &Table, keys: &[SortKey]) -> Result<SortSpec> {
        let mut resolved = Vec::with_capacity(keys.len());
        for key in keys {
            resolved.push((require_column(table, &key.column)?, key.order));
        }
        Ok(SortSpec { keys: resolved })
    }

    /// Lexicographic multi-key comparison honoring each key's direction.
    pub(crate) fn compare(&self, a: &[i32], b: &[i32]) -> Ordering {
        for &(position, order) in &self.keys {
            let ordering = match order {
                SortOrder::Asc => a[position].cmp(&b[position]),
                SortOrder::Desc => b[position].cmp(&a[position]),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// A completed run: a named sequence of temporary pages with known
/// per-page row counts.
#[derive(Clone)]
pub(crate) struct RunFile {
    pub name: String,
    pub page_rows: Vec<usize>,
    pub column_count: usize,
}

/// Exact identities of every temporary run page created by one sort
/// operation. Deleted wholesale when the operator finishes, successfully
/// or not.
pub(crate) struct Scratch {
    pages: Vec<(String, usize)>,
    next_run: usize,
}

impl Scratch {
    pub(crate) fn new() -> Scratch {
        Scratch { pages: Vec::new(), next_run: 0 }
    }

    fn run_name(&mut self, table_name: &str) -> String {
        let name = format!("{table_name}_run{}", self.next_run);
        self.next_run += 1;
        name
    }

    fn absorb(&mut self, writer: &mut PageWriter) {
        self.pages.append(&mut writer.written);
    }

    pub(crate) fn delete_all(&mut self, pool: &mut BufferPool) {
        if !self.pages.is_empty() {
            debug!("deleting {} temporary run pages", self.pages.len());
        }
        for (name, page_index) in self.pages.drain(..) {
            pool.delete_page(&name, page_index);
        }
    }
}

/// Buffers rows into pages of `max_rows` and writes them through the
/// pool, remembering what it wrote.
pub(crate) struct PageWriter {
    name: String,
    max_rows: usize,
    column_count: usize,
    buffer: Vec<Row>,
    page_rows: Vec<usize>,
    written: Vec<(String, usize)>,
}

impl PageWriter {
    pub(crate) fn new(name: &str, max_rows: usize, column_count: usize) -> PageWriter {
        PageWriter {
            name: name.to_string(),
            max_rows,
            column_count,
            buffer: Vec::with_capacity(max_rows),
            page_rows: Vec::new(),
            written: Vec::new(),
        }
    }

    fn push(&mut self, pool: &mut BufferPool, row: Row) -> Result<()> {
        self.buffer.push(row);
        if self.buffer.len() == self.max_rows {
            self.flush_page(pool)?;
        }
        Ok(())
    }

    fn flush_page(&mut self, pool: &mut BufferPool) -> Result<()> {
        let rows = mem::take(&mut self.buffer);
        let page_index = self.page_rows.len();
        self.page_rows.push(rows.len());
        pool.write_page(&self.name, page_index, rows)?;
        self.written.push((self.name.clone(), page_index));
        Ok(())
    }

    pub(crate) fn finish(&mut self, pool: &mut BufferPool) -> Result<RunFile> {
        if !self.buffer.is_empty() {
            self.flush_page(pool)?;
        }
        Ok(RunFile {
            name: self.name.clone(),
            page_rows: self.page_rows.clone(),
            column_count: self.column_count,
        })
    }
}

/// Sequential reader over a run's pages.
pub(crate) struct RunCursor<'a> {
    run: &'a RunFile,
    page_index: usize,
    row_in_page: usize,
    rows: Vec<Row>,
}

impl<'a> RunCursor<'a> {
    pub(crate) fn new(run: &'a RunFile) -> RunCursor<'a> {
        RunCursor { run, page_index: 0, row_in_page: 0, rows: Vec::new() }
    }

    pub(crate) fn next(&mut self, pool: &mut BufferPool) -> Result<Option<Row>> {
        loop {
            if self.row_in_page < self.rows.len() {
                let row = self.rows[self.row_in_page].clone();
                self.row_in_page += 1;
                return Ok(Some(row));
            }
            if self.page_index >= self.run.page_rows.len() {
                return Ok(None);
            }
            let expected = self.run.page_rows[self.page_index];
            let page = pool.get_page(&self.run.name, self.page_index, self.run.column_count, expected)?;
            self.rows = page.rows().to_vec();
            self.page_index += 1;
            self.row_in_page = 0;
        }
    }
}

/// Heap entry for the K-way merge. The heap is a max-heap, so the
/// comparison is reversed to pop the smallest row first; ties break on
/// the run index to keep passes deterministic.
struct MergeEntry<'a> {
    row: Row,
    source: usize,
    spec: &'a SortSpec,
}

impl PartialEq for MergeEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeEntry<'_> {}

impl PartialOrd for MergeEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.spec
            .compare(&other.row, &self.row)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Phase 1: read `blocks_per_run` pages at a time, sort in memory, write
/// each sorted group out as a run.
pub(crate) fn form_runs(
    pool: &mut BufferPool,
    table: &Table,
    spec: &SortSpec,
    blocks_per_run: usize,
    scratch: &mut Scratch,
) -> Result<Vec<RunFile>> {
    let mut runs = Vec::new();
    let mut start = 0;
    while start < table.block_count {
        let end = (start + blocks_per_run).min(table.block_count);

        let mut rows: Vec<Row> = Vec::new();
        for page_index in start..end {
            let page = table.fetch_page(pool, page_index)?;
            rows.extend(page.rows().iter().cloned());
        }
        rows.sort_by(|a, b| spec.compare(a, b));

        let mut writer = PageWriter::new(
            &scratch.run_name(&table.name),
            table.max_rows_per_block,
            table.column_count(),
        );
        let mut push_all = || -> Result<RunFile> {
            for row in rows.drain(..) {
                writer.push(pool, row)?;
            }
            writer.finish(pool)
        };
        let run = push_all();
        scratch.absorb(&mut writer);
        runs.push(run?);

        start = end;
    }
    debug!("formed {} sorted runs for '{}'", runs.len(), table.name);
    Ok(runs)
}

/// Phase 2: repeated merge passes until at most one run remains.
pub(crate) fn reduce_to_single_run(
    pool: &mut BufferPool,
    table_name: &str,
    max_rows_per_block: usize,
    spec: &SortSpec,
    mut runs: Vec<RunFile>,
    fan_in: usize,
    scratch: &mut Scratch,
) -> Result<Option<RunFile>> {
    let mut pass = 0;
    while runs.len() > 1 {
        pass += 1;
        debug!("merge pass {pass}: {} runs, fan-in {fan_in}", runs.len());
        let mut next = Vec::new();
        for group in runs.chunks(fan_in) {
            if group.len() == 1 {
                next.push(group[0].clone());
                continue;
            }
            let mut writer = PageWriter::new(
                &scratch.run_name(table_name),
                max_rows_per_block,
                group[0].column_count,
            );
            let merged = merge_runs(pool, spec, group, &mut writer);
            scratch.absorb(&mut writer);
            merged?;
            let run = writer.finish(pool);
            scratch.absorb(&mut writer);
            next.push(run?);
        }
        runs = next;
    }
    Ok(runs.into_iter().next())
}

/// K-way merge of sorted runs through a min-heap, streaming rows into
/// the writer.
pub(crate) fn merge_runs(
    pool: &mut BufferPool,
    spec: &SortSpec,
    runs: &[RunFile],
    writer: &mut PageWriter,
) -> Result<()> {
    let mut cursors: Vec<RunCursor> = runs.iter().map(RunCursor::new).collect();
    let mut heap = BinaryHeap::with_capacity(runs.len());

    for (source, cursor) in cursors.iter_mut().enumerate() {
        if let Some(row) = cursor.next(pool)? {
            heap.push(MergeEntry { row, source, spec });
        }
    }

    while let Some(MergeEntry { row, source, .. }) = heap.pop() {
        writer.push(pool, row)?;
        if let Some(next) = cursors[source].next(pool)? {
            heap.push(MergeEntry { row: next, source, spec });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(keys: Vec<(usize, SortOrder)>) -> SortSpec {
        SortSpec { keys }
    }

    #[test]
    fn comparator_honors_direction_per_key() {
        let s = spec(vec![(0, SortOrder::Asc), (1, SortOrder::Desc)]);
        assert_eq!(s.compare(&[1, 5], &[2, 5]), Ordering::Less);
        assert_eq!(s.compare(&[1, 5], &[1, 9]), Ordering::Greater);
        assert_eq!(s.compare(&[1, 5], &[1, 5]), Ordering::Equal);
    }

    #[test]
    fn fan_in_never_drops_below_two() {
        assert_eq!(merge_fan_in(2), 2);
        assert_eq!(merge_fan_in(3), 2);
        assert_eq!(merge_fan_in(10), 9);
    }
}
