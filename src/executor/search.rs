//! `R <- SEARCH FROM S WHERE col op val` — index-assisted selection.
//!
//! When the source has an index on the column, the sorted map answers
//! point and range predicates directly; the matching locations are then
//! resolved through a small local page cache so a page is fetched at most
//! once. `!=` would touch almost the whole index, so it falls back to the
//! linear scan, as does any unindexed column. Either way the result is
//! the same multiset a linear selection would produce.

use std::collections::HashMap;
use std::ops::Bound;

use log::debug;

use crate::ast::BinaryOperator;
use crate::buffer_pool::BufferPool;
use crate::error::Result;
use crate::executor::{register, require_absent, require_column, require_table};
use crate::instance::Context;
use crate::page::Page;
use crate::table::{RowLocation, RowWriter, Table};

pub fn run(
    ctx: &mut Context,
    result: &str,
    source: &str,
    column: &str,
    op: BinaryOperator,
    value: i32,
) -> Result<()> {
    let Context { catalog, pool, config } = ctx;
    require_absent(catalog, result)?;
    let source_table = require_table(catalog, source)?;
    let column_position = require_column(source_table, column)?;

    let dest = Table::create(result, source_table.columns.clone(), config)?;
    let mut writer = dest.row_writer()?;

    let use_index = source_table.is_indexed(column) && op != BinaryOperator::NotEqual;
    if use_index {
        debug!("SEARCH on '{source}' uses the index on '{column}'");
        let locations = index_lookup(source_table, column, op, value);
        fetch_rows(source_table, pool, &locations, &mut writer)?;
    } else {
        debug!("SEARCH on '{source}' falls back to a linear scan");
        let mut cursor = source_table.cursor(pool)?;
        while let Some(row) = cursor.next(source_table, pool)? {
            if op.eval(row[column_position] as i64, value as i64) {
                writer.write_row(&row)?;
            }
        }
    }
    writer.finish()?;

    register(catalog, pool, dest)
}

/// Collect every matching row location from the column's sorted map.
fn index_lookup(table: &Table, column: &str, op: BinaryOperator, value: i32) -> Vec<RowLocation> {
    let index = &table.indices[column];
    let mut locations = Vec::new();
    let mut extend = |entries: &Vec<RowLocation>| locations.extend(entries.iter().copied());

    match op {
        BinaryOperator::Equal => {
            if let Some(entries) = index.get(&value) {
                extend(entries);
            }
        }
        BinaryOperator::LessThan => {
            for entries in index.range(..value).map(|(_, v)| v) {
                extend(entries);
            }
        }
        BinaryOperator::LessEqual => {
            for entries in index.range(..=value).map(|(_, v)| v) {
                extend(entries);
            }
        }
        BinaryOperator::GreaterThan => {
            for entries in index.range((Bound::Excluded(value), Bound::Unbounded)).map(|(_, v)| v) {
                extend(entries);
            }
        }
        BinaryOperator::GreaterEqual => {
            for entries in index.range(value..).map(|(_, v)| v) {
                extend(entries);
            }
        }
        // Handled by the linear fallback before we get here.
        BinaryOperator::NotEqual => {}
    }
    locations
}

/// Resolve row locations into rows, buffering pages in a local cache so
/// each page is pulled through the pool once.
fn fetch_rows(
    table: &Table,
    pool: &mut BufferPool,
    locations: &[RowLocation],
    writer: &mut RowWriter,
) -> Result<()> {
    let mut cache: HashMap<usize, Page> = HashMap::new();

    for location in locations {
        if !cache.contains_key(&location.page) {
            cache.insert(location.page, table.fetch_page(pool, location.page)?);
        }
        let page = &cache[&location.page];
        match page.row(location.row) {
            Some(row) => writer.write_row(row)?,
            None => log::warn!(
                "stale index location ({}, {}) on '{}'",
                location.page,
                location.row,
                table.name
            ),
        }
    }
    Ok(())
}
