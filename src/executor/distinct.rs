//! `R <- DISTINCT S` — row deduplication over a single scan, hashing
//! whole rows the way the join build phase hashes keys.

use std::collections::HashSet;

use crate::error::Result;
use crate::executor::{register, require_absent, require_table};
use crate::instance::Context;
use crate::page::Row;
use crate::table::Table;

pub fn run(ctx: &mut Context, result: &str, source: &str) -> Result<()> {
    let Context { catalog, pool, config } = ctx;
    require_absent(catalog, result)?;
    let source_table = require_table(catalog, source)?;

    let dest = Table::create(result, source_table.columns.clone(), config)?;
    let mut writer = dest.row_writer()?;

    let mut seen: HashSet<Row> = HashSet::new();
    let mut cursor = source_table.cursor(pool)?;
    while let Some(row) = cursor.next(source_table, pool)? {
        if seen.insert(row.clone()) {
            writer.write_row(&row)?;
        }
    }
    writer.finish()?;

    register(catalog, pool, dest)
}
