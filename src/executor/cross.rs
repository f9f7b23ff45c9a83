//! `R <- CROSS S1 S2` — cross product. Result columns carry a
//! `{table}_{column}` prefix so the two sides stay distinguishable.

use crate::error::Result;
use crate::executor::{register, require_absent, require_table};
use crate::instance::Context;
use crate::table::Table;

pub fn run(ctx: &mut Context, result: &str, left: &str, right: &str) -> Result<()> {
    let Context { catalog, pool, config } = ctx;
    require_absent(catalog, result)?;
    let left_table = require_table(catalog, left)?;
    let right_table = require_table(catalog, right)?;

    let mut columns = Vec::with_capacity(left_table.column_count() + right_table.column_count());
    for column in &left_table.columns {
        columns.push(format!("{}_{}", left_table.name, column));
    }
    for column in &right_table.columns {
        columns.push(format!("{}_{}", right_table.name, column));
    }

    let dest = Table::create(result, columns, config)?;
    let mut writer = dest.row_writer()?;

    let mut outer = left_table.cursor(pool)?;
    while let Some(left_row) = outer.next(left_table, pool)? {
        // A fresh inner cursor per outer row.
        let mut inner = right_table.cursor(pool)?;
        while let Some(right_row) = inner.next(right_table, pool)? {
            let mut combined = Vec::with_capacity(left_row.len() + right_row.len());
            combined.extend_from_slice(&left_row);
            combined.extend_from_slice(&right_row);
            writer.write_row(&combined)?;
        }
    }
    writer.finish()?;

    register(catalog, pool, dest)
}
