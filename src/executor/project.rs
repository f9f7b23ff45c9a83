//! `R <- PROJECT c1, ..., ck FROM S`

use crate::error::Result;
use crate::executor::{register, require_absent, require_column, require_table};
use crate::instance::Context;
use crate::table::Table;

pub fn run(ctx: &mut Context, result: &str, source: &str, columns: &[String]) -> Result<()> {
    let Context { catalog, pool, config } = ctx;
    require_absent(catalog, result)?;
    let source_table = require_table(catalog, source)?;

    let mut positions = Vec::with_capacity(columns.len());
    for column in columns {
        positions.push(require_column(source_table, column)?);
    }

    let dest = Table::create(result, columns.to_vec(), config)?;
    let mut writer = dest.row_writer()?;

    let mut cursor = source_table.cursor(pool)?;
    while let Some(row) = cursor.next(source_table, pool)? {
        let projected: Vec<i32> = positions.iter().map(|&p| row[p]).collect();
        writer.write_row(&projected)?;
    }
    writer.finish()?;

    register(catalog, pool, dest)
}
