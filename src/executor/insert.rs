//! `INSERT INTO T ( c1 = v1, c2 = v2, ... )`
//!
//! Unmentioned columns default to 0. The row lands in the last page when
//! it has room, otherwise a new page is created. Every indexed column
//! learns the new row's location; the pool is cleared for the table so
//! pre-mutation page copies are never served.

use std::collections::HashSet;

use log::debug;

use crate::error::{EngineError, Result};
use crate::executor::{require_column, require_table_mut};
use crate::instance::Context;
use crate::table::RowLocation;

pub fn run(ctx: &mut Context, table_name: &str, assignments: &[(String, i32)]) -> Result<()> {
    let Context { catalog, pool, .. } = ctx;
    let table = require_table_mut(catalog, table_name)?;

    // Validate columns and reject duplicate assignments before mutating.
    let mut seen = HashSet::new();
    for (column, _) in assignments {
        require_column(table, column)?;
        if !seen.insert(column.as_str()) {
            return Err(EngineError::Semantic(format!(
                "column '{column}' assigned more than once"
            )));
        }
    }

    let mut row = vec![0; table.column_count()];
    for (column, value) in assignments {
        let position = table.column_index(column).expect("validated above");
        row[position] = *value;
    }

    let location = if let Some(last) = table.block_count.checked_sub(1) {
        let rows_in_last = table.rows_per_block_count[last];
        if rows_in_last < table.max_rows_per_block {
            // Append to the last page.
            let page = table.fetch_page(pool, last)?;
            let mut rows = page.rows().to_vec();
            rows.push(row.clone());
            pool.write_page(&table.name, last, rows)?;
            table.rows_per_block_count[last] += 1;
            RowLocation { page: last, row: rows_in_last }
        } else {
            // Last page is full, open a new one.
            let page_index = table.block_count;
            pool.write_page(&table.name, page_index, vec![row.clone()])?;
            table.block_count += 1;
            table.rows_per_block_count.push(1);
            RowLocation { page: page_index, row: 0 }
        }
    } else {
        // Empty table: the row creates page 0.
        pool.write_page(&table.name, 0, vec![row.clone()])?;
        table.block_count = 1;
        table.rows_per_block_count.push(1);
        RowLocation { page: 0, row: 0 }
    };

    table.row_count += 1;
    debug!(
        "INSERT into '{table_name}' at ({}, {})",
        location.page, location.row
    );

    // The new location joins every indexed column.
    let columns = table.columns.clone();
    for (position, column) in columns.iter().enumerate() {
        if let Some(index) = table.indices.get_mut(column) {
            index.entry(row[position]).or_default().push(location);
        }
    }

    pool.clear_pool_for_table(&table.name);
    println!("Row inserted into '{table_name}'. Row Count: {}", table.row_count);
    Ok(())
}
