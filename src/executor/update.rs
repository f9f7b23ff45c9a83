//! `UPDATE T WHERE wcol op v SET scol = newv`
//!
//! Row locations survive an update, but stored values do not, so all
//! indices are invalidated up front. Pages are read, modified in memory
//! and written back only when a row actually changed.

use log::debug;

use crate::ast::{Condition, Operand};
use crate::error::{EngineError, Result};
use crate::executor::{require_column, require_table_mut};
use crate::instance::Context;

pub fn run(
    ctx: &mut Context,
    table_name: &str,
    condition: &Condition,
    set_column: &str,
    set_value: i32,
) -> Result<()> {
    let Context { catalog, pool, .. } = ctx;
    let table = require_table_mut(catalog, table_name)?;

    let where_position = require_column(table, &condition.column)?;
    let set_position = require_column(table, set_column)?;
    let Operand::Literal(where_value) = condition.operand else {
        return Err(EngineError::Semantic(
            "UPDATE supports comparison with integer literals only".into(),
        ));
    };

    table.clear_indices();

    let mut updated: u64 = 0;
    for page_index in 0..table.block_count {
        let page = table.fetch_page(pool, page_index)?;
        let mut rows = page.rows().to_vec();
        let mut page_modified = false;

        for row in &mut rows {
            if condition.op.eval(row[where_position] as i64, where_value as i64)
                && row[set_position] != set_value
            {
                row[set_position] = set_value;
                page_modified = true;
                updated += 1;
            }
        }

        if page_modified {
            debug!("UPDATE '{table_name}': writing back page {page_index}");
            pool.write_page(&table.name, page_index, rows)?;
        }
    }

    if updated > 0 {
        pool.clear_pool_for_table(&table.name);
        println!("UPDATE completed. {updated} rows updated.");
    } else {
        println!("UPDATE completed. No rows matched the condition.");
    }
    Ok(())
}
