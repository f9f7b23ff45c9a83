//! `DELETE FROM T WHERE wcol op v`
//!
//! Pages are filtered in memory; a page only goes back to disk when rows
//! were actually dropped. The block count is not reduced — a page may end
//! up with zero rows and the cursor skips it.

use log::debug;

use crate::ast::{Condition, Operand};
use crate::error::{EngineError, Result};
use crate::executor::{require_column, require_table_mut};
use crate::instance::Context;

pub fn run(ctx: &mut Context, table_name: &str, condition: &Condition) -> Result<()> {
    let Context { catalog, pool, .. } = ctx;
    let table = require_table_mut(catalog, table_name)?;

    let where_position = require_column(table, &condition.column)?;
    let Operand::Literal(where_value) = condition.operand else {
        return Err(EngineError::Semantic(
            "DELETE supports comparison with integer literals only".into(),
        ));
    };

    table.clear_indices();

    let mut deleted: u64 = 0;
    for page_index in 0..table.block_count {
        let page = table.fetch_page(pool, page_index)?;
        let original = page.row_count();

        let retained: Vec<_> = page
            .rows()
            .iter()
            .filter(|row| !condition.op.eval(row[where_position] as i64, where_value as i64))
            .cloned()
            .collect();

        let dropped = original - retained.len();
        if dropped > 0 {
            debug!("DELETE '{table_name}': page {page_index} loses {dropped} rows");
            table.rows_per_block_count[page_index] = retained.len();
            pool.write_page(&table.name, page_index, retained)?;
            deleted += dropped as u64;
        }
    }

    if deleted > 0 {
        table.row_count -= deleted;
        pool.clear_pool_for_table(&table.name);
        println!("DELETE completed. {deleted} rows deleted.");
    } else {
        println!("DELETE completed. No rows matched the condition.");
    }
    Ok(())
}
