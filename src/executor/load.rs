//! `LOAD T` — read `{dataDir}/T.csv`, blockify it, and build the
//! implicit index on every column.

use crate::error::{EngineError, Result};
use crate::executor::require_absent;
use crate::instance::Context;
use crate::table::Table;

pub fn run(ctx: &mut Context, table_name: &str) -> Result<()> {
    let Context { catalog, pool, config } = ctx;
    require_absent(catalog, table_name)?;

    let source = config.data_dir.join(format!("{table_name}.csv"));
    if !source.exists() {
        return Err(EngineError::Semantic(format!(
            "data file for relation '{table_name}' doesn't exist"
        )));
    }

    let mut table = Table::open(table_name, config);
    table.load(pool, config)?;
    table.build_indices(pool)?;

    println!(
        "Loaded relation '{table_name}'. Column Count: {} Row Count: {}",
        table.column_count(),
        table.row_count
    );
    catalog.insert(table)?;
    Ok(())
}
