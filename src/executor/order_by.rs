//! `R <- ORDER BY col ASC|DESC ON S` — external sort into a fresh
//! destination relation. Shares the run-formation and merge machinery
//! with SORT; the source table is left untouched.

use crate::ast::SortKey;
use crate::error::Result;
use crate::executor::sort::{form_runs, merge_fan_in, reduce_to_single_run, RunCursor, Scratch, SortSpec};
use crate::executor::{register, require_absent, require_table};
use crate::instance::Context;
use crate::table::Table;

pub fn run(ctx: &mut Context, result: &str, source: &str, key: &SortKey) -> Result<()> {
    let Context { catalog, pool, config } = ctx;
    require_absent(catalog, result)?;
    let source_table = require_table(catalog, source)?;
    let spec = SortSpec::resolve(source_table, std::slice::from_ref(key))?;

    let dest = Table::create(result, source_table.columns.clone(), config)?;

    let mut scratch = Scratch::new();
    let outcome = (|| -> Result<()> {
        let runs = form_runs(pool, source_table, &spec, config.pool_capacity, &mut scratch)?;
        let run = reduce_to_single_run(
            pool,
            &dest.name,
            source_table.max_rows_per_block,
            &spec,
            runs,
            merge_fan_in(config.pool_capacity),
            &mut scratch,
        )?;

        let mut writer = dest.row_writer()?;
        if let Some(run) = run {
            let mut cursor = RunCursor::new(&run);
            while let Some(row) = cursor.next(pool)? {
                writer.write_row(&row)?;
            }
        }
        writer.finish()
    })();
    scratch.delete_all(pool);
    outcome?;

    register(catalog, pool, dest)
}
