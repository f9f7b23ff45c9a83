//! `R <- SELECT col op val FROM S` — linear selection. The right-hand
//! side is an integer literal or a second column of the same relation.
//! Index-assisted lookups are the SEARCH operator's job.

use crate::ast::{Condition, Operand};
use crate::error::Result;
use crate::executor::{register, require_absent, require_column, require_table};
use crate::instance::Context;
use crate::table::Table;

pub fn run(ctx: &mut Context, result: &str, source: &str, condition: &Condition) -> Result<()> {
    let Context { catalog, pool, config } = ctx;
    require_absent(catalog, result)?;
    let source_table = require_table(catalog, source)?;

    let column = require_column(source_table, &condition.column)?;
    // Resolve the right-hand side once so the scan body stays simple.
    #[derive(Clone, Copy)]
    enum Rhs {
        Literal(i32),
        Column(usize),
    }
    let rhs = match &condition.operand {
        Operand::Literal(value) => Rhs::Literal(*value),
        Operand::Column(name) => Rhs::Column(require_column(source_table, name)?),
    };

    let dest = Table::create(result, source_table.columns.clone(), config)?;
    let mut writer = dest.row_writer()?;

    let mut cursor = source_table.cursor(pool)?;
    while let Some(row) = cursor.next(source_table, pool)? {
        let right = match rhs {
            Rhs::Literal(value) => value,
            Rhs::Column(position) => row[position],
        };
        if condition.op.eval(row[column] as i64, right as i64) {
            writer.write_row(&row)?;
        }
    }
    writer.finish()?;

    register(catalog, pool, dest)
}
