//! `R <- GROUP BY gcol FROM S HAVING f_h(h_attr) op v RETURN f_r(r_attr)`
//!
//! One scan collects, per group value, the HAVING-attribute values and
//! the RETURN-attribute values. Groups whose HAVING aggregate passes the
//! condition emit `(group_value, f_r(return values))`. Aggregates
//! accumulate in 64 bits; the emitted value is narrowed to 32 bits with
//! any loss logged. The result schema is `(gcol, f_r ++ r_attr)`.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::ast::{AggregateExpr, BinaryOperator};
use crate::error::Result;
use crate::executor::{register, require_absent, require_column, require_table};
use crate::instance::Context;
use crate::table::Table;

#[allow(clippy::too_many_arguments)]
pub fn run(
    ctx: &mut Context,
    result: &str,
    source: &str,
    group_column: &str,
    having: &AggregateExpr,
    having_op: BinaryOperator,
    having_value: i32,
    returning: &AggregateExpr,
) -> Result<()> {
    let Context { catalog, pool, config } = ctx;
    require_absent(catalog, result)?;
    let source_table = require_table(catalog, source)?;

    let group_position = require_column(source_table, group_column)?;
    let having_position = require_column(source_table, &having.column)?;
    let return_position = require_column(source_table, &returning.column)?;

    // group value -> (having-attribute values, return-attribute values).
    // An ordered map keeps the (otherwise unspecified) output order
    // deterministic.
    let mut groups: BTreeMap<i32, (Vec<i32>, Vec<i32>)> = BTreeMap::new();
    let mut cursor = source_table.cursor(pool)?;
    while let Some(row) = cursor.next(source_table, pool)? {
        let entry = groups.entry(row[group_position]).or_default();
        entry.0.push(row[having_position]);
        entry.1.push(row[return_position]);
    }
    debug!("GROUP BY on '{source}': {} groups", groups.len());

    let return_header = format!("{}{}", returning.function.keyword(), returning.column);
    let dest = Table::create(result, vec![group_column.to_string(), return_header], config)?;
    let mut writer = dest.row_writer()?;

    for (group_value, (having_values, return_values)) in &groups {
        let having_aggregate = having.function.apply(having_values);
        if !having_op.eval(having_aggregate, having_value as i64) {
            continue;
        }
        let return_aggregate = returning.function.apply(return_values);
        let narrowed = return_aggregate as i32;
        if narrowed as i64 != return_aggregate {
            warn!(
                "group {group_value}: aggregate {return_aggregate} does not fit in 32 bits, truncating"
            );
        }
        writer.write_row(&[*group_value, narrowed])?;
    }
    writer.finish()?;

    register(catalog, pool, dest)
}
