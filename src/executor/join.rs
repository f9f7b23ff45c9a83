//! `R <- JOIN S1, S2 ON c1 c2` — hash join.
//!
//! The smaller relation (by stored row count) is built into an in-memory
//! multimap, the larger one probes it. Output columns are always
//! `columns(S1) ++ columns(S2)` regardless of which side was chosen as
//! the build side.

use std::collections::HashMap;

use log::debug;

use crate::error::Result;
use crate::executor::{register, require_absent, require_column, require_table};
use crate::instance::Context;
use crate::page::Row;
use crate::table::Table;

pub fn run(
    ctx: &mut Context,
    result: &str,
    left: &str,
    right: &str,
    left_column: &str,
    right_column: &str,
) -> Result<()> {
    let Context { catalog, pool, config } = ctx;
    require_absent(catalog, result)?;
    let left_table = require_table(catalog, left)?;
    let right_table = require_table(catalog, right)?;
    let left_position = require_column(left_table, left_column)?;
    let right_position = require_column(right_table, right_column)?;

    let left_is_build = left_table.row_count <= right_table.row_count;
    let (build_table, build_position, probe_table, probe_position) = if left_is_build {
        (left_table, left_position, right_table, right_position)
    } else {
        (right_table, right_position, left_table, left_position)
    };

    // Build phase.
    debug!("JOIN build side: '{}' ({} rows)", build_table.name, build_table.row_count);
    let mut hash_table: HashMap<i32, Vec<Row>> = HashMap::new();
    let mut cursor = build_table.cursor(pool)?;
    while let Some(row) = cursor.next(build_table, pool)? {
        hash_table.entry(row[build_position]).or_default().push(row);
    }

    let mut columns = left_table.columns.clone();
    columns.extend(right_table.columns.iter().cloned());
    let dest = Table::create(result, columns, config)?;
    let mut writer = dest.row_writer()?;

    // Probe phase.
    let mut cursor = probe_table.cursor(pool)?;
    while let Some(probe_row) = cursor.next(probe_table, pool)? {
        let Some(matches) = hash_table.get(&probe_row[probe_position]) else {
            continue;
        };
        for build_row in matches {
            let mut combined = Vec::with_capacity(build_row.len() + probe_row.len());
            if left_is_build {
                combined.extend_from_slice(build_row);
                combined.extend_from_slice(&probe_row);
            } else {
                combined.extend_from_slice(&probe_row);
                combined.extend_from_slice(build_row);
            }
            writer.write_row(&combined)?;
        }
    }
    writer.finish()?;

    register(catalog, pool, dest)
}
