//! Command execution. Each non-trivial operator lives in its own
//! submodule; the thin commands (PRINT, EXPORT, CLEAR, RENAME, LIST) are
//! wrappers over Table/Catalogue methods and live here with the
//! dispatcher.
//!
//! All operators follow the same protocol: semantic validation first
//! (required relations exist, forbidden ones do not, referenced columns
//! exist), then execution that either registers a new destination table
//! in the catalogue or mutates a named table in place. No mutation
//! happens before validation passes.

pub mod cross;
pub mod delete;
pub mod distinct;
pub mod group_by;
pub mod insert;
pub mod join;
pub mod load;
pub mod order_by;
pub mod project;
pub mod search;
pub mod select;
pub mod sort;
pub mod source;
pub mod update;

use crate::ast::Command;
use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::error::{EngineError, Result};
use crate::instance::Context;
use crate::parser;
use crate::table::Table;

/// Whether the driver should keep reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Parse and execute a single command line.
pub fn execute_line(ctx: &mut Context, line: &str) -> Result<Flow> {
    match parser::parse(line)? {
        Some(command) => dispatch(ctx, command),
        None => Ok(Flow::Continue),
    }
}

pub fn dispatch(ctx: &mut Context, command: Command) -> Result<Flow> {
    match command {
        Command::Load { table } => load::run(ctx, &table)?,
        Command::Print { table } => print(ctx, &table)?,
        Command::Export { table } => export(ctx, &table)?,
        Command::Clear { table } => clear(ctx, &table)?,
        Command::ListTables => list_tables(ctx),
        Command::Rename { table, from, to } => rename(ctx, &table, &from, &to)?,
        Command::Source { file } => source::run(ctx, &file)?,
        Command::Project { result, source, columns } => {
            project::run(ctx, &result, &source, &columns)?
        }
        Command::Select { result, source, condition } => {
            select::run(ctx, &result, &source, &condition)?
        }
        Command::Search { result, source, column, op, value } => {
            search::run(ctx, &result, &source, &column, op, value)?
        }
        Command::Cross { result, left, right } => cross::run(ctx, &result, &left, &right)?,
        Command::Join { result, left, right, left_column, right_column } => {
            join::run(ctx, &result, &left, &right, &left_column, &right_column)?
        }
        Command::Distinct { result, source } => distinct::run(ctx, &result, &source)?,
        Command::Sort { table, keys } => sort::run(ctx, &table, &keys)?,
        Command::OrderBy { result, source, key } => order_by::run(ctx, &result, &source, &key)?,
        Command::GroupBy {
            result,
            source,
            group_column,
            having,
            having_op,
            having_value,
            returning,
        } => group_by::run(
            ctx,
            &result,
            &source,
            &group_column,
            &having,
            having_op,
            having_value,
            &returning,
        )?,
        Command::Insert { table, assignments } => insert::run(ctx, &table, &assignments)?,
        Command::Update { table, condition, set_column, set_value } => {
            update::run(ctx, &table, &condition, &set_column, set_value)?
        }
        Command::Delete { table, condition } => delete::run(ctx, &table, &condition)?,
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

/// The named table, or a semantic error.
pub(crate) fn require_table<'a>(catalog: &'a Catalog, name: &str) -> Result<&'a Table> {
    catalog
        .get(name)
        .ok_or_else(|| EngineError::Semantic(format!("relation '{name}' doesn't exist")))
}

pub(crate) fn require_table_mut<'a>(catalog: &'a mut Catalog, name: &str) -> Result<&'a mut Table> {
    catalog
        .get_mut(name)
        .ok_or_else(|| EngineError::Semantic(format!("relation '{name}' doesn't exist")))
}

/// Destination relations must not already exist.
pub(crate) fn require_absent(catalog: &Catalog, name: &str) -> Result<()> {
    if catalog.contains(name) {
        return Err(EngineError::Semantic(format!("relation '{name}' already exists")));
    }
    Ok(())
}

/// The named column's position, or a semantic error.
pub(crate) fn require_column(table: &Table, column: &str) -> Result<usize> {
    table.column_index(column).ok_or_else(|| {
        EngineError::Semantic(format!(
            "column '{column}' doesn't exist in relation '{}'",
            table.name
        ))
    })
}

/// Blockify a freshly written destination table and register it.
pub(crate) fn register(catalog: &mut Catalog, pool: &mut BufferPool, mut table: Table) -> Result<()> {
    table.blockify(pool)?;
    let name = table.name.clone();
    let row_count = table.row_count;
    catalog.insert(table)?;
    println!("Created relation '{name}'. Row Count: {row_count}");
    Ok(())
}

fn print(ctx: &mut Context, table_name: &str) -> Result<()> {
    let Context { catalog, pool, config } = ctx;
    let table = require_table(catalog, table_name)?;
    table.print(pool, config.print_limit)
}

fn export(ctx: &mut Context, table_name: &str) -> Result<()> {
    let Context { catalog, pool, config } = ctx;
    let table = require_table_mut(catalog, table_name)?;
    table.make_permanent(pool, config)?;
    println!("Exported relation '{table_name}'");
    Ok(())
}

fn clear(ctx: &mut Context, table_name: &str) -> Result<()> {
    let Context { catalog, pool, config } = ctx;
    catalog.delete(table_name, pool, config)?;
    println!("Cleared relation '{table_name}'");
    Ok(())
}

fn list_tables(ctx: &Context) {
    println!("RELATIONS");
    for name in ctx.catalog.names() {
        println!("{name}");
    }
    println!("\nRow Count: {}", ctx.catalog.len());
}

fn rename(ctx: &mut Context, table_name: &str, from: &str, to: &str) -> Result<()> {
    let table = require_table_mut(&mut ctx.catalog, table_name)?;
    require_column(table, from)?;
    if table.is_column(to) {
        return Err(EngineError::Semantic(format!(
            "column '{to}' already exists in relation '{table_name}'"
        )));
    }
    table.rename_column(from, to);
    println!("Renamed column '{from}' to '{to}' in relation '{table_name}'");
    Ok(())
}
