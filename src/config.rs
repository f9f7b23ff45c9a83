use std::env;
use std::path::PathBuf;

use crate::error::{EngineError, Result};

pub const DEFAULT_BLOCK_BYTES: usize = 32768;
pub const DEFAULT_POOL_CAPACITY: usize = 8;
pub const DEFAULT_PRINT_LIMIT: usize = 20;

/// Engine configuration. Read once at startup; tests construct it directly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Size of one data block/page in bytes.
    pub block_bytes: usize,
    /// Number of page slots in the buffer pool.
    pub pool_capacity: usize,
    /// Default number of rows shown by PRINT.
    pub print_limit: usize,
    /// Directory holding permanent CSV files.
    pub data_dir: PathBuf,
    /// Directory holding page files and temporary CSV files.
    pub temp_dir: PathBuf,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Config {
            block_bytes: DEFAULT_BLOCK_BYTES,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            print_limit: DEFAULT_PRINT_LIMIT,
            data_dir: data_dir.into(),
            temp_dir: temp_dir.into(),
        }
    }

    /// Build the configuration from the environment, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let config = Config {
            block_bytes: read_env("BLOCK_BYTES", DEFAULT_BLOCK_BYTES)?,
            pool_capacity: read_env("POOL_CAPACITY", DEFAULT_POOL_CAPACITY)?,
            print_limit: read_env("PRINT_LIMIT", DEFAULT_PRINT_LIMIT)?,
            data_dir: env::var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| "data".into()),
            temp_dir: env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data").join("temp")),
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration checks that would otherwise surface as runtime
    /// failures deep inside operators.
    pub fn validate(&self) -> Result<()> {
        if self.block_bytes < std::mem::size_of::<i32>() {
            return Err(EngineError::State(format!(
                "BLOCK_BYTES = {} cannot hold a single integer",
                self.block_bytes
            )));
        }
        if self.pool_capacity < 2 {
            return Err(EngineError::State(format!(
                "POOL_CAPACITY = {} is too small (need at least 2)",
                self.pool_capacity
            )));
        }
        Ok(())
    }
}

fn read_env(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| EngineError::State(format!("{name} must be a positive integer, got '{value}'"))),
        Err(_) => Ok(default),
    }
}
