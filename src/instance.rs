use std::fs;
use std::io::{self, BufRead, Write};

use anyhow::Result;
use log::info;

use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::Result as EngineResult;
use crate::executor::{self, Flow};

/// The engine's owning state: catalogue, buffer pool and configuration.
/// Operators receive this context explicitly instead of reaching for
/// globals.
pub struct Context {
    pub catalog: Catalog,
    pub pool: BufferPool,
    pub config: Config,
}

impl Context {
    /// Validate the configuration and prepare the on-disk directories.
    /// A temp directory that cannot be created is a fatal setup failure.
    pub fn new(config: Config) -> EngineResult<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;
        // Leftover page files from a previous run would shadow fresh loads.
        if config.temp_dir.exists() {
            fs::remove_dir_all(&config.temp_dir)?;
        }
        fs::create_dir_all(&config.temp_dir)?;

        let pool = BufferPool::new(config.pool_capacity, config.temp_dir.clone());
        Ok(Context {
            catalog: Catalog::new(),
            pool,
            config,
        })
    }

    /// Parse and execute one command line.
    pub fn run_line(&mut self, line: &str) -> EngineResult<Flow> {
        executor::execute_line(self, line)
    }

    /// Flush every resident page, then unload every table.
    pub fn shutdown(&mut self) {
        info!("shutting down: flushing pool and unloading tables");
        self.pool.write_all_pages();
        let Context { catalog, pool, config } = self;
        catalog.unload_all(pool, config);
    }
}

/// The REPL: reads one command per line, runs it to completion, reports
/// a single diagnostic line on failure, and never crashes.
pub struct Instance {
    context: Context,
}

impl Instance {
    pub fn new(config: Config) -> Result<Self> {
        let context = Context::new(config)?;
        Ok(Instance { context })
    }

    pub fn start(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();

        loop {
            print!("\n> ");
            io::stdout().flush()?;
            let Some(line) = lines.next() else { break };
            let line = line?;

            match self.context.run_line(&line) {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(err) => println!("{err}"),
            }
        }

        self.context.shutdown();
        Ok(())
    }
}
