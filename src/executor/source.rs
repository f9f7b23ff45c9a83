//! `SOURCE f` — run the commands in `{dataDir}/f.ra`, one per line. A
//! failing line prints its diagnostic and the driver moves on; a QUIT in
//! the file stops it.

use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::error::{EngineError, Result};
use crate::executor::{self, Flow};
use crate::instance::Context;

pub fn run(ctx: &mut Context, file: &str) -> Result<()> {
    let path = ctx.config.data_dir.join(format!("{file}.ra"));
    let file = File::open(&path).map_err(|_| {
        EngineError::Semantic(format!("query file '{}' doesn't exist", path.display()))
    })?;

    for line in BufReader::new(file).lines() {
        let line = line?;
        match executor::execute_line(ctx, &line) {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(err) => println!("{err}"),
        }
    }
    Ok(())
}
