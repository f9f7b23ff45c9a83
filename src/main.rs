use anyhow::Result;

use blockrel::config::Config;
use blockrel::instance::Instance;

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::from_env()?;
    let mut instance = Instance::new(config)?;
    instance.start()
}
