mod config;
mod shell;
mod terminal;

use crate::config::Config;
use crate::shell::Shell;
use anyhow::Result;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    dotenv::dotenv().ok();

    let config = Config::from_env();
    let mut shell = Shell::new(&config)?;
    shell.run()?;

    Ok(())
}
