use anyhow::Result;
use plugpm::{init_environment, Config};

pub fn run() -> Result<()> {
    let config = Config::load()?;
    let ctx = super::open_context(&config)?;

    let value = init_environment(&ctx, &config.initial_packages)?.unwrap_or_default();

    println!("{}={}", config.host.search_path_var, value);
    Ok(())
}
