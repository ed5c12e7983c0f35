pub mod config;
pub mod env;
pub mod info;
pub mod install;
pub mod list;
pub mod search;
pub mod uninstall;

use anyhow::{Context as _, Result};
use plugpm::main_thread::main_thread;
use plugpm::{Config, Context, Repository};

/// Context for a CLI invocation
///
/// The CLI is single-threaded, so main-context tasks always run inline and
/// the queue side can be dropped.
pub fn open_context(config: &Config) -> Result<Context> {
    let (handle, _queue) = main_thread();
    Context::from_config(config, handle).with_context(|| {
        format!(
            "Failed to open packages directory {}",
            config.packages_dir().display()
        )
    })
}

/// Repository given on the command line, else the first configured one
pub fn pick_repo(ctx: &Context, config: &Config, url: Option<String>) -> Result<Repository> {
    match url {
        Some(url) => Ok(Repository::with_timeout(url, config.timeout())),
        None => ctx.repos().first().cloned().ok_or_else(|| {
            anyhow::anyhow!("No repository configured. Add one with: plugpm config set repos <url>")
        }),
    }
}
