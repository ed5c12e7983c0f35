use anyhow::Result;
use plugpm::{Config, RemovalOutcome};

pub fn run(package: String) -> Result<()> {
    let config = Config::load()?;
    let ctx = super::open_context(&config)?;

    println!("Uninstalling package: {}", package);
    println!();

    let Some(mut pkg) = ctx.registry().by_name(&package)? else {
        println!("⚠ Package '{}' is not installed", package);
        println!();
        println!("List installed packages with: plugpm list");
        return Ok(());
    };

    match pkg.remove(&ctx)? {
        RemovalOutcome::Removed => {
            println!("✓ Successfully uninstalled {} {}", pkg.id, pkg.version);
        }
        RemovalOutcome::Deferred { path } => {
            println!("⚠ Some files of {} are still in use", pkg.id);
            println!("  Moved to {}", path.display());
            println!("  It will be deleted the next time packages are scanned.");
        }
    }

    Ok(())
}
