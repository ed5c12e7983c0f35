use anyhow::Result;
use plugpm::Config;

pub fn run() -> Result<()> {
    let config = Config::load()?;
    let ctx = super::open_context(&config)?;

    let packages = ctx.registry().all()?;

    if packages.is_empty() {
        println!("No packages installed.");
        println!();
        println!("Install packages with: plugpm install <package>");
    } else {
        println!("Installed packages ({}):", ctx.registry().root().display());
        for pkg in &packages {
            println!("  {} @ {}", pkg.id, pkg.version);
        }
        println!();
        println!(
            "Total: {} package{}",
            packages.len(),
            if packages.len() == 1 { "" } else { "s" }
        );
    }

    let pending = ctx.registry().pending_deletions()?;
    if !pending.is_empty() {
        println!();
        println!("Pending deletion (files still in use):");
        for path in pending {
            println!("  {}", path.display());
        }
    }

    Ok(())
}
