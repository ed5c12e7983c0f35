use anyhow::Result;
use plugpm::{Config, Repository};

pub fn run(package: String, repo: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let ctx = super::open_context(&config)?;

    let repos = match repo {
        Some(url) => vec![Repository::with_timeout(url, config.timeout())],
        None => ctx.repos().to_vec(),
    };

    let Some(found) = repos.iter().find_map(|r| r.single(ctx.fetcher(), &package)) else {
        return Err(plugpm::Error::PackageNotFound(package).into());
    };

    println!("{} ({})", found.name, found.id);
    println!("  Latest version: {}", found.version);
    println!("  Repository:     {}", found.repo.url);

    match ctx.registry().by_name(&found.id)? {
        Some(local) if local.version == found.version => {
            println!("  Installed:      {} (up to date)", local.version)
        }
        Some(local) => println!(
            "  Installed:      {} (run 'plugpm install --upgrade {}')",
            local.version, local.id
        ),
        None => println!("  Installed:      no"),
    }

    Ok(())
}
