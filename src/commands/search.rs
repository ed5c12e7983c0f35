use anyhow::Result;
use plugpm::{get_online_packages, Config};

pub fn run(query: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let ctx = super::open_context(&config)?;

    match &query {
        Some(q) => println!("Searching for: {}", q),
        None => println!("Listing available packages"),
    }
    println!();

    let needle = query.as_deref().map(str::to_lowercase);
    let results: Vec<_> = get_online_packages(&ctx, ctx.repos())?
        .into_iter()
        .filter(|pkg| match &needle {
            Some(n) => pkg.id.to_lowercase().contains(n) || pkg.name.to_lowercase().contains(n),
            None => true,
        })
        .collect();

    if results.is_empty() {
        println!("No installable packages found.");
        println!();
        println!("Installed packages are not listed. Check the repositories with: plugpm config show");
        return Ok(());
    }

    println!(
        "Found {} package{}:",
        results.len(),
        if results.len() == 1 { "" } else { "s" }
    );
    for pkg in &results {
        println!("  {} @ {} - {} ({})", pkg.id, pkg.version, pkg.name, pkg.repo.url);
    }
    println!();

    Ok(())
}
