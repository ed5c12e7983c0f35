use anyhow::Result;
use plugpm::Config;

pub fn run(action: &crate::ConfigAction) -> Result<()> {
    use crate::ConfigAction;

    match action {
        ConfigAction::Show => show_config(),
        ConfigAction::Set { key, value } => set_config(key, value),
    }
}

fn show_config() -> Result<()> {
    let config = Config::load()?;
    let config_path = Config::default_path()?;

    println!();
    println!("  📁 Config file: {}", config_path.display());
    println!();

    println!("┌─ Paths ─");
    println!("│  Packages:  {}", config.packages_dir().display());
    println!("│  Runtime:   {}", config.runtime_dir().display());
    println!("└─");
    println!();

    println!("┌─ Repositories ─");
    if config.repos.is_empty() {
        println!("│  (none)");
    }
    for (i, repo) in config.repos.iter().enumerate() {
        println!("│  {}. {}", i + 1, repo);
    }
    println!("└─");
    println!();

    println!("┌─ Network ─");
    println!("│  Timeout:          {}s", config.network.timeout_secs);
    println!("│  Max concurrent:   {}", config.network.max_concurrent);
    println!("└─");
    println!();

    println!("┌─ Host ─");
    println!("│  Search path var:  {}", config.host.search_path_var);
    println!(
        "│  User dir:         {}",
        config.host.user_dir.as_deref().unwrap_or("(platform default)")
    );
    println!(
        "│  Script modules:   {}",
        config.host.script_extensions.join(", ")
    );
    println!("│  Interpreter:      {}", config.scripts.interpreter);
    println!("└─");
    println!();

    if !config.initial_packages.is_empty() {
        println!("  Initial packages: {}", config.initial_packages.join(", "));
        println!();
    }

    println!("💡 Modify settings:");
    println!("   plugpm config set <key> <value>");
    println!();
    println!("   Available keys:");
    println!("     • paths.packages");
    println!("     • paths.runtime");
    println!("     • repos (comma-separated)");
    println!("     • network.timeout_secs");
    println!("     • network.max_concurrent");
    println!("     • host.search_path_var");
    println!("     • host.user_dir");
    println!("     • scripts.interpreter");
    println!();

    Ok(())
}

fn set_config(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?;

    config.set(key, value)?;
    config.save()?;

    println!("✓ {} = \"{}\"", key, value);
    println!("  Saved to {}", Config::default_path()?.display());
    Ok(())
}
