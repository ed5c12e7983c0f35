use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};
use plugpm::{install_with_options, Config, InstallOptions, ProgressCallback};

/// Create a progress callback that renders a spinner
fn create_spinner_callback() -> ProgressCallback {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let spinner = Arc::new(Mutex::new(spinner));
    Arc::new(move |msg: &str, current: u64, total: u64| {
        if let Ok(s) = spinner.lock() {
            if current >= total && total > 0 {
                s.finish_with_message(format!("✓ {}", msg));
            } else {
                s.set_message(msg.to_string());
            }
        }
    })
}

pub fn run(spec: String, upgrade: bool, remove_on_fail: bool, repo: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let ctx = super::open_context(&config)?;
    let repo = super::pick_repo(&ctx, &config, repo)?;

    println!("Installing {} from {}", spec, repo.url);
    println!();

    let options = InstallOptions {
        upgrade,
        remove_on_fail,
        progress: Some(create_spinner_callback()),
    };

    let pkg = install_with_options(&ctx, &repo, &spec, &options)?;

    println!();
    println!("✓ {} {} installed at {}", pkg.id, pkg.version, pkg.path.display());
    Ok(())
}
