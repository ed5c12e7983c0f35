use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

mod commands;

/// plugpm - A package manager for host application plugins
#[derive(Parser)]
#[command(name = "plugpm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show debug logging (overridden by PLUGPM_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a package and its dependencies
    Install {
        /// Package id or dependency spec (e.g., ifred)
        spec: String,

        /// Replace installed packages whose version differs from the repository's
        #[arg(short, long)]
        upgrade: bool,

        /// Remove the package again if one of its installers fails
        #[arg(long)]
        remove_on_fail: bool,

        /// Repository URL (defaults to the first configured repository)
        #[arg(long)]
        repo: Option<String>,
    },

    /// Uninstall a package
    Uninstall {
        /// Package id
        package: String,
    },

    /// List installed packages
    List,

    /// List packages available from all configured repositories
    Search {
        /// Only show packages whose id or name contains this text
        query: Option<String>,
    },

    /// Show repository metadata for a package
    Info {
        /// Package id
        package: String,

        /// Repository URL (defaults to trying every configured repository)
        #[arg(long)]
        repo: Option<String>,
    },

    /// Install initial packages and print the resulting search path
    Env,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., network.timeout_secs)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "plugpm=debug" } else { "plugpm=info" };
    let filter = EnvFilter::try_from_env("PLUGPM_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Install {
            spec,
            upgrade,
            remove_on_fail,
            repo,
        } => commands::install::run(spec, upgrade, remove_on_fail, repo),
        Commands::Uninstall { package } => commands::uninstall::run(package),
        Commands::List => commands::list::run(),
        Commands::Search { query } => commands::search::run(query),
        Commands::Info { package, repo } => commands::info::run(package, repo),
        Commands::Env => commands::env::run(),
        Commands::Config { action } => commands::config::run(&action),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "plugpm", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
