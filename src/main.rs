use clap::Parser;
use pit::cli::{self, Cli, Commands};
use pit::config::AppConfig;
use pit::error::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config_dir)?;
    if let Some(data) = &cli.data {
        config.data.path = data.clone();
    }

    match &cli.command {
        Commands::Train {
            episodes,
            workers,
            resume,
        } => {
            if let Some(episodes) = episodes {
                config.training.max_episodes = *episodes;
            }
            if let Some(workers) = workers {
                config.training.workers = *workers;
            }
            let config = config.resolved();
            init_logging(&config.logging.level);
            cli::run_train(&config, *resume)
        }
        Commands::Validate => {
            let config = config.resolved();
            init_logging(&config.logging.level);
            cli::run_validate(&config)
        }
        Commands::Inspect => {
            let config = config.resolved();
            init_logging(&config.logging.level);
            cli::run_inspect(&config)
        }
    }
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
