use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "driftguard-cli", version, about = "Driftguard CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a browsing context
    Evaluate {
        #[command(subcommand)]
        action: commands::evaluate::EvaluateAction,
    },
    /// Site classification
    Classify {
        #[command(subcommand)]
        action: commands::classify::ClassifyAction,
    },
    /// Focus streak
    Streak {
        #[command(subcommand)]
        action: commands::streak::StreakAction,
    },
    /// Points, level and achievements
    Progress {
        #[command(subcommand)]
        action: commands::progress::ProgressAction,
    },
    /// Settings management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Evaluate { action } => commands::evaluate::run(action),
        Commands::Classify { action } => commands::classify::run(action),
        Commands::Streak { action } => commands::streak::run(action),
        Commands::Progress { action } => commands::progress::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
