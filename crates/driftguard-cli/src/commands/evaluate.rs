use chrono::{Datelike, Local, Timelike, Utc};
use clap::Subcommand;
use driftguard_core::BrowsingContext;

#[derive(Subcommand)]
pub enum EvaluateAction {
    /// Evaluate a URL with the current local time
    Url {
        url: String,
        /// Override the hour (0-23); defaults to the local hour
        #[arg(long)]
        hour: Option<u8>,
        /// Override the weekday (0-6, 0 = Sunday); defaults to today
        #[arg(long)]
        weekday: Option<u8>,
        /// Minutes the current session has been running
        #[arg(long, default_value_t = 0)]
        session_minutes: u32,
        /// Minutes since the last productive signal
        #[arg(long, default_value_t = 0)]
        idle_minutes: u32,
    },
    /// Evaluate a full BrowsingContext from a JSON file ("-" for stdin)
    File { path: String },
}

pub fn run(action: EvaluateAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = super::open_engine()?;

    let ctx = match action {
        EvaluateAction::Url {
            url,
            hour,
            weekday,
            session_minutes,
            idle_minutes,
        } => {
            let now = Local::now();
            BrowsingContext {
                url,
                title: String::new(),
                timestamp: Utc::now(),
                hour: hour.unwrap_or(now.hour() as u8),
                weekday: weekday.unwrap_or(now.weekday().num_days_from_sunday() as u8),
                recent_history: Vec::new(),
                session_minutes,
                idle_productive_minutes: idle_minutes,
            }
        }
        EvaluateAction::File { path } => {
            let content = if path == "-" {
                use std::io::Read;
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(path)?
            };
            serde_json::from_str(&content)?
        }
    };

    let assessment = engine.evaluate(&ctx)?;
    println!("{}", serde_json::to_string_pretty(&assessment)?);

    let explanations = engine.explain_patterns(&ctx);
    for line in explanations {
        eprintln!("note: {line}");
    }
    Ok(())
}
