use chrono::{Datelike, Local, Timelike, Utc};
use clap::{Subcommand, ValueEnum};
use driftguard_core::{BrowsingContext, ClassifiedCategory};

#[derive(Clone, Copy, ValueEnum)]
pub enum CategoryArg {
    Productive,
    Distraction,
    Neutral,
    Custom,
}

impl From<CategoryArg> for ClassifiedCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Productive => ClassifiedCategory::Productive,
            CategoryArg::Distraction => ClassifiedCategory::Distraction,
            CategoryArg::Neutral => ClassifiedCategory::Neutral,
            CategoryArg::Custom => ClassifiedCategory::Custom,
        }
    }
}

#[derive(Subcommand)]
pub enum ClassifyAction {
    /// Resolve a URL's classification
    Show { url: String },
    /// Manually classify a site (exact URL or bare domain)
    Set {
        site: String,
        #[arg(value_enum)]
        category: CategoryArg,
        /// Label, required for the custom category
        #[arg(long)]
        label: Option<String>,
    },
}

pub fn run(action: ClassifyAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = super::open_engine()?;

    match action {
        ClassifyAction::Show { url } => {
            let now = Local::now();
            let ctx = BrowsingContext {
                url,
                title: String::new(),
                timestamp: Utc::now(),
                hour: now.hour() as u8,
                weekday: now.weekday().num_days_from_sunday() as u8,
                recent_history: Vec::new(),
                session_minutes: 0,
                idle_productive_minutes: 0,
            };
            let classification = engine.classify(&ctx);
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }
        ClassifyAction::Set { site, category, label } => {
            engine.set_user_classification(&site, category.into(), label)?;
            println!("classified {site}");
        }
    }
    Ok(())
}
