use clap::{Subcommand, ValueEnum};
use driftguard_core::{InterventionFrequency, QuietHours, UserSettings};

#[derive(Clone, Copy, ValueEnum)]
pub enum FrequencyArg {
    Aggressive,
    Moderate,
    Minimal,
}

impl From<FrequencyArg> for InterventionFrequency {
    fn from(arg: FrequencyArg) -> Self {
        match arg {
            FrequencyArg::Aggressive => InterventionFrequency::Aggressive,
            FrequencyArg::Moderate => InterventionFrequency::Moderate,
            FrequencyArg::Minimal => InterventionFrequency::Minimal,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current settings
    Show,
    /// Set the intervention frequency
    SetFrequency {
        #[arg(value_enum)]
        frequency: FrequencyArg,
    },
    /// Add a whitelist entry
    AddWhitelist { entry: String },
    /// Add a quiet-hours range (may wrap past midnight)
    AddQuietHours { start_hour: u8, end_hour: u8 },
    /// Enable or disable learning mode
    SetLearningMode {
        #[arg(value_parser = clap::value_parser!(bool))]
        enabled: bool,
    },
    /// Set the daily streak goal
    SetStreakGoal { goal: u32 },
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = UserSettings::load()?;

    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            return Ok(());
        }
        ConfigAction::SetFrequency { frequency } => {
            settings.intervention_frequency = frequency.into();
        }
        ConfigAction::AddWhitelist { entry } => {
            settings.whitelist.push(entry);
        }
        ConfigAction::AddQuietHours { start_hour, end_hour } => {
            settings.quiet_hours.push(QuietHours { start_hour, end_hour });
        }
        ConfigAction::SetLearningMode { enabled } => {
            settings.learning_mode = enabled;
        }
        ConfigAction::SetStreakGoal { goal } => {
            settings.streak_goal = goal;
        }
    }

    settings.save()?;
    println!("settings saved");
    Ok(())
}
