use clap::Subcommand;

#[derive(Subcommand)]
pub enum StreakAction {
    /// Current streak state
    Show,
    /// Record a productive signal
    Productive,
    /// Record a distraction signal
    Distraction,
}

pub fn run(action: StreakAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = super::open_engine()?;

    match action {
        StreakAction::Show => {
            println!("{}", serde_json::to_string_pretty(engine.get_streak())?);
        }
        StreakAction::Productive => {
            let events = engine.record_productive_activity();
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        StreakAction::Distraction => {
            let events = engine.record_distraction();
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
    }
    Ok(())
}
