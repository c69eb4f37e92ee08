use clap::Subcommand;

#[derive(Subcommand)]
pub enum ProgressAction {
    /// Points, level and achievements
    Show,
    /// Award a productive session of the given length
    AwardSession {
        minutes: u32,
    },
    /// Award the daily streak goal
    DailyGoal,
}

pub fn run(action: ProgressAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = super::open_engine()?;

    match action {
        ProgressAction::Show => {
            println!("{}", serde_json::to_string_pretty(engine.get_progress())?);
        }
        ProgressAction::AwardSession { minutes } => {
            let outcome = engine.award_session(minutes);
            println!("awarded {} points (total {})", outcome.points, outcome.total_points);
        }
        ProgressAction::DailyGoal => {
            let outcome = engine.award_daily_goal();
            println!("awarded {} points (total {})", outcome.points, outcome.total_points);
        }
    }
    Ok(())
}
