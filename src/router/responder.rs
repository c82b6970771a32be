use crate::intent::Intent;

/// Canned answer for a non-risky intent, keyed by intent and the resolved
/// sticky target. Every outcome string is distinct so operators can tell why
/// a command did or did not proceed.
pub fn answer(intent: Intent, target: Option<&str>) -> String {
    let team = target.unwrap_or("the default team");
    match intent {
        Intent::TeamSummary => {
            format!("Summarized the latest scores and coverage for {team}.")
        }
        Intent::AnomalyBrief => {
            format!("Briefing the most recent anomaly alerts for {team}.")
        }
        Intent::PredictReport => {
            format!("Preparing the forecast report for {team}.")
        }
        Intent::GlobalStats => {
            "Fetched the global statistics. See the dashboard for details.".to_string()
        }
        Intent::ModelStatus => {
            "The prediction model is running on its latest version.".to_string()
        }
        _ => "I did not understand that command. Try \"team summary\", \"retuning\", \
              or \"anomaly brief\"."
            .to_string(),
    }
}
