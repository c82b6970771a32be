//! Intent catalog: ordered pattern rules mapping free-form operator text to
//! named intents.
//!
//! The catalog is data, not code — an ordered list of `(Intent, Regex)`
//! pairs evaluated against case-folded input, first match wins. Evaluation
//! order is the explicit priority: the narrow `model_reload`/`deploy_model`
//! rules sit ahead of the broad `model_status` rule so phrases like
//! `모델 재로드` resolve to the specific intent.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Named category of operator request, resolved from free text.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    TeamSummary,
    AnomalyBrief,
    Retuning,
    PredictReport,
    ModelReload,
    DeployModel,
    ModelStatus,
    GlobalStats,
    BulkAlert,
    Unknown,
}

/// Urgency tier for intents that require human confirmation.
///
/// Affects only presentation/urgency of the confirmation prompt, never the
/// approval logic itself.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskTier {
    High,
    Medium,
}

impl Intent {
    /// Static risk partition: `Some(tier)` for intents whose execution
    /// requires confirmation, `None` for read-only/informational ones.
    pub fn risk_tier(self) -> Option<RiskTier> {
        match self {
            Self::DeployModel | Self::BulkAlert => Some(RiskTier::High),
            Self::Retuning | Self::ModelReload => Some(RiskTier::Medium),
            _ => None,
        }
    }
}

struct IntentRule {
    intent: Intent,
    pattern: Regex,
}

/// Ordered pattern rules; first match wins, unmatched text is `Unknown`.
pub struct IntentCatalog {
    rules: Vec<IntentRule>,
}

impl IntentCatalog {
    /// The built-in rule set. Patterns are bilingual (Korean + English)
    /// because operator input arrives in both.
    pub fn builtin() -> Self {
        Self::from_rules(&[
            (Intent::TeamSummary, r"(팀|team).*(요약|summary)|요약.*(팀|team)"),
            (
                Intent::AnomalyBrief,
                r"(이상|anomaly|알람|경보).*(브리핑|요약|알려|확인)|브리핑.*(이상|알람|경보)",
            ),
            (Intent::Retuning, r"재튜닝|튜닝|retune|재조정"),
            (Intent::PredictReport, r"예측|prediction|다음주|forecast"),
            (Intent::ModelReload, r"모델.*재로드|모델.*리로드|reload.*model"),
            (Intent::DeployModel, r"모델.*배포|모델.*교체|deploy.*model"),
            (Intent::ModelStatus, r"(모델|model).*(상태|버전|재학습|학습|로드)"),
            (Intent::GlobalStats, r"(전체|글로벌|global).*(통계|요약|상태)"),
            (Intent::BulkAlert, r"(대량|bulk).*(알람|알림|경보)"),
        ])
    }

    fn from_rules(rules: &[(Intent, &str)]) -> Self {
        let rules = rules
            .iter()
            .map(|(intent, pattern)| IntentRule {
                intent: *intent,
                // Built-in patterns are compile-time constants.
                pattern: Regex::new(pattern).unwrap_or_else(|error| {
                    panic!("invalid built-in intent pattern for {intent}: {error}")
                }),
            })
            .collect();
        Self { rules }
    }

    /// Classify free text into an intent. Pure, deterministic, idempotent.
    pub fn classify(&self, text: &str) -> Intent {
        let folded = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(&folded))
            .map_or(Intent::Unknown, |rule| rule.intent)
    }
}

#[cfg(test)]
mod tests {
    use super::{Intent, IntentCatalog, RiskTier};

    fn catalog() -> IntentCatalog {
        IntentCatalog::builtin()
    }

    #[test]
    fn classify_korean_commands() {
        let catalog = catalog();
        assert_eq!(catalog.classify("팀 요약 알려줘"), Intent::TeamSummary);
        assert_eq!(catalog.classify("재튜닝 실행해"), Intent::Retuning);
        assert_eq!(catalog.classify("이상 경보 브리핑 해줘"), Intent::AnomalyBrief);
        assert_eq!(catalog.classify("전체 통계 보여줘"), Intent::GlobalStats);
        assert_eq!(catalog.classify("대량 알람 보내"), Intent::BulkAlert);
    }

    #[test]
    fn classify_english_commands() {
        let catalog = catalog();
        assert_eq!(catalog.classify("team summary please"), Intent::TeamSummary);
        assert_eq!(catalog.classify("retune the model"), Intent::Retuning);
        assert_eq!(catalog.classify("deploy model v2"), Intent::DeployModel);
        assert_eq!(catalog.classify("reload model now"), Intent::ModelReload);
        assert_eq!(catalog.classify("forecast for next week"), Intent::PredictReport);
    }

    #[test]
    fn classify_is_case_folded() {
        let catalog = catalog();
        assert_eq!(catalog.classify("TEAM SUMMARY"), Intent::TeamSummary);
        assert_eq!(catalog.classify("Deploy MODEL"), Intent::DeployModel);
    }

    #[test]
    fn classify_unmatched_text_is_unknown() {
        assert_eq!(catalog().classify("what is the weather"), Intent::Unknown);
        assert_eq!(catalog().classify(""), Intent::Unknown);
    }

    #[test]
    fn classify_is_deterministic() {
        let catalog = catalog();
        let first = catalog.classify("모델 상태 알려줘");
        for _ in 0..10 {
            assert_eq!(catalog.classify("모델 상태 알려줘"), first);
        }
        assert_eq!(first, Intent::ModelStatus);
    }

    #[test]
    fn reload_takes_priority_over_status() {
        // `로드` also matches the broad model_status rule; declaration order
        // must resolve the ambiguity toward the specific intent.
        assert_eq!(catalog().classify("모델 재로드 해줘"), Intent::ModelReload);
    }

    #[test]
    fn risk_partition_is_static() {
        assert_eq!(Intent::DeployModel.risk_tier(), Some(RiskTier::High));
        assert_eq!(Intent::BulkAlert.risk_tier(), Some(RiskTier::High));
        assert_eq!(Intent::Retuning.risk_tier(), Some(RiskTier::Medium));
        assert_eq!(Intent::ModelReload.risk_tier(), Some(RiskTier::Medium));
        assert_eq!(Intent::TeamSummary.risk_tier(), None);
        assert_eq!(Intent::Unknown.risk_tier(), None);
    }

    #[test]
    fn intent_wire_names_are_snake_case() {
        assert_eq!(Intent::TeamSummary.to_string(), "team_summary");
        assert_eq!(Intent::DeployModel.as_ref(), "deploy_model");
        assert_eq!(RiskTier::Medium.to_string(), "medium");
    }
}
