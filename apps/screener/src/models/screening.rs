//! Screening output models: one type per stage boundary.
//!
//! Everything here is append-only inside `PipelineState` and serializes
//! losslessly into the aggregate report, so scores, severities and ordering
//! survive a round trip.

use serde::{Deserialize, Serialize};

/// How badly a JD requirement is missing from a resume.
///
/// Ordering matters: gap analysis sorts critical first. The derived `Ord`
/// follows variant declaration order, so `Critical > Moderate > Minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Moderate,
    Critical,
}

/// A JD requirement without adequate supporting evidence in the resume.
/// Produced only by gap analysis; immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gap {
    /// The requirement term as extracted from the JD.
    pub skill: String,
    /// Supporting JD passages, best match first.
    pub jd_evidence: Vec<String>,
    /// Resume passages that partially cover the requirement. Empty when the
    /// resume has nothing relevant at all.
    pub resume_evidence: Vec<String>,
    pub severity: Severity,
}

/// Question difficulty, scaled from the severity of the gap it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Basic,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Critical gaps get advanced questions, moderate intermediate, minor basic.
    pub fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Difficulty::Advanced,
            Severity::Moderate => Difficulty::Intermediate,
            Severity::Minor => Difficulty::Basic,
        }
    }
}

/// One interview question. Sequence position is presentation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewQuestion {
    pub text: String,
    /// Indices into the gap sequence this question probes. Sorted, distinct,
    /// and always referencing gaps already present in state.
    pub targets: Vec<usize>,
    pub difficulty: Difficulty,
}

/// Evaluation of one supplied answer. At most one per question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerEvaluation {
    /// Index into the question sequence.
    pub question: usize,
    pub answer_text: String,
    /// Competency score in [0, 1].
    pub score: f64,
    pub rationale: String,
    /// True when the answer did not close the targeted gap. An evaluation
    /// that could not be obtained defaults to true; an unresolved
    /// evaluation never silently clears a gap.
    pub residual_gap: bool,
}

/// One learning plan entry, derived from a gap still open after evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPlanItem {
    /// Always a `Gap::skill` present in state.
    pub topic: String,
    /// Concrete study resources, presentation order.
    pub resources: Vec<String>,
    pub estimated_effort: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_orders_critical_highest() {
        assert!(Severity::Critical > Severity::Moderate);
        assert!(Severity::Moderate > Severity::Minor);
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            r#""critical""#
        );
        let back: Severity = serde_json::from_str(r#""moderate""#).unwrap();
        assert_eq!(back, Severity::Moderate);
    }

    #[test]
    fn test_difficulty_scales_with_severity() {
        assert_eq!(
            Difficulty::for_severity(Severity::Critical),
            Difficulty::Advanced
        );
        assert_eq!(
            Difficulty::for_severity(Severity::Moderate),
            Difficulty::Intermediate
        );
        assert_eq!(Difficulty::for_severity(Severity::Minor), Difficulty::Basic);
    }

    #[test]
    fn test_evaluation_round_trips_without_losing_score_precision() {
        let eval = AnswerEvaluation {
            question: 2,
            answer_text: "I deploy with Helm charts".to_string(),
            score: 0.625,
            rationale: "Covers tooling, misses operators".to_string(),
            residual_gap: true,
        };
        let json = serde_json::to_string(&eval).unwrap();
        let back: AnswerEvaluation = serde_json::from_str(&json).unwrap();
        assert_eq!(back.question, 2);
        assert_eq!(back.score, 0.625);
        assert!(back.residual_gap);
    }
}
