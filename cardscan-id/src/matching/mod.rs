// Match Scorer
//
// Scores every candidate with the fixed factor list, ranks them and makes
// the found / not-found decision against the required score.
//
// Ranking: total (desc), exact number, exact set, then input order.

pub mod factors;

use crate::config::MatchConfig;
use crate::types::{
    CandidateCard, ConfidenceTier, FactorScore, IdentificationRecord, MatchDecision, MatchKind,
    RankedMatch, ScoreBreakdown, ScoreFactor,
};
use std::cmp::Reverse;

/// Candidate scorer and decision maker
pub struct MatchScorer {
    config: MatchConfig,
}

impl Default for MatchScorer {
    fn default() -> Self {
        Self::new(MatchConfig::default())
    }
}

impl MatchScorer {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn required_score(&self) -> i32 {
        self.config.required_score
    }

    fn confidence_tier(&self, total: i32) -> ConfidenceTier {
        if total >= self.config.high_confidence {
            ConfidenceTier::High
        } else if total >= self.config.medium_confidence {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    /// Score one candidate across all factors
    pub fn score(&self, record: &IdentificationRecord, candidate: &CandidateCard) -> ScoreBreakdown {
        let mut contributions = Vec::with_capacity(ScoreFactor::ALL.len());
        let mut reasoning = Vec::new();
        let mut total = 0;

        for factor in ScoreFactor::ALL {
            let outcome = factors::evaluate(factor, record, candidate, &self.config);
            tracing::trace!(
                candidate = %candidate.id,
                factor = ?factor,
                points = outcome.points,
                "Factor scored"
            );
            total += outcome.points;
            if let Some(reason) = outcome.reason {
                reasoning.push(reason);
            }
            contributions.push(FactorScore {
                factor,
                points: outcome.points,
                kind: outcome.kind,
            });
        }

        ScoreBreakdown {
            contributions,
            total,
            confidence_tier: self.confidence_tier(total),
            reasoning,
        }
    }

    /// Score and order candidates, best first
    pub fn rank(&self, record: &IdentificationRecord, candidates: &[CandidateCard]) -> Vec<RankedMatch> {
        let mut ranked: Vec<RankedMatch> = candidates
            .iter()
            .map(|candidate| RankedMatch {
                candidate: candidate.clone(),
                breakdown: self.score(record, candidate),
            })
            .collect();

        // sort_by_key is stable, so input order settles remaining ties
        ranked.sort_by_key(|m| {
            let exact_number = m.breakdown.kind(ScoreFactor::NumberMatch) == MatchKind::Exact;
            let exact_set = m.breakdown.kind(ScoreFactor::SetMatch) == MatchKind::Exact;
            (Reverse(m.breakdown.total), !exact_number, !exact_set)
        });
        ranked
    }

    /// Decide on the best candidate
    ///
    /// Returns the decision plus up to `max_alternatives` runner-ups that
    /// also reached the required score.
    pub fn decide(
        &self,
        record: &IdentificationRecord,
        candidates: &[CandidateCard],
    ) -> (MatchDecision, Vec<RankedMatch>) {
        let required = self.config.required_score;
        let mut ranked = self.rank(record, candidates).into_iter();

        let Some(best) = ranked.next() else {
            return (
                MatchDecision::NotFound {
                    best_breakdown: None,
                    required_score: required,
                    gap: required,
                },
                Vec::new(),
            );
        };

        if best.breakdown.total < required {
            tracing::debug!(
                best = %best.candidate.id,
                total = best.breakdown.total,
                required,
                "Best candidate below required score"
            );
            return (
                MatchDecision::NotFound {
                    gap: required - best.breakdown.total,
                    best_breakdown: Some(best.breakdown),
                    required_score: required,
                },
                Vec::new(),
            );
        }

        let alternatives: Vec<RankedMatch> = ranked
            .take_while(|m| m.breakdown.total >= required)
            .take(self.config.max_alternatives)
            .collect();

        tracing::debug!(
            card = %best.candidate.id,
            total = best.breakdown.total,
            tier = ?best.breakdown.confidence_tier,
            alternatives = alternatives.len(),
            "Match found"
        );
        (
            MatchDecision::Found {
                candidate: best.candidate,
                breakdown: best.breakdown,
            },
            alternatives,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> IdentificationRecord {
        IdentificationRecord {
            name: Some("Charizard".into()),
            set_name: Some("Base".into()),
            number: Some("4".into()),
            confidence: 0.95,
            detected_language: "en".into(),
            ..Default::default()
        }
    }

    fn card(id: &str, name: &str, set: &str, number: &str) -> CandidateCard {
        CandidateCard {
            id: id.into(),
            name: name.into(),
            set_name: Some(set.into()),
            number: Some(number.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_exact_triple_scores_100() {
        let breakdown = MatchScorer::default().score(&record(), &card("base1-4", "Charizard", "Base", "4"));
        assert_eq!(breakdown.total, 100);
        assert_eq!(breakdown.confidence_tier, ConfidenceTier::High);
        assert_eq!(breakdown.contributions.len(), ScoreFactor::ALL.len());
        assert_eq!(breakdown.reasoning.len(), 3);
    }

    #[test]
    fn test_found_picks_highest() {
        let candidates = vec![
            card("evo-11", "Charizard", "Evolving Skies", "11"),
            card("base1-4", "Charizard", "Base", "4"),
        ];
        let scorer = MatchScorer::default();
        let ranked = scorer.rank(&record(), &candidates);
        assert_eq!(ranked[0].breakdown.total, 100);
        assert_eq!(ranked[1].breakdown.total, 20);

        let (decision, alternatives) = scorer.decide(&record(), &candidates);
        match decision {
            MatchDecision::Found { candidate, .. } => assert_eq!(candidate.id, "base1-4"),
            other => panic!("expected Found, got {:?}", other),
        }
        assert!(alternatives.is_empty());
    }

    #[test]
    fn test_not_found_reports_gap() {
        let candidates = vec![card("evo-4", "Raichu", "Evolving Skies", "4")];
        let (decision, alternatives) = MatchScorer::default().decide(&record(), &candidates);
        match decision {
            MatchDecision::NotFound {
                best_breakdown,
                required_score,
                gap,
            } => {
                assert_eq!(best_breakdown.unwrap().total, 45);
                assert_eq!(required_score, 60);
                assert_eq!(gap, 15);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(alternatives.is_empty());
    }

    #[test]
    fn test_no_candidates_gap_is_required_score() {
        let (decision, _) = MatchScorer::default().decide(&record(), &[]);
        assert_eq!(
            decision,
            MatchDecision::NotFound {
                best_breakdown: None,
                required_score: 60,
                gap: 60
            }
        );
    }

    #[test]
    fn test_tie_break_prefers_exact_number_then_input_order() {
        let rec = IdentificationRecord {
            name: Some("Pikachu".into()),
            set_name: Some("Jungle".into()),
            number: Some("60".into()),
            ..Default::default()
        };
        // All three total 55 with identical factor shapes
        let candidates = vec![
            card("a", "Pikachu", "Jungle", "61"),
            card("b", "Pikachu", "Jungle", "62"),
            card("c", "Pikachu", "Jungle", "63"),
        ];
        let ranked = MatchScorer::default().rank(&rec, &candidates);
        let ids: Vec<&str> = ranked.iter().map(|m| m.candidate.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        // Equal totals, exact number wins over exact set
        let weights = crate::config::MatchWeights {
            number_exact: 35,
            ..Default::default()
        };
        let scorer = MatchScorer::new(MatchConfig {
            weights,
            ..Default::default()
        });
        let candidates = vec![
            card("set-only", "Pikachu", "Jungle", "99"),
            card("number-only", "Pikachu", "Evolving Skies", "60"),
        ];
        let ranked = scorer.rank(&rec, &candidates);
        assert_eq!(ranked[0].breakdown.total, ranked[1].breakdown.total);
        assert_eq!(ranked[0].candidate.id, "number-only");
    }

    #[test]
    fn test_tie_break_uses_match_kind_not_points() {
        // Partial number match weighted the same as an exact one
        let weights = crate::config::MatchWeights {
            number_partial: 45,
            ..Default::default()
        };
        let scorer = MatchScorer::new(MatchConfig {
            weights,
            ..Default::default()
        });
        let rec = IdentificationRecord {
            name: Some("Pikachu".into()),
            number: Some("60".into()),
            set_total: Some(64),
            ..Default::default()
        };
        let with_total = |id: &str, number: &str| CandidateCard {
            set_total: Some(64),
            ..card(id, "Pikachu", "Jungle", number)
        };
        let candidates = vec![with_total("partial", "61"), with_total("exact", "60")];

        let ranked = scorer.rank(&rec, &candidates);
        assert_eq!(ranked[0].breakdown.total, ranked[1].breakdown.total);
        assert_eq!(ranked[0].candidate.id, "exact");
        assert_eq!(ranked[0].breakdown.kind(ScoreFactor::NumberMatch), MatchKind::Exact);
        assert_eq!(ranked[1].breakdown.kind(ScoreFactor::NumberMatch), MatchKind::Partial);
    }

    #[test]
    fn test_tie_break_prefers_exact_set() {
        let weights = crate::config::MatchWeights {
            set_family: 35,
            ..Default::default()
        };
        let scorer = MatchScorer::new(MatchConfig {
            weights,
            ..Default::default()
        });
        let rec = IdentificationRecord {
            name: Some("Eevee".into()),
            set_name: Some("Jungle".into()),
            ..Default::default()
        };
        let candidates = vec![
            card("family", "Eevee", "Fossil", "51"),
            card("exact", "Eevee", "Jungle", "51"),
        ];

        let ranked = scorer.rank(&rec, &candidates);
        assert_eq!(ranked[0].breakdown.total, ranked[1].breakdown.total);
        assert_eq!(ranked[0].candidate.id, "exact");
        assert_eq!(ranked[1].breakdown.kind(ScoreFactor::SetMatch), MatchKind::Family);
    }

    #[test]
    fn test_alternatives_above_required() {
        let rec = record();
        let candidates = vec![
            card("base1-4", "Charizard", "Base", "4"),
            card("base2-4", "Charizard", "Base Set 2", "4"),
            card("evo-11", "Charizard", "Evolving Skies", "11"),
        ];
        let (decision, alternatives) = MatchScorer::default().decide(&rec, &candidates);
        assert!(decision.is_found());
        assert_eq!(alternatives.len(), 1);
        assert_eq!(alternatives[0].candidate.id, "base2-4");
        assert_eq!(alternatives[0].breakdown.total, 80);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let scorer = MatchScorer::default();
        let candidate = card("base1-4", "Charizard", "Base", "4");
        assert_eq!(scorer.score(&record(), &candidate), scorer.score(&record(), &candidate));
    }

    #[test]
    fn test_adding_a_match_never_lowers_score() {
        let scorer = MatchScorer::default();
        let mut candidate = card("x", "Charizard", "Evolving Skies", "11");
        let before = scorer.score(&record(), &candidate).total;
        candidate.number = Some("4".into());
        let after = scorer.score(&record(), &candidate).total;
        assert!(after > before);
    }
}
