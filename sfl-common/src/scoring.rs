//! Engagement-weighted scoring
//!
//! Every classified record is worth one point to its sentiment class, plus
//! extra points for engagement:
//!
//! ```text
//! weight = 1
//!        + favorite_weight   * favorite_count
//!        + reply_weight      * reply_count
//!        + retweet_weight    * retweet_count
//!        + follower_log_weight * log10(user_followers)   (only when followers > 0)
//! ```
//!
//! The sum is rounded half away from zero and clamped at 0. This is the only
//! place rounding happens; rollups are exact integer sums.

use crate::model::{ClassifiedRecord, Sentiment};
use crate::{Error, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;

pub const DEFAULT_FAVORITE_WEIGHT: f64 = 0.1;
pub const DEFAULT_REPLY_WEIGHT: f64 = 0.05;
pub const DEFAULT_RETWEET_WEIGHT: f64 = 0.2;
pub const DEFAULT_FOLLOWER_LOG_WEIGHT: f64 = 0.0;

/// Scoring coefficients
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_favorite_weight")]
    pub favorite_weight: f64,
    #[serde(default = "default_reply_weight")]
    pub reply_weight: f64,
    #[serde(default = "default_retweet_weight")]
    pub retweet_weight: f64,
    #[serde(default = "default_follower_log_weight")]
    pub follower_log_weight: f64,
}

fn default_favorite_weight() -> f64 {
    DEFAULT_FAVORITE_WEIGHT
}

fn default_reply_weight() -> f64 {
    DEFAULT_REPLY_WEIGHT
}

fn default_retweet_weight() -> f64 {
    DEFAULT_RETWEET_WEIGHT
}

fn default_follower_log_weight() -> f64 {
    DEFAULT_FOLLOWER_LOG_WEIGHT
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            favorite_weight: DEFAULT_FAVORITE_WEIGHT,
            reply_weight: DEFAULT_REPLY_WEIGHT,
            retweet_weight: DEFAULT_RETWEET_WEIGHT,
            follower_log_weight: DEFAULT_FOLLOWER_LOG_WEIGHT,
        }
    }
}

impl ScoringWeights {
    /// All coefficients zero: every record weighs exactly 1
    pub fn unweighted() -> Self {
        Self {
            favorite_weight: 0.0,
            reply_weight: 0.0,
            retweet_weight: 0.0,
            follower_log_weight: 0.0,
        }
    }

    /// Reject NaN and infinite coefficients
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("favorite_weight", self.favorite_weight),
            ("reply_weight", self.reply_weight),
            ("retweet_weight", self.retweet_weight),
            ("follower_log_weight", self.follower_log_weight),
        ];
        for (name, value) in named {
            if !value.is_finite() {
                return Err(Error::Config(format!("Scoring coefficient {} must be finite, got {}", name, value)));
            }
        }
        Ok(())
    }
}

/// A record reduced to what aggregation needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredRecord {
    pub sentiment: Sentiment,
    pub weight: u64,
    pub created_at: NaiveDateTime,
}

/// Pure scoring function parameterized by its coefficients
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine {
    weights: ScoringWeights,
}

impl ScoringEngine {
    pub fn new(weights: ScoringWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score one classified record
    pub fn score(&self, classified: &ClassifiedRecord) -> ScoredRecord {
        ScoredRecord {
            sentiment: classified.label,
            weight: self.weight(classified),
            created_at: classified.record.created_at,
        }
    }

    pub fn score_all(&self, classified: &[ClassifiedRecord]) -> Vec<ScoredRecord> {
        classified.iter().map(|c| self.score(c)).collect()
    }

    fn weight(&self, classified: &ClassifiedRecord) -> u64 {
        let record = &classified.record;
        let w = &self.weights;
        let mut points = 1.0_f64;

        if w.favorite_weight != 0.0 {
            points += w.favorite_weight * record.favorite_count as f64;
        }
        if w.reply_weight != 0.0 {
            points += w.reply_weight * record.reply_count as f64;
        }
        if w.retweet_weight != 0.0 {
            points += w.retweet_weight * record.retweet_count as f64;
        }
        if w.follower_log_weight != 0.0 {
            if let Some(followers) = record.user_followers.filter(|f| *f > 0) {
                points += w.follower_log_weight * (followers as f64).log10();
            }
        }

        round_weight(points)
    }
}

/// Round half away from zero, then clamp at 0
fn round_weight(points: f64) -> u64 {
    let rounded = points.round();
    if rounded <= 0.0 {
        0
    } else {
        rounded as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;

    fn classified(favorites: u64, replies: u64, retweets: u64, followers: Option<u64>) -> ClassifiedRecord {
        ClassifiedRecord {
            record: Record {
                id: "1".to_string(),
                created_at: NaiveDateTime::parse_from_str("2024-01-10 08:15:00", "%Y-%m-%d %H:%M:%S").unwrap(),
                text: "tekst".to_string(),
                raw_text: "tekst".to_string(),
                favorite_count: favorites,
                reply_count: replies,
                retweet_count: retweets,
                user_followers: followers,
            },
            label: Sentiment::Neutral,
        }
    }

    fn engine(favorite: f64, reply: f64, retweet: f64, follower_log: f64) -> ScoringEngine {
        ScoringEngine::new(ScoringWeights {
            favorite_weight: favorite,
            reply_weight: reply,
            retweet_weight: retweet,
            follower_log_weight: follower_log,
        })
        .unwrap()
    }

    #[test]
    fn test_no_engagement_weighs_one() {
        let scored = ScoringEngine::default().score(&classified(0, 0, 0, None));
        assert_eq!(scored.weight, 1);
        assert_eq!(scored.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_default_coefficients() {
        // 1 + 0.1*10 + 0.05*20 + 0.2*5 = 4
        let scored = ScoringEngine::default().score(&classified(10, 20, 5, Some(1000)));
        assert_eq!(scored.weight, 4);
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        // 1 + 0.25*1 = 1.25 -> 1
        assert_eq!(engine(0.25, 0.0, 0.0, 0.0).score(&classified(1, 0, 0, None)).weight, 1);
        // 1 + 0.25*2 = 1.5 -> 2
        assert_eq!(engine(0.25, 0.0, 0.0, 0.0).score(&classified(2, 0, 0, None)).weight, 2);
        // 1 + 0.5*3 = 2.5 -> 3 (not banker's rounding)
        assert_eq!(engine(0.5, 0.0, 0.0, 0.0).score(&classified(3, 0, 0, None)).weight, 3);
    }

    #[test]
    fn test_round_weight_boundaries() {
        assert_eq!(round_weight(1.4), 1);
        assert_eq!(round_weight(1.5), 2);
        assert_eq!(round_weight(0.49), 0);
        assert_eq!(round_weight(-3.7), 0);
    }

    #[test]
    fn test_negative_coefficients_clamp_at_zero() {
        let scored = engine(-1.0, 0.0, 0.0, 0.0).score(&classified(10, 0, 0, None));
        assert_eq!(scored.weight, 0);
    }

    #[test]
    fn test_follower_log_term() {
        // 1 + 2*log10(1000) = 7
        let scored = engine(0.0, 0.0, 0.0, 2.0).score(&classified(0, 0, 0, Some(1000)));
        assert_eq!(scored.weight, 7);
    }

    #[test]
    fn test_zero_or_missing_followers_never_contribute() {
        let e = engine(0.0, 0.0, 0.0, 5.0);
        assert_eq!(e.score(&classified(0, 0, 0, Some(0))).weight, 1);
        assert_eq!(e.score(&classified(0, 0, 0, None)).weight, 1);
    }

    #[test]
    fn test_zero_coefficients_ignore_counts() {
        let scored = ScoringEngine::new(ScoringWeights::unweighted())
            .unwrap()
            .score(&classified(1_000_000, 1_000_000, 1_000_000, Some(1_000_000)));
        assert_eq!(scored.weight, 1);
    }

    #[test]
    fn test_score_is_deterministic() {
        let engine = ScoringEngine::default();
        let record = classified(7, 3, 2, Some(42));
        assert_eq!(engine.score(&record), engine.score(&record));
    }

    #[test]
    fn test_non_finite_coefficients_rejected() {
        let weights = ScoringWeights {
            favorite_weight: f64::NAN,
            ..ScoringWeights::default()
        };
        assert!(matches!(ScoringEngine::new(weights), Err(Error::Config(_))));
    }
}
