//! Records, sentiment classes and aggregated buckets

use crate::period::{Granularity, PeriodLabel};
use crate::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentiment class assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Parse a classifier label
    ///
    /// Only the exact labels `POSITIVE`, `NEUTRAL` and `NEGATIVE` are accepted;
    /// anything else violates the classifier contract.
    pub fn from_label(label: &str) -> Result<Self> {
        match label {
            "POSITIVE" => Ok(Sentiment::Positive),
            "NEUTRAL" => Ok(Sentiment::Neutral),
            "NEGATIVE" => Ok(Sentiment::Negative),
            other => Err(Error::InvalidLabel(other.to_string())),
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Sentiment::Positive => "POSITIVE",
            Sentiment::Neutral => "NEUTRAL",
            Sentiment::Negative => "NEGATIVE",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// One ingested text unit, before classification
///
/// `created_at` is local time (second granularity) in the target timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(with = "created_at_format")]
    pub created_at: NaiveDateTime,
    /// Canonical text, used for dedup and as classifier input
    pub text: String,
    /// Text as received from the fetch source
    pub raw_text: String,
    pub favorite_count: u64,
    pub reply_count: u64,
    pub retweet_count: u64,
    pub user_followers: Option<u64>,
}

/// A record paired with the classifier's verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRecord {
    pub record: Record,
    pub label: Sentiment,
}

impl ClassifiedRecord {
    /// Pair records with classifier labels
    ///
    /// Fails if the label count differs from the record count or any label is
    /// outside the three known classes.
    pub fn zip_labels(records: Vec<Record>, labels: &[String]) -> Result<Vec<Self>> {
        if records.len() != labels.len() {
            return Err(Error::Upstream(format!(
                "Classifier returned {} labels for {} texts",
                labels.len(),
                records.len()
            )));
        }

        records
            .into_iter()
            .zip(labels)
            .map(|(record, label)| {
                Ok(ClassifiedRecord {
                    record,
                    label: Sentiment::from_label(label)?,
                })
            })
            .collect()
    }
}

/// Per-class weight counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentCounts {
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
}

impl SentimentCounts {
    pub fn new(positive: u64, neutral: u64, negative: u64) -> Self {
        Self {
            positive,
            neutral,
            negative,
        }
    }

    /// Add `weight` to one class, saturating at `u64::MAX`
    pub fn add(&mut self, sentiment: Sentiment, weight: u64) {
        let slot = match sentiment {
            Sentiment::Positive => &mut self.positive,
            Sentiment::Neutral => &mut self.neutral,
            Sentiment::Negative => &mut self.negative,
        };
        *slot = saturating_sum(*slot, weight);
    }

    /// Component-wise sum, saturating at `u64::MAX`
    pub fn merge(&mut self, other: &SentimentCounts) {
        self.positive = saturating_sum(self.positive, other.positive);
        self.neutral = saturating_sum(self.neutral, other.neutral);
        self.negative = saturating_sum(self.negative, other.negative);
    }

    /// Component-wise sum that fails instead of saturating
    pub fn try_merge(&mut self, other: &SentimentCounts) -> Result<()> {
        let overflow = || Error::InvalidInput(format!("Sentiment counts overflow: {:?} + {:?}", self, other));
        let positive = self.positive.checked_add(other.positive).ok_or_else(overflow)?;
        let neutral = self.neutral.checked_add(other.neutral).ok_or_else(overflow)?;
        let negative = self.negative.checked_add(other.negative).ok_or_else(overflow)?;
        *self = Self::new(positive, neutral, negative);
        Ok(())
    }

    pub fn get(&self, sentiment: Sentiment) -> u64 {
        match sentiment {
            Sentiment::Positive => self.positive,
            Sentiment::Neutral => self.neutral,
            Sentiment::Negative => self.negative,
        }
    }

    pub fn total(&self) -> u64 {
        self.positive.saturating_add(self.neutral).saturating_add(self.negative)
    }
}

fn saturating_sum(a: u64, b: u64) -> u64 {
    a.checked_add(b).unwrap_or_else(|| {
        tracing::warn!(a, b, "Sentiment counter saturated at u64::MAX");
        u64::MAX
    })
}

/// Aggregated counters for one period at one granularity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub period: PeriodLabel,
    pub counts: SentimentCounts,
}

impl Bucket {
    pub fn new(period: PeriodLabel, counts: SentimentCounts) -> Self {
        Self { period, counts }
    }

    pub fn granularity(&self) -> Granularity {
        self.period.granularity()
    }
}

/// Serde adapter for the `YYYY-MM-DD HH:MM:SS` timestamp format used in backups
mod created_at_format {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}
