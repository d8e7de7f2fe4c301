use serde::{Deserialize, Serialize};

use crate::models::{Alert, Category, Severity};

impl Severity {
    /// One level up, saturating at high.
    pub fn escalated(self) -> Self {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium | Severity::High => Severity::High,
        }
    }
}

/// Severity to report for a knowledge-base spot. Computed from the stored
/// severity every time, so repeated calls never stack.
pub fn effective_severity(stored: Severity, category: Category, is_rainy: bool) -> Severity {
    if is_rainy && category == Category::Flooding {
        stored.escalated()
    } else {
        stored
    }
}

/// Unrecognised or missing values land in the medium bucket.
pub fn coerce(value: Option<&str>) -> Severity {
    value.and_then(Severity::parse).unwrap_or(Severity::Medium)
}

/// Which list an incoming alert came from; decides the severity field to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSource {
    Flood,
    Traffic,
    Infrastructure,
    Area,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SeverityFields<'a> {
    pub risk_level: Option<&'a str>,
    pub congestion_level: Option<&'a str>,
    pub severity: Option<&'a str>,
}

pub fn resolve(source: AlertSource, fields: SeverityFields<'_>) -> Severity {
    let raw = match source {
        AlertSource::Flood | AlertSource::Infrastructure => fields.risk_level,
        AlertSource::Traffic => fields.congestion_level.or(fields.risk_level),
        AlertSource::Area => fields.severity,
    };
    coerce(raw)
}

/// Keyword rule for alerts that carry no explicit category.
pub fn infer_category(issue: &str) -> Category {
    let issue = issue.to_lowercase();
    if issue.contains("water") || issue.contains("flood") {
        Category::Flooding
    } else if issue.contains("traffic") || issue.contains("congestion") {
        Category::Traffic
    } else {
        Category::Infrastructure
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityBuckets<T> {
    pub high: Vec<T>,
    pub medium: Vec<T>,
    pub low: Vec<T>,
}

impl<T> Default for SeverityBuckets<T> {
    fn default() -> Self {
        Self {
            high: Vec::new(),
            medium: Vec::new(),
            low: Vec::new(),
        }
    }
}

impl<T> SeverityBuckets<T> {
    pub fn get(&self, severity: Severity) -> &[T] {
        match severity {
            Severity::High => &self.high,
            Severity::Medium => &self.medium,
            Severity::Low => &self.low,
        }
    }

    fn get_mut(&mut self, severity: Severity) -> &mut Vec<T> {
        match severity {
            Severity::High => &mut self.high,
            Severity::Medium => &mut self.medium,
            Severity::Low => &mut self.low,
        }
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// High, then medium, then low.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        Severity::BUCKET_ORDER
            .into_iter()
            .flat_map(move |severity| self.get(severity))
    }
}

/// Stable partition by severity; input order is kept inside each bucket.
pub fn bucket(alerts: &[Alert]) -> SeverityBuckets<Alert> {
    let mut buckets = SeverityBuckets::default();
    for alert in alerts {
        buckets.get_mut(alert.severity).push(alert.clone());
    }
    buckets
}
