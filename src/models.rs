use std::fmt;

use serde::{Deserialize, Serialize};

/// Alert severity, ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const BUCKET_ORDER: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Strict parse; `None` for anything outside high/medium/low.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Flooding,
    Traffic,
    Infrastructure,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Flooding, Category::Traffic, Category::Infrastructure];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Flooding => "flooding",
            Category::Traffic => "traffic",
            Category::Infrastructure => "infrastructure",
        }
    }
}

/// What an alert is about. Known kinds drive recommendations; anything else
/// the oracle invents is carried through as free text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueKind {
    Waterlogging,
    TrafficCongestion,
    Infrastructure,
    Other(String),
}

impl IssueKind {
    pub fn label(&self) -> &str {
        match self {
            IssueKind::Waterlogging => "waterlogging",
            IssueKind::TrafficCongestion => "traffic congestion",
            IssueKind::Infrastructure => "infrastructure",
            IssueKind::Other(label) => label,
        }
    }
}

impl From<String> for IssueKind {
    fn from(label: String) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "waterlogging" => IssueKind::Waterlogging,
            "traffic congestion" => IssueKind::TrafficCongestion,
            "infrastructure" => IssueKind::Infrastructure,
            _ => IssueKind::Other(label),
        }
    }
}

impl From<&str> for IssueKind {
    fn from(label: &str) -> Self {
        IssueKind::from(label.to_string())
    }
}

impl From<IssueKind> for String {
    fn from(kind: IssueKind) -> Self {
        match kind {
            IssueKind::Other(label) => label,
            known => known.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub location: String,
    pub issue: IssueKind,
    pub details: String,
    pub severity: Severity,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotspot {
    pub location: String,
    pub issue: String,
    pub severity: Severity,
}

/// Decision input derived from raw upstream payloads for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signal {
    pub is_rainy: bool,
    pub has_social_signal: bool,
    pub has_news_signal: bool,
    pub area: Option<String>,
}

/// Fully populated prediction for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub summary: String,
    pub alerts: Vec<Alert>,
    /// Only populated for area-scoped predictions.
    pub hotspots: Vec<Hotspot>,
    pub recommendations: Vec<String>,
    /// In `[0, 1]`.
    pub confidence_score: f64,
}

impl PredictionResult {
    pub fn alerts_in(&self, category: Category) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(move |alert| alert.category == category)
    }

    pub fn confidence_percent(&self) -> u8 {
        (self.confidence_score.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    City,
    Area(String),
}

/// Which stage produced the base result before completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Oracle,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Forecast {
    pub scope: Scope,
    pub city: String,
    pub signal: Signal,
    pub result: PredictionResult,
    pub provenance: Provenance,
}

impl Forecast {
    pub fn area(&self) -> Option<&str> {
        match &self.scope {
            Scope::City => None,
            Scope::Area(area) => Some(area),
        }
    }
}
