//! Per-field defaulting of oracle output.
//!
//! A draft carries every required field as an `Option`. The rule tables below
//! list each field once; a field that is absent or blank is taken from a
//! fallback draft built for the same request context. Fields the oracle did
//! provide are never touched.

use crate::models::{Alert, Hotspot, PredictionResult};
use crate::recommend;

/// Emptiness test used to decide whether a present field still needs a default.
pub trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl<T> Blank for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

/// A score is usable only in `(0, 1]`.
impl Blank for f64 {
    fn is_blank(&self) -> bool {
        !(*self > 0.0 && *self <= 1.0)
    }
}

pub struct FieldRule<D> {
    pub field: &'static str,
    pub missing: fn(&D) -> bool,
    pub fill: fn(&mut D, &mut D),
}

macro_rules! field_rules {
    ($draft:ty => $($field:ident),+ $(,)?) => {
        &[$(
            FieldRule::<$draft> {
                field: stringify!($field),
                missing: |draft| draft.$field.as_ref().map_or(true, |value| value.is_blank()),
                fill: |draft, fallback| draft.$field = fallback.$field.take(),
            }
        ),+]
    };
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CityDraft {
    pub summary: Option<String>,
    pub flood_alerts: Option<Vec<Alert>>,
    pub traffic_alerts: Option<Vec<Alert>>,
    pub infrastructure_alerts: Option<Vec<Alert>>,
    pub confidence_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaDraft {
    pub summary: Option<String>,
    pub alerts: Option<Vec<Alert>>,
    pub hotspots: Option<Vec<Hotspot>>,
    pub recommendations: Option<Vec<String>>,
    pub confidence_score: Option<f64>,
}

pub const CITY_FIELDS: &[FieldRule<CityDraft>] = field_rules!(CityDraft =>
    summary,
    flood_alerts,
    traffic_alerts,
    infrastructure_alerts,
    confidence_score,
);

pub const AREA_FIELDS: &[FieldRule<AreaDraft>] = field_rules!(AreaDraft =>
    summary,
    alerts,
    hotspots,
    recommendations,
    confidence_score,
);

/// Names of the fields a draft still lacks.
pub fn missing_fields<D>(draft: &D, rules: &[FieldRule<D>]) -> Vec<&'static str> {
    rules
        .iter()
        .filter(|rule| (rule.missing)(draft))
        .map(|rule| rule.field)
        .collect()
}

/// Fills every missing field from `fallback`, which is only built when at
/// least one field is missing. Returns the completed draft and the names of
/// the substituted fields.
pub fn complete<D>(
    mut draft: D,
    rules: &[FieldRule<D>],
    fallback: impl FnOnce() -> D,
) -> (D, Vec<&'static str>) {
    let missing: Vec<&FieldRule<D>> = rules.iter().filter(|rule| (rule.missing)(&draft)).collect();
    if missing.is_empty() {
        return (draft, Vec::new());
    }

    let mut fallback = fallback();
    let filled = missing
        .into_iter()
        .map(|rule| {
            (rule.fill)(&mut draft, &mut fallback);
            rule.field
        })
        .collect();
    (draft, filled)
}

impl CityDraft {
    /// Flattens the three alert lists (flood, traffic, infrastructure) and
    /// derives the advice list from the categories present.
    pub fn seal(self) -> PredictionResult {
        let alerts: Vec<Alert> = [self.flood_alerts, self.traffic_alerts, self.infrastructure_alerts]
            .into_iter()
            .flatten()
            .flatten()
            .collect();

        PredictionResult {
            summary: self.summary.unwrap_or_default(),
            recommendations: recommend::for_city(&alerts),
            alerts,
            hotspots: Vec::new(),
            confidence_score: self.confidence_score.unwrap_or_default(),
        }
    }
}

impl AreaDraft {
    pub fn seal(self) -> PredictionResult {
        PredictionResult {
            summary: self.summary.unwrap_or_default(),
            alerts: self.alerts.unwrap_or_default(),
            hotspots: self.hotspots.unwrap_or_default(),
            recommendations: self.recommendations.unwrap_or_default(),
            confidence_score: self.confidence_score.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, IssueKind, Severity};

    fn alert(location: &str) -> Alert {
        Alert {
            location: location.to_string(),
            issue: IssueKind::Waterlogging,
            details: "details".into(),
            severity: Severity::High,
            category: Category::Flooding,
        }
    }

    fn full_city() -> CityDraft {
        CityDraft {
            summary: Some("fallback summary".into()),
            flood_alerts: Some(vec![alert("Silk Board Junction")]),
            traffic_alerts: Some(vec![alert("Hebbal Flyover")]),
            infrastructure_alerts: Some(vec![alert("Old City areas")]),
            confidence_score: Some(0.7),
        }
    }

    #[test]
    fn missing_confidence_keeps_oracle_fields() {
        let oracle = CityDraft {
            confidence_score: None,
            summary: Some("oracle summary".into()),
            ..full_city()
        };
        let (done, filled) = complete(oracle, CITY_FIELDS, full_city);
        assert_eq!(filled, vec!["confidence_score"]);
        assert_eq!(done.summary.as_deref(), Some("oracle summary"));
        assert_eq!(done.confidence_score, Some(0.7));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let oracle = CityDraft {
            summary: Some("   ".into()),
            traffic_alerts: Some(vec![]),
            confidence_score: Some(1.7),
            ..full_city()
        };
        assert_eq!(
            missing_fields(&oracle, CITY_FIELDS),
            vec!["summary", "traffic_alerts", "confidence_score"]
        );
        let (done, _) = complete(oracle, CITY_FIELDS, full_city);
        assert!(missing_fields(&done, CITY_FIELDS).is_empty());
    }

    #[test]
    fn zero_confidence_is_replaced() {
        let oracle = CityDraft {
            confidence_score: Some(0.0),
            ..full_city()
        };
        let (done, filled) = complete(oracle, CITY_FIELDS, || CityDraft {
            confidence_score: Some(0.65),
            ..full_city()
        });
        assert_eq!(filled, vec!["confidence_score"]);
        assert_eq!(done.confidence_score, Some(0.65));
        assert!(!1.0f64.is_blank());
        assert!(f64::NAN.is_blank());
    }

    #[test]
    fn complete_draft_never_builds_fallback() {
        let (done, filled) = complete(full_city(), CITY_FIELDS, || -> CityDraft {
            panic!("fallback must not be built")
        });
        assert!(filled.is_empty());
        assert_eq!(done, full_city());
    }

    #[test]
    fn empty_area_draft_takes_everything() {
        let fallback = || AreaDraft {
            summary: Some("s".into()),
            alerts: Some(vec![alert("Main roads in Hebbal")]),
            hotspots: Some(vec![Hotspot {
                location: "Major bus stops in Hebbal".into(),
                issue: "congestion".into(),
                severity: Severity::Medium,
            }]),
            recommendations: Some(vec!["r".into()]),
            confidence_score: Some(0.5),
        };
        let (done, filled) = complete(AreaDraft::default(), AREA_FIELDS, fallback);
        assert_eq!(filled.len(), AREA_FIELDS.len());
        let result = done.seal();
        assert_eq!(result.alerts.len(), 1);
        assert_eq!(result.confidence_score, 0.5);
    }

    #[test]
    fn sealed_city_keeps_category_order() {
        let result = full_city().seal();
        let locations: Vec<&str> = result.alerts.iter().map(|a| a.location.as_str()).collect();
        assert_eq!(locations, vec!["Silk Board Junction", "Hebbal Flyover", "Old City areas"]);
        assert!(result.hotspots.is_empty());
        assert!(!result.recommendations.is_empty());
    }
}
