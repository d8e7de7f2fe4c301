use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::models::{Alert, Category, Forecast, Hotspot, Scope};
use crate::recommend;
use crate::severity::{self, SeverityBuckets};

const NO_ALERTS: &str = "No significant alerts at this time.";
const NO_HOTSPOTS: &str = "No specific hotspots identified at this time.";

/// Wire shape served to callers. `area` and `hotspots` only appear for
/// area-scoped predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    pub summary: String,
    pub alerts: SeverityBuckets<Alert>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotspots: Option<Vec<Hotspot>>,
    pub recommendations: Vec<String>,
    /// Integer percent.
    pub confidence_score: u8,
}

impl PredictionJson {
    pub fn from_forecast(forecast: &Forecast) -> Self {
        let result = &forecast.result;
        let hotspots = match forecast.scope {
            Scope::City => None,
            Scope::Area(_) => Some(result.hotspots.clone()),
        };

        Self {
            area: forecast.area().map(str::to_string),
            summary: result.summary.clone(),
            alerts: severity::bucket(&result.alerts),
            hotspots,
            recommendations: result
                .recommendations
                .iter()
                .map(|line| recommend::strip_bullet(line))
                .filter(|line| !line.is_empty())
                .collect(),
            confidence_score: result.confidence_percent(),
        }
    }
}

pub fn render_json(forecast: &Forecast) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&PredictionJson::from_forecast(forecast))
}

pub fn render_text(forecast: &Forecast) -> String {
    match forecast.area() {
        None => render_city(forecast),
        Some(area) => render_area(forecast, area),
    }
}

fn heading(output: &mut String, title: &str) {
    let _ = writeln!(output, "{title}");
    let _ = writeln!(output, "{}", "=".repeat(title.chars().count()));
    let _ = writeln!(output);
}

fn section(output: &mut String, title: &str) {
    let _ = writeln!(output);
    let _ = writeln!(output, "{title}:");
    let _ = writeln!(output, "{}", "-".repeat(title.chars().count() + 1));
}

fn footer(output: &mut String, forecast: &Forecast, sources: &str) {
    section(output, "RECOMMENDATIONS");
    for line in &forecast.result.recommendations {
        let _ = writeln!(output, "- {}", recommend::strip_bullet(line));
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "This prediction is based on {sources}.");
    let _ = writeln!(
        output,
        "Confidence level: {}%",
        forecast.result.confidence_percent()
    );
}

fn render_city(forecast: &Forecast) -> String {
    let mut output = String::new();
    heading(
        &mut output,
        &format!("{} CIVIC PREDICTION SUMMARY", forecast.city.to_uppercase()),
    );
    let _ = writeln!(output, "{}", forecast.result.summary);

    for (category, title) in [
        (Category::Flooding, "FLOODING & WATERLOGGING"),
        (Category::Traffic, "TRAFFIC CONGESTION"),
        (Category::Infrastructure, "INFRASTRUCTURE ISSUES"),
    ] {
        section(&mut output, title);
        let mut alerts = forecast.result.alerts_in(category).peekable();
        if alerts.peek().is_none() {
            let _ = writeln!(output, "{NO_ALERTS}");
        }
        for alert in alerts {
            let _ = writeln!(
                output,
                "- {} ({}): {}",
                alert.location,
                alert.severity.as_str().to_uppercase(),
                alert.details
            );
        }
    }

    footer(
        &mut output,
        forecast,
        "current weather conditions, recent news, and social media activity",
    );
    output
}

fn render_area(forecast: &Forecast, area: &str) -> String {
    let result = &forecast.result;
    let mut output = String::new();
    heading(
        &mut output,
        &format!(
            "CIVIC PREDICTION FOR {}, {}",
            area.to_uppercase(),
            forecast.city.to_uppercase()
        ),
    );
    let _ = writeln!(output, "{}", result.summary);

    section(&mut output, "SPECIFIC ALERTS");
    let alerts = severity::bucket(&result.alerts);
    if alerts.is_empty() {
        let _ = writeln!(output, "{NO_ALERTS}");
    }
    for alert in alerts.iter() {
        let _ = writeln!(
            output,
            "- {} - {} ({}): {}",
            alert.location,
            title_case(alert.issue.label()),
            alert.severity.as_str().to_uppercase(),
            alert.details
        );
    }

    section(&mut output, "HOTSPOT LOCATIONS");
    if result.hotspots.is_empty() {
        let _ = writeln!(output, "{NO_HOTSPOTS}");
    }
    for hotspot in &result.hotspots {
        let _ = writeln!(
            output,
            "- {}: {} ({})",
            hotspot.location,
            hotspot.issue,
            hotspot.severity.as_str().to_uppercase()
        );
    }

    footer(
        &mut output,
        forecast,
        "current weather conditions and recent social media activity",
    );
    output
}

/// Upper-cases the first letter of every word.
fn title_case(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if at_word_start {
            output.extend(ch.to_uppercase());
        } else {
            output.extend(ch.to_lowercase());
        }
        at_word_start = !ch.is_alphabetic();
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::completion::AreaDraft;
    use crate::fallback;
    use crate::knowledge::KnowledgeBase;
    use crate::models::{IssueKind, PredictionResult, Provenance, Severity, Signal};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date")
    }

    fn city_forecast(is_rainy: bool) -> Forecast {
        let kb = KnowledgeBase::seeded();
        Forecast {
            scope: Scope::City,
            city: kb.city().to_string(),
            signal: Signal {
                is_rainy,
                ..Signal::default()
            },
            result: fallback::city(&kb, kb.city(), is_rainy, today()).seal(),
            provenance: Provenance::Fallback,
        }
    }

    fn area_forecast(area: &str, result: PredictionResult) -> Forecast {
        Forecast {
            scope: Scope::Area(area.to_string()),
            city: "Bengaluru".into(),
            signal: Signal::default(),
            result,
            provenance: Provenance::Fallback,
        }
    }

    #[test]
    fn city_text_has_every_section() {
        let text = render_text(&city_forecast(false));
        assert!(text.starts_with("BENGALURU CIVIC PREDICTION SUMMARY\n"));
        assert!(text.contains("FLOODING & WATERLOGGING:"));
        assert!(text.contains("- Silk Board Junction (HIGH): One of the most congested junctions in the city"));
        assert!(text.contains("INFRASTRUCTURE ISSUES:"));
        assert!(text.contains("- Stay updated with weather forecasts before planning travel."));
        assert!(text.trim_end().ends_with("Confidence level: 70%"));
    }

    #[test]
    fn empty_sections_say_so() {
        let result = AreaDraft {
            summary: Some("Quiet day.".into()),
            alerts: Some(vec![]),
            hotspots: Some(vec![]),
            recommendations: Some(vec!["- Carry an umbrella".into()]),
            confidence_score: Some(0.55),
        }
        .seal();
        let text = render_text(&area_forecast("Jayanagar", result));
        assert!(text.starts_with("CIVIC PREDICTION FOR JAYANAGAR, BENGALURU\n"));
        assert!(text.contains(NO_ALERTS));
        assert!(text.contains(NO_HOTSPOTS));
        assert!(text.contains("\n- Carry an umbrella\n"));
        assert!(text.contains("Confidence level: 55%"));
    }

    #[test]
    fn area_alert_lines_title_case_the_issue() {
        let kb = KnowledgeBase::seeded();
        let result = fallback::area(&kb, "Koramangala", true, today()).seal();
        let text = render_text(&area_forecast("Koramangala", result));
        assert!(text.contains(
            "- 80 Feet Road near Sony World Signal - Waterlogging (HIGH): "
        ));
        assert!(text.contains("- Sony World Signal: congestion (HIGH)"));

        let specific = text
            .split("SPECIFIC ALERTS:")
            .nth(1)
            .and_then(|rest| rest.split("HOTSPOT LOCATIONS:").next())
            .expect("alerts section");
        let first_medium = specific.find("(MEDIUM)").expect("medium alert");
        let last_high = specific.rfind("(HIGH)").expect("high alert");
        assert!(last_high < first_medium);
        assert_eq!(title_case("traffic congestion"), "Traffic Congestion");
        assert_eq!(title_case("pot-hole repair"), "Pot-Hole Repair");
    }

    #[test]
    fn city_json_omits_area_fields() {
        let json = render_json(&city_forecast(true)).expect("serialize");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert!(value.get("area").is_none());
        assert!(value.get("hotspots").is_none());
        assert_eq!(value["confidence_score"], 65);
        assert_eq!(value["alerts"]["high"][0]["location"], "Silk Board Junction");
        assert_eq!(value["alerts"]["high"][0]["issue"], "waterlogging");
        assert_eq!(value["alerts"]["high"][0]["category"], "flooding");
    }

    #[test]
    fn json_round_trip_keeps_every_alert_once() {
        let kb = KnowledgeBase::seeded();
        for forecast in [
            city_forecast(true),
            area_forecast(
                "Whitefield",
                fallback::area(&kb, "Whitefield", true, today()).seal(),
            ),
        ] {
            let json = render_json(&forecast).expect("serialize");
            let parsed: PredictionJson = serde_json::from_str(&json).expect("deserialize");

            let mut rendered: Vec<Alert> = parsed.alerts.iter().cloned().collect();
            let mut source = forecast.result.alerts.clone();
            let key = |a: &Alert| (a.location.clone(), a.issue.label().to_string(), a.severity);
            rendered.sort_by_key(key);
            source.sort_by_key(key);
            assert_eq!(rendered, source);
        }
    }

    #[test]
    fn area_json_strips_bullets_and_keeps_free_text_issues() {
        let result = PredictionResult {
            summary: "s".into(),
            alerts: vec![Alert {
                location: "Outer Ring Road".into(),
                issue: IssueKind::Other("Tree Fall".into()),
                details: "d".into(),
                severity: Severity::Low,
                category: Category::Infrastructure,
            }],
            hotspots: vec![],
            recommendations: vec!["- Avoid ORR".into(), "  ".into()],
            confidence_score: 0.834,
        };
        let parsed = PredictionJson::from_forecast(&area_forecast("Bellandur", result));
        assert_eq!(parsed.area.as_deref(), Some("Bellandur"));
        assert_eq!(parsed.hotspots, Some(vec![]));
        assert_eq!(parsed.recommendations, vec!["Avoid ORR"]);
        assert_eq!(parsed.confidence_score, 83);
        assert_eq!(parsed.alerts.low[0].issue.label(), "Tree Fall");
    }
}
