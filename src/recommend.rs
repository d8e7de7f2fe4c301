use crate::models::{Alert, Category, IssueKind, Severity};

const HELPLINE: &str = "BBMP helpline (080-22660000)";

/// City-wide advice: one block per category that has alerts, then general lines.
pub fn for_city(alerts: &[Alert]) -> Vec<String> {
    let has = |category: Category| alerts.iter().any(|alert| alert.category == category);
    let mut lines: Vec<String> = Vec::new();

    if has(Category::Flooding) {
        lines.extend([
            "Avoid low-lying areas during heavy rainfall, especially those mentioned in flooding alerts.".to_string(),
            "Keep emergency contact numbers handy for waterlogging assistance.".to_string(),
            "Use waterproof bags and cases for electronic devices when traveling in rainy conditions.".to_string(),
        ]);
    }
    if has(Category::Traffic) {
        lines.extend([
            "Plan alternative routes to avoid congested areas mentioned in traffic alerts.".to_string(),
            "Allow extra travel time during peak hours, especially if rain is forecast.".to_string(),
            "Consider using public transportation or carpooling to reduce congestion.".to_string(),
        ]);
    }
    if has(Category::Infrastructure) {
        lines.extend([
            format!("Report dangerous potholes or infrastructure issues to {HELPLINE}."),
            "Exercise caution around areas with known infrastructure issues, especially in rain.".to_string(),
            "Consider using navigation apps that provide real-time updates on road conditions.".to_string(),
        ]);
    }

    lines.push("Stay updated with weather forecasts before planning travel.".to_string());
    lines.push(
        "Consider working from home if severe weather or traffic conditions are predicted.".to_string(),
    );
    lines
}

/// Advice for an area with knowledge-base coverage.
pub fn for_area(area: &str, is_rainy: bool, alerts: &[Alert]) -> Vec<String> {
    let mut lines = vec![format!(
        "Plan travel routes through {area} to avoid known congestion points, especially during peak hours."
    )];

    let high: Vec<&str> = alerts
        .iter()
        .filter(|alert| alert.severity == Severity::High)
        .take(2)
        .map(|alert| alert.location.as_str())
        .collect();
    if !high.is_empty() {
        lines.push(format!(
            "Avoid {} if possible, as these areas have high-severity issues.",
            high.join(", ")
        ));
    }

    if is_rainy {
        lines.push(format!(
            "Check for waterlogging updates before traveling through {area} during rainfall."
        ));
        lines.push(format!(
            "Keep a 10-15 minute buffer in travel plans for {area} due to potential rain-related delays."
        ));
    }

    let has_issue = |kind: &IssueKind| alerts.iter().any(|alert| &alert.issue == kind);
    if has_issue(&IssueKind::TrafficCongestion) {
        lines.push(format!(
            "Consider alternative transport options when traveling through {area} during peak hours."
        ));
    }
    if has_issue(&IssueKind::Infrastructure) {
        lines.push(format!(
            "Drive cautiously on inner roads in {area} due to reported infrastructure issues."
        ));
    }

    lines.push(format!("Stay updated with real-time traffic apps when traveling through {area}."));
    lines.push(format!("Report any new civic issues in {area} to the {HELPLINE}."));
    lines
}

/// Advice for an area the knowledge base does not know.
pub fn for_unknown_area(area: &str, is_rainy: bool) -> Vec<String> {
    let mut lines = vec![
        format!("Allow extra time for commuting through {area}, especially during peak hours."),
        "Consider alternative routes to avoid main junctions during rush hours.".to_string(),
        "Stay updated with weather forecasts before planning travel.".to_string(),
        "Exercise caution on inner roads where infrastructure issues may be present.".to_string(),
    ];
    if is_rainy {
        lines.push(format!(
            "Avoid low-lying areas in {area} during heavy rainfall due to potential waterlogging."
        ));
        lines.push("Keep emergency contact numbers handy for waterlogging assistance.".to_string());
    }
    lines
}

/// Splits free-text advice into lines, dropping blanks and list bullets.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(strip_bullet).filter(|line| !line.is_empty()).collect()
}

pub fn strip_bullet(line: &str) -> String {
    line.trim().trim_matches(|c| c == '-' || c == ' ').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(location: &str, issue: IssueKind, category: Category, severity: Severity) -> Alert {
        Alert {
            location: location.to_string(),
            issue,
            details: String::new(),
            severity,
            category,
        }
    }

    #[test]
    fn city_blocks_follow_categories() {
        let only_traffic = vec![alert(
            "Hebbal Flyover",
            IssueKind::TrafficCongestion,
            Category::Traffic,
            Severity::High,
        )];
        let lines = for_city(&only_traffic);
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("Plan alternative routes"));
        assert!(lines.iter().all(|line| !line.contains("low-lying")));

        assert_eq!(for_city(&[]).len(), 2);
    }

    #[test]
    fn area_names_first_two_high_locations() {
        let alerts = vec![
            alert("A", IssueKind::Waterlogging, Category::Flooding, Severity::High),
            alert("B", IssueKind::Infrastructure, Category::Infrastructure, Severity::Low),
            alert("C", IssueKind::TrafficCongestion, Category::Traffic, Severity::High),
            alert("D", IssueKind::TrafficCongestion, Category::Traffic, Severity::High),
        ];
        let lines = for_area("Whitefield", true, &alerts);
        assert!(lines.contains(&"Avoid A, C if possible, as these areas have high-severity issues.".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("Check for waterlogging updates")));
        assert!(lines.iter().any(|l| l.starts_with("Consider alternative transport")));
        assert!(lines.iter().any(|l| l.starts_with("Drive cautiously")));
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn dry_area_without_high_alerts_is_short() {
        let alerts = vec![alert("B", IssueKind::Other("drainage".into()), Category::Infrastructure, Severity::Low)];
        let lines = for_area("Indiranagar", false, &alerts);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn unknown_area_adds_rain_lines() {
        assert_eq!(for_unknown_area("Hebbal", false).len(), 4);
        assert_eq!(for_unknown_area("Hebbal", true).len(), 6);
    }

    #[test]
    fn bullets_are_stripped() {
        assert_eq!(
            split_lines("- Avoid Silk Board\n\n  - Carry an umbrella -\n"),
            vec!["Avoid Silk Board", "Carry an umbrella"]
        );
    }
}
