use chrono::NaiveDate;

use crate::completion::{AreaDraft, CityDraft};
use crate::knowledge::{AreaKnowledge, KnowledgeBase, KnowledgeSpot};
use crate::models::{Alert, Category, Hotspot, IssueKind, Severity};
use crate::recommend;
use crate::severity::{effective_severity, infer_category};

const CITY_CONFIDENCE_RAINY: f64 = 0.65;
const CITY_CONFIDENCE_DRY: f64 = 0.70;
const KNOWN_AREA_CONFIDENCE: f64 = 0.6;
const UNKNOWN_AREA_CONFIDENCE: f64 = 0.5;

fn day_label(date: NaiveDate) -> String {
    date.format("%A, %B %d").to_string()
}

fn window(today: NaiveDate) -> (String, String) {
    let tomorrow = today.succ_opt().unwrap_or(today);
    (day_label(today), day_label(tomorrow))
}

fn issue_for(category: Category) -> IssueKind {
    match category {
        Category::Flooding => IssueKind::Waterlogging,
        Category::Traffic => IssueKind::TrafficCongestion,
        Category::Infrastructure => IssueKind::Infrastructure,
    }
}

/// One alert per spot, flood spots escalated while raining.
pub fn alerts_from_spots(spots: &[KnowledgeSpot], category: Category, is_rainy: bool) -> Vec<Alert> {
    spots
        .iter()
        .map(|spot| Alert {
            location: spot.location.clone(),
            issue: issue_for(category),
            details: spot.details.clone(),
            severity: effective_severity(spot.severity, category, is_rainy),
            category,
        })
        .collect()
}

/// City-wide prediction from the general knowledge group.
pub fn city(kb: &KnowledgeBase, city: &str, is_rainy: bool, today: NaiveDate) -> CityDraft {
    let (today_label, tomorrow_label) = window(today);
    let general = kb.general();

    let summary = if is_rainy {
        format!(
            "Based on weather patterns, {city} is likely to experience rainfall today ({today_label}) \
             and possibly tomorrow ({tomorrow_label}). This may lead to waterlogging in low-lying areas, \
             especially near known flooding spots. Traffic congestion is expected to worsen, particularly \
             during peak hours near major junctions and tech corridors."
        )
    } else {
        format!(
            "For {today_label} and {tomorrow_label}, {city} is expected to have typical urban challenges. \
             Traffic congestion will be significant during peak hours (8-11 AM and 5-8 PM) at major \
             junctions. Infrastructure issues like potholes and road quality may affect commutes in \
             certain areas."
        )
    };

    CityDraft {
        summary: Some(summary),
        flood_alerts: Some(alerts_from_spots(&general.flood, Category::Flooding, is_rainy)),
        traffic_alerts: Some(alerts_from_spots(&general.traffic, Category::Traffic, is_rainy)),
        infrastructure_alerts: Some(alerts_from_spots(
            &general.infrastructure,
            Category::Infrastructure,
            is_rainy,
        )),
        confidence_score: Some(if is_rainy {
            CITY_CONFIDENCE_RAINY
        } else {
            CITY_CONFIDENCE_DRY
        }),
    }
}

/// Area-scoped prediction: knowledge-base spots when the area is known,
/// generic alerts naming the area otherwise.
pub fn area(kb: &KnowledgeBase, area: &str, is_rainy: bool, today: NaiveDate) -> AreaDraft {
    match kb.lookup(area) {
        Some(knowledge) => known_area(knowledge, area, is_rainy, today),
        None => unknown_area(area, is_rainy, today),
    }
}

fn known_area(knowledge: &AreaKnowledge, area: &str, is_rainy: bool, today: NaiveDate) -> AreaDraft {
    let (today_label, tomorrow_label) = window(today);

    let summary = if is_rainy {
        let flood_spots: Vec<&str> = knowledge
            .flood
            .iter()
            .take(2)
            .map(|spot| spot.location.as_str())
            .collect();
        format!(
            "For {today_label} and {tomorrow_label}, {area} may experience rainfall which could lead to \
             waterlogging in low-lying areas, particularly near {}. Traffic congestion is expected to \
             increase during rainfall, especially at major junctions.",
            flood_spots.join(" and ")
        )
    } else {
        let junction = knowledge
            .traffic
            .first()
            .map_or("major junctions", |spot| spot.location.as_str());
        format!(
            "For {today_label} and {tomorrow_label}, {area} is expected to experience typical traffic \
             congestion at key junctions such as {junction} during peak hours (8-11 AM and 5-8 PM). \
             Some infrastructure issues may affect commutes in certain sections."
        )
    };

    let mut alerts = Vec::new();
    let mut hotspots = Vec::new();

    if is_rainy {
        let flood = alerts_from_spots(&knowledge.flood, Category::Flooding, is_rainy);
        hotspots.extend(flood.iter().map(|alert| Hotspot {
            location: alert.location.clone(),
            issue: "flooding risk".to_string(),
            severity: alert.severity,
        }));
        alerts.extend(flood);
    }

    let traffic = alerts_from_spots(&knowledge.traffic, Category::Traffic, is_rainy);
    hotspots.extend(traffic.iter().map(|alert| Hotspot {
        location: alert.location.clone(),
        issue: "congestion".to_string(),
        severity: alert.severity,
    }));
    alerts.extend(traffic);
    alerts.extend(alerts_from_spots(
        &knowledge.infrastructure,
        Category::Infrastructure,
        is_rainy,
    ));

    AreaDraft {
        summary: Some(summary),
        recommendations: Some(recommend::for_area(area, is_rainy, &alerts)),
        alerts: Some(alerts),
        hotspots: Some(hotspots),
        confidence_score: Some(KNOWN_AREA_CONFIDENCE),
    }
}

fn generic_alert(location: String, issue: IssueKind, severity: Severity, details: &str) -> Alert {
    Alert {
        category: infer_category(issue.label()),
        location,
        issue,
        details: details.to_string(),
        severity,
    }
}

fn unknown_area(area: &str, is_rainy: bool, today: NaiveDate) -> AreaDraft {
    let (today_label, tomorrow_label) = window(today);

    let summary = if is_rainy {
        format!(
            "For {today_label} and {tomorrow_label}, {area} may experience rainfall which could lead to \
             waterlogging in low-lying areas. Traffic congestion is expected to increase during \
             rainfall, especially at major junctions."
        )
    } else {
        format!(
            "For {today_label} and {tomorrow_label}, {area} is expected to experience typical traffic \
             congestion at key junctions during peak hours (8-11 AM and 5-8 PM). Some infrastructure \
             issues may affect commutes in certain sections."
        )
    };

    let mut alerts = vec![
        generic_alert(
            format!("Main roads in {area}"),
            IssueKind::TrafficCongestion,
            Severity::Medium,
            "Typical congestion during peak hours (8-11 AM and 5-8 PM)",
        ),
        generic_alert(
            format!("Market areas in {area}"),
            IssueKind::TrafficCongestion,
            Severity::High,
            "Heavy vehicle and pedestrian traffic, especially on weekends",
        ),
    ];
    if is_rainy {
        alerts.push(generic_alert(
            format!("Low-lying areas in {area}"),
            IssueKind::Waterlogging,
            Severity::Medium,
            "Possible water accumulation during rainfall due to drainage issues",
        ));
        alerts.push(generic_alert(
            format!("Main junctions in {area}"),
            IssueKind::Waterlogging,
            Severity::Low,
            "Minor water accumulation possible during heavy rainfall",
        ));
    }
    alerts.push(generic_alert(
        format!("Inner roads of {area}"),
        IssueKind::Infrastructure,
        Severity::Medium,
        "Potential for potholes and uneven surfaces, especially after rainfall",
    ));

    let hotspots = vec![
        Hotspot {
            location: format!("Main market junction in {area}"),
            issue: "congestion".to_string(),
            severity: Severity::High,
        },
        Hotspot {
            location: format!("Major bus stops in {area}"),
            issue: "congestion".to_string(),
            severity: Severity::Medium,
        },
    ];

    AreaDraft {
        summary: Some(summary),
        alerts: Some(alerts),
        hotspots: Some(hotspots),
        recommendations: Some(recommend::for_unknown_area(area, is_rainy)),
        confidence_score: Some(UNKNOWN_AREA_CONFIDENCE),
    }
}
