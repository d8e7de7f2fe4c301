use std::fmt::Write;

use async_trait::async_trait;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::completion::{missing_fields, AreaDraft, CityDraft, AREA_FIELDS, CITY_FIELDS};
use crate::error::{FallbackReason, UpstreamError};
use crate::models::{Alert, Category, Hotspot, IssueKind};
use crate::recommend;
use crate::severity::{self, AlertSource, SeverityFields};
use crate::signal::Observations;
use crate::sources::Sentiment;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// External text-generation service. Output is free text that is expected,
/// but not guaranteed, to hold a JSON object.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

pub struct GeminiOracle {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

impl GeminiOracle {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            http: reqwest::Client::new(),
            base_url: GEMINI_API_URL.to_string(),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[async_trait]
impl Oracle for GeminiOracle {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, "Gemini generate request");

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await?;
            return Err(UpstreamError::Api { status, message });
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .filter_map(|part| part.text)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

fn data_section(observations: &Observations, social_label: &str, include_news: bool) -> String {
    let mut out = String::new();

    match &observations.weather {
        Some(weather) => {
            let temperature = weather
                .temperature_celsius
                .map_or("Unknown".to_string(), |t| format!("{t:.1}"));
            let _ = writeln!(out, "Current Weather: {}, Temperature: {temperature}°C", weather.weather);
        }
        None => {
            let _ = writeln!(out, "Current Weather: Unknown");
        }
    }
    let _ = writeln!(out);

    match observations.social.as_deref() {
        Some(posts) if !posts.is_empty() => {
            let negative = posts.iter().filter(|p| p.sentiment == Sentiment::Negative).count();
            let samples: Vec<&str> = posts.iter().take(3).map(|p| p.text.as_str()).collect();
            let _ = writeln!(
                out,
                "{social_label}: Available ({} posts, {negative} negative)",
                posts.len()
            );
            let _ = writeln!(out, "Sample posts: {samples:?}");
        }
        _ => {
            let _ = writeln!(out, "{social_label}: Limited or unavailable");
        }
    }

    if include_news {
        let _ = writeln!(out);
        match observations.news.as_deref() {
            Some(articles) if !articles.is_empty() => {
                let titles: Vec<&str> = articles.iter().take(3).map(|a| a.title.as_str()).collect();
                let _ = writeln!(out, "News Data: Available ({} articles)", articles.len());
                let _ = writeln!(out, "Sample titles: {titles:?}");
            }
            _ => {
                let _ = writeln!(out, "News Data: Limited or unavailable");
            }
        }
    }

    out
}

pub fn city_prompt(city: &str, observations: &Observations, is_rainy: bool) -> String {
    let mut context = format!(
        "{city} Context:\n\
         - The city is prone to waterlogging during rainfall in several areas\n\
         - Traffic congestion is common at major junctions like Silk Board, KR Puram, and Hebbal\n\
         - Infrastructure issues include potholes and road quality problems, especially after rainfall\n"
    );
    if is_rainy {
        context.push_str(
            "- During rainfall, waterlogging is common in low-lying areas and underpasses\n\
             - Traffic congestion worsens significantly during rainfall\n\
             - Potholes can form quickly after heavy rainfall\n",
        );
    }

    format!(
        "You are a civic issue prediction system for {city}, India. Based on the provided data, \
         predict potential civic issues in the next 24-48 hours. Focus on flooding, traffic \
         congestion, and infrastructure problems.\n\n\
         DATA:\n{data}\n{context}\n\
         Be specific about locations. If there's rain, emphasize waterlogging predictions.\n\n\
         Respond with a JSON object with these exact keys:\n\
         - summary (2-3 sentences)\n\
         - flood_alerts (array of objects with 'area', 'risk_level' high/medium/low, and 'prediction')\n\
         - traffic_alerts (array of objects with 'area', 'congestion_level' high/medium/low, and 'prediction')\n\
         - infrastructure_alerts (array of objects with 'area', 'issue_type', 'risk_level', and 'prediction')\n\
         - confidence_score (number between 0.5 and 0.9)\n",
        data = data_section(observations, "Social Media Data", true),
    )
}

pub fn area_prompt(city: &str, area: &str, observations: &Observations, is_rainy: bool) -> String {
    let mut context = format!(
        "{area} Context:\n\
         - Located in {city}\n\
         - Has typical urban issues including traffic congestion and infrastructure challenges\n"
    );
    if is_rainy {
        let _ = write!(
            context,
            "- During rainfall, parts of {area} may experience waterlogging\n\
             - Traffic congestion typically worsens in {area} during rainfall\n\
             - Road conditions in {area} can deteriorate after heavy rainfall\n"
        );
    }

    format!(
        "You are a civic issue prediction system for {city}, India. Based on the provided data, \
         predict potential civic issues in {area} for the next 24-48 hours. Focus on flooding, \
         traffic congestion, and infrastructure problems.\n\n\
         DATA:\n{data}\n{context}\n\
         Be very specific about locations within {area}. If there's rain, emphasize waterlogging \
         predictions.\n\n\
         Respond with a JSON object with these exact keys:\n\
         - summary (2-3 sentences)\n\
         - alerts (array of objects with 'location', 'issue', 'severity' high/medium/low, and 'details')\n\
         - hotspots (array of objects with 'location', 'issue', and 'severity')\n\
         - recommendations (newline-separated list of practical recommendations)\n\
         - confidence_score (number between 0.5 and 0.9)\n",
        data = data_section(observations, &format!("Social Media Data for {area}"), false),
    )
}

pub const WEATHER_BRIEF: &str = "Here is the weather information for the specified location. \
     Summarize the key weather conditions, forecasts, and any relevant alerts. Focus on \
     extracting important details that users need to know. Keep the summary concise but \
     informative.";

pub fn social_brief(city: &str) -> String {
    format!(
        "You are given a list of recent posts about civic issues in {city}.\n\n\
         If the posts mention specific areas, group them by area and write a short summary for \
         each area highlighting common issues, concerns, and sentiments. If area information is \
         missing or minimal, write a single general summary.\n\n\
         Focus on recurring civic problems and useful insights for decision-makers. Keep \
         summaries concise but informative."
    )
}

/// Free-text digest request: instructions, then the raw material.
pub fn digest_prompt(brief: &str, input: &str) -> String {
    format!("{}\n\nUser: {input}", brief.trim())
}

// Every field decodes on its own: a value of the wrong type counts as absent
// and is later filled per field, instead of failing the whole reply.

#[derive(Deserialize)]
struct CityWire {
    #[serde(default, deserialize_with = "lenient")]
    summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    flood_alerts: Option<Vec<CityAlertWire>>,
    #[serde(default, deserialize_with = "lenient_list")]
    traffic_alerts: Option<Vec<CityAlertWire>>,
    #[serde(default, deserialize_with = "lenient_list")]
    infrastructure_alerts: Option<Vec<CityAlertWire>>,
    #[serde(default, deserialize_with = "lenient_score")]
    confidence_score: Option<f64>,
}

#[derive(Deserialize)]
struct CityAlertWire {
    #[serde(default, deserialize_with = "lenient")]
    area: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    risk_level: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    congestion_level: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    issue_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    prediction: Option<String>,
}

#[derive(Deserialize)]
struct AreaWire {
    #[serde(default, deserialize_with = "lenient")]
    summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    alerts: Option<Vec<AreaAlertWire>>,
    #[serde(default, deserialize_with = "lenient_list")]
    hotspots: Option<Vec<HotspotWire>>,
    #[serde(default, deserialize_with = "lenient")]
    recommendations: Option<RecommendationsWire>,
    #[serde(default, deserialize_with = "lenient_score")]
    confidence_score: Option<f64>,
}

#[derive(Deserialize)]
struct AreaAlertWire {
    #[serde(default, deserialize_with = "lenient")]
    location: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    issue: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    severity: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    details: Option<String>,
}

#[derive(Deserialize)]
struct HotspotWire {
    #[serde(default, deserialize_with = "lenient")]
    location: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    issue: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    severity: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecommendationsWire {
    Text(String),
    List(Vec<String>),
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Keeps the well-formed items; anything but an array is absent.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        )),
        other => {
            debug!(value = %other, "Ignoring non-list oracle field");
            Ok(None)
        }
    }
}

/// A number, or a string holding one.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

/// The JSON object inside a response, ignoring code fences and chatter.
fn json_body(text: &str) -> &str {
    let text = text.trim();
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

fn decode<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, FallbackReason> {
    if text.trim().is_empty() {
        return Err(FallbackReason::EmptyResponse);
    }
    serde_json::from_str(json_body(text)).map_err(|err| FallbackReason::Unusable(err.to_string()))
}

fn location_or_unknown(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "Unknown location".to_string())
}

fn details_or_default(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "No details available".to_string())
}

fn city_alerts(items: Option<Vec<CityAlertWire>>, source: AlertSource) -> Option<Vec<Alert>> {
    let (category, default_issue) = match source {
        AlertSource::Flood => (Category::Flooding, IssueKind::Waterlogging),
        AlertSource::Traffic => (Category::Traffic, IssueKind::TrafficCongestion),
        AlertSource::Infrastructure | AlertSource::Area => (
            Category::Infrastructure,
            IssueKind::Other("infrastructure issue".to_string()),
        ),
    };

    items.map(|items| {
        items
            .into_iter()
            .map(|item| {
                let severity = severity::resolve(
                    source,
                    SeverityFields {
                        risk_level: item.risk_level.as_deref(),
                        congestion_level: item.congestion_level.as_deref(),
                        severity: None,
                    },
                );
                let issue = match (source, item.issue_type) {
                    (AlertSource::Infrastructure, Some(label)) if !label.trim().is_empty() => {
                        IssueKind::from(label)
                    }
                    _ => default_issue.clone(),
                };
                Alert {
                    location: location_or_unknown(item.area),
                    issue,
                    details: details_or_default(item.prediction),
                    severity,
                    category,
                }
            })
            .collect()
    })
}

pub fn parse_city(text: &str) -> Result<CityDraft, FallbackReason> {
    let wire: CityWire = decode(text)?;
    let draft = CityDraft {
        summary: wire.summary,
        flood_alerts: city_alerts(wire.flood_alerts, AlertSource::Flood),
        traffic_alerts: city_alerts(wire.traffic_alerts, AlertSource::Traffic),
        infrastructure_alerts: city_alerts(wire.infrastructure_alerts, AlertSource::Infrastructure),
        confidence_score: wire.confidence_score,
    };

    if missing_fields(&draft, CITY_FIELDS).len() == CITY_FIELDS.len() {
        return Err(FallbackReason::Unusable("no recognised fields".into()));
    }
    Ok(draft)
}

pub fn parse_area(text: &str) -> Result<AreaDraft, FallbackReason> {
    let wire: AreaWire = decode(text)?;

    let alerts = wire.alerts.map(|items| {
        items
            .into_iter()
            .map(|item| {
                let issue = item
                    .issue
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| "general issue".to_string());
                Alert {
                    category: severity::infer_category(&issue),
                    severity: severity::resolve(
                        AlertSource::Area,
                        SeverityFields {
                            severity: item.severity.as_deref(),
                            ..SeverityFields::default()
                        },
                    ),
                    location: location_or_unknown(item.location),
                    issue: IssueKind::from(issue),
                    details: details_or_default(item.details),
                }
            })
            .collect()
    });

    let hotspots = wire.hotspots.map(|items| {
        items
            .into_iter()
            .map(|item| Hotspot {
                location: location_or_unknown(item.location),
                issue: item.issue.unwrap_or_else(|| "Unknown issue".to_string()),
                severity: severity::coerce(item.severity.as_deref()),
            })
            .collect()
    });

    let recommendations = wire.recommendations.map(|recs| match recs {
        RecommendationsWire::Text(text) => recommend::split_lines(&text),
        RecommendationsWire::List(lines) => lines
            .iter()
            .map(|line| recommend::strip_bullet(line))
            .filter(|line| !line.is_empty())
            .collect(),
    });

    let draft = AreaDraft {
        summary: wire.summary,
        alerts,
        hotspots,
        recommendations,
        confidence_score: wire.confidence_score,
    };

    if missing_fields(&draft, AREA_FIELDS).len() == AREA_FIELDS.len() {
        return Err(FallbackReason::Unusable("no recognised fields".into()));
    }
    Ok(draft)
}
