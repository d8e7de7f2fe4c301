use std::io::Read;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::UpstreamError;

const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const TWITTER_SEARCH_URL: &str = "https://api.twitterapi.io/twitter/tweet/advanced_search";
const MEDIASTACK_URL: &str = "http://api.mediastack.com/v1/news";

/// Posts and articles older than this are ignored.
const RECENT_DAYS: i64 = 15;

const CIVIC_HASHTAGS: &[&str] = &[
    "bengalururains",
    "bangalorefloods",
    "bescom",
    "bengalurupowercuts",
    "bbmp",
    "bwssb",
];

const KNOWN_AREAS: &[&str] = &[
    "whitefield", "electronic city", "koramangala", "indiranagar", "jayanagar",
    "hsr layout", "marathahalli", "jp nagar", "bannerghatta", "hebbal",
    "bellandur", "sarjapur", "mahadevapura", "yelahanka", "btm layout",
    "malleshwaram", "rr nagar", "basavanagudi", "kengeri", "banashankari",
];

const POSITIVE_WORDS: &[&str] = &["fixed", "resolved", "thank", "good", "working", "restored", "solved"];
const NEGATIVE_WORDS: &[&str] = &[
    "problem", "issue", "outage", "down", "broken", "fail", "terrible", "pathetic",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    /// Free-text descriptor, e.g. "light rain".
    pub weather: String,
    pub temperature_celsius: Option<f64>,
    pub feels_like_celsius: Option<f64>,
    pub min_temperature_celsius: Option<f64>,
    pub max_temperature_celsius: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn of(text: &str) -> Self {
        let text = text.to_lowercase();
        let positive = POSITIVE_WORDS.iter().filter(|w| text.contains(*w)).count();
        let negative = NEGATIVE_WORDS.iter().filter(|w| text.contains(*w)).count();
        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub sentiment: Sentiment,
    pub mentioned_areas: Vec<String>,
    pub category: String,
}

impl SocialPost {
    pub fn new(text: impl Into<String>, created_at: Option<DateTime<Utc>>, category: &str) -> Self {
        let text = text.into();
        let lowered = text.to_lowercase();
        Self {
            sentiment: Sentiment::of(&text),
            mentioned_areas: KNOWN_AREAS
                .iter()
                .filter(|area| lowered.contains(*area))
                .map(|area| area.to_string())
                .collect(),
            category: category.to_string(),
            created_at,
            text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub published_at: String,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, city: &str) -> Result<WeatherReport, UpstreamError>;
}

/// `Ok(None)` means the provider answered but had nothing recent.
#[async_trait]
pub trait SocialProvider: Send + Sync {
    async fn fetch(&self, query: &str, category: &str)
        -> Result<Option<Vec<SocialPost>>, UpstreamError>;
}

#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn fetch(&self) -> Result<Option<Vec<NewsArticle>>, UpstreamError>;
}

fn recent_cutoff() -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(RECENT_DAYS)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%a %b %d %H:%M:%S %z %Y"))
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

async fn api_error(response: reqwest::Response) -> UpstreamError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    UpstreamError::Api { status, message }
}

pub struct OpenWeather {
    api_key: Option<String>,
    http: reqwest::Client,
    base_url: String,
}

impl OpenWeather {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            http: reqwest::Client::new(),
            base_url: OPENWEATHER_URL.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct OwmResponse {
    #[serde(default)]
    weather: Vec<OwmCondition>,
    main: OwmMain,
}

#[derive(Deserialize)]
struct OwmCondition {
    description: String,
}

#[derive(Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
}

#[async_trait]
impl WeatherProvider for OpenWeather {
    async fn current(&self, city: &str) -> Result<WeatherReport, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("weather provider"))?;

        debug!(city, "OpenWeatherMap request");
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("q", city), ("appid", api_key), ("units", "metric")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: OwmResponse = response.json().await?;
        let condition = body
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::Malformed("weather list is empty".into()))?;

        Ok(WeatherReport {
            city: city.to_string(),
            weather: condition.description,
            temperature_celsius: Some(body.main.temp),
            feels_like_celsius: Some(body.main.feels_like),
            min_temperature_celsius: Some(body.main.temp_min),
            max_temperature_celsius: Some(body.main.temp_max),
        })
    }
}

pub struct TwitterSearch {
    api_key: Option<String>,
    http: reqwest::Client,
    base_url: String,
    max_posts: usize,
}

impl TwitterSearch {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            http: reqwest::Client::new(),
            base_url: TWITTER_SEARCH_URL.to_string(),
            max_posts: 100,
        }
    }

    pub fn civic_query(query: &str) -> String {
        let hashtags: Vec<String> = CIVIC_HASHTAGS.iter().map(|tag| format!("#{tag}")).collect();
        format!("({query}) AND (Bengaluru OR Bangalore) AND ({})", hashtags.join(" OR "))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TweetPage {
    #[serde(default)]
    tweets: Vec<RawTweet>,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTweet {
    #[serde(default)]
    text: String,
    created_at: Option<String>,
}

#[async_trait]
impl SocialProvider for TwitterSearch {
    async fn fetch(
        &self,
        query: &str,
        category: &str,
    ) -> Result<Option<Vec<SocialPost>>, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("social provider"))?;

        let full_query = Self::civic_query(query);
        let mut raw: Vec<RawTweet> = Vec::new();
        let mut cursor: Option<String> = None;

        while raw.len() < self.max_posts {
            let mut request = self
                .http
                .get(&self.base_url)
                .header("X-API-Key", api_key)
                .query(&[("query", full_query.as_str()), ("limit", "20")]);
            if let Some(cursor) = &cursor {
                request = request.query(&[("cursor", cursor.as_str())]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(api_error(response).await);
            }

            let page: TweetPage = response.json().await?;
            if page.tweets.is_empty() {
                break;
            }
            raw.extend(page.tweets);

            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => {
                    cursor = Some(next);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                None => break,
            }
        }
        raw.truncate(self.max_posts);

        let cutoff = recent_cutoff();
        let posts: Vec<SocialPost> = raw
            .into_iter()
            .map(|tweet| {
                let created_at = tweet.created_at.as_deref().and_then(parse_timestamp);
                SocialPost::new(tweet.text, created_at, category)
            })
            .filter(|post| post.created_at.map_or(true, |ts| ts >= cutoff))
            .collect();

        debug!(posts = posts.len(), "twitterapi.io search finished");
        Ok((!posts.is_empty()).then_some(posts))
    }
}

pub struct Mediastack {
    api_key: Option<String>,
    keywords: String,
    http: reqwest::Client,
    base_url: String,
}

impl Mediastack {
    pub fn new(api_key: Option<String>, city: &str) -> Self {
        Self {
            api_key,
            keywords: city.to_string(),
            http: reqwest::Client::new(),
            base_url: MEDIASTACK_URL.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct MediastackResponse {
    #[serde(default)]
    data: Vec<RawArticle>,
    error: Option<MediastackError>,
}

#[derive(Deserialize)]
struct MediastackError {
    info: Option<String>,
}

#[derive(Deserialize)]
struct RawArticle {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
}

#[async_trait]
impl NewsProvider for Mediastack {
    async fn fetch(&self) -> Result<Option<Vec<NewsArticle>>, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("news provider"))?;

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("access_key", api_key),
                ("countries", "in"),
                ("keywords", self.keywords.as_str()),
                ("sort", "published_desc"),
                ("limit", "100"),
            ])
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: MediastackResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(UpstreamError::Api {
                status,
                message: error.info.unwrap_or_else(|| "unknown mediastack error".into()),
            });
        }

        Ok(Some(recent_articles(body.data, recent_cutoff())))
    }
}

fn recent_articles(raw: Vec<RawArticle>, cutoff: DateTime<Utc>) -> Vec<NewsArticle> {
    raw.into_iter()
        .filter_map(|article| {
            let published_at = article.published_at?;
            let ts = parse_timestamp(&published_at)?;
            (ts >= cutoff).then(|| NewsArticle {
                title: article.title.unwrap_or_else(|| "Untitled".to_string()),
                description: article.description,
                url: article.url,
                published_at,
            })
        })
        .collect()
}

/// Fixed weather descriptor, e.g. from the command line.
pub struct StaticWeather {
    descriptor: Option<String>,
}

impl StaticWeather {
    pub fn new(descriptor: Option<String>) -> Self {
        Self { descriptor }
    }
}

#[async_trait]
impl WeatherProvider for StaticWeather {
    async fn current(&self, city: &str) -> Result<WeatherReport, UpstreamError> {
        let weather = self
            .descriptor
            .clone()
            .ok_or(UpstreamError::NotConfigured("weather descriptor"))?;
        Ok(WeatherReport {
            city: city.to_string(),
            weather,
            temperature_celsius: None,
            feels_like_celsius: None,
            min_temperature_celsius: None,
            max_temperature_celsius: None,
        })
    }
}

/// Social posts read once from a CSV export with at least a `text` column.
pub struct CsvPosts {
    posts: Vec<SocialPost>,
}

impl CsvPosts {
    pub fn from_path(path: &Path) -> Result<Self, UpstreamError> {
        let file = std::fs::File::open(path)
            .map_err(|err| UpstreamError::Malformed(format!("{}: {err}", path.display())))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(source: R) -> Result<Self, UpstreamError> {
        #[derive(Deserialize)]
        struct PostRow {
            text: Option<String>,
            created_at: Option<String>,
        }

        let mut reader = csv::Reader::from_reader(source);
        let mut posts = Vec::new();
        for row in reader.deserialize::<PostRow>() {
            let row = row?;
            let Some(text) = row.text.filter(|t| !t.trim().is_empty()) else {
                continue;
            };
            let created_at = row.created_at.as_deref().and_then(parse_timestamp);
            posts.push(SocialPost::new(text, created_at, "civic"));
        }
        Ok(Self { posts })
    }
}

#[async_trait]
impl SocialProvider for CsvPosts {
    async fn fetch(
        &self,
        _query: &str,
        category: &str,
    ) -> Result<Option<Vec<SocialPost>>, UpstreamError> {
        let posts: Vec<SocialPost> = self
            .posts
            .iter()
            .cloned()
            .map(|mut post| {
                post.category = category.to_string();
                post
            })
            .collect();
        Ok((!posts.is_empty()).then_some(posts))
    }
}

/// Stand-in for a provider with no backing source.
pub struct Disabled(pub &'static str);

#[async_trait]
impl WeatherProvider for Disabled {
    async fn current(&self, _city: &str) -> Result<WeatherReport, UpstreamError> {
        Err(UpstreamError::NotConfigured(self.0))
    }
}

#[async_trait]
impl SocialProvider for Disabled {
    async fn fetch(
        &self,
        _query: &str,
        _category: &str,
    ) -> Result<Option<Vec<SocialPost>>, UpstreamError> {
        Err(UpstreamError::NotConfigured(self.0))
    }
}

#[async_trait]
impl NewsProvider for Disabled {
    async fn fetch(&self) -> Result<Option<Vec<NewsArticle>>, UpstreamError> {
        Err(UpstreamError::NotConfigured(self.0))
    }
}
