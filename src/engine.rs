use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::completion::{self, AREA_FIELDS, CITY_FIELDS};
use crate::config::Config;
use crate::error::{FallbackReason, UpstreamError};
use crate::fallback;
use crate::knowledge::KnowledgeBase;
use crate::models::{Forecast, PredictionResult, Provenance, Scope, Signal};
use crate::oracle::{self, GeminiOracle, Oracle};
use crate::signal::Observations;
use crate::sources::{
    Disabled, Mediastack, NewsArticle, NewsProvider, OpenWeather, SocialProvider, TwitterSearch,
    WeatherProvider, WeatherReport,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const CIVIC_TERMS: &str =
    "flood OR waterlogging OR pothole OR traffic OR road condition OR power cut OR water supply";
const DIGEST_TERMS: &str = "issue OR problem";

/// A weather report plus an oracle-written digest when the oracle answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    #[serde(flatten)]
    pub report: WeatherReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Result of the first pipeline stage.
enum Outcome<D> {
    Drafted(D),
    Fallback(FallbackReason),
}

/// Runs city-wide and area-scoped predictions. Cheap to share behind an
/// `Arc`; every call builds and owns its own request state.
pub struct Predictor {
    kb: Arc<KnowledgeBase>,
    city: String,
    weather: Arc<dyn WeatherProvider>,
    social: Arc<dyn SocialProvider>,
    news: Arc<dyn NewsProvider>,
    oracle: Option<Arc<dyn Oracle>>,
    timeout: Duration,
}

impl Predictor {
    /// No upstream sources and no oracle: every prediction is a fallback.
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self {
            city: kb.city().to_string(),
            kb,
            weather: Arc::new(Disabled("weather provider")),
            social: Arc::new(Disabled("social provider")),
            news: Arc::new(Disabled("news provider")),
            oracle: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(config: &Config, kb: Arc<KnowledgeBase>) -> Self {
        let oracle = config
            .gemini_api_key
            .as_deref()
            .map(|key| Arc::new(GeminiOracle::new(key, &config.oracle_model)) as Arc<dyn Oracle>);

        let predictor = Self::new(kb)
            .with_city(&config.city)
            .with_weather(Arc::new(OpenWeather::new(config.weather_api_key.clone())))
            .with_social(Arc::new(TwitterSearch::new(config.twitter_api_key.clone())))
            .with_news(Arc::new(Mediastack::new(config.news_api_key.clone(), &config.city)))
            .with_timeout(config.upstream_timeout);

        match oracle {
            Some(oracle) => predictor.with_oracle(oracle),
            None => predictor,
        }
    }

    pub fn with_city(mut self, city: &str) -> Self {
        self.city = city.to_string();
        self
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherProvider>) -> Self {
        self.weather = weather;
        self
    }

    pub fn with_social(mut self, social: Arc<dyn SocialProvider>) -> Self {
        self.social = social;
        self
    }

    pub fn with_news(mut self, news: Arc<dyn NewsProvider>) -> Self {
        self.news = news;
        self
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn predict_city(&self) -> Forecast {
        let span = info_span!("predict", request_id = %Uuid::new_v4(), scope = "city");
        self.run_city(Local::now().date_naive()).instrument(span).await
    }

    pub async fn predict_area(&self, area: &str) -> Forecast {
        let span = info_span!("predict", request_id = %Uuid::new_v4(), scope = %area);
        self.run_area(area, Local::now().date_naive()).instrument(span).await
    }

    async fn run_city(&self, today: NaiveDate) -> Forecast {
        info!(city = %self.city, "Starting city-wide prediction");
        let query = format!("{} {CIVIC_TERMS}", self.city.to_lowercase());

        let (weather, social, news) = tokio::join!(
            self.bounded("weather", self.weather.current(&self.city)),
            self.bounded("social", self.social.fetch(&query, "civic")),
            self.bounded("news", self.news.fetch()),
        );
        let observations = Observations {
            weather,
            social: social.flatten(),
            news: news.flatten(),
        };
        let signal = observations.signal(None);

        let preconditions = if !observations.has_weather() {
            Err(FallbackReason::InsufficientSignals("no weather report"))
        } else if !signal.has_social_signal {
            Err(FallbackReason::InsufficientSignals("no social posts"))
        } else if !signal.has_news_signal {
            Err(FallbackReason::InsufficientSignals("no news articles"))
        } else {
            Ok(())
        };

        let outcome = self
            .consult(
                preconditions,
                || oracle::city_prompt(&self.city, &observations, signal.is_rainy),
                oracle::parse_city,
            )
            .await;

        let build_fallback = || fallback::city(&self.kb, &self.city, signal.is_rainy, today);
        let (draft, provenance) = match outcome {
            Outcome::Drafted(draft) => {
                let (draft, filled) = completion::complete(draft, CITY_FIELDS, build_fallback);
                log_filled(&filled);
                (draft, Provenance::Oracle)
            }
            Outcome::Fallback(reason) => {
                log_fallback(&reason);
                (build_fallback(), Provenance::Fallback)
            }
        };

        self.forecast(Scope::City, signal, draft.seal(), provenance)
    }

    async fn run_area(&self, area: &str, today: NaiveDate) -> Forecast {
        info!(city = %self.city, area, "Starting area prediction");
        let query = format!("{area} {} {CIVIC_TERMS}", self.city.to_lowercase());

        let (weather, social) = tokio::join!(
            self.bounded("weather", self.weather.current(&self.city)),
            self.bounded("social", self.social.fetch(&query, "civic")),
        );
        let observations = Observations {
            weather,
            social: social.flatten(),
            news: None,
        };
        let signal = observations.signal(Some(area));

        let preconditions = if !observations.has_weather() {
            Err(FallbackReason::InsufficientSignals("no weather report"))
        } else if !signal.has_social_signal {
            Err(FallbackReason::InsufficientSignals("no social posts"))
        } else {
            Ok(())
        };

        let outcome = self
            .consult(
                preconditions,
                || oracle::area_prompt(&self.city, area, &observations, signal.is_rainy),
                oracle::parse_area,
            )
            .await;

        let build_fallback = || fallback::area(&self.kb, area, signal.is_rainy, today);
        let (draft, provenance) = match outcome {
            Outcome::Drafted(draft) => {
                let (draft, filled) = completion::complete(draft, AREA_FIELDS, build_fallback);
                log_filled(&filled);
                (draft, Provenance::Oracle)
            }
            Outcome::Fallback(reason) => {
                log_fallback(&reason);
                if self.kb.lookup(area).is_none() {
                    info!(area, "Area not in knowledge base, using generic alerts");
                }
                (build_fallback(), Provenance::Fallback)
            }
        };

        self.forecast(Scope::Area(area.to_string()), signal, draft.seal(), provenance)
    }

    fn forecast(
        &self,
        scope: Scope,
        signal: Signal,
        result: PredictionResult,
        provenance: Provenance,
    ) -> Forecast {
        let forecast = Forecast {
            scope,
            city: self.city.clone(),
            signal,
            result,
            provenance,
        };
        info!(
            alerts = forecast.result.alerts.len(),
            confidence = forecast.result.confidence_score,
            provenance = ?forecast.provenance,
            rainy = forecast.signal.is_rainy,
            "Prediction ready"
        );
        forecast
    }

    /// Current weather for `query` with a short digest. Fails only when the
    /// weather itself is unavailable; a missing digest is logged and skipped.
    pub async fn weather_summary(&self, query: &str) -> Result<WeatherSummary, UpstreamError> {
        let report = self.within(self.weather.current(query)).await?;
        let summary = match &self.oracle {
            Some(oracle) => {
                let input = serde_json::to_string(&report)?;
                let prompt = oracle::digest_prompt(oracle::WEATHER_BRIEF, &input);
                match self.within(oracle.generate(&prompt)).await {
                    Ok(text) if !text.trim().is_empty() => Some(text),
                    Ok(_) => None,
                    Err(err) => {
                        warn!(error = %err, "Weather digest failed");
                        None
                    }
                }
            }
            None => None,
        };
        Ok(WeatherSummary { report, summary })
    }

    /// Oracle digest of recent civic posts for the city.
    pub async fn social_summary(&self) -> Result<String, UpstreamError> {
        let query = format!("{} {DIGEST_TERMS}", self.city.to_lowercase());
        let posts = self
            .within(self.social.fetch(&query, "civic"))
            .await?
            .unwrap_or_default();
        if posts.is_empty() {
            return Ok(format!("No recent civic issue posts found for {}.", self.city));
        }

        let oracle = self
            .oracle
            .as_ref()
            .ok_or(UpstreamError::NotConfigured("text-generation oracle"))?;
        let texts: Vec<&str> = posts.iter().map(|post| post.text.as_str()).collect();
        let prompt = oracle::digest_prompt(&oracle::social_brief(&self.city), &texts.join("\n"));
        self.within(oracle.generate(&prompt)).await
    }

    /// Recent city news, newest first. Empty when the provider had nothing.
    pub async fn recent_news(&self) -> Result<Vec<NewsArticle>, UpstreamError> {
        Ok(self.within(self.news.fetch()).await?.unwrap_or_default())
    }

    async fn within<T>(
        &self,
        call: impl Future<Output = Result<T, UpstreamError>>,
    ) -> Result<T, UpstreamError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| UpstreamError::Timeout(self.timeout))?
    }

    /// Awaits an upstream call under the timeout; failures become `None`.
    async fn bounded<T>(
        &self,
        source: &'static str,
        call: impl Future<Output = Result<T, UpstreamError>>,
    ) -> Option<T> {
        match self.within(call).await {
            Ok(value) => Some(value),
            Err(UpstreamError::NotConfigured(what)) => {
                info!(source, "Skipping fetch, {what} is not configured");
                None
            }
            Err(err) => {
                warn!(source, error = %err, "Upstream fetch failed");
                None
            }
        }
    }

    /// Single oracle attempt, no retry.
    async fn consult<D>(
        &self,
        preconditions: Result<(), FallbackReason>,
        prompt: impl FnOnce() -> String,
        parse: fn(&str) -> Result<D, FallbackReason>,
    ) -> Outcome<D> {
        if let Err(reason) = preconditions {
            return Outcome::Fallback(reason);
        }
        let Some(oracle) = &self.oracle else {
            return Outcome::Fallback(FallbackReason::NoOracle);
        };

        let prompt = prompt();
        let text = match self.within(oracle.generate(&prompt)).await {
            Ok(text) => text,
            Err(err) => return Outcome::Fallback(err.into()),
        };

        match parse(&text) {
            Ok(draft) => Outcome::Drafted(draft),
            Err(reason) => Outcome::Fallback(reason),
        }
    }
}

fn log_fallback(reason: &FallbackReason) {
    match reason {
        FallbackReason::InsufficientSignals(_) | FallbackReason::NoOracle => {
            info!(reason = %reason, "Using knowledge-base fallback");
        }
        _ => warn!(reason = %reason, "Oracle failed, using knowledge-base fallback"),
    }
}

fn log_filled(filled: &[&'static str]) {
    for field in filled {
        info!(field, "Oracle prediction missing field, filled from fallback");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::models::{Category, Severity};
    use crate::severity::bucket;
    use crate::sources::{NewsArticle, SocialPost, WeatherReport};

    struct StubWeather(&'static str);

    #[async_trait]
    impl WeatherProvider for StubWeather {
        async fn current(&self, city: &str) -> Result<WeatherReport, UpstreamError> {
            Ok(WeatherReport {
                city: city.to_string(),
                weather: self.0.to_string(),
                temperature_celsius: Some(23.0),
                feels_like_celsius: None,
                min_temperature_celsius: None,
                max_temperature_celsius: None,
            })
        }
    }

    struct StubSocial;

    #[async_trait]
    impl SocialProvider for StubSocial {
        async fn fetch(
            &self,
            _query: &str,
            category: &str,
        ) -> Result<Option<Vec<SocialPost>>, UpstreamError> {
            Ok(Some(vec![SocialPost::new("Waterlogging near Silk Board", None, category)]))
        }
    }

    struct StubNews;

    #[async_trait]
    impl NewsProvider for StubNews {
        async fn fetch(&self) -> Result<Option<Vec<NewsArticle>>, UpstreamError> {
            Ok(Some(vec![NewsArticle {
                title: "Heavy rain forecast".into(),
                description: None,
                url: None,
                published_at: "2026-10-17T06:00:00+00:00".into(),
            }]))
        }
    }

    enum Reply {
        Fail,
        Hang,
        Text(&'static str),
    }

    struct StubOracle {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl StubOracle {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Oracle for StubOracle {
        async fn generate(&self, _prompt: &str) -> Result<String, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Fail => Err(UpstreamError::Api {
                    status: 503,
                    message: "overloaded".into(),
                }),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(String::new())
                }
                Reply::Text(text) => Ok(text.to_string()),
            }
        }
    }

    fn kb() -> Arc<KnowledgeBase> {
        Arc::new(KnowledgeBase::seeded())
    }

    fn live(weather: &'static str, oracle: Arc<StubOracle>) -> Predictor {
        Predictor::new(kb())
            .with_weather(Arc::new(StubWeather(weather)))
            .with_social(Arc::new(StubSocial))
            .with_news(Arc::new(StubNews))
            .with_oracle(oracle)
            .with_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn rainy_koramangala_without_oracle() {
        let predictor = Predictor::new(kb()).with_weather(Arc::new(StubWeather("light rain")));
        let forecast = predictor.predict_area("koramangala").await;

        assert!(forecast.signal.is_rainy);
        assert_eq!(forecast.provenance, Provenance::Fallback);
        assert_eq!(forecast.result.confidence_percent(), 60);
        assert!(forecast.result.alerts.iter().any(|alert| {
            alert.location == "80 Feet Road near Sony World Signal"
                && alert.severity == Severity::High
                && alert.category == Category::Flooding
        }));
    }

    #[tokio::test]
    async fn dry_city_without_oracle() {
        let predictor = Predictor::new(kb()).with_weather(Arc::new(StubWeather("clear sky")));
        let forecast = predictor.predict_city().await;

        assert_eq!(forecast.result.confidence_percent(), 70);
        let buckets = bucket(&forecast.result.alerts);
        let traffic: Vec<&str> = buckets
            .high
            .iter()
            .filter(|alert| alert.category == Category::Traffic)
            .map(|alert| alert.location.as_str())
            .collect();
        assert_eq!(traffic, vec!["Silk Board Junction", "Hebbal Flyover", "Outer Ring Road"]);
    }

    #[tokio::test]
    async fn oracle_failure_never_propagates() {
        let oracle = StubOracle::new(Reply::Fail);
        let predictor = live("moderate rain", oracle.clone());

        let city = predictor.predict_city().await;
        assert_eq!(city.provenance, Provenance::Fallback);
        assert!(!city.result.alerts.is_empty());

        let area = predictor.predict_area("whitefield").await;
        assert!(!area.result.alerts.is_empty());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn oracle_timeout_falls_back() {
        let predictor = live("haze", StubOracle::new(Reply::Hang));
        let forecast = predictor.predict_city().await;
        assert_eq!(forecast.provenance, Provenance::Fallback);
        assert_eq!(forecast.result.confidence_percent(), 70);
    }

    #[tokio::test]
    async fn empty_oracle_reply_falls_back() {
        let predictor = live("haze", StubOracle::new(Reply::Text("")));
        let forecast = predictor.predict_area("Indiranagar").await;
        assert_eq!(forecast.provenance, Provenance::Fallback);
        assert_eq!(forecast.result.confidence_percent(), 60);
    }

    #[tokio::test]
    async fn partial_oracle_reply_is_completed_per_field() {
        let reply = r#"{"summary": "Oracle says traffic.",
            "traffic_alerts": [{"area": "KR Puram", "congestion_level": "high", "prediction": "Jams"}]}"#;
        let predictor = live("clear sky", StubOracle::new(Reply::Text(reply)));
        let forecast = predictor.predict_city().await;

        assert_eq!(forecast.provenance, Provenance::Oracle);
        assert_eq!(forecast.result.summary, "Oracle says traffic.");
        assert_eq!(forecast.result.confidence_percent(), 70);
        let traffic: Vec<_> = forecast.result.alerts_in(Category::Traffic).collect();
        assert_eq!(traffic.len(), 1);
        assert_eq!(traffic[0].location, "KR Puram");
        assert_eq!(forecast.result.alerts_in(Category::Flooding).count(), 3);
    }

    #[tokio::test]
    async fn partial_area_reply_keeps_oracle_fields_and_fills_the_rest() {
        let reply = r#"{"summary": "Showers over Koramangala this evening.",
            "alerts": [{"location": "Forum Mall junction", "issue": "Waterlogging",
                        "severity": "high", "details": "Standing water after showers"}]}"#;
        let predictor = live("light rain", StubOracle::new(Reply::Text(reply)));
        let forecast = predictor.predict_area("Koramangala").await;

        assert_eq!(forecast.provenance, Provenance::Oracle);
        assert_eq!(forecast.result.summary, "Showers over Koramangala this evening.");
        assert_eq!(forecast.result.alerts.len(), 1);
        let alert = &forecast.result.alerts[0];
        assert_eq!(alert.location, "Forum Mall junction");
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.category, Category::Flooding);

        assert_eq!(forecast.result.hotspots.len(), 6);
        assert!(forecast.result.recommendations[0]
            .contains("Plan travel routes through Koramangala"));
        assert_eq!(forecast.result.confidence_percent(), 60);
    }

    #[tokio::test]
    async fn city_needs_news_before_consulting_oracle() {
        let oracle = StubOracle::new(Reply::Fail);
        let predictor = Predictor::new(kb())
            .with_weather(Arc::new(StubWeather("light rain")))
            .with_social(Arc::new(StubSocial))
            .with_oracle(oracle.clone());

        predictor.predict_city().await;
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);

        predictor.predict_area("Marathahalli").await;
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_area_uses_generic_alerts() {
        let forecast = Predictor::new(kb()).predict_area("Hebbal").await;
        assert_eq!(forecast.result.confidence_percent(), 50);
        assert!(forecast
            .result
            .alerts
            .iter()
            .all(|alert| alert.location.contains("Hebbal")));
        assert_eq!(forecast.area(), Some("Hebbal"));
    }
}
