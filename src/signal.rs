use crate::models::Signal;
use crate::sources::{NewsArticle, SocialPost, WeatherReport};

const RAIN_TERMS: [&str; 4] = ["rain", "shower", "drizzle", "thunderstorm"];

/// Raw upstream payloads gathered for one request. Any of them may be absent.
#[derive(Debug, Clone, Default)]
pub struct Observations {
    pub weather: Option<WeatherReport>,
    pub social: Option<Vec<SocialPost>>,
    pub news: Option<Vec<NewsArticle>>,
}

impl Observations {
    pub fn signal(&self, area: Option<&str>) -> Signal {
        Signal {
            is_rainy: is_rainy(self.weather.as_ref().map(|w| w.weather.as_str())),
            has_social_signal: self.social.as_ref().is_some_and(|posts| !posts.is_empty()),
            has_news_signal: self.news.as_ref().is_some_and(|articles| !articles.is_empty()),
            area: area.map(str::to_string),
        }
    }

    pub fn has_weather(&self) -> bool {
        self.weather.is_some()
    }
}

/// True iff the descriptor mentions rain, showers, drizzle or thunderstorms.
pub fn is_rainy(descriptor: Option<&str>) -> bool {
    descriptor.is_some_and(|text| {
        let text = text.to_lowercase();
        RAIN_TERMS.iter().any(|term| text.contains(term))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather(descriptor: &str) -> WeatherReport {
        WeatherReport {
            city: "Bengaluru".into(),
            weather: descriptor.into(),
            temperature_celsius: Some(24.0),
            feels_like_celsius: None,
            min_temperature_celsius: None,
            max_temperature_celsius: None,
        }
    }

    #[test]
    fn rain_terms_match_case_insensitively() {
        assert!(is_rainy(Some("Light RAIN")));
        assert!(is_rainy(Some("scattered showers")));
        assert!(is_rainy(Some("drizzle")));
        assert!(is_rainy(Some("thunderstorm with heavy rain")));
        assert!(!is_rainy(Some("overcast clouds")));
        assert!(!is_rainy(Some("Unknown")));
        assert!(!is_rainy(Some("")));
        assert!(!is_rainy(None));
    }

    #[test]
    fn empty_collections_are_not_signals() {
        let observations = Observations {
            weather: Some(weather("haze")),
            social: Some(vec![]),
            news: None,
        };
        let signal = observations.signal(Some("Whitefield"));
        assert!(!signal.is_rainy);
        assert!(!signal.has_social_signal);
        assert!(!signal.has_news_signal);
        assert_eq!(signal.area.as_deref(), Some("Whitefield"));
    }

    #[test]
    fn populated_collections_are_signals() {
        let observations = Observations {
            weather: Some(weather("moderate rain")),
            social: Some(vec![SocialPost::new("Silk Board flooded", None, "civic")]),
            news: Some(vec![NewsArticle {
                title: "Rain alert".into(),
                description: None,
                url: None,
                published_at: "2025-06-01T08:30:00+00:00".into(),
            }]),
        };
        let signal = observations.signal(None);
        assert!(signal.is_rainy && signal.has_social_signal && signal.has_news_signal);
        assert!(observations.has_weather());
    }
}
