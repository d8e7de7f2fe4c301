use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::models::Severity::{High, Low, Medium};
use crate::models::{Category, Severity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeSpot {
    pub location: String,
    pub severity: Severity,
    pub details: String,
}

/// Known problem spots for one area, split by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaKnowledge {
    pub name: String,
    pub flood: Vec<KnowledgeSpot>,
    pub traffic: Vec<KnowledgeSpot>,
    pub infrastructure: Vec<KnowledgeSpot>,
}

impl AreaKnowledge {
    pub fn spots(&self, category: Category) -> &[KnowledgeSpot] {
        match category {
            Category::Flooding => &self.flood,
            Category::Traffic => &self.traffic,
            Category::Infrastructure => &self.infrastructure,
        }
    }

    fn spots_mut(&mut self, category: Category) -> &mut Vec<KnowledgeSpot> {
        match category {
            Category::Flooding => &mut self.flood,
            Category::Traffic => &mut self.traffic,
            Category::Infrastructure => &mut self.infrastructure,
        }
    }

    fn missing_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|category| self.spots(*category).is_empty())
            .collect()
    }
}

/// Read-only catalog of known problem locations. Built once at startup and
/// shared behind an `Arc`; there are no mutation methods once it is frozen.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    city: String,
    general: AreaKnowledge,
    areas: BTreeMap<String, AreaKnowledge>,
}

impl KnowledgeBase {
    pub fn seeded() -> Self {
        let areas = SEEDED_AREAS
            .iter()
            .map(|seed| (seed.name.to_lowercase(), seed.build()))
            .collect();

        Self {
            city: "Bengaluru".to_string(),
            general: GENERAL.build(),
            areas,
        }
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    /// Case-insensitive exact match on the area name.
    pub fn lookup(&self, area: &str) -> Option<&AreaKnowledge> {
        self.areas.get(&area.to_lowercase())
    }

    pub fn general(&self) -> &AreaKnowledge {
        &self.general
    }

    pub fn area_names(&self) -> impl Iterator<Item = &str> {
        self.areas.values().map(|area| area.name.as_str())
    }

    pub fn merge_csv_file(self, path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open knowledge file {}", path.display()))?;
        self.merge_csv(file)
            .with_context(|| format!("failed to merge knowledge file {}", path.display()))
    }

    /// Merges `area,category,location,severity,details` rows. `general` as the
    /// area targets the city-wide group. Every area must still cover all three
    /// categories afterwards.
    pub fn merge_csv<R: Read>(mut self, source: R) -> anyhow::Result<Self> {
        #[derive(Deserialize)]
        struct KnowledgeRow {
            area: String,
            category: String,
            location: String,
            severity: String,
            details: String,
        }

        let mut reader = csv::Reader::from_reader(source);
        let mut merged = 0usize;

        for (index, result) in reader.deserialize::<KnowledgeRow>().enumerate() {
            let row = result?;
            let line = index + 2;
            let category = parse_category(&row.category)
                .with_context(|| format!("line {line}: unknown category {:?}", row.category))?;
            let severity = Severity::parse(&row.severity)
                .with_context(|| format!("line {line}: unknown severity {:?}", row.severity))?;

            let area = row.area.trim();
            let target = if area.eq_ignore_ascii_case("general") {
                &mut self.general
            } else {
                self.areas
                    .entry(area.to_lowercase())
                    .or_insert_with(|| AreaKnowledge {
                        name: area.to_string(),
                        ..AreaKnowledge::default()
                    })
            };

            target.spots_mut(category).push(KnowledgeSpot {
                location: row.location.trim().to_string(),
                severity,
                details: row.details.trim().to_string(),
            });
            merged += 1;
        }

        self.validate()?;
        tracing::info!(rows = merged, areas = self.areas.len(), "Merged knowledge rows");
        Ok(self)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for area in std::iter::once(&self.general).chain(self.areas.values()) {
            let missing = area.missing_categories();
            if !missing.is_empty() {
                let names: Vec<&str> = missing.iter().map(|c| c.as_str()).collect();
                bail!("area {:?} has no spots for: {}", area.name, names.join(", "));
            }
        }
        Ok(())
    }
}

fn parse_category(value: &str) -> Option<Category> {
    match value.trim().to_ascii_lowercase().as_str() {
        "flood" | "flooding" => Some(Category::Flooding),
        "traffic" => Some(Category::Traffic),
        "infrastructure" => Some(Category::Infrastructure),
        _ => None,
    }
}

type SeedSpot = (&'static str, Severity, &'static str);

struct SeedArea {
    name: &'static str,
    flood: &'static [SeedSpot],
    traffic: &'static [SeedSpot],
    infrastructure: &'static [SeedSpot],
}

impl SeedArea {
    fn build(&self) -> AreaKnowledge {
        let spots = |seed: &[SeedSpot]| -> Vec<KnowledgeSpot> {
            seed.iter()
                .map(|(location, severity, details)| KnowledgeSpot {
                    location: location.to_string(),
                    severity: *severity,
                    details: details.to_string(),
                })
                .collect()
        };

        AreaKnowledge {
            name: self.name.to_string(),
            flood: spots(self.flood),
            traffic: spots(self.traffic),
            infrastructure: spots(self.infrastructure),
        }
    }
}

const SEEDED_AREAS: &[SeedArea] = &[
    SeedArea {
        name: "Koramangala",
        flood: &[
            ("80 Feet Road near Sony World Signal", High, "Poor drainage system leads to significant waterlogging during moderate to heavy rainfall"),
            ("Koramangala 4th Block near Forum Mall", Medium, "Road tends to flood during rainfall, affecting traffic flow and pedestrian movement"),
            ("Koramangala 3rd Block near Jyoti Nivas College", Low, "Minor waterlogging possible during heavy rainfall"),
        ],
        traffic: &[
            ("Sony World Signal", High, "Major intersection with frequent congestion during peak hours (9-11 AM, 5-7 PM)"),
            ("Forum Mall junction", High, "Shopping area with heavy vehicle and pedestrian traffic, especially on weekends"),
            ("80 Feet Road", Medium, "Main thoroughfare with moderate to heavy traffic throughout the day"),
        ],
        infrastructure: &[
            ("Inner roads of 5th Block", Medium, "Multiple potholes reported after recent rainfall"),
            ("Drainage system near Raheja Arcade", Low, "Aging infrastructure that may cause issues during heavy rainfall"),
            ("Road quality in parts of 1st Block", Medium, "Uneven surfaces and patches that can worsen after rain"),
        ],
    },
    SeedArea {
        name: "Whitefield",
        flood: &[
            ("ITPL Main Road junction", High, "Prone to severe waterlogging during rainfall due to inadequate drainage"),
            ("Hope Farm junction", Medium, "Water accumulation during moderate to heavy rainfall"),
            ("Varthur Kodi", High, "Area near Varthur Lake experiences significant flooding during monsoon"),
        ],
        traffic: &[
            ("Graphite India signal", High, "Major bottleneck during peak hours with traffic jams extending for kilometers"),
            ("ITPL Main Road", High, "Heavy traffic throughout the day due to IT companies and residential complexes"),
            ("Whitefield Main Road", Medium, "Congestion due to ongoing metro construction and narrow road width"),
        ],
        infrastructure: &[
            ("Roads near Phoenix Marketcity", Medium, "Multiple potholes that worsen during rainy season"),
            ("Whitefield Main Road", High, "Ongoing metro construction causing road quality issues"),
            ("Hoodi Circle", Medium, "Deteriorating road conditions reported by residents"),
        ],
    },
    SeedArea {
        name: "Indiranagar",
        flood: &[
            ("100 Feet Road near CMH Road junction", Medium, "Water accumulation during moderate to heavy rainfall"),
            ("Doopanahalli underpass", High, "Prone to flooding during rainfall, sometimes becoming impassable"),
            ("Low-lying areas near Old Airport Road", Low, "Minor waterlogging possible during heavy rainfall"),
        ],
        traffic: &[
            ("100 Feet Road", High, "Commercial hub with heavy traffic throughout the day and evening"),
            ("Double Road junction", Medium, "Congestion during peak hours due to narrow road width"),
            ("CMH Road", Medium, "Shopping area with heavy vehicle and pedestrian traffic, especially on weekends"),
        ],
        infrastructure: &[
            ("Inner roads of HAL 2nd Stage", Medium, "Aging roads with multiple patches and potholes"),
            ("Drainage system in Old Indiranagar", Low, "Older infrastructure that may cause issues during heavy rainfall"),
            ("Footpaths on 12th Main", Medium, "Uneven and broken in several places, hazardous for pedestrians"),
        ],
    },
    SeedArea {
        name: "Marathahalli",
        flood: &[
            ("Outer Ring Road near Marathahalli Bridge", High, "Significant waterlogging during rainfall, affecting traffic flow"),
            ("Marathahalli underpass", High, "Frequently flooded during heavy rainfall, sometimes becoming impassable"),
            ("Kundalahalli Gate", Medium, "Water accumulation reported during moderate to heavy rainfall"),
        ],
        traffic: &[
            ("Marathahalli Bridge", High, "Major bottleneck with severe congestion during peak hours"),
            ("Outer Ring Road", High, "Heavy traffic throughout the day, worsens during evenings"),
            ("HAL Airport Road junction", Medium, "Congestion due to merging traffic from multiple directions"),
        ],
        infrastructure: &[
            ("Service roads along Outer Ring Road", Medium, "Narrow and pothole-filled, difficult for two-wheelers"),
            ("Footpaths near Marathahalli Market", Medium, "Broken or missing in several places, forcing pedestrians onto the road"),
            ("Drainage system near Kundalahalli Gate", High, "Inadequate infrastructure causing frequent waterlogging"),
        ],
    },
];

const GENERAL: SeedArea = SeedArea {
    name: "general",
    flood: &[
        ("Silk Board Junction", High, "Prone to severe waterlogging during rainfall"),
        ("KR Puram Bridge", Medium, "Water accumulation during moderate to heavy rainfall"),
        ("Bellandur area near the lake", High, "Significant flooding during monsoon season"),
    ],
    traffic: &[
        ("Silk Board Junction", High, "One of the most congested junctions in the city"),
        ("Hebbal Flyover", High, "Major bottleneck during peak hours"),
        ("Outer Ring Road", High, "Heavy traffic throughout the day, especially near tech parks"),
    ],
    infrastructure: &[
        ("Old City areas", Medium, "Aging infrastructure and narrow roads"),
        ("Metro construction zones", Medium, "Road quality issues and diversions"),
        ("Underpasses during rainy season", High, "Prone to flooding due to inadequate drainage"),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_exact() {
        let kb = KnowledgeBase::seeded();
        assert_eq!(kb.lookup("KORAMANGALA").map(|a| a.name.as_str()), Some("Koramangala"));
        assert!(kb.lookup("Koramangala 5th Block").is_none());
        assert!(kb.lookup("hsr layout").is_none());
    }

    #[test]
    fn seeded_areas_cover_every_category() {
        let kb = KnowledgeBase::seeded();
        assert!(kb.area_names().count() >= 4);
        assert!(kb.validate().is_ok());
        for name in kb.area_names() {
            let area = kb.lookup(name).expect("listed area resolves");
            for category in Category::ALL {
                assert!(!area.spots(category).is_empty(), "{name} lacks {category:?}");
            }
        }
    }

    #[test]
    fn csv_merge_adds_complete_area() {
        let rows = "\
area,category,location,severity,details
HSR Layout,flood,Agara Lake road,high,Overflows in heavy rain
HSR Layout,traffic,27th Main,medium,Peak hour congestion
HSR Layout,infrastructure,Sector 2 inner roads,low,Patchy surface
general,traffic,Tin Factory,high,Bus depot bottleneck
";
        let kb = KnowledgeBase::seeded().merge_csv(rows.as_bytes()).expect("merge");
        let hsr = kb.lookup("hsr layout").expect("merged area");
        assert_eq!(hsr.flood[0].severity, Severity::High);
        assert_eq!(kb.general().traffic.len(), 4);
    }

    #[test]
    fn csv_merge_rejects_incomplete_area() {
        let rows = "\
area,category,location,severity,details
Jayanagar,traffic,4th Block,high,Shopping traffic
";
        let err = KnowledgeBase::seeded().merge_csv(rows.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Jayanagar"));
    }

    #[test]
    fn csv_merge_rejects_unknown_severity() {
        let rows = "\
area,category,location,severity,details
Koramangala,traffic,Ejipura signal,severe,Always jammed
";
        assert!(KnowledgeBase::seeded().merge_csv(rows.as_bytes()).is_err());
    }
}
