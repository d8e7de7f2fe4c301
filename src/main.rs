use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod completion;
mod config;
mod engine;
mod error;
mod fallback;
mod knowledge;
mod models;
mod oracle;
mod recommend;
mod report;
mod server;
mod severity;
mod signal;
mod sources;

use config::Config;
use engine::Predictor;
use knowledge::KnowledgeBase;
use sources::{CsvPosts, Disabled, SocialProvider, StaticWeather};

#[derive(Parser)]
#[command(name = "civic-forecast")]
#[command(about = "Short-range civic issue forecasts from weather, social and news signals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Text,
    Both,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict civic issues city-wide, or for one area
    Predict {
        #[arg(long)]
        area: Option<String>,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// Write the report here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Skip every upstream service and the oracle
        #[arg(long)]
        offline: bool,
        /// Weather descriptor to assume when offline, e.g. "light rain"
        #[arg(long, requires = "offline")]
        weather: Option<String>,
        /// CSV of social posts (a `text` column) to use when offline
        #[arg(long, requires = "offline")]
        social_csv: Option<PathBuf>,
        /// Extra knowledge-base rows merged over the built-in data
        #[arg(long)]
        knowledge_csv: Option<PathBuf>,
    },
    /// List the areas the knowledge base covers
    Areas {
        #[arg(long)]
        knowledge_csv: Option<PathBuf>,
    },
    /// Serve predictions over HTTP
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        knowledge_csv: Option<PathBuf>,
    },
}

fn load_knowledge(path: Option<&Path>) -> anyhow::Result<Arc<KnowledgeBase>> {
    let kb = KnowledgeBase::seeded();
    let kb = match path {
        Some(path) => kb.merge_csv_file(path)?,
        None => kb,
    };
    Ok(Arc::new(kb))
}

fn offline_predictor(
    config: &Config,
    kb: Arc<KnowledgeBase>,
    weather: Option<String>,
    social_csv: Option<&Path>,
) -> anyhow::Result<Predictor> {
    let social: Arc<dyn SocialProvider> = match social_csv {
        Some(path) => Arc::new(
            CsvPosts::from_path(path)
                .with_context(|| format!("failed to read social posts from {}", path.display()))?,
        ),
        None => Arc::new(Disabled("social provider")),
    };

    Ok(Predictor::new(kb)
        .with_city(&config.city)
        .with_weather(Arc::new(StaticWeather::new(weather)))
        .with_social(social)
        .with_timeout(config.upstream_timeout))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("civic_forecast=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Predict {
            area,
            format,
            out,
            offline,
            weather,
            social_csv,
            knowledge_csv,
        } => {
            let kb = load_knowledge(knowledge_csv.as_deref())?;
            let predictor = if offline {
                offline_predictor(&config, kb, weather, social_csv.as_deref())?
            } else {
                Predictor::from_config(&config, kb)
            };

            let forecast = match area.as_deref() {
                Some(area) => predictor.predict_area(area).await,
                None => predictor.predict_city().await,
            };

            let mut output = String::new();
            if matches!(format, Format::Text | Format::Both) {
                output.push_str(&report::render_text(&forecast));
            }
            if matches!(format, Format::Both) {
                output.push('\n');
            }
            if matches!(format, Format::Json | Format::Both) {
                output.push_str(&report::render_json(&forecast)?);
                output.push('\n');
            }

            match out {
                Some(path) => {
                    std::fs::write(&path, output)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Prediction written to {}.", path.display());
                }
                None => print!("{output}"),
            }
        }
        Commands::Areas { knowledge_csv } => {
            let kb = load_knowledge(knowledge_csv.as_deref())?;
            println!("Areas covered for {}:", kb.city());
            for name in kb.area_names() {
                println!("- {name}");
            }
        }
        Commands::Serve {
            host,
            port,
            knowledge_csv,
        } => {
            let kb = load_knowledge(knowledge_csv.as_deref())?;
            let predictor = Arc::new(Predictor::from_config(&config, kb));
            let host = host.unwrap_or_else(|| config.web_host.clone());
            let port = port.unwrap_or(config.web_port);
            server::serve(predictor, &host, port).await?;
        }
    }

    Ok(())
}
