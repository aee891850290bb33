use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use songsim::maintenance::assign_clusters;
use songsim::{Anchor, Engine, EngineConfig, LogStore, Registry, SongRecord};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "songsim", about = "Lyrics similarity recommendations")]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(long, env = "SONGSIM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List model variants in the artifact directory
    Models,
    Info {
        name: String,
    },
    Recommend {
        #[arg(long, conflicts_with = "text", required_unless_present = "text")]
        id: Option<String>,
        #[arg(long)]
        text: Option<String>,
        #[arg(short, default_value_t = 10)]
        k: usize,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        cluster_weight: Option<f64>,
        #[arg(long)]
        global_weight: Option<f64>,
    },
    /// Write cluster labels from a JSON file `{"ids": [..], "labels": [..]}`
    AssignClusters {
        labels: PathBuf,
        #[arg(long, default_value_t = 500)]
        batch_size: usize,
    },
    /// Load song records from a JSON array into the song log
    Import {
        songs: PathBuf,
    },
}

#[derive(Deserialize)]
struct LabelFile {
    ids: Vec<String>,
    labels: Vec<u32>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Models => {
            let registry = Registry::from_config(&config);
            for name in registry.list_variants()? {
                println!("{name}");
            }
        }
        Commands::Info { name } => {
            let info = Registry::from_config(&config).variant_info(&name)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Recommend {
            id,
            text,
            k,
            model,
            cluster_weight,
            global_weight,
        } => {
            let anchor = match (id, text) {
                (Some(id), None) => Anchor::Id(id),
                (None, Some(text)) => Anchor::Text(text),
                _ => bail!("pass exactly one of --id or --text"),
            };
            let (cw, gw) = match (cluster_weight, global_weight) {
                (Some(c), Some(g)) => (c, g),
                (Some(c), None) => (c, 1.0 - c),
                (None, Some(g)) => (1.0 - g, g),
                (None, None) => (config.cluster_weight, config.global_weight),
            };
            let engine = Engine::from_config(&config)?;
            let model = model.unwrap_or_else(|| config.default_model.clone());
            let recommendations = engine.recommend_with(&model, &anchor, k, cw, gw)?;
            println!("{}", serde_json::to_string_pretty(&recommendations)?);
        }
        Commands::AssignClusters { labels, batch_size } => {
            let text = std::fs::read_to_string(&labels)
                .with_context(|| format!("reading {}", labels.display()))?;
            let file: LabelFile = serde_json::from_str(&text)?;
            let store = LogStore::open(&config.store_path)?;
            let report = assign_clusters(&store, &file.ids, &file.labels, batch_size)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Import { songs } => {
            let text = std::fs::read_to_string(&songs)
                .with_context(|| format!("reading {}", songs.display()))?;
            let records: Vec<SongRecord> = serde_json::from_str(&text)?;
            let store = LogStore::open(&config.store_path)?;
            let n = store.insert(records)?;
            println!("imported {n} songs");
        }
    }
    Ok(())
}
