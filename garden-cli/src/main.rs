use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use garden::aar::{Action, ActivationEngine, Stimulus};
use garden::sync::{SyncCoordinator, Transaction, TransactionLog};
use garden::types::{FragmentRequest, IdentityAspect};
use garden::GardenConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "garden")]
#[command(about = "Inspect and drive a Garden of Memory identity hypergraph")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long, env = "GARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Snapshot file, overriding the configured data_dir/snapshot_file
    #[arg(long, env = "GARDEN_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print memory statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Similarity search over stored fragments
    Recall {
        query: String,
        #[arg(long)]
        aspect: Option<IdentityAspect>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Add fragments from a JSON array of requests and save the snapshot
    Ingest { file: PathBuf },
    /// Run one perceive / act / reflect cycle and save the snapshot
    Cycle {
        /// Stimulus content
        #[arg(long)]
        stimulus: String,
        #[arg(long, default_value = "task")]
        stimulus_kind: String,
        #[arg(long, default_value_t = 0.5)]
        intensity: f64,
        /// Action kind (generate_code, research, reason, coordinate, create, reflect)
        #[arg(long)]
        action: String,
        #[arg(long)]
        source: String,
        /// What the action produced
        #[arg(long)]
        content: String,
        #[arg(long)]
        goal: Option<String>,
    },
    /// Summarize a transaction log
    History {
        /// Log file; defaults to the configured transaction_log
        #[arg(long)]
        log: Option<PathBuf>,
        /// Only this collaborator's transactions
        #[arg(long)]
        actor: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

impl Args {
    fn load_config(&self) -> anyhow::Result<GardenConfig> {
        let mut config = match &self.config {
            Some(path) => GardenConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => GardenConfig::default(),
        };
        if let Some(snapshot) = &self.snapshot {
            config.memory.data_dir = snapshot
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            config.memory.snapshot_file = snapshot
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .context("snapshot path has no file name")?;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("garden=info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let config = args.load_config()?;
    run(args.command, &config)
}

fn run(command: Command, config: &GardenConfig) -> anyhow::Result<()> {
    match command {
        Command::Stats { json } => {
            let sync = SyncCoordinator::from_config(config)?;
            let stats = sync.statistics();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("fragments: {}", stats.total_fragments);
                println!("tuples: {}", stats.total_tuples);
                println!("avg confidence: {:.3}", stats.avg_confidence);
                println!("aspects:");
                for (aspect, count) in &stats.aspect_distribution {
                    println!("  {:<22} {}", aspect.as_str(), count);
                }
                println!("sources:");
                for (source, count) in &stats.source_distribution {
                    println!("  {:<22} {}", source, count);
                }
            }
        }
        Command::Recall {
            query,
            aspect,
            source,
            top_k,
        } => {
            let sync = SyncCoordinator::from_config(config)?;
            let top_k = top_k.unwrap_or(config.memory.default_top_k);
            let results = sync.retrieve_similar(&query, aspect, source.as_deref(), top_k);
            if results.is_empty() {
                println!("no fragments match {:?}", query);
            }
            for fragment in results {
                println!(
                    "{} [{}] ({}, {:.2}) {}",
                    fragment.id, fragment.aspect, fragment.source, fragment.confidence, fragment.content
                );
            }
        }
        Command::Ingest { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let requests: Vec<FragmentRequest> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing fragment requests in {}", file.display()))?;

            let sync = SyncCoordinator::from_config(config)?;
            let results = sync.batch_add_fragments(requests);
            let added = results.iter().filter(|r| r.is_some()).count();
            sync.save(config.snapshot_path())?;
            info!(added, rejected = results.len() - added, "Ingest finished");
            println!("added {} of {} fragments", added, results.len());
        }
        Command::Cycle {
            stimulus,
            stimulus_kind,
            intensity,
            action,
            source,
            content,
            goal,
        } => {
            let sync = Arc::new(SyncCoordinator::from_config(config)?);
            let mut engine = ActivationEngine::with_config(sync.clone(), config.activation.clone());
            if let Some(goal) = goal {
                engine.set_goal(goal);
            }

            let focus = engine.perceive(Stimulus::new(stimulus_kind, stimulus).with_intensity(intensity));
            info!(activated = focus.len(), "Perceived stimulus");
            let outcome = engine.act(Action::new(action, source, content))?;
            println!(
                "recorded {} (activation {:.2}, related {})",
                outcome.fragment_id, outcome.activation, outcome.related_fragments
            );

            let reflection = engine.reflect()?;
            println!("{}", reflection.narrative());
            sync.save(config.snapshot_path())?;
        }
        Command::History { log, actor, limit } => {
            let path = match log.or_else(|| config.sync.transaction_log.clone()) {
                Some(path) => path,
                None => bail!("no transaction log given and none configured"),
            };
            let records = TransactionLog::read_all(&path)?;
            print_history(&records, actor.as_deref(), limit);
        }
    }
    Ok(())
}

fn summarize(records: &[Transaction]) -> BTreeMap<&str, (usize, usize)> {
    let mut per_actor: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for record in records {
        let entry = per_actor.entry(record.actor.as_str()).or_default();
        if record.is_completed() {
            entry.0 += 1;
        } else if record.is_failed() {
            entry.1 += 1;
        }
    }
    per_actor
}

fn print_history(records: &[Transaction], actor: Option<&str>, limit: usize) {
    let per_actor = summarize(records);
    let failed: usize = per_actor.values().map(|(_, failed)| failed).sum();
    println!("{} transactions, {} failed", records.len(), failed);
    for (name, (completed, failed)) in &per_actor {
        println!("  {:<22} completed {:<6} failed {}", name, completed, failed);
    }

    let selected: Vec<&Transaction> = records
        .iter()
        .filter(|t| actor.map_or(true, |a| t.actor == a))
        .collect();
    let start = selected.len().saturating_sub(limit);
    for record in &selected[start..] {
        println!(
            "{} {} {:<15} {:?} {}",
            record.timestamp.to_rfc3339(),
            record.actor,
            record.operation.as_str(),
            record.status,
            record.result_id().unwrap_or("-")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from([
            "garden",
            "recall",
            "python pipeline",
            "--aspect",
            "technical_capability",
            "--top-k",
            "3",
        ]);
        assert!(args.config.is_none());
        match args.command {
            Command::Recall {
                query,
                aspect,
                source,
                top_k,
            } => {
                assert_eq!(query, "python pipeline");
                assert_eq!(aspect, Some(IdentityAspect::TechnicalCapability));
                assert!(source.is_none());
                assert_eq!(top_k, Some(3));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_invalid_aspect_is_rejected() {
        let parsed = Args::try_parse_from(["garden", "recall", "x", "--aspect", "mood"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_snapshot_flag_overrides_config() {
        let args = Args::parse_from(["garden", "--snapshot", "/tmp/g/mem.json", "stats"]);
        let config = args.load_config().unwrap();
        assert_eq!(config.snapshot_path(), PathBuf::from("/tmp/g/mem.json"));
    }

    #[test]
    fn test_cycle_then_stats_on_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GardenConfig::default();
        config.memory.data_dir = dir.path().to_path_buf();

        run(
            Command::Cycle {
                stimulus: "python pipeline".into(),
                stimulus_kind: "task".into(),
                intensity: 0.4,
                action: "generate_code".into(),
                source: "OpenHands".into(),
                content: "Wrote a python pipeline".into(),
                goal: Some("ship it".into()),
            },
            &config,
        )
        .unwrap();

        let sync = SyncCoordinator::from_config(&config).unwrap();
        let stats = sync.statistics();
        // the action fragment plus one reflection
        assert_eq!(stats.total_fragments, 2);
        assert_eq!(stats.aspect_distribution[&IdentityAspect::MetaReflection], 1);
    }

    #[test]
    fn test_history_summary_counts() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("sync.log");
        let mut config = GardenConfig::default();
        config.memory.data_dir = dir.path().to_path_buf();
        config.sync.transaction_log = Some(log_path.clone());

        let requests = r#"[
            {"framework": "ii-agent", "aspect": "value_principle", "content": "Be candid", "confidence": 0.9},
            {"framework": "ii-agent", "aspect": "wishful", "content": "bad aspect", "confidence": 0.1}
        ]"#;
        let file = dir.path().join("batch.json");
        std::fs::write(&file, requests).unwrap();
        run(Command::Ingest { file }, &config).unwrap();

        let records = TransactionLog::read_all(&log_path).unwrap();
        let summary = summarize(&records);
        assert_eq!(summary["ii-agent"], (1, 1));
    }
}
