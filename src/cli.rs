use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};

use crate::artifacts::{ArtifactDir, ClusterSnapshot};
use crate::config::Config;
use crate::features::{extract_universe, ExtractionMode};
use crate::input::{read_assignments_csv, read_price_csv};
use crate::model::price_series::PriceSeriesStore;
use crate::model::recommendation::RiskLabel;
use crate::output::{recommendations_json, write_feature_table_csv, write_recommendations_csv};
use crate::pipeline::{recommend, recommend_concurrent, train, train_concurrent, RunOutput};
use crate::risk::{centroids_from_members, label_from_score};

pub async fn run_cli(args: &[String], config: &Config) -> Result<()> {
    let Some(command) = args.first() else {
        print_usage();
        bail!("missing subcommand");
    };
    match command.as_str() {
        "train" => {
            let prices = required(args, 1, "train", "<prices.csv>")?;
            run_train(config, prices, args.get(2).map(String::as_str)).await
        }
        "recommend" => {
            let prices = required(args, 1, "recommend", "<prices.csv>")?;
            let opts = RecommendOptions::parse(&args[2..])?;
            run_recommend(config, prices, &opts).await
        }
        "features" => {
            let prices = required(args, 1, "features", "<prices.csv>")?;
            let mode = match args.get(2).map(String::as_str) {
                None | Some("--latest") => ExtractionMode::Latest,
                Some("--history") => ExtractionMode::History,
                Some(other) => bail!("unknown features flag `{}`", other),
            };
            run_features(config, prices, mode)
        }
        "bucket-for-score" => {
            let raw = required(args, 1, "bucket-for-score", "<1..10>")?;
            let score: i32 = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid score `{}`", raw))?;
            if !(1..=10).contains(&score) {
                bail!("score must be between 1 and 10, got {}", score);
            }
            println!("{}", label_from_score(score));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => bail!(
            "unknown subcommand `{}`. expected one of: train|recommend|features|bucket-for-score",
            other
        ),
    }
}

fn required<'a>(args: &'a [String], idx: usize, command: &str, what: &str) -> Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("`{}` requires a {} argument", command, what))
}

#[derive(Debug, Default, PartialEq)]
struct RecommendOptions {
    bucket: Option<RiskLabel>,
    json: bool,
}

impl RecommendOptions {
    fn parse(flags: &[String]) -> Result<Self> {
        let mut opts = Self::default();
        let mut iter = flags.iter();
        while let Some(flag) = iter.next() {
            match flag.as_str() {
                "--json" => opts.json = true,
                "--bucket" => {
                    let raw = iter
                        .next()
                        .ok_or_else(|| anyhow!("`--bucket` requires Low|Medium|High"))?;
                    opts.bucket = Some(raw.parse().map_err(|e: String| anyhow!(e))?);
                }
                other => bail!("unknown recommend flag `{}`", other),
            }
        }
        Ok(opts)
    }
}

fn load_store(config: &Config, path: &str) -> Result<PriceSeriesStore> {
    let file = File::open(Path::new(path)).with_context(|| format!("failed to open {}", path))?;
    read_price_csv(BufReader::new(file), &config.pipeline.benchmark)
        .with_context(|| format!("failed to load prices from {}", path))
}

async fn run_train(config: &Config, prices: &str, assignments: Option<&str>) -> Result<()> {
    let store = load_store(config, prices)?;
    let windows = config.pipeline.window_params();
    let dir = ArtifactDir::new(&config.artifacts.dir);

    if let Some(path) = assignments {
        let file = File::open(path).with_context(|| format!("failed to open {}", path))?;
        let assignments = read_assignments_csv(BufReader::new(file))?;
        let latest = extract_universe(&store, &windows, ExtractionMode::Latest)?;
        let centroids = centroids_from_members(&latest.table.latest_rows(), &assignments);
        dir.save_clusters(&ClusterSnapshot {
            centroids,
            assignments,
        })?;
    }

    let (model, report) = if config.pipeline.concurrent_extraction {
        train_concurrent(Arc::new(store), windows).await?
    } else {
        train(&store, &windows)?
    };
    dir.save_model(&model)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_recommend(config: &Config, prices: &str, opts: &RecommendOptions) -> Result<()> {
    let store = load_store(config, prices)?;
    let ctx = ArtifactDir::new(&config.artifacts.dir).load_context()?;
    let params = config.pipeline.run_params();

    let output: RunOutput = if params.concurrent {
        recommend_concurrent(Arc::new(store), &ctx, &params).await?
    } else {
        recommend(&store, &ctx, &params)?
    };

    let picks: Vec<_> = match opts.bucket {
        Some(label) => output.for_bucket(label).into_iter().cloned().collect(),
        None => output.recommendations.clone(),
    };
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if opts.json {
        writeln!(handle, "{}", recommendations_json(&picks)?)?;
    } else {
        write_recommendations_csv(&mut handle, &picks)?;
    }
    Ok(())
}

fn run_features(config: &Config, prices: &str, mode: ExtractionMode) -> Result<()> {
    let store = load_store(config, prices)?;
    let windows = config.pipeline.window_params();
    let extraction = extract_universe(&store, &windows, mode)?;
    let stdout = std::io::stdout();
    write_feature_table_csv(stdout.lock(), &extraction.table)?;
    Ok(())
}

fn print_usage() {
    eprintln!("usage:");
    eprintln!("  risk-picks train <prices.csv> [assignments.csv]");
    eprintln!("  risk-picks recommend <prices.csv> [--bucket Low|Medium|High] [--json]");
    eprintln!("  risk-picks features <prices.csv> [--latest|--history]");
    eprintln!("  risk-picks bucket-for-score <1..10>");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn recommend_flags_parse() {
        let opts = RecommendOptions::parse(&strings(&["--bucket", "medium", "--json"])).unwrap();
        assert_eq!(opts.bucket, Some(RiskLabel::Medium));
        assert!(opts.json);
        assert!(RecommendOptions::parse(&strings(&["--bucket"])).is_err());
        assert!(RecommendOptions::parse(&strings(&["--bucket", "extreme"])).is_err());
        assert!(RecommendOptions::parse(&strings(&["--csv"])).is_err());
    }
}
