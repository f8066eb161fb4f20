use crate::infra::ScoringRuntime;
use attrition_ai::config::AppConfig;
use attrition_ai::error::AppError;
use attrition_ai::scoring::{
    load_records, write_static_api, RecordLimit, ScoringMode, DEFAULT_BASE_PATH,
};
use attrition_ai::telemetry;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Employee CSV to score
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Number of employees to return, or `all`
    #[arg(long)]
    pub(crate) top_n: Option<RecordLimit>,
    /// Number of features to explain per employee
    #[arg(long)]
    pub(crate) top_k: Option<usize>,
    /// Skip features whose value is zero for the employee
    #[arg(long, conflicts_with = "no_zero_filter")]
    pub(crate) zero_filter: bool,
    /// Keep zero-valued features as explanation candidates
    #[arg(long)]
    pub(crate) no_zero_filter: bool,
    /// Write the JSON result here instead of stdout
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct StaticApiArgs {
    /// Directory that receives the JSON documents
    #[arg(long, default_value = "api")]
    pub(crate) output_dir: PathBuf,
    /// URL path the bundle will be hosted under, listed in `index.json`
    #[arg(long, default_value = DEFAULT_BASE_PATH)]
    pub(crate) base_path: String,
    /// Dataset used for the top employee ranking (defaults to the configured dataset)
    #[arg(long)]
    pub(crate) dataset: Option<PathBuf>,
}

impl ScoreArgs {
    fn zero_filter_override(&self) -> Option<bool> {
        match (self.zero_filter, self.no_zero_filter) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let runtime = ScoringRuntime::load(&config)?;

    let mut policy = runtime.service.policy(ScoringMode::Batch);
    if let Some(top_n) = args.top_n {
        policy = policy.with_top_n(top_n);
    }
    if let Some(top_k) = args.top_k {
        policy = policy.with_top_k(top_k);
    }
    if let Some(enabled) = args.zero_filter_override() {
        policy = policy.with_zero_value_filter(enabled);
    }

    let records = load_records(&args.input)?;
    let ranked = runtime.service.score(&records, &policy)?;
    let rendered = serde_json::to_string_pretty(&ranked)?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            info!(output = %path.display(), employees = ranked.len(), "scores written");
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

pub(crate) fn run_static_api(args: StaticApiArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let runtime = ScoringRuntime::load(&config)?;

    let dataset = args
        .dataset
        .unwrap_or_else(|| config.artifacts.dataset_path.clone());
    let ranked = runtime.startup_ranking(&dataset)?;
    let written = write_static_api(
        &args.output_dir,
        &args.base_path,
        &ranked,
        &runtime.model_info,
    )?;

    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}
