use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use crate::plan::PlanTier;

#[derive(Parser, Debug)]
#[command(
    name = "adverdict",
    version,
    about = "Ad performance rollups with scale/watch/cut/learn verdicts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Ingest(IngestArgs),
    Add(AddArgs),
    Report(ReportArgs),
    Rules(RulesArgs),
    Plan(PlanArgs),
    Sample(SampleArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, default_value = ".cache/adverdict")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value = "default")]
    pub account: String,
}

impl StoreArgs {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_root.join("adverdict.sqlite"))
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.data_root.join("manifests")
    }
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub file: PathBuf,

    /// JSON object mapping extra header names to canonical fields.
    #[arg(long)]
    pub column_map: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub campaign: String,

    #[arg(long)]
    pub ad_set: String,

    #[arg(long)]
    pub ad: String,

    #[arg(long)]
    pub start: Option<String>,

    #[arg(long)]
    pub end: Option<String>,

    #[arg(long)]
    pub impressions: Option<String>,

    #[arg(long)]
    pub clicks: Option<String>,

    #[arg(long)]
    pub spend: Option<String>,

    #[arg(long)]
    pub purchases: Option<String>,

    #[arg(long)]
    pub revenue: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ReportDepth {
    Campaign,
    AdSet,
    Ad,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, value_enum, default_value_t = ReportDepth::Ad)]
    pub depth: ReportDepth,

    #[arg(long, value_enum)]
    pub plan: Option<PlanTier>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RulesArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RulesAction {
    Show,
    Set(RulesSetArgs),
    Reset,
}

#[derive(Args, Debug, Clone)]
pub struct RulesSetArgs {
    #[arg(long)]
    pub scale_roas: Option<Decimal>,

    #[arg(long)]
    pub min_roas: Option<Decimal>,

    #[arg(long)]
    pub learning_spend: Option<Decimal>,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub action: PlanAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PlanAction {
    Show,
    Set(PlanSetArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PlanSetArgs {
    #[arg(long, value_enum)]
    pub tier: PlanTier,

    #[arg(long, default_value = "active")]
    pub status: String,

    #[arg(long)]
    pub current_period_end: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SampleArgs {
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}
