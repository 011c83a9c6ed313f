//! iam-policy-finder 命令行入口

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use iam_policy_finder::{
    ConfigManager, EntityType, FileSource, PolicyDetector, PolicySource, RuleCompiler, Scanner,
};

#[derive(Parser, Debug)]
#[command(name = "iam-policy-finder", version, about = "Find IAM policy documents matching a CEL-style rule expression")]
struct Cli {
    /// Rule expression text, or the path of a file containing it
    expr: String,

    /// Print matched policy documents to stdout
    #[arg(long)]
    dump: bool,

    /// Restrict to entity types (User, Group, Role, LocalManagedPolicy, AWSManagedPolicy)
    #[arg(short, long)]
    filter: Vec<EntityType>,

    /// Debug logging
    #[arg(long)]
    debug: bool,

    /// Log evaluation errors and treat them as non-matches instead of aborting
    #[arg(long)]
    skip_evaluation_error: bool,

    /// Show progress dots on stderr
    #[arg(long, overrides_with = "no_progress")]
    progress: bool,

    #[arg(long, overrides_with = "progress", hide = true)]
    no_progress: bool,

    /// Lower-case Action / NotAction before matching
    #[arg(long)]
    action_to_lower_case: bool,

    /// Read authorization details from JSON files instead of the live IAM API
    #[arg(short, long)]
    input: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ConfigManager::custom()
        .dump(cli.dump)
        .filter(cli.filter)
        .skip_evaluation_error(cli.skip_evaluation_error)
        .progress(cli.progress)
        .action_to_lower_case(cli.action_to_lower_case)
        .build();

    let rule = RuleCompiler::compile_arg(&cli.expr)
        .await
        .context("规则表达式编译失败")?;
    let page_size = config.page_size;
    let scanner = Scanner::new(PolicyDetector::new(rule, config));

    let mut source = open_source(cli.input, page_size).await?;
    scanner.run(source.as_mut()).await.context("扫描失败")?;
    Ok(())
}

async fn open_source(input: Vec<PathBuf>, page_size: i32) -> Result<Box<dyn PolicySource>> {
    if !input.is_empty() {
        return Ok(Box::new(FileSource::new(input)));
    }
    live_source(page_size).await
}

#[cfg(feature = "aws")]
async fn live_source(page_size: i32) -> Result<Box<dyn PolicySource>> {
    Ok(Box::new(iam_policy_finder::IamSource::from_env(page_size).await))
}

#[cfg(not(feature = "aws"))]
async fn live_source(_page_size: i32) -> Result<Box<dyn PolicySource>> {
    anyhow::bail!("未指定 --input，且编译时未启用 aws 特性，无法在线拉取授权详情")
}
