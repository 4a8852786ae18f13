//! 固定深さの探索ベンチマーク
//!
//! 局面ファイル（1行1FEN）を順に探索し、結果を JSON で出力する。

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use rchess_core::EngineConfig;
use tools::bench::{BenchRunner, load_config, load_positions};

#[derive(Parser, Debug)]
#[command(name = "search-bench")]
#[command(about = "Fixed-depth search benchmark over a list of FEN positions")]
struct Cli {
    /// エンジン設定（TOML）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 局面ファイル（1行1FEN、省略時は組み込みの局面）
    #[arg(short, long)]
    positions: Option<PathBuf>,

    /// 探索深さ
    #[arg(short, long, default_value_t = 10)]
    depth: i32,

    /// 局面ごとのノード数上限（0 で無制限）
    #[arg(long, default_value_t = 0)]
    nodes: u64,

    /// 置換表サイズ（MB、設定ファイルより優先）
    #[arg(long)]
    hash: Option<usize>,

    /// 探索スレッド数（設定ファイルより優先）
    #[arg(short, long)]
    threads: Option<usize>,

    /// MultiPV（設定ファイルより優先）
    #[arg(long)]
    multipv: Option<usize>,

    /// info 行を標準エラーに出す
    #[arg(long)]
    info: bool,

    /// JSON の出力先（省略時は標準出力）
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut EngineConfig) {
        if let Some(hash) = self.hash {
            config.hash_mb = hash;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(multipv) = self.multipv {
            config.multi_pv = multipv;
        }
    }
}

#[cfg(feature = "syzygy")]
fn attach_tablebase<'a>(runner: BenchRunner<'a>, config: &EngineConfig) -> BenchRunner<'a> {
    use rchess_core::position::ChessPosition;

    let Some(path) = config.syzygy_path.as_deref() else {
        return runner;
    };
    match ChessPosition::load_tablebase(path) {
        Ok(tablebase) => runner.with_prepare(move |pos| pos.with_tablebase(tablebase.clone())),
        Err(err) => {
            warn!("tablebase disabled: {err}");
            runner
        }
    }
}

#[cfg(not(feature = "syzygy"))]
fn attach_tablebase<'a>(runner: BenchRunner<'a>, config: &EngineConfig) -> BenchRunner<'a> {
    if let Some(path) = &config.syzygy_path {
        warn!("built without the syzygy feature; ignoring {}", path.display());
    }
    runner
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    let fens = load_positions(cli.positions.as_deref())?;
    info!(
        "bench: {} positions depth={} threads={} hash={}MB",
        fens.len(),
        cli.depth,
        config.threads,
        config.hash_mb
    );

    let runner = BenchRunner::new(config.clone(), cli.depth)?.with_node_limit(cli.nodes);
    let mut runner = attach_tablebase(runner, &config);
    runner.print_info = cli.info;
    let report = runner.run(&fens)?;

    info!(
        "bench done: nodes={} time={}ms nps={}",
        report.total_nodes, report.total_time_ms, report.nps
    );

    let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    match &cli.output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("failed to write report {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
