//! 固定深さベンチマーク
//!
//! FEN の一覧を順に探索し、局面ごとの最善手・評価値・ノード数を集計する。

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;

use rchess_core::EngineConfig;
use rchess_core::position::ChessPosition;
use rchess_core::search::{LimitsType, Search, SearchInfo, SearchResult};
use rchess_core::types::{Move, Value};

/// 位置ファイルを指定しないときの局面
pub const DEFAULT_POSITIONS: &[&str] = &[
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1",
    "8/8/8/4k3/8/8/3QK3/8 w - - 0 1",
];

/// TOML の設定ファイルを読む（省略時は既定値）
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
}

/// 1行1局面のテキストから FEN を取り出す
///
/// 空行と `#` で始まる行は読み飛ばす。
pub fn parse_positions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// 位置ファイルを読む（省略時は組み込みの局面）
pub fn load_positions(path: Option<&Path>) -> Result<Vec<String>> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read positions {}", path.display()))?;
            Ok(parse_positions(&text))
        }
        None => Ok(DEFAULT_POSITIONS.iter().map(|s| s.to_string()).collect()),
    }
}

/// 評価値の表記
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Score {
    Cp(i32),
    Mate(i32),
}

impl From<Value> for Score {
    fn from(v: Value) -> Self {
        if v.is_mate_score() {
            Score::Mate(v.mate_moves())
        } else {
            Score::Cp(v.raw())
        }
    }
}

/// 局面ごとの結果
#[derive(Debug, Clone, Serialize)]
pub struct PositionReport {
    pub fen: String,
    pub best_move: String,
    pub ponder_move: Option<String>,
    pub score: Score,
    pub depth: i32,
    pub sel_depth: i32,
    pub nodes: u64,
    pub time_ms: u64,
    pub nps: u64,
    pub pv: Vec<String>,
    /// 探索中に受け取った info 行の数
    pub info_lines: usize,
}

/// ベンチマーク全体の結果
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub config: EngineConfig,
    pub depth: i32,
    pub positions: Vec<PositionReport>,
    pub total_nodes: u64,
    pub total_time_ms: u64,
    pub nps: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<String>,
}

fn nps(nodes: u64, time_ms: u64) -> u64 {
    nodes * 1000 / time_ms.max(1)
}

fn move_text(mv: Move) -> Option<String> {
    (!mv.is_none()).then(|| mv.to_uci())
}

fn position_report(fen: &str, result: &SearchResult, time_ms: u64, info_lines: usize) -> PositionReport {
    PositionReport {
        fen: fen.to_string(),
        best_move: move_text(result.best_move).unwrap_or_else(|| "(none)".to_string()),
        ponder_move: move_text(result.ponder_move),
        score: result.score.into(),
        depth: result.depth,
        sel_depth: result.sel_depth,
        nodes: result.nodes,
        time_ms,
        nps: nps(result.nodes, time_ms),
        pv: result.pv.iter().map(|m| m.to_uci()).collect(),
        info_lines,
    }
}

/// ベンチマークの実行
pub struct BenchRunner<'a> {
    search: Search,
    config: EngineConfig,
    limits: LimitsType,
    prepare: Box<dyn Fn(ChessPosition) -> ChessPosition + 'a>,
    /// info 行を標準エラーに出すか
    pub print_info: bool,
}

impl<'a> BenchRunner<'a> {
    /// 設定から探索器を作る
    pub fn new(config: EngineConfig, depth: i32) -> Result<Self> {
        let search = Search::from_config(&config).context("invalid engine configuration")?;
        Ok(Self {
            search,
            config,
            limits: LimitsType::depth(depth),
            prepare: Box::new(|pos| pos),
            print_info: false,
        })
    }

    /// 読み込んだ局面に手を加える（テーブルベースの設定など）
    pub fn with_prepare(mut self, prepare: impl Fn(ChessPosition) -> ChessPosition + 'a) -> Self {
        self.prepare = Box::new(prepare);
        self
    }

    /// 局面ごとのノード数上限（0 で無制限）
    pub fn with_node_limit(mut self, nodes: u64) -> Self {
        self.limits.nodes = nodes;
        self
    }

    /// 全局面を探索する
    pub fn run(&mut self, fens: &[String]) -> Result<BenchReport> {
        let mut positions = Vec::with_capacity(fens.len());
        let bench_start = Instant::now();

        for (i, fen) in fens.iter().enumerate() {
            let pos = ChessPosition::from_fen(fen)
                .with_context(|| format!("position {} is not a valid FEN", i + 1))?;
            let pos = (self.prepare)(pos);

            // 局面ごとに置換表と履歴を空にして再現性を保つ
            self.search.new_game();

            let print_info = self.print_info;
            let mut info_lines = 0;
            let start = Instant::now();
            let result = self.search.go(&pos, &self.limits, |info: &SearchInfo| {
                info_lines += 1;
                if print_info {
                    eprintln!("{}", info.to_uci_string());
                }
            });
            let time_ms = start.elapsed().as_millis() as u64;

            log::info!(
                "position {}/{}: bestmove={} nodes={} time={time_ms}ms",
                i + 1,
                fens.len(),
                result.best_move,
                result.nodes
            );
            positions.push(position_report(fen, &result, time_ms, info_lines));
        }

        let total_time_ms = bench_start.elapsed().as_millis() as u64;
        let total_nodes = positions.iter().map(|p| p.nodes).sum();
        let stats = self.search.stats_report();

        Ok(BenchReport {
            config: self.config.clone(),
            depth: self.limits.depth,
            positions,
            total_nodes,
            total_time_ms,
            nps: nps(total_nodes, total_time_ms),
            stats: (!stats.trim().is_empty()).then_some(stats),
        })
    }
}
