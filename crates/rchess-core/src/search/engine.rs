//! 探索エンジンのエントリポイント
//!
//! 反復深化・aspiration window・multi-PV と Lazy SMP のスレッド管理。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::position::{GenType, MoveList, SearchPosition};
use crate::tt::TranspositionTable;
use crate::types::{Bound, Depth, Move, Value};

use super::alpha_beta::{SearchContext, SearchWorker};
use super::time_manager::{calculate_falling_eval, calculate_time_reduction, TimeManagement};
use super::{
    LimitsType, RootMove, RootMoves, SearchSignals, SearchTuneParams, StopLevel, TimeOptions,
    MAX_SEARCH_DEPTH,
};
#[cfg(feature = "search-stats")]
use super::SearchStats;

/// 置換表サイズの既定値（MB）
pub const DEFAULT_HASH_MB: usize = 16;

/// 置換表サイズの上限（MB）
pub const MAX_HASH_MB: usize = 1 << 20;

/// 探索スレッドのスタックサイズ
const SEARCH_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Lazy SMP: helper スレッドが深さを飛ばす周期
const SKIP_SIZE: [i32; 20] = [1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4];
/// Lazy SMP: helper スレッドが深さを飛ばす位相
const SKIP_PHASE: [i32; 20] = [0, 1, 0, 1, 2, 3, 0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 6, 7];

// =============================================================================
// SearchInfo - 探索情報
// =============================================================================

/// 探索情報（反復ごと・aspiration の再探索ごとに通知する）
#[derive(Debug, Clone)]
pub struct SearchInfo {
    /// 探索深さ
    pub depth: Depth,
    /// 選択的深さ
    pub sel_depth: i32,
    /// MultiPV番号（1-indexed）
    pub multi_pv: usize,
    /// この行のスコア
    pub score: Value,
    /// スコアの種類（aspiration の失敗中は Lower / Upper）
    pub bound: Bound,
    /// 探索ノード数
    pub nodes: u64,
    /// NPS (nodes per second)
    pub nps: u64,
    /// 経過時間（ミリ秒）
    pub time_ms: u64,
    /// 置換表使用率（千分率）
    pub hashfull: u32,
    /// Principal Variation
    pub pv: Vec<Move>,
}

impl SearchInfo {
    /// UCI形式のinfo文字列を生成
    pub fn to_uci_string(&self) -> String {
        let mut score = if self.score.is_mate_score() {
            format!("mate {}", self.score.mate_moves())
        } else {
            format!("cp {}", self.score.raw())
        };
        match self.bound {
            Bound::Lower => score.push_str(" lowerbound"),
            Bound::Upper => score.push_str(" upperbound"),
            _ => {}
        }

        let mut s = format!(
            "info depth {} seldepth {} multipv {} score {} nodes {} nps {} hashfull {} time {}",
            self.depth,
            self.sel_depth,
            self.multi_pv,
            score,
            self.nodes,
            self.nps,
            self.hashfull,
            self.time_ms
        );

        if !self.pv.is_empty() {
            s.push_str(" pv");
            for m in &self.pv {
                s.push(' ');
                s.push_str(&m.to_uci());
            }
        }
        s
    }
}

// =============================================================================
// SearchResult - 探索結果
// =============================================================================

/// 探索結果
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// 最善手（合法手がなければ `Move::NONE`）
    pub best_move: Move,
    /// Ponder手（相手の予想応手）
    pub ponder_move: Move,
    /// 最善手のスコア
    pub score: Value,
    /// 最善手の読み筋
    pub pv: Vec<Move>,
    /// 全スレッドの探索ノード数
    pub nodes: u64,
    /// 完了した探索深さ
    pub depth: Depth,
    /// 選択的深さ
    pub sel_depth: i32,
}

impl SearchResult {
    fn terminal(score: Value) -> Self {
        Self {
            best_move: Move::NONE,
            ponder_move: Move::NONE,
            score,
            pv: Vec::new(),
            nodes: 0,
            depth: 0,
            sel_depth: 0,
        }
    }

    fn from_line(line: &RootMove, depth: Depth, nodes: u64) -> Self {
        Self {
            best_move: line.mv(),
            ponder_move: line.pv.get(1).copied().unwrap_or(Move::NONE),
            score: line.score,
            pv: line.pv.clone(),
            nodes,
            depth,
            sel_depth: line.sel_depth,
        }
    }
}

// =============================================================================
// 補助関数
// =============================================================================

/// helper スレッドがこの深さを飛ばすか
#[inline]
fn skip_depth(thread_id: usize, depth: Depth, game_ply: i32) -> bool {
    if thread_id == 0 {
        return false;
    }
    let i = (thread_id - 1) % SKIP_SIZE.len();
    ((depth + game_ply + SKIP_PHASE[i]) / SKIP_SIZE[i]) % 2 != 0
}

/// ルートの合法手（生成した手のうち `do_move` が通るもの）
fn legal_root_moves<P: SearchPosition>(pos: &mut P) -> Vec<Move> {
    let mut list = MoveList::new();
    let kind = if pos.in_check() {
        GenType::Evasions
    } else {
        GenType::All
    };
    pos.generate(kind, &mut list);
    list.into_iter()
        .filter(|&mv| {
            if pos.do_move(mv) {
                pos.undo_move(mv);
                true
            } else {
                false
            }
        })
        .collect()
}

/// aspiration window の初期値 `(alpha, beta, delta)`
///
/// 深さ4未満か、まだ評価値がない手はフルウィンドウで探索する。
fn aspiration_window(rm: &RootMove, depth: Depth, tune: &SearchTuneParams) -> (Value, Value, i32) {
    let inf = Value::INFINITE.raw();
    if depth < 4 || rm.average_score == -Value::INFINITE {
        return (-Value::INFINITE, Value::INFINITE, tune.aspiration_delta);
    }
    let avg = rm.average_score.raw();
    let delta = tune.aspiration_delta + avg.abs() / tune.aspiration_avg_div;
    (
        Value::new((avg - delta).max(-inf)),
        Value::new((avg + delta).min(inf)),
        delta,
    )
}

/// 詰みを読み切り、深さが十分に進んだか
#[inline]
fn proven_mate_depth_exceeded(best_value: Value, depth: Depth) -> bool {
    best_value.is_mate_score() && (best_value.mate_ply() + 2) * 5 / 2 < depth
}

/// `go mate` 指定時に、要求手数以内の詰みが見つかったか
#[inline]
fn mate_within_limit(rm: &RootMove, mate_limit_moves: i32) -> bool {
    mate_limit_moves > 0
        && !rm.score_lowerbound
        && !rm.score_upperbound
        && rm.score.is_win()
        && rm.score.mate_ply() <= mate_limit_moves * 2
}

// =============================================================================
// 反復深化
// =============================================================================

/// 全スレッドで共有する探索中の情報
struct DriverShared<'a> {
    tt: &'a TranspositionTable,
    tune_params: &'a SearchTuneParams,
    limits: &'a LimitsType,
    signals: &'a SearchSignals,
    total_nodes: &'a AtomicU64,
    /// スレッドごとの best_move_changes（f64 のビット列）
    best_move_changes: &'a [AtomicU64],
    multi_pv: usize,
    game_ply: i32,
    previous_score: Value,
    previous_average_score: Value,
}

impl DriverShared<'_> {
    fn info(&self, rm: &RootMove, depth: Depth, multi_pv: usize, bound: Bound) -> SearchInfo {
        let time_ms = self.limits.elapsed().max(0) as u64;
        let nodes = self.total_nodes.load(Ordering::Relaxed);
        SearchInfo {
            depth,
            sel_depth: rm.sel_depth,
            multi_pv,
            score: rm.uci_score,
            bound,
            nodes,
            nps: if time_ms > 0 { nodes * 1000 / time_ms } else { 0 },
            time_ms,
            hashfull: self.tt.hashfull(0).max(0) as u32,
            pv: rm.pv.clone(),
        }
    }

    fn total_best_move_changes(&self) -> f64 {
        self.best_move_changes
            .iter()
            .map(|bits| f64::from_bits(bits.load(Ordering::Relaxed)))
            .sum()
    }
}

/// 1スレッドぶんの反復深化
///
/// thread 0 だけが進捗を通知し、時間・詰み・深さで探索全体の停止を決める。
fn iterative_deepening<P, F>(
    worker: &mut SearchWorker,
    pos: &mut P,
    shared: &DriverShared<'_>,
    mut on_info: Option<F>,
) where
    P: SearchPosition,
    F: FnMut(&SearchInfo),
{
    let thread_id = worker.thread_id;
    let main_thread = thread_id == 0;
    let limits = shared.limits;
    let tune = shared.tune_params;
    let ctx = SearchContext {
        tt: shared.tt,
        tune_params: tune,
        limits,
        signals: shared.signals,
        total_nodes: shared.total_nodes,
        thread_id,
    };

    let max_depth = if limits.has_depth_limit() {
        limits.depth.min(MAX_SEARCH_DEPTH)
    } else {
        MAX_SEARCH_DEPTH
    };
    let multi_pv = shared.multi_pv;
    let threads = shared.best_move_changes.len();

    let mut last_best_move = Move::NONE;
    let mut last_best_move_depth = 0;
    let mut iter_value = [shared.previous_score; 4];
    let mut iter_idx = 0;

    log::debug!("search thread {thread_id} started");

    let mut root_depth = 0;
    while root_depth < max_depth {
        root_depth += 1;

        if shared.signals.stop_requested() {
            break;
        }
        if skip_depth(thread_id, root_depth, shared.game_ply) {
            continue;
        }

        worker.decay_best_move_changes();
        worker.state.root_moves.save_previous_scores();
        worker.state.root_depth = root_depth;

        for pv_idx in 0..multi_pv {
            worker.state.pv_idx = pv_idx;
            worker.state.sel_depth = 0;

            let (mut alpha, mut beta, mut delta) =
                aspiration_window(&worker.state.root_moves[pv_idx], root_depth, tune);
            if pv_idx == 0 {
                if let Some((a, b)) = limits.initial_window {
                    if a < b {
                        alpha = a.max(-Value::INFINITE);
                        beta = b.min(Value::INFINITE);
                    }
                }
            }
            let mut failed_high_cnt = 0;

            loop {
                let adjusted_depth = (root_depth - failed_high_cnt).max(1);
                let value = worker.search_root(&ctx, pos, adjusted_depth, alpha, beta);

                // 未探索の手は -INFINITE なので、中断していても並べ替えてよい
                let len = worker.state.root_moves.len();
                worker.state.root_moves.stable_sort_range(pv_idx, len);

                if worker.state.abort {
                    break;
                }

                let bound = if value <= alpha {
                    beta = Value::new((alpha.raw() + beta.raw()) / 2);
                    alpha = Value::new((value.raw() - delta).max(-Value::INFINITE.raw()));
                    failed_high_cnt = 0;
                    Bound::Upper
                } else if value >= beta {
                    beta = Value::new((value.raw() + delta).min(Value::INFINITE.raw()));
                    failed_high_cnt += 1;
                    Bound::Lower
                } else {
                    break;
                };

                log::debug!(
                    "aspiration retry: thread={thread_id} depth={root_depth} pv={pv_idx} \
                     value={} window=({}, {})",
                    value.raw(),
                    alpha.raw(),
                    beta.raw()
                );
                if let Some(cb) = on_info.as_mut() {
                    cb(&shared.info(&worker.state.root_moves[pv_idx], root_depth, pv_idx + 1, bound));
                }

                delta += delta / 3;
            }

            worker.state.root_moves.stable_sort_range(0, pv_idx + 1);

            if worker.state.abort {
                break;
            }
        }

        // 中断した反復の結果は使わない
        if worker.state.abort {
            break;
        }

        let st = &mut worker.state;
        st.completed_depth = root_depth;
        st.completed_lines = st.root_moves.iter().take(multi_pv).cloned().collect();
        st.best_move = st.root_moves[0].mv();
        if st.best_move != last_best_move {
            last_best_move = st.best_move;
            last_best_move_depth = root_depth;
        }
        shared.best_move_changes[thread_id].store(st.best_move_changes.to_bits(), Ordering::Relaxed);

        if !main_thread {
            continue;
        }

        if let Some(cb) = on_info.as_mut() {
            for (i, rm) in st.completed_lines.iter().enumerate() {
                cb(&shared.info(rm, root_depth, i + 1, Bound::Exact));
            }
        }

        let best = &st.root_moves[0];
        let best_value = best.score;

        if mate_within_limit(best, limits.mate) {
            log::debug!("mate within {} moves found at depth {root_depth}", limits.mate);
            shared.signals.escalate(StopLevel::StopSoon);
            break;
        }
        if multi_pv == 1 && limits.mate == 0 && proven_mate_depth_exceeded(best_value, root_depth) {
            log::debug!("proven mate at depth {root_depth}: {}", best_value.raw());
            break;
        }

        if limits.use_time_management() && !shared.signals.stop_requested() {
            let falling_eval = calculate_falling_eval(
                shared.previous_average_score.raw(),
                iter_value[iter_idx].raw(),
                best_value.raw(),
            );
            let time_reduction = calculate_time_reduction(root_depth, last_best_move_depth);
            st.time_manager.apply_time_multipliers(
                falling_eval,
                time_reduction,
                shared.total_best_move_changes(),
                threads,
            );
            iter_value[iter_idx] = best_value;
            iter_idx = (iter_idx + 1) % iter_value.len();

            if st.time_manager.should_stop() {
                log::debug!(
                    "optimum time used: elapsed={}ms depth={root_depth}",
                    st.time_manager.elapsed()
                );
                shared.signals.escalate(StopLevel::StopSoon);
            }
        }
    }

    if main_thread {
        // infinite では stop が来るまで結果を返さない
        while limits.infinite && !shared.signals.stop_requested() {
            thread::sleep(Duration::from_millis(1));
        }
        shared.signals.escalate(StopLevel::StopNow);
    }

    log::debug!(
        "search thread {thread_id} finished: completed_depth={} nodes={}",
        worker.state.completed_depth,
        worker.state.nodes
    );
}

// =============================================================================
// Search - 探索エンジン
// =============================================================================

/// 探索エンジン
///
/// ワーカー（履歴・探索スタック）は探索をまたいで再利用する。
pub struct Search {
    tt: Arc<TranspositionTable>,
    hash_mb: usize,
    workers: Vec<Box<SearchWorker>>,
    signals: Arc<SearchSignals>,
    tune_params: SearchTuneParams,
    time_options: TimeOptions,
    multi_pv: usize,
    /// 前回の探索の最善スコア（手番が変われば符号を反転する）
    best_previous_score: Option<Value>,
    best_previous_average_score: Option<Value>,
    last_game_ply: Option<i32>,
}

impl Default for Search {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_MB)
    }
}

impl Search {
    /// 新しいSearchを作成（1スレッド）
    ///
    /// `hash_mb` は `1..=MAX_HASH_MB` に丸める。
    pub fn new(hash_mb: usize) -> Self {
        let hash_mb = hash_mb.clamp(1, MAX_HASH_MB);
        Self {
            tt: Arc::new(TranspositionTable::new(hash_mb)),
            hash_mb,
            workers: vec![SearchWorker::new(0)],
            signals: Arc::new(SearchSignals::new()),
            tune_params: SearchTuneParams::default(),
            time_options: TimeOptions::default(),
            multi_pv: 1,
            best_previous_score: None,
            best_previous_average_score: None,
            last_game_ply: None,
        }
    }

    /// 設定から作成する
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut search = Self::new(DEFAULT_HASH_MB);
        search.set_hash_size(config.hash_mb)?;
        search.set_num_threads(config.threads)?;
        search.set_multi_pv(config.multi_pv);
        search.set_time_options(TimeOptions {
            move_overhead: config.move_overhead_ms,
            minimum_thinking_time: config.minimum_thinking_time_ms,
            slow_mover: config.slow_mover,
        });
        search.tune_params.set_option("SyzygyProbeLimit", config.syzygy_probe_limit)?;
        for (name, &value) in &config.tune {
            search.tune_params.set_option(name, value)?;
        }
        log::info!(
            "engine configured: hash={}MB threads={} multi_pv={}",
            search.hash_mb,
            search.num_threads(),
            search.multi_pv
        );
        Ok(search)
    }

    /// 置換表のサイズを変更する（内容は消える）
    pub fn set_hash_size(&mut self, mb: usize) -> Result<()> {
        if mb == 0 || mb > MAX_HASH_MB {
            return Err(EngineError::InvalidHashSize {
                got: mb,
                max: MAX_HASH_MB,
            });
        }
        if mb != self.hash_mb {
            match Arc::get_mut(&mut self.tt) {
                Some(tt) => tt.resize(mb),
                None => self.tt = Arc::new(TranspositionTable::new(mb)),
            }
            self.hash_mb = mb;
        }
        Ok(())
    }

    pub fn hash_size(&self) -> usize {
        self.hash_mb
    }

    /// 探索スレッド数を設定する
    pub fn set_num_threads(&mut self, n: usize) -> Result<()> {
        if n == 0 {
            return Err(EngineError::InvalidThreadCount);
        }
        self.workers.truncate(n);
        while self.workers.len() < n {
            let id = self.workers.len();
            self.workers.push(SearchWorker::new(id));
        }
        Ok(())
    }

    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    /// 既定の MultiPV 本数（`LimitsType::multi_pv` が 2 以上ならそちらを使う）
    pub fn set_multi_pv(&mut self, n: usize) {
        self.multi_pv = n.max(1);
    }

    pub fn set_time_options(&mut self, opts: TimeOptions) {
        let mut tm = TimeManagement::default();
        tm.set_options(&opts);
        self.time_options = tm.options();
    }

    pub fn time_options(&self) -> TimeOptions {
        self.time_options
    }

    pub fn tune_params(&self) -> &SearchTuneParams {
        &self.tune_params
    }

    /// 名前でオプションを設定する
    ///
    /// エンジン設定（Hash, Threads, MultiPV, 時間）以外は探索係数として扱う。
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<()> {
        let invalid = || EngineError::InvalidOptionValue {
            name: name.to_string(),
            value: value.to_string(),
        };
        let value = value.trim();
        match name.to_ascii_lowercase().as_str() {
            "hash" => self.set_hash_size(value.parse().map_err(|_| invalid())?),
            "threads" => self.set_num_threads(value.parse().map_err(|_| invalid())?),
            "multipv" => {
                let n: usize = value.parse().map_err(|_| invalid())?;
                if n == 0 {
                    return Err(invalid());
                }
                self.set_multi_pv(n);
                Ok(())
            }
            "moveoverhead" | "minimumthinkingtime" | "slowmover" => {
                let v: i64 = value.parse().map_err(|_| invalid())?;
                let mut opts = self.time_options;
                match name.to_ascii_lowercase().as_str() {
                    "moveoverhead" => opts.move_overhead = v,
                    "minimumthinkingtime" => opts.minimum_thinking_time = v,
                    _ => opts.slow_mover = i32::try_from(v).map_err(|_| invalid())?,
                }
                self.set_time_options(opts);
                Ok(())
            }
            _ => {
                let v: i32 = value.parse().map_err(|_| invalid())?;
                self.tune_params.set_option(name, v)
            }
        }
    }

    /// 新しい対局：置換表と全履歴をクリア
    pub fn new_game(&mut self) {
        self.tt.clear();
        for worker in &mut self.workers {
            worker.clear();
        }
        self.best_previous_score = None;
        self.best_previous_average_score = None;
        self.last_game_ply = None;
    }

    /// 直ちに停止させる
    pub fn stop(&self) {
        self.signals.escalate(StopLevel::StopNow);
    }

    /// 現在の反復を終えたら停止させる
    pub fn stop_soon(&self) {
        self.signals.escalate(StopLevel::StopSoon);
    }

    /// 別スレッドから停止させるための信号
    pub fn signals(&self) -> Arc<SearchSignals> {
        Arc::clone(&self.signals)
    }

    /// 全ワーカーを合算した探索統計
    #[cfg(feature = "search-stats")]
    pub fn stats_report(&self) -> String {
        let mut total = SearchStats::default();
        for worker in &self.workers {
            total.merge(&worker.state.stats);
        }
        total.format_report()
    }

    #[cfg(not(feature = "search-stats"))]
    pub fn stats_report(&self) -> String {
        String::new()
    }

    /// 前回のスコアを今回の手番から見た値に直す
    fn previous_scores(&mut self, game_ply: i32) -> (Value, Value) {
        if let Some(last_ply) = self.last_game_ply {
            if (last_ply - game_ply).abs() % 2 == 1 {
                self.best_previous_score = self.best_previous_score.map(|v| -v);
                self.best_previous_average_score = self.best_previous_average_score.map(|v| -v);
            }
        }
        self.last_game_ply = Some(game_ply);
        (
            self.best_previous_score.unwrap_or(Value::ZERO),
            self.best_previous_average_score.unwrap_or(Value::INFINITE),
        )
    }

    /// 探索を実行する
    ///
    /// `on_info` は thread 0 から呼ばれる。返るのは全スレッドの終了後。
    pub fn go<P, F>(&mut self, pos: &P, limits: &LimitsType, on_info: F) -> SearchResult
    where
        P: SearchPosition,
        F: FnMut(&SearchInfo) + Send,
    {
        let mut limits = limits.clone();
        limits.set_start_time();
        self.signals.reset();
        self.tt.new_search();

        let mut root_pos = pos.clone();
        let legal = legal_root_moves(&mut root_pos);
        if legal.is_empty() {
            let score = if pos.in_check() {
                Value::mated_in(0)
            } else {
                Value::DRAW
            };
            log::info!("no legal move at root: score={}", score.raw());
            self.signals.escalate(StopLevel::Terminated);
            return SearchResult::terminal(score);
        }

        let mut root_moves = RootMoves::from_moves(&legal, &limits.search_moves);
        if root_moves.is_empty() {
            log::warn!("searchmoves has no legal move; searching all moves");
            root_moves = RootMoves::from_moves(&legal, &[]);
        }

        let multi_pv = if limits.multi_pv > 1 {
            limits.multi_pv
        } else {
            self.multi_pv
        }
        .min(root_moves.len());

        let game_ply = pos.game_ply();
        let mut time_manager = TimeManagement::new(self.time_options);
        time_manager.init_with_root_moves_count(
            &limits,
            pos.side_to_move(),
            game_ply,
            root_moves.len(),
        );
        let (previous_score, previous_average_score) = self.previous_scores(game_ply);

        for worker in &mut self.workers {
            worker.prepare_search(root_moves.clone(), time_manager.clone());
        }

        let total_nodes = AtomicU64::new(0);
        let best_move_changes: Vec<AtomicU64> =
            (0..self.workers.len()).map(|_| AtomicU64::new(0)).collect();
        let shared = DriverShared {
            tt: &self.tt,
            tune_params: &self.tune_params,
            limits: &limits,
            signals: &self.signals,
            total_nodes: &total_nodes,
            best_move_changes: &best_move_changes,
            multi_pv,
            game_ply,
            previous_score,
            previous_average_score,
        };

        log::info!(
            "search start: threads={} root_moves={} multi_pv={multi_pv} depth={} nodes={} movetime={}",
            self.workers.len(),
            root_moves.len(),
            limits.depth,
            limits.nodes,
            limits.movetime
        );

        let mut on_info = Some(on_info);
        thread::scope(|s| {
            for worker in self.workers.iter_mut() {
                let thread_id = worker.thread_id;
                let mut thread_pos = pos.clone();
                let shared = &shared;
                let callback = if thread_id == 0 { on_info.take() } else { None };
                let spawned = thread::Builder::new()
                    .name(format!("search-{thread_id}"))
                    .stack_size(SEARCH_STACK_SIZE)
                    .spawn_scoped(s, move || {
                        iterative_deepening(worker, &mut thread_pos, shared, callback)
                    });
                if let Err(err) = spawned {
                    log::error!("failed to spawn search thread {thread_id}: {err}");
                    if thread_id == 0 {
                        // 停止を判断するスレッドがいないので helper も止める
                        shared.signals.escalate(StopLevel::StopNow);
                    }
                }
            }
        });
        self.signals.escalate(StopLevel::Terminated);

        let nodes: u64 = self.workers.iter().map(|w| w.state.nodes).sum();
        let result = self.best_result(multi_pv, nodes);

        if let Some(line) = self.workers.iter().find_map(|w| w.state.completed_lines.first()) {
            self.best_previous_score = Some(result.score);
            self.best_previous_average_score = Some(if line.average_score == -Value::INFINITE {
                result.score
            } else {
                line.average_score
            });
        }

        log::info!(
            "search done: bestmove={} score={} depth={} nodes={nodes} time={}ms",
            result.best_move,
            result.score.raw(),
            result.depth,
            limits.elapsed()
        );
        result
    }

    /// 最善のスレッドの結果を選ぶ
    ///
    /// 完了した深さが最も深いもの、同じならスコアが高いもの。
    /// 単一PVでは詰みを見つけたスレッドを優先し、その中では最短の詰みを選ぶ。
    fn best_result(&self, multi_pv: usize, nodes: u64) -> SearchResult {
        let completed = self
            .workers
            .iter()
            .filter(|w| w.state.completed_depth > 0 && !w.state.completed_lines.is_empty());

        let best = if multi_pv == 1 {
            completed
                .clone()
                .filter(|w| w.state.completed_lines[0].score.is_win())
                .max_by(|a, b| {
                    a.state.completed_lines[0]
                        .score
                        .cmp(&b.state.completed_lines[0].score)
                        .then(b.thread_id.cmp(&a.thread_id))
                })
                .or_else(|| {
                    completed.max_by(|a, b| {
                        let (sa, sb) = (&a.state, &b.state);
                        sa.completed_depth
                            .cmp(&sb.completed_depth)
                            .then(sa.completed_lines[0].score.cmp(&sb.completed_lines[0].score))
                            .then(b.thread_id.cmp(&a.thread_id))
                    })
                })
        } else {
            // multi-PV の各行は thread 0 のものを返す
            self.workers
                .first()
                .filter(|w| w.state.completed_depth > 0 && !w.state.completed_lines.is_empty())
        };

        match best {
            Some(worker) => {
                let st = &worker.state;
                SearchResult::from_line(&st.completed_lines[0], st.completed_depth, nodes)
            }
            None => {
                // 1反復も終わらなかった：並べ替え済みの先頭の手
                let fallback = self
                    .workers
                    .first()
                    .and_then(|w| w.state.root_moves.get(0))
                    .map(|rm| SearchResult {
                        best_move: rm.mv(),
                        ponder_move: Move::NONE,
                        score: if rm.score == -Value::INFINITE {
                            Value::ZERO
                        } else {
                            rm.score
                        },
                        pv: vec![rm.mv()],
                        nodes,
                        depth: 0,
                        sel_depth: 0,
                    });
                fallback.unwrap_or_else(|| SearchResult::terminal(Value::ZERO))
            }
        }
    }

    /// 最後の探索で完了した multi-PV の各行（thread 0）
    pub fn last_lines(&self) -> &[RootMove] {
        self.workers
            .first()
            .map_or(&[], |w| w.state.completed_lines.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::ChessPosition;

    #[test]
    fn test_skip_depth_pattern() {
        // メインスレッドは飛ばさない
        assert!((1..20).all(|d| !skip_depth(0, d, 0)));
        // helper 1 は1つおきに飛ばす
        assert!(skip_depth(1, 1, 0));
        assert!(!skip_depth(1, 2, 0));
        // helper 2 は位相がずれる
        assert_ne!(skip_depth(1, 3, 0), skip_depth(2, 3, 0));
        // 手数でも位相が変わる
        assert_ne!(skip_depth(1, 3, 0), skip_depth(1, 3, 1));
        // 21番目の helper は1番目と同じ
        assert_eq!(skip_depth(1, 5, 0), skip_depth(21, 5, 0));
    }

    #[test]
    fn test_aspiration_window_full_for_shallow_depth() {
        let tune = SearchTuneParams::default();
        let mut rm = RootMove::new(Move::NONE);
        rm.average_score = Value::new(50);
        assert_eq!(
            aspiration_window(&rm, 3, &tune),
            (-Value::INFINITE, Value::INFINITE, tune.aspiration_delta)
        );
        let (alpha, beta, delta) = aspiration_window(&rm, 4, &tune);
        assert_eq!(delta, tune.aspiration_delta + 50 / tune.aspiration_avg_div);
        assert_eq!(alpha, Value::new(50 - delta));
        assert_eq!(beta, Value::new(50 + delta));
    }

    #[test]
    fn test_proven_mate_depth() {
        assert!(!proven_mate_depth_exceeded(Value::new(100), 50));
        let mate = Value::mate_in(3);
        assert!(!proven_mate_depth_exceeded(mate, 12));
        assert!(proven_mate_depth_exceeded(mate, 13));
        assert!(proven_mate_depth_exceeded(-mate, 13));
    }

    #[test]
    fn test_search_info_to_uci() {
        let pos = ChessPosition::startpos();
        let mv = pos.legal_moves()[0];
        let mut info = SearchInfo {
            depth: 5,
            sel_depth: 7,
            multi_pv: 1,
            score: Value::new(34),
            bound: Bound::Exact,
            nodes: 1000,
            nps: 50000,
            time_ms: 20,
            hashfull: 3,
            pv: vec![mv],
        };
        let s = info.to_uci_string();
        assert!(s.starts_with("info depth 5 seldepth 7 multipv 1 score cp 34 nodes 1000"));
        assert!(s.ends_with(&format!(" pv {}", mv.to_uci())));

        info.bound = Bound::Lower;
        assert!(info.to_uci_string().contains("score cp 34 lowerbound"));

        info.bound = Bound::Exact;
        info.score = Value::mate_in(3);
        assert!(info.to_uci_string().contains("score mate 2"));
        info.score = Value::mated_in(4);
        assert!(info.to_uci_string().contains("score mate -2"));
    }

    #[test]
    fn test_set_hash_size_validates() {
        let mut search = Search::new(1);
        assert!(matches!(
            search.set_hash_size(0),
            Err(EngineError::InvalidHashSize { got: 0, .. })
        ));
        assert!(search.set_hash_size(MAX_HASH_MB + 1).is_err());
        assert!(search.set_hash_size(2).is_ok());
        assert_eq!(search.hash_size(), 2);
    }

    #[test]
    fn test_set_num_threads() {
        let mut search = Search::new(1);
        assert!(matches!(search.set_num_threads(0), Err(EngineError::InvalidThreadCount)));
        search.set_num_threads(3).expect("three threads");
        assert_eq!(search.num_threads(), 3);
        assert!(search.workers.iter().enumerate().all(|(i, w)| w.thread_id == i));
        search.set_num_threads(1).expect("one thread");
        assert_eq!(search.num_threads(), 1);
    }

    #[test]
    fn test_set_option_routes_by_name() {
        let mut search = Search::new(1);
        search.set_option("Threads", "2").expect("threads");
        assert_eq!(search.num_threads(), 2);
        search.set_option("MoveOverhead", "50").expect("overhead");
        assert_eq!(search.time_options().move_overhead, 50);
        search.set_option("RfpMargin", "120").expect("tune");
        assert_eq!(search.tune_params().rfp_margin, 120);
        assert!(matches!(
            search.set_option("NoSuchOption", "1"),
            Err(EngineError::UnknownOption(_))
        ));
        assert!(matches!(
            search.set_option("RfpMargin", "abc"),
            Err(EngineError::InvalidOptionValue { .. })
        ));
        assert!(matches!(
            search.set_option("RfpMargin", "99999"),
            Err(EngineError::OptionOutOfRange { .. })
        ));
    }

    #[test]
    fn test_previous_scores_flip_with_side_to_move() {
        let mut search = Search::new(1);
        search.best_previous_score = Some(Value::new(40));
        search.best_previous_average_score = Some(Value::new(30));
        search.last_game_ply = Some(10);
        // 手番が変わると反転し、反転後の値が保存される
        assert_eq!(search.previous_scores(11), (Value::new(-40), Value::new(-30)));
        // 同じ手番のままなら反転しない
        assert_eq!(search.previous_scores(13), (Value::new(-40), Value::new(-30)));
        // 手番が戻れば元の視点に戻る
        assert_eq!(search.previous_scores(14), (Value::new(40), Value::new(30)));
    }

    fn finish_thread(search: &mut Search, thread_id: usize, uci: &str, score: Value, depth: Depth) {
        let pos = ChessPosition::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1").unwrap();
        let mv = pos.legal_moves().into_iter().find(|m| m.to_uci() == uci).unwrap();
        let mut line = RootMove::new(mv);
        line.score = score;
        let st = &mut search.workers[thread_id].state;
        st.completed_depth = depth;
        st.completed_lines = vec![line];
    }

    #[test]
    fn test_best_result_prefers_shortest_mate() {
        let mut search = Search::new(1);
        search.set_num_threads(3).unwrap();
        // thread 0 は深いが詰みなし、thread 1 は長い詰み、thread 2 は短い詰み
        finish_thread(&mut search, 0, "a1a7", Value::new(900), 12);
        finish_thread(&mut search, 1, "a1a2", Value::mate_in(5), 6);
        finish_thread(&mut search, 2, "a1a8", Value::mate_in(1), 4);

        let result = search.best_result(1, 100);
        assert_eq!(result.best_move.to_uci(), "a1a8");
        assert_eq!(result.score, Value::mate_in(1));
        assert_eq!(result.depth, 4);
        assert_eq!(result.nodes, 100);
    }

    #[test]
    fn test_best_result_without_mate_prefers_depth_then_score() {
        let mut search = Search::new(1);
        search.set_num_threads(3).unwrap();
        finish_thread(&mut search, 0, "a1a2", Value::new(50), 8);
        finish_thread(&mut search, 1, "a1a3", Value::new(80), 9);
        finish_thread(&mut search, 2, "a1a4", Value::new(20), 9);

        let result = search.best_result(1, 0);
        assert_eq!(result.best_move.to_uci(), "a1a3");
        assert_eq!(result.depth, 9);

        // multi-PV では thread 0 の行を返す
        let result = search.best_result(2, 0);
        assert_eq!(result.best_move.to_uci(), "a1a2");
    }

    #[test]
    fn test_previous_scores_default_without_history() {
        let mut search = Search::new(1);
        assert_eq!(search.previous_scores(7), (Value::ZERO, Value::INFINITE));
        assert_eq!(search.last_game_ply, Some(7));
    }
}
