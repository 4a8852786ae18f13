//! Alpha-Beta探索の実装
//!
//! - Principal Variation Search (PVS)
//! - 静止探索 (Quiescence Search) への接続
//! - 各種枝刈り: Razoring, Reverse futility, NMP, ProbCut, LMP, Futility, SEE
//! - 延長: Singular extension, 王手延長
//! - Late Move Reduction

use std::sync::atomic::AtomicU64;
use std::sync::LazyLock;

use crate::position::{SearchPosition, TbWdl};
use crate::tt::{value_from_tt, value_to_tt, ProbeResult, TTData, TranspositionTable};
use crate::types::{Bound, Depth, Move, Value, DEPTH_QS, DEPTH_UNSEARCHED, MAX_MOVES, MAX_PLY};

use super::history::{stat_bonus, HistoryTables};
use super::limits::LimitsType;
use super::movepicker::MovePicker;
use super::pruning::{
    lmp_limit, prune_move, try_null_move_pruning, try_probcut, try_razoring,
    try_reverse_futility, MovePruneContext,
};
use super::qsearch::{bound_allows, qsearch};
use super::search_helpers::{
    check_abort, cont_keys, draw_value, is_draw, set_current_move, update_all_stats,
    update_pv, update_quiet_stats,
};
use super::signals::SearchSignals;
use super::stats::{inc_stat, inc_stat_by_depth};
#[cfg(feature = "search-stats")]
use super::stats::SearchStats;
use super::time_manager::TimeManagement;
use super::tune_params::SearchTuneParams;
use super::types::{new_stack, NodeType, RootMove, RootMoves, SearchedMoveList, Stack};

const NON_PV: u8 = NodeType::NonPV as u8;
const PV: u8 = NodeType::PV as u8;
const ROOT: u8 = NodeType::Root as u8;

// =============================================================================
// LMR
// =============================================================================

/// `ln(i) * 1024` のテーブル
///
/// 係数 `lmr_table_scale` は実行時に変えられるので、掛けるのは `reduction` 側で行う。
static REDUCTIONS: LazyLock<[i32; MAX_MOVES]> = LazyLock::new(|| {
    let mut table = [0; MAX_MOVES];
    for (i, value) in table.iter_mut().enumerate().skip(1) {
        *value = ((i as f64).ln() * 1024.0) as i32;
    }
    table
});

/// 探索窓の広さに応じた reduction の減り方
const LMR_DELTA_SCALE: i32 = 896;

/// 非改善時に1手ぶん追加で減らす reduction の下限
const LMR_NON_IMPROVING_THRESHOLD: i32 = 880;

/// Reductionを取得（1024 = 1手）
#[inline]
pub(crate) fn reduction(
    tune_params: &SearchTuneParams,
    improving: bool,
    depth: Depth,
    move_count: i32,
    delta: i32,
    root_delta: i32,
) -> i32 {
    if depth <= 0 || move_count <= 0 {
        return 0;
    }

    let max_idx = MAX_MOVES as i32 - 1;
    let scaled = |i: i32| REDUCTIONS[i.clamp(1, max_idx) as usize] * tune_params.lmr_table_scale / (100 * 1024);
    let reduction_scale = scaled(depth) * scaled(move_count);

    let mut r = reduction_scale - delta.max(0) * LMR_DELTA_SCALE / root_delta.max(1)
        + tune_params.lmr_base_offset;
    if !improving && reduction_scale > LMR_NON_IMPROVING_THRESHOLD {
        r += 1024;
    }
    r
}

/// singular extension 中の置換表キー（除外手でずらす）
#[inline]
fn excluded_key(mv: Move) -> u64 {
    (mv.to_u16() as u64)
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407)
}

/// IID の浅い探索の深さ（静止探索だけにならないよう1以上）
#[inline]
fn iid_search_depth(tune: &SearchTuneParams, depth: Depth) -> Depth {
    (depth - tune.iid_reduction).max(1)
}

/// 2手前（なければ4手前）より静的評価が良くなっているか
#[inline]
fn is_improving(st: &SearchState, ply: i32, static_eval: Value) -> bool {
    for back in [2, 4] {
        if ply >= back {
            let prev = st.stack[(ply - back) as usize].static_eval;
            if prev != Value::NONE {
                return static_eval > prev;
            }
        }
    }
    true
}

// =============================================================================
// SearchContext / SearchState
// =============================================================================

/// 探索中に変化しない共有データ
///
/// 探索の各ノードで共有される不変の参照群。スレッドごとに1つ作る。
pub struct SearchContext<'a> {
    /// 置換表への参照
    pub tt: &'a TranspositionTable,
    /// 探索係数
    pub tune_params: &'a SearchTuneParams,
    /// 探索制限
    pub limits: &'a LimitsType,
    /// 停止信号
    pub signals: &'a SearchSignals,
    /// 全スレッドの合計ノード数（中断チェックのたびに足し込む）
    pub total_nodes: &'a AtomicU64,
    /// スレッドID（0=main）
    pub thread_id: usize,
}

/// 置換表プローブの結果をまとめたコンテキスト
pub(super) struct TTContext<'a> {
    pub(super) key: u64,
    pub(super) result: ProbeResult<'a>,
    pub(super) data: TTData,
    pub(super) hit: bool,
    pub(super) mv: Move,
    pub(super) value: Value,
}

/// 探索中に変化する状態
///
/// 各探索スレッドが持つ可変状態。
pub struct SearchState {
    /// 探索ノード数
    pub nodes: u64,
    /// `total_nodes` に反映済みのノード数
    pub(super) nodes_flushed: u64,
    /// 探索スタック
    pub stack: Vec<Stack>,
    /// 履歴/統計テーブル群
    pub history: Box<HistoryTables>,
    /// 時間管理（メインスレッドのみ参照する）
    pub time_manager: TimeManagement,
    /// ルートでのウィンドウ幅（beta - alpha）。LMRスケール用。
    pub root_delta: i32,
    /// 中断フラグ
    pub abort: bool,
    /// 選択的深さ
    pub sel_depth: i32,
    /// ルート深さ
    pub root_depth: Depth,
    /// 完了済み深さ
    pub completed_depth: Depth,
    /// 最善手
    pub best_move: Move,
    /// 最善手変更カウンター（PV安定性判断用）
    pub best_move_changes: f64,
    /// Null Move Pruning の Verification Search 用
    pub nmp_min_ply: i32,
    /// ルート手
    pub root_moves: RootMoves,
    /// 探索中の multi-PV の行
    pub pv_idx: usize,
    /// 最後に完了した反復の読み筋（multi-PV の本数ぶん）
    pub completed_lines: Vec<RootMove>,
    /// check_abort呼び出しカウンター
    pub calls_cnt: i32,
    /// 探索統計（search-stats feature有効時のみ）
    #[cfg(feature = "search-stats")]
    pub stats: SearchStats,
}

impl SearchState {
    pub fn new() -> Self {
        Self {
            nodes: 0,
            nodes_flushed: 0,
            stack: new_stack(),
            history: HistoryTables::new_boxed(),
            time_manager: TimeManagement::default(),
            root_delta: 1,
            abort: false,
            sel_depth: 0,
            root_depth: 0,
            completed_depth: 0,
            best_move: Move::NONE,
            best_move_changes: 0.0,
            nmp_min_ply: 0,
            root_moves: RootMoves::new(),
            pv_idx: 0,
            completed_lines: Vec::new(),
            calls_cnt: 0,
            #[cfg(feature = "search-stats")]
            stats: SearchStats::default(),
        }
    }
}

impl Default for SearchState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SearchWorker
// =============================================================================

/// 探索用のワーカー状態
///
/// Workerはゲーム全体で再利用される。
/// 履歴統計は new_game でクリアし、go では保持する。
pub struct SearchWorker {
    /// スレッドID（0=main）
    pub thread_id: usize,
    /// 探索中に変化する状態
    pub state: SearchState,
}

impl SearchWorker {
    pub fn new(thread_id: usize) -> Box<Self> {
        Box::new(Self {
            thread_id,
            state: SearchState::new(),
        })
    }

    /// 新しい対局：全履歴をクリア
    pub fn clear(&mut self) {
        self.state.history.clear();
    }

    /// go で呼び出し：探索状態のリセット（履歴はクリアしない）
    pub fn prepare_search(&mut self, root_moves: RootMoves, time_manager: TimeManagement) {
        let st = &mut self.state;
        st.nodes = 0;
        st.nodes_flushed = 0;
        st.sel_depth = 0;
        st.root_depth = 0;
        st.root_delta = 1;
        st.completed_depth = 0;
        st.best_move = Move::NONE;
        st.abort = false;
        st.best_move_changes = 0.0;
        st.nmp_min_ply = 0;
        st.root_moves = root_moves;
        st.pv_idx = 0;
        st.completed_lines.clear();
        st.time_manager = time_manager;
        for ss in st.stack.iter_mut() {
            ss.reset();
        }
        // 新しい探索の最初のノードで停止チェックを行う
        st.calls_cnt = 0;
        self.reset_stats();
    }

    /// best_move_changes を半減（反復ごとの減衰）
    pub fn decay_best_move_changes(&mut self) {
        self.state.best_move_changes /= 2.0;
    }

    #[cfg(feature = "search-stats")]
    pub fn reset_stats(&mut self) {
        self.state.stats.reset();
    }

    #[cfg(not(feature = "search-stats"))]
    pub fn reset_stats(&mut self) {}

    /// ルート探索
    ///
    /// `root_moves[pv_idx..]` だけを対象に、窓 `(alpha, beta)` で探索する。
    pub fn search_root<P: SearchPosition>(
        &mut self,
        ctx: &SearchContext<'_>,
        pos: &mut P,
        depth: Depth,
        alpha: Value,
        beta: Value,
    ) -> Value {
        let st = &mut self.state;
        st.root_delta = (beta - alpha).raw().abs().max(1);
        st.stack[0].excluded_move = Move::NONE;
        search_node::<P, ROOT>(st, ctx, pos, depth, alpha, beta, 0, false)
    }
}

// =============================================================================
// search_node
// =============================================================================

/// 通常探索（negamax, fail-soft）
///
/// `NT` は `NodeType` の値。`depth <= 0` なら静止探索に移る。
/// 中断時は `Value::ZERO` を返し、呼び出し側はその値を使わない。
#[allow(clippy::too_many_arguments)]
pub(super) fn search_node<P: SearchPosition, const NT: u8>(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut P,
    depth: Depth,
    mut alpha: Value,
    mut beta: Value,
    ply: i32,
    cut_node: bool,
) -> Value {
    let pv_node = NT != NON_PV;
    let root_node = NT == ROOT;

    if depth <= 0 {
        return if pv_node {
            qsearch::<P, PV>(st, ctx, pos, DEPTH_QS, alpha, beta, ply)
        } else {
            qsearch::<P, NON_PV>(st, ctx, pos, DEPTH_QS, alpha, beta, ply)
        };
    }

    debug_assert!(-Value::INFINITE <= alpha && alpha < beta && beta <= Value::INFINITE);
    debug_assert!(pv_node || alpha == beta - 1);
    debug_assert!(!(pv_node && cut_node));

    let tune = ctx.tune_params;
    let ply_idx = ply as usize;
    let in_check = pos.in_check();
    let us = pos.side_to_move();

    if pv_node {
        st.stack[ply_idx].pv.clear();
        st.sel_depth = st.sel_depth.max(ply + 1);
    }

    st.nodes += 1;
    inc_stat!(st, nodes_searched);
    inc_stat_by_depth!(st, nodes_by_depth, depth);

    // Step 1. 中断チェック
    if check_abort(st, ctx) {
        return Value::ZERO;
    }

    if !root_node {
        // Step 2. 引き分け
        if is_draw(pos, ply) {
            return draw_value(pos, ply);
        }
        if ply >= MAX_PLY {
            return if in_check { Value::DRAW } else { pos.evaluate() };
        }

        // Step 4. Mate distance pruning
        alpha = alpha.max(Value::mated_in(ply));
        beta = beta.min(Value::mate_in(ply + 1));
        if alpha >= beta {
            return alpha;
        }
    }

    let excluded_move = st.stack[ply_idx].excluded_move;
    let prev_double_extensions = if ply > 0 {
        st.stack[ply_idx - 1].double_extensions
    } else {
        0
    };
    {
        let ss = &mut st.stack[ply_idx];
        ss.in_check = in_check;
        ss.move_count = 0;
        ss.double_extensions = prev_double_extensions;
    }
    st.stack[ply_idx + 1].excluded_move = Move::NONE;
    st.stack[ply_idx + 2].killers = [Move::NONE; 2];
    st.stack[ply_idx + 2].cutoff_cnt = 0;

    // Step 5. 置換表
    let pos_key = if excluded_move.is_some() {
        pos.key() ^ excluded_key(excluded_move)
    } else {
        pos.key()
    };
    let probe = ctx.tt.probe_entry(pos_key);
    let tt_hit = probe.found;
    let tt_data = probe.data;
    let tt_value = if tt_hit {
        value_from_tt(tt_data.value, ply)
    } else {
        Value::NONE
    };
    let mut tt_move = if root_node {
        st.root_moves[st.pv_idx].mv()
    } else if tt_hit {
        pos.decode_move(tt_data.move16)
    } else {
        Move::NONE
    };
    let tt_ctx = TTContext {
        key: pos_key,
        result: probe,
        data: tt_data,
        hit: tt_hit,
        mv: tt_move,
        value: tt_value,
    };
    st.stack[ply_idx].tt_hit = tt_hit;
    if excluded_move.is_none() {
        st.stack[ply_idx].tt_pv = pv_node || (tt_hit && tt_data.is_pv);
    }
    let tt_pv = st.stack[ply_idx].tt_pv;

    if !pv_node
        && excluded_move.is_none()
        && tt_hit
        && tt_value != Value::NONE
        && tt_data.depth >= depth
        && pos.rule50_count() < 90
        && bound_allows(tt_data.bound, tt_value, beta)
    {
        inc_stat!(st, tt_cutoff);
        inc_stat_by_depth!(st, tt_cutoff_by_depth, depth);
        if tt_move.is_some() && tt_value >= beta && !tt_move.is_tactical() {
            let bonus = stat_bonus(depth, true, tune);
            update_quiet_stats(st, ply, us, in_check, tt_move, bonus);
        }
        return tt_value;
    }

    // Step 6. テーブルベース
    let mut best_value = -Value::INFINITE;
    let mut max_value = Value::INFINITE;
    if !root_node
        && excluded_move.is_none()
        && tune.syzygy_probe_limit > 0
        && pos.piece_count() <= tune.syzygy_probe_limit as u32
        && pos.rule50_count() == 0
    {
        if let Some(tb) = pos.probe_tablebase() {
            let (value, bound) = match tb.wdl {
                TbWdl::Win => (Value::TB_WIN - ply, Bound::Lower),
                TbWdl::Loss => (-Value::TB_WIN + ply, Bound::Upper),
                TbWdl::CursedWin => (Value::DRAW + 1, Bound::Exact),
                TbWdl::BlessedLoss => (Value::DRAW - 1, Bound::Exact),
                TbWdl::Draw => (Value::DRAW, Bound::Exact),
            };

            if bound == Bound::Exact
                || (bound == Bound::Lower && value >= beta)
                || (bound == Bound::Upper && value <= alpha)
            {
                inc_stat!(st, tb_cutoff);
                tt_ctx.result.write(
                    pos_key,
                    value_to_tt(value, ply),
                    tt_pv,
                    bound,
                    (depth + 6).min(MAX_PLY - 1),
                    Move::NONE,
                    Value::NONE,
                    ctx.tt.generation(),
                );
                return value;
            }

            if pv_node {
                if bound == Bound::Lower {
                    best_value = value;
                    alpha = alpha.max(best_value);
                } else {
                    max_value = value;
                }
            }
        }
    }

    // Step 7. 静的評価と枝刈り
    let static_eval;
    let improving;
    if in_check {
        static_eval = Value::NONE;
        improving = false;
        st.stack[ply_idx].static_eval = Value::NONE;
    } else {
        let mut eval;
        if excluded_move.is_some() {
            static_eval = st.stack[ply_idx].static_eval;
            eval = static_eval;
        } else if tt_hit {
            static_eval = if tt_data.eval != Value::NONE {
                tt_data.eval
            } else {
                pos.evaluate()
            };
            eval = static_eval;
            // 置換表の値の方が正確ならそれを使う
            if tt_value != Value::NONE && bound_allows(tt_data.bound, tt_value, eval + 1) {
                eval = tt_value;
            }
        } else {
            static_eval = pos.evaluate();
            eval = static_eval;
            tt_ctx.result.write(
                pos_key,
                Value::NONE,
                tt_pv,
                Bound::None,
                DEPTH_UNSEARCHED,
                Move::NONE,
                static_eval,
                ctx.tt.generation(),
            );
        }
        st.stack[ply_idx].static_eval = static_eval;
        improving = is_improving(st, ply, static_eval);

        if !pv_node {
            if excluded_move.is_none() {
                if let Some(v) = try_razoring(st, ctx, pos, depth, alpha, ply, eval) {
                    return v;
                }
                if st.abort {
                    return Value::ZERO;
                }
            }

            if let Some(v) = try_reverse_futility(st, tune, depth, beta, eval, improving) {
                return v;
            }

            if excluded_move.is_none() {
                if let Some(v) =
                    try_null_move_pruning(st, ctx, pos, depth, beta, ply, cut_node, eval)
                {
                    return v;
                }
                if st.abort {
                    return Value::ZERO;
                }
            }
        }

        // IID: 置換表の手がない PV ノードは浅い探索で手を用意する
        if pv_node && !root_node && tt_move.is_none() && depth >= tune.iid_depth {
            search_node::<P, PV>(st, ctx, pos, iid_search_depth(tune, depth), alpha, beta, ply, false);
            if st.abort {
                return Value::ZERO;
            }
            let refreshed = ctx.tt.probe_entry(pos_key);
            if refreshed.found {
                tt_move = pos.decode_move(refreshed.data.move16);
            }
        }

        // Step 8. ProbCut
        if !pv_node {
            if let Some(v) =
                try_probcut(st, ctx, pos, depth, beta, ply, cut_node, static_eval, &tt_ctx)
            {
                return v;
            }
            if st.abort {
                return Value::ZERO;
            }
        }
    }

    // Step 9. 指し手ループ
    let cont = cont_keys(st, ply);
    let counter_move = if ply > 0 {
        st.history.counter_moves.get(st.stack[ply_idx - 1].cont_key)
    } else {
        Move::NONE
    };
    let killers = st.stack[ply_idx].killers;
    let mut mp = MovePicker::new(pos, tt_move, killers, counter_move, cont);
    let tt_capture = tt_move.is_tactical();

    let mut best_move = Move::NONE;
    let mut move_count = 0;
    let mut quiets_tried = SearchedMoveList::new();
    let mut captures_tried = SearchedMoveList::new();
    let move_count_limit = lmp_limit(tune, depth, improving);

    loop {
        let mv = mp.next_move(pos, &st.history);
        if mv.is_none() {
            break;
        }
        if mv == excluded_move {
            continue;
        }
        if root_node && !st.root_moves.iter().skip(st.pv_idx).any(|rm| rm.mv() == mv) {
            continue;
        }

        move_count += 1;
        let is_tactical = mv.is_tactical();
        let gives_check = pos.gives_check(mv);
        let mut new_depth = depth - 1;
        let r = reduction(tune, improving, depth, move_count, (beta - alpha).raw(), st.root_delta);

        // 浅い深さでの枝刈り
        if !root_node && pos.non_pawn_material(us) > 0 && !best_value.is_loss() {
            if move_count >= move_count_limit {
                mp.skip_quiets();
            }
            let prune_ctx = MovePruneContext {
                depth,
                lmr_depth: (new_depth - r / 1024).max(0),
                alpha,
                static_eval,
                in_check,
                gives_check,
                searched: best_value > -Value::INFINITE,
            };
            if prune_move(st, tune, pos, mv, &prune_ctx) {
                continue;
            }
        }

        // 延長
        let mut extension = 0;
        if ply < st.root_depth * 2 {
            if !root_node
                && mv == tt_move
                && excluded_move.is_none()
                && depth >= tune.singular_depth
                && tt_value != Value::NONE
                && !tt_value.is_decisive()
                && tt_data.bound.is_lower()
                && tt_data.depth >= depth - tune.singular_tt_depth_margin
            {
                let singular_beta = tt_value - tune.singular_beta_mult * depth;
                let singular_depth = (depth - 1) / 2;

                st.stack[ply_idx].excluded_move = mv;
                let value = search_node::<P, NON_PV>(
                    st,
                    ctx,
                    pos,
                    singular_depth,
                    singular_beta - 1,
                    singular_beta,
                    ply,
                    cut_node,
                );
                st.stack[ply_idx].excluded_move = Move::NONE;
                if st.abort {
                    return Value::ZERO;
                }

                if value < singular_beta {
                    inc_stat!(st, singular_extension);
                    extension = 1;
                    if !pv_node
                        && value < singular_beta - tune.double_extension_margin
                        && prev_double_extensions <= tune.double_extension_limit
                    {
                        extension = 2;
                    }
                } else if singular_beta >= beta {
                    // 除外しても beta を超える手が他にある
                    inc_stat!(st, multi_cut);
                    return singular_beta;
                }
            } else if gives_check && pos.see_ge(mv, 0) {
                extension = 1;
            }
        }
        new_depth += extension;
        st.stack[ply_idx].double_extensions = prev_double_extensions + (extension == 2) as i32;

        // Step 10. 指す
        if !pos.do_move(mv) {
            move_count -= 1;
            continue;
        }
        set_current_move(st, ply, mv);
        st.stack[ply_idx].move_count = move_count;

        let mut value = -Value::INFINITE;

        // LMR
        if depth >= 2 && move_count > 1 + root_node as i32 && (!is_tactical || cut_node) {
            inc_stat!(st, lmr_applied);
            let mut r = r;
            if tt_pv {
                r -= 1024;
            }
            if cut_node {
                r += 2048;
            }
            if tt_capture && !is_tactical {
                r += 1024;
            }
            if st.stack[ply_idx + 1].cutoff_cnt > 3 {
                r += 1024;
            }

            let stat_score = if is_tactical {
                st.history.capture_history.get_move(mv) as i32
            } else {
                let cont_hist = &st.history.continuation_history;
                2 * st.history.main_history.get(us, mv) as i32
                    + cont_hist.get(cont[0], mv.piece(), mv.to()) as i32
                    + cont_hist.get(cont[1], mv.piece(), mv.to()) as i32
                    - 4000
            };
            st.stack[ply_idx].stat_score = stat_score;
            r -= stat_score * 1024 / tune.lmr_history_div;

            let d = (new_depth - r / 1024).min(new_depth + 1).max(1);
            value = -search_node::<P, NON_PV>(st, ctx, pos, d, -(alpha + 1), -alpha, ply + 1, true);

            if value > alpha && d < new_depth {
                inc_stat!(st, lmr_research);
                value = -search_node::<P, NON_PV>(
                    st,
                    ctx,
                    pos,
                    new_depth,
                    -(alpha + 1),
                    -alpha,
                    ply + 1,
                    !cut_node,
                );
            }
        } else if !pv_node || move_count > 1 {
            value = -search_node::<P, NON_PV>(
                st,
                ctx,
                pos,
                new_depth,
                -(alpha + 1),
                -alpha,
                ply + 1,
                !cut_node,
            );
        }

        // PVS: PV ノードは最初の手と窓に入った手を全窓で読み直す
        if pv_node && (move_count == 1 || (value > alpha && (root_node || value < beta))) {
            st.stack[ply_idx + 1].pv.clear();
            value = -search_node::<P, PV>(st, ctx, pos, new_depth, -beta, -alpha, ply + 1, false);
        }

        pos.undo_move(mv);

        if st.abort {
            return Value::ZERO;
        }

        if root_node {
            let sel_depth = st.sel_depth;
            let child_pv = &st.stack[ply_idx + 1].pv;
            let mut changed = false;
            if let Some(rm) = st.root_moves.find_mut(mv) {
                rm.update_average(value);
                if move_count == 1 || value > alpha {
                    rm.score = value;
                    rm.uci_score = value;
                    rm.sel_depth = sel_depth;
                    rm.score_lowerbound = value >= beta;
                    rm.score_upperbound = value <= alpha;
                    rm.pv.truncate(1);
                    rm.pv.extend_from_slice(child_pv);
                    changed = move_count > 1;
                } else {
                    // 順位付けのため、読み切れなかった手は最下位に置く
                    rm.score = -Value::INFINITE;
                }
            }
            if changed && st.pv_idx == 0 {
                st.best_move_changes += 1.0;
            }
        }

        if value > best_value {
            best_value = value;
            if value > alpha {
                best_move = mv;
                if pv_node && !root_node {
                    update_pv(&mut st.stack, ply, mv);
                }
                if value >= beta {
                    st.stack[ply_idx].cutoff_cnt += 1;
                    inc_stat_by_depth!(st, cutoff_by_depth, depth);
                    if move_count == 1 {
                        inc_stat_by_depth!(st, first_move_cutoff_by_depth, depth);
                    }
                    break;
                }
                alpha = value;
            }
        }

        if mv != best_move && move_count <= 32 {
            if is_tactical {
                captures_tried.push(mv);
            } else {
                quiets_tried.push(mv);
            }
        }
    }

    // Step 11. 合法手なし / 統計更新
    if move_count == 0 {
        best_value = if excluded_move.is_some() {
            alpha
        } else if in_check {
            Value::mated_in(ply)
        } else {
            Value::DRAW
        };
    } else if best_move.is_some() {
        update_all_stats(
            st,
            ctx,
            pos,
            ply,
            best_move,
            tt_move,
            &quiets_tried,
            &captures_tried,
            depth,
            move_count,
        );
    }

    if pv_node {
        best_value = best_value.min(max_value);
    }

    // 置換表に保存（singular 探索と multi-PV の2本目以降は保存しない）
    if excluded_move.is_none() && !(root_node && st.pv_idx > 0) {
        let bound = if best_value >= beta {
            Bound::Lower
        } else if pv_node && best_move.is_some() {
            Bound::Exact
        } else {
            Bound::Upper
        };
        tt_ctx.result.write(
            pos_key,
            value_to_tt(best_value, ply),
            tt_pv,
            bound,
            depth,
            best_move,
            static_eval,
            ctx.tt.generation(),
        );
    }

    best_value
}
