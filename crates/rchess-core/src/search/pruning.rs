//! 枝刈りヘルパー群
//!
//! - Razoring
//! - Reverse futility pruning
//! - Null Move Pruning
//! - ProbCut
//! - 指し手ループ内の枝刈り (LMP, Futility, SEE)

use crate::position::SearchPosition;
use crate::tt::value_to_tt;
use crate::types::{Bound, Depth, Move, Value, DEPTH_QS};

use super::alpha_beta::{search_node, SearchContext, SearchState, TTContext};
use super::movepicker::MovePicker;
use super::qsearch::qsearch;
use super::search_helpers::{set_current_move, set_null_move};
use super::stats::inc_stat;
use super::tune_params::SearchTuneParams;
use super::types::NodeType;

const NON_PV: u8 = NodeType::NonPV as u8;

// =============================================================================
// Razoring
// =============================================================================

/// Razoring
///
/// 評価値が alpha を大きく下回る浅いノードでは、静止探索で fail low を確かめて打ち切る。
#[allow(clippy::too_many_arguments)]
#[inline]
pub(super) fn try_razoring<P: SearchPosition>(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut P,
    depth: Depth,
    alpha: Value,
    ply: i32,
    eval: Value,
) -> Option<Value> {
    let tune = ctx.tune_params;
    if depth > tune.razoring_depth || eval + tune.razoring_margin * depth >= alpha {
        return None;
    }

    let value = qsearch::<P, NON_PV>(st, ctx, pos, DEPTH_QS, alpha - 1, alpha, ply);
    if value < alpha {
        inc_stat!(st, razoring_applied);
        return Some(value);
    }
    None
}

// =============================================================================
// Reverse futility pruning
// =============================================================================

/// Reverse futility pruning
///
/// 評価値がマージンを引いても beta 以上なら、評価値をそのまま返す。
#[inline]
pub(super) fn try_reverse_futility(
    st: &mut SearchState,
    tune: &SearchTuneParams,
    depth: Depth,
    beta: Value,
    eval: Value,
    improving: bool,
) -> Option<Value> {
    if depth < tune.rfp_depth
        && !eval.is_decisive()
        && eval - tune.rfp_margin * (depth - improving as i32) >= beta
    {
        inc_stat!(st, futility_pruned);
        return Some(eval);
    }
    None
}

// =============================================================================
// Null Move Pruning
// =============================================================================

/// Null move pruning
///
/// 手番を渡しても beta を超えるなら打ち切る。深いノードでは null move を
/// 禁止した検証探索で確かめる。
#[allow(clippy::too_many_arguments)]
#[inline]
pub(super) fn try_null_move_pruning<P: SearchPosition>(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut P,
    depth: Depth,
    beta: Value,
    ply: i32,
    cut_node: bool,
    eval: Value,
) -> Option<Value> {
    if ply < 1 {
        return None;
    }
    let tune = ctx.tune_params;
    let prev_move = st.stack[(ply - 1) as usize].current_move;
    let us = pos.side_to_move();

    if prev_move.is_none()
        || eval < beta
        || ply < st.nmp_min_ply
        || beta.is_loss()
        || pos.non_pawn_material(us) == 0
    {
        return None;
    }

    inc_stat!(st, nmp_attempted);
    let r = tune.nmp_reduction_base
        + depth / tune.nmp_reduction_depth_div
        + ((eval - beta).raw() / tune.nmp_eval_div).min(tune.nmp_eval_max);

    if !pos.do_null_move() {
        return None;
    }
    set_null_move(st, ply);
    let mut null_value =
        -search_node::<P, NON_PV>(st, ctx, pos, depth - r, -beta, -beta + 1, ply + 1, !cut_node);
    pos.undo_null_move();

    if st.abort || null_value < beta {
        return None;
    }

    // 証明されていない詰みスコアは返さない
    if null_value.is_decisive() {
        null_value = beta;
    }

    if st.nmp_min_ply != 0 || depth < tune.nmp_verification_depth || tune.nmp_verification == 0 {
        inc_stat!(st, nmp_cutoff);
        return Some(null_value);
    }

    // 検証探索（この間は null move を使わない）
    st.nmp_min_ply = ply + 3 * (depth - r) / 4;
    let v = search_node::<P, NON_PV>(st, ctx, pos, depth - r, beta - 1, beta, ply, false);
    st.nmp_min_ply = 0;

    if !st.abort && v >= beta {
        inc_stat!(st, nmp_cutoff);
        return Some(null_value);
    }
    None
}

// =============================================================================
// ProbCut
// =============================================================================

/// ProbCut
///
/// SEE の良い駒取りが浅い探索で `beta + margin` を超えるなら打ち切る。
#[allow(clippy::too_many_arguments)]
#[inline]
pub(super) fn try_probcut<P: SearchPosition>(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut P,
    depth: Depth,
    beta: Value,
    ply: i32,
    cut_node: bool,
    static_eval: Value,
    tt_ctx: &TTContext<'_>,
) -> Option<Value> {
    let tune = ctx.tune_params;
    if depth < tune.probcut_depth || beta.is_decisive() || static_eval == Value::NONE {
        return None;
    }

    let probcut_beta = beta + tune.probcut_margin;

    // 置換表が浅くない探索で probcut_beta に届かないと言っているなら試さない
    if tt_ctx.hit
        && tt_ctx.data.depth >= depth - 3
        && tt_ctx.value != Value::NONE
        && tt_ctx.value < probcut_beta
    {
        return None;
    }

    inc_stat!(st, probcut_attempted);
    let threshold = (probcut_beta - static_eval).raw();
    let mut mp = MovePicker::new_probcut(pos, tt_ctx.mv, threshold);
    let excluded = st.stack[ply as usize].excluded_move;

    loop {
        let mv = mp.next_move(pos, &st.history);
        if mv.is_none() {
            break;
        }
        if mv == excluded {
            continue;
        }
        if !pos.do_move(mv) {
            continue;
        }
        set_current_move(st, ply, mv);

        let mut value =
            -qsearch::<P, NON_PV>(st, ctx, pos, DEPTH_QS, -probcut_beta, -probcut_beta + 1, ply + 1);

        if value >= probcut_beta && depth - tune.probcut_reduction > 0 {
            value = -search_node::<P, NON_PV>(
                st,
                ctx,
                pos,
                depth - tune.probcut_reduction,
                -probcut_beta,
                -probcut_beta + 1,
                ply + 1,
                !cut_node,
            );
        }
        pos.undo_move(mv);

        if st.abort {
            return None;
        }

        if value >= probcut_beta {
            tt_ctx.result.write(
                tt_ctx.key,
                value_to_tt(value, ply),
                st.stack[ply as usize].tt_pv,
                Bound::Lower,
                depth - 3,
                mv,
                static_eval,
                ctx.tt.generation(),
            );
            inc_stat!(st, probcut_cutoff);
            return Some(value);
        }
    }

    None
}

// =============================================================================
// 指し手ループ内の枝刈り
// =============================================================================

/// LMP: これ以上の手数では quiet を読まない
#[inline]
pub(super) fn lmp_limit(tune: &SearchTuneParams, depth: Depth, improving: bool) -> i32 {
    (tune.lmp_base + depth * depth) / (2 - improving as i32)
}

/// 指し手ループ内の枝刈りに必要な文脈
pub(super) struct MovePruneContext {
    pub(super) depth: Depth,
    /// reduction を引いた後の深さ
    pub(super) lmr_depth: Depth,
    pub(super) alpha: Value,
    pub(super) static_eval: Value,
    pub(super) in_check: bool,
    pub(super) gives_check: bool,
    /// すでに1手以上探索したか
    pub(super) searched: bool,
}

/// Futility pruning と SEE pruning（枝刈りするなら true）
#[inline]
pub(super) fn prune_move<P: SearchPosition>(
    st: &mut SearchState,
    tune: &SearchTuneParams,
    pos: &P,
    mv: Move,
    c: &MovePruneContext,
) -> bool {
    let pruned = if mv.is_tactical() || c.gives_check {
        !pos.see_ge(mv, -tune.see_capture_margin * c.depth)
    } else {
        let futile = !c.in_check
            && c.searched
            && c.lmr_depth < tune.futility_lmr_depth
            && c.static_eval != Value::NONE
            && c.static_eval + tune.futility_base + tune.futility_per_depth * c.lmr_depth
                <= c.alpha;
        futile || !pos.see_ge(mv, -tune.see_quiet_margin * c.lmr_depth * c.lmr_depth)
    };
    if pruned {
        inc_stat!(st, move_loop_pruned);
    }
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lmp_limit_grows_with_depth() {
        let tune = SearchTuneParams::default();
        assert_eq!(lmp_limit(&tune, 1, false), (tune.lmp_base + 1) / 2);
        assert_eq!(lmp_limit(&tune, 1, true), tune.lmp_base + 1);
        assert!(lmp_limit(&tune, 6, false) > lmp_limit(&tune, 3, false));
    }

    #[test]
    fn test_reverse_futility_respects_margin() {
        let tune = SearchTuneParams::default();
        let mut st = SearchState::new();
        let beta = Value::new(100);
        let far_above = beta + tune.rfp_margin * 3 + 1;
        assert_eq!(
            try_reverse_futility(&mut st, &tune, 3, beta, far_above, false),
            Some(far_above)
        );
        assert_eq!(try_reverse_futility(&mut st, &tune, 3, beta, beta, false), None);
        // 深いノードでは適用しない
        assert_eq!(
            try_reverse_futility(&mut st, &tune, tune.rfp_depth, beta, far_above, false),
            None
        );
        // 詰みスコアはそのまま返さない
        assert_eq!(
            try_reverse_futility(&mut st, &tune, 3, beta, Value::mate_in(5), false),
            None
        );
    }
}
