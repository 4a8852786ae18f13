//! 探索ヘルパー関数群
//!
//! 中断チェック、ContinuationHistory のキー取得、history 更新。

use std::sync::atomic::Ordering;

use crate::position::{GenType, MoveList, SearchPosition};
use crate::types::{Color, Move, Value};

use super::alpha_beta::{SearchContext, SearchState};
use super::history::{ContHistKey, CONTINUATION_PLIES};
use super::signals::StopLevel;
use super::types::Stack;

// =============================================================================
// 中断チェック
// =============================================================================

/// 中断チェックの間隔（ノード数）
const NODE_CHECK_INTERVAL: i32 = 512;

/// 中断チェック
///
/// 512ノードごとに停止信号を見る。メインスレッドは全体のノード数と
/// 最大思考時間も確認し、超えていれば `StopNow` に引き上げる。
#[inline]
pub(super) fn check_abort(st: &mut SearchState, ctx: &SearchContext<'_>) -> bool {
    if st.abort {
        return true;
    }

    st.calls_cnt -= 1;
    if st.calls_cnt > 0 {
        return false;
    }
    st.calls_cnt = if ctx.limits.nodes > 0 {
        NODE_CHECK_INTERVAL.min((ctx.limits.nodes / 1024) as i32).max(1)
    } else {
        NODE_CHECK_INTERVAL
    };

    let total = flush_nodes(st, ctx);

    if ctx.signals.stop_now() {
        st.abort = true;
        return true;
    }

    if ctx.thread_id == 0 {
        if ctx.limits.nodes > 0 && total >= ctx.limits.nodes {
            log::debug!("node limit reached: nodes={total} limit={}", ctx.limits.nodes);
            ctx.signals.escalate(StopLevel::StopNow);
            st.abort = true;
            return true;
        }

        if ctx.limits.is_time_limited() && st.time_manager.should_stop_immediately() {
            log::debug!(
                "maximum time reached: elapsed={}ms maximum={}ms",
                st.time_manager.elapsed(),
                st.time_manager.maximum()
            );
            ctx.signals.escalate(StopLevel::StopNow);
            st.abort = true;
            return true;
        }
    }

    false
}

/// 未反映のノード数を全体カウンタに足し込み、全体のノード数を返す
#[inline]
pub(super) fn flush_nodes(st: &mut SearchState, ctx: &SearchContext<'_>) -> u64 {
    let delta = st.nodes - st.nodes_flushed;
    st.nodes_flushed = st.nodes;
    ctx.total_nodes.fetch_add(delta, Ordering::Relaxed) + delta
}

// =============================================================================
// 引き分け・PV
// =============================================================================

/// 合法手が1つでもあるか
pub(super) fn has_legal_move<P: SearchPosition>(pos: &mut P) -> bool {
    let mut list = MoveList::new();
    let kind = if pos.in_check() {
        GenType::Evasions
    } else {
        GenType::All
    };
    pos.generate(kind, &mut list);
    list.into_iter().any(|mv| {
        if pos.do_move(mv) {
            pos.undo_move(mv);
            true
        } else {
            false
        }
    })
}

/// 千日手・50手ルールで引き分けになった局面の値
///
/// 50手目でも詰んでいれば詰みを優先する。
pub(super) fn draw_value<P: SearchPosition>(pos: &mut P, ply: i32) -> Value {
    if pos.rule50_count() >= 100 && pos.in_check() && !has_legal_move(pos) {
        Value::mated_in(ply)
    } else {
        Value::DRAW
    }
}

/// 引き分けか（千日手または50手ルール）
#[inline]
pub(super) fn is_draw<P: SearchPosition>(pos: &P, ply: i32) -> bool {
    pos.rule50_count() >= 100 || pos.is_repetition(ply)
}

/// `ply` の読み筋を `mv` + 子ノードの読み筋にする
#[inline]
pub(super) fn update_pv(stack: &mut [Stack], ply: i32, mv: Move) {
    let (head, tail) = stack.split_at_mut(ply as usize + 1);
    let pv = &mut head[ply as usize].pv;
    pv.clear();
    pv.push(mv);
    pv.extend_from_slice(&tail[0].pv);
}

// =============================================================================
// ContinuationHistory
// =============================================================================

/// `ply` のノードから見た 1, 2, 4, 6 手前の continuation history キー
#[inline]
pub(super) fn cont_keys(st: &SearchState, ply: i32) -> [ContHistKey; 4] {
    let mut keys = [ContHistKey::NONE; 4];
    for (key, &back) in keys.iter_mut().zip(CONTINUATION_PLIES.iter()) {
        let target = ply - back as i32;
        if target >= 0 {
            *key = st.stack[target as usize].cont_key;
        }
    }
    keys
}

/// 指し手を指した後のスタック設定
#[inline]
pub(super) fn set_current_move(st: &mut SearchState, ply: i32, mv: Move) {
    let ss = &mut st.stack[ply as usize];
    ss.current_move = mv;
    ss.cont_key = ContHistKey::of(mv);
}

/// null move を指した後のスタック設定
#[inline]
pub(super) fn set_null_move(st: &mut SearchState, ply: i32) {
    let ss = &mut st.stack[ply as usize];
    ss.current_move = Move::NONE;
    ss.cont_key = ContHistKey::NONE;
}

// =============================================================================
// history 更新
// =============================================================================

/// continuation histories を更新
///
/// 王手中は2手前までに限る。
#[inline]
pub(super) fn update_continuation_histories(
    st: &mut SearchState,
    ply: i32,
    in_check: bool,
    mv: Move,
    bonus: i32,
) {
    let pc = mv.piece();
    let to = mv.to();
    for &back in CONTINUATION_PLIES.iter() {
        if in_check && back > 2 {
            break;
        }
        let target = ply - back as i32;
        if target < 0 {
            break;
        }
        let key = st.stack[target as usize].cont_key;
        if !key.is_none() {
            st.history.continuation_history.update(key, pc, to, bonus);
        }
    }
}

/// quiet の手の butterfly と continuation history を更新
#[inline]
pub(super) fn update_quiet_histories(
    st: &mut SearchState,
    ply: i32,
    us: Color,
    in_check: bool,
    mv: Move,
    bonus: i32,
) {
    st.history.main_history.update(us, mv, bonus);
    update_continuation_histories(st, ply, in_check, mv, bonus);
}

/// quiet の最善手の統計（キラー、カウンター手、history）を更新
#[inline]
pub(super) fn update_quiet_stats(
    st: &mut SearchState,
    ply: i32,
    us: Color,
    in_check: bool,
    mv: Move,
    bonus: i32,
) {
    st.stack[ply as usize].update_killers(mv);
    update_quiet_histories(st, ply, us, in_check, mv, bonus);

    if ply > 0 {
        let prev = st.stack[(ply - 1) as usize].cont_key;
        if !prev.is_none() {
            st.history.counter_moves.set(prev, mv);
        }
    }
}

/// βカットまたはPV確定時の history 一括更新
///
/// 最善手にボーナス、試して外れた手にペナルティを与える。
#[allow(clippy::too_many_arguments)]
pub(super) fn update_all_stats<P: SearchPosition>(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &P,
    ply: i32,
    best_move: Move,
    tt_move: Move,
    quiets_tried: &[Move],
    captures_tried: &[Move],
    depth: i32,
    move_count: i32,
) {
    let us = pos.side_to_move();
    let in_check = st.stack[ply as usize].in_check;
    let bonus = super::history::stat_bonus(depth, best_move == tt_move, ctx.tune_params);
    let malus = super::history::stat_malus(depth, move_count, ctx.tune_params);

    if best_move.is_tactical() {
        st.history.capture_history.update_move(best_move, bonus);
    } else {
        update_quiet_stats(st, ply, us, in_check, best_move, bonus);
        for &mv in quiets_tried {
            update_quiet_histories(st, ply, us, in_check, mv, -malus);
        }
    }

    for &mv in captures_tried {
        st.history.capture_history.update_move(mv, -malus);
    }
}
