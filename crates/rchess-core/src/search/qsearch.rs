//! 静止探索 (Quiescence Search)
//!
//! 駒取り・成り（王手中は回避手）だけを読み、局面が落ち着くまで探索を続ける。

use crate::eval::see_value;
use crate::position::SearchPosition;
use crate::tt::{value_from_tt, value_to_tt};
use crate::types::{Bound, Depth, Move, PieceType, Value, DEPTH_QS, MAX_PLY};

use super::alpha_beta::{SearchContext, SearchState};
use super::movepicker::MovePicker;
use super::search_helpers::{
    check_abort, cont_keys, draw_value, is_draw, set_current_move, update_pv,
};
use super::stats::inc_stat;
use super::types::NodeType;

/// 静止探索
///
/// fail-soft。`depth` は 0 以下で、置換表への格納は `DEPTH_QS` で行う。
pub(super) fn qsearch<P: SearchPosition, const NT: u8>(
    st: &mut SearchState,
    ctx: &SearchContext<'_>,
    pos: &mut P,
    depth: Depth,
    mut alpha: Value,
    beta: Value,
    ply: i32,
) -> Value {
    let pv_node = NT != NodeType::NonPV as u8;
    let in_check = pos.in_check();
    debug_assert!(alpha < beta);
    debug_assert!(pv_node || alpha == beta - 1);

    if pv_node {
        st.stack[ply as usize].pv.clear();
        st.sel_depth = st.sel_depth.max(ply + 1);
    }

    st.nodes += 1;
    inc_stat!(st, qsearch_nodes);

    if check_abort(st, ctx) {
        return Value::ZERO;
    }

    if is_draw(pos, ply) {
        return draw_value(pos, ply);
    }

    if ply >= MAX_PLY {
        return if in_check { Value::DRAW } else { pos.evaluate() };
    }

    st.stack[ply as usize].in_check = in_check;

    // 置換表
    let key = pos.key();
    let probe = ctx.tt.probe_entry(key);
    let tt_hit = probe.found;
    let tt_data = probe.data;
    let tt_value = if tt_hit {
        value_from_tt(tt_data.value, ply)
    } else {
        Value::NONE
    };
    let tt_move = if tt_hit {
        pos.decode_move(tt_data.move16)
    } else {
        Move::NONE
    };
    let pv_hit = tt_hit && tt_data.is_pv;

    if !pv_node
        && tt_hit
        && tt_value != Value::NONE
        && tt_data.depth >= DEPTH_QS
        && bound_allows(tt_data.bound, tt_value, beta)
    {
        inc_stat!(st, tt_cutoff);
        return tt_value;
    }

    // stand pat
    let static_eval;
    let mut best_value;
    let futility_base;
    if in_check {
        static_eval = Value::NONE;
        best_value = -Value::INFINITE;
        futility_base = -Value::INFINITE;
    } else {
        static_eval = if tt_hit && tt_data.eval != Value::NONE {
            tt_data.eval
        } else {
            pos.evaluate()
        };
        best_value = static_eval;

        // 置換表の値の方が正確ならそれを使う
        if tt_hit
            && tt_value != Value::NONE
            && !tt_value.is_decisive()
            && bound_allows(tt_data.bound, tt_value, best_value + 1)
        {
            best_value = tt_value;
        }

        if best_value >= beta {
            if !tt_hit {
                probe.write(
                    key,
                    value_to_tt(best_value, ply),
                    false,
                    Bound::Lower,
                    DEPTH_QS,
                    Move::NONE,
                    static_eval,
                    ctx.tt.generation(),
                );
            }
            return best_value;
        }

        if best_value > alpha {
            alpha = best_value;
        }

        // delta pruning
        let queen = see_value(PieceType::Queen);
        let mut max_gain = queen;
        if pos.has_promotion_candidate() {
            max_gain += queen - see_value(PieceType::Pawn);
        }
        if best_value + ctx.tune_params.qsearch_delta_margin + max_gain < alpha {
            return best_value;
        }

        futility_base = static_eval + ctx.tune_params.qsearch_futility_margin;
    }

    let cont = cont_keys(st, ply);
    let mut mp = MovePicker::new_qsearch(pos, tt_move, cont);
    let mut best_move = Move::NONE;
    let mut move_count = 0;

    loop {
        let mv = mp.next_move(pos, &st.history);
        if mv.is_none() {
            break;
        }

        if !in_check && !best_value.is_loss() && !mv.is_promotion() && !pos.gives_check(mv) {
            let victim = mv.captured().piece_type().map_or(0, see_value);
            let futility_value = futility_base + victim;
            if futility_value <= alpha {
                best_value = best_value.max(futility_value);
                continue;
            }
            if !pos.see_ge(mv, 0) {
                continue;
            }
        }

        if !pos.do_move(mv) {
            continue;
        }
        move_count += 1;
        set_current_move(st, ply, mv);

        let value = -qsearch::<P, NT>(st, ctx, pos, depth - 1, -beta, -alpha, ply + 1);
        pos.undo_move(mv);

        if st.abort {
            return Value::ZERO;
        }

        if value > best_value {
            best_value = value;
            if value > alpha {
                best_move = mv;
                if pv_node {
                    update_pv(&mut st.stack, ply, mv);
                }
                if value >= beta {
                    break;
                }
                alpha = value;
            }
        }
    }

    if in_check && move_count == 0 {
        return Value::mated_in(ply);
    }

    let bound = if best_value >= beta {
        Bound::Lower
    } else if pv_node && best_move.is_some() {
        Bound::Exact
    } else {
        Bound::Upper
    };
    probe.write(
        key,
        value_to_tt(best_value, ply),
        pv_hit,
        bound,
        DEPTH_QS,
        best_move,
        static_eval,
        ctx.tt.generation(),
    );

    best_value
}

/// 置換表の境界が `value` を `beta` に対して確定させるか
#[inline]
pub(super) fn bound_allows(bound: Bound, value: Value, beta: Value) -> bool {
    if value >= beta {
        bound.is_lower()
    } else {
        bound.is_upper()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::ChessPosition;
    use crate::search::{LimitsType, SearchSignals, SearchTuneParams};
    use crate::tt::TranspositionTable;
    use std::sync::atomic::AtomicU64;

    const NON_PV: u8 = NodeType::NonPV as u8;
    const PV: u8 = NodeType::PV as u8;

    fn run_qsearch(fen: &str, pv: bool) -> (Value, Vec<String>) {
        let mut pos = ChessPosition::from_fen(fen).expect("valid fen");
        let tt = TranspositionTable::new(1);
        let tune = SearchTuneParams::default();
        let limits = LimitsType::default();
        let signals = SearchSignals::new();
        let total = AtomicU64::new(0);
        let ctx = SearchContext {
            tt: &tt,
            tune_params: &tune,
            limits: &limits,
            signals: &signals,
            total_nodes: &total,
            thread_id: 0,
        };
        let mut st = SearchState::new();
        let value = if pv {
            qsearch::<_, PV>(&mut st, &ctx, &mut pos, DEPTH_QS, -Value::INFINITE, Value::INFINITE, 0)
        } else {
            qsearch::<_, NON_PV>(&mut st, &ctx, &mut pos, DEPTH_QS, Value::new(-1), Value::ZERO, 0)
        };
        let pv = st.stack[0].pv.iter().map(|m| m.to_uci()).collect();
        (value, pv)
    }

    #[test]
    fn test_qsearch_wins_hanging_queen() {
        // 白のルークで黒のクイーンをただ取りできる
        let fen = "4k3/8/8/3q4/8/8/8/3RK3 w - - 0 1";
        let static_eval = ChessPosition::from_fen(fen).expect("valid fen").evaluate();
        let (value, pv) = run_qsearch(fen, true);
        // 駒位置評価の分だけ駒割りからずれる
        let margin = see_value(PieceType::Pawn);
        assert!(
            value.raw() >= static_eval.raw() + see_value(PieceType::Queen) - margin,
            "value = {value:?}, static_eval = {static_eval:?}"
        );
        assert!(value.raw() > see_value(PieceType::Rook) - margin, "value = {value:?}");
        assert_eq!(pv.first().map(String::as_str), Some("d1d5"));
    }

    #[test]
    fn test_qsearch_checkmated_returns_mated() {
        // 黒がバックランクで詰んでいる
        let (value, _) = run_qsearch("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1", true);
        assert_eq!(value, Value::mated_in(0));
    }

    #[test]
    fn test_qsearch_quiet_position_stands_pat() {
        let fen = "4k3/8/8/8/8/8/8/4K3 w - - 0 1";
        let pos = ChessPosition::from_fen(fen).expect("valid fen");
        let (value, pv) = run_qsearch(fen, false);
        assert_eq!(value, pos.evaluate());
        assert!(pv.is_empty());
    }

    #[test]
    fn test_bound_allows() {
        assert!(bound_allows(Bound::Lower, Value::new(10), Value::new(5)));
        assert!(!bound_allows(Bound::Upper, Value::new(10), Value::new(5)));
        assert!(bound_allows(Bound::Upper, Value::new(1), Value::new(5)));
        assert!(bound_allows(Bound::Exact, Value::new(1), Value::new(5)));
    }
}
