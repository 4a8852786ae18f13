//! 探索で使う型
//!
//! - `NodeType`: ノード種別（const generic で渡す）
//! - `Stack`: plyごとの探索スタック
//! - `RootMove` / `RootMoves`: ルートの候補手と読み筋

use smallvec::SmallVec;

use crate::types::{Depth, Move, Value, MAX_PLY};

use super::history::ContHistKey;

// =============================================================================
// NodeType
// =============================================================================

/// ノード種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    /// null window で探索するノード
    NonPV = 0,
    /// PVノード
    PV = 1,
    /// ルート
    Root = 2,
}

// =============================================================================
// Stack
// =============================================================================

/// 探索スタックの要素数（静止探索や延長でMAX_PLYを少し超えるため余裕を持たせる）
pub const STACK_SIZE: usize = (MAX_PLY + 10) as usize;

/// plyごとの探索情報
///
/// このplyに指し手が指された時点で書き込まれ、子ノードから参照される。
#[derive(Clone)]
pub struct Stack {
    /// このノードからの読み筋
    pub pv: Vec<Move>,
    /// このノードで探索中の指し手（null move は `Move::NONE`）
    pub current_move: Move,
    /// singular extension で除外する手
    pub excluded_move: Move,
    /// キラー手
    pub killers: [Move; 2],
    /// 静的評価値（王手中は `Value::NONE`）
    pub static_eval: Value,
    /// 探索した手の数
    pub move_count: i32,
    pub in_check: bool,
    /// 置換表上でPVだったか
    pub tt_pv: bool,
    pub tt_hit: bool,
    /// 直前の手の history 合計（LMR用）
    pub stat_score: i32,
    /// `current_move` を指した後の continuation history キー
    pub cont_key: ContHistKey,
    /// この枝で行った二重延長の回数
    pub double_extensions: i32,
    /// 子ノードで起きたβカット数
    pub cutoff_cnt: i32,
}

impl Default for Stack {
    fn default() -> Self {
        Self {
            pv: Vec::with_capacity(MAX_PLY as usize + 1),
            current_move: Move::NONE,
            excluded_move: Move::NONE,
            killers: [Move::NONE; 2],
            static_eval: Value::NONE,
            move_count: 0,
            in_check: false,
            tt_pv: false,
            tt_hit: false,
            stat_score: 0,
            cont_key: ContHistKey::NONE,
            double_extensions: 0,
            cutoff_cnt: 0,
        }
    }
}

impl Stack {
    /// 探索開始時の状態に戻す（pvのバッファは再利用）
    pub fn reset(&mut self) {
        self.pv.clear();
        self.current_move = Move::NONE;
        self.excluded_move = Move::NONE;
        self.killers = [Move::NONE; 2];
        self.static_eval = Value::NONE;
        self.move_count = 0;
        self.in_check = false;
        self.tt_pv = false;
        self.tt_hit = false;
        self.stat_score = 0;
        self.cont_key = ContHistKey::NONE;
        self.double_extensions = 0;
        self.cutoff_cnt = 0;
    }

    /// キラー手を更新（同じ手は重複させない）
    #[inline]
    pub fn update_killers(&mut self, mv: Move) {
        if self.killers[0] != mv {
            self.killers[1] = self.killers[0];
            self.killers[0] = mv;
        }
    }
}

/// 探索スタック全体を確保する
pub fn new_stack() -> Vec<Stack> {
    vec![Stack::default(); STACK_SIZE]
}

/// 探索済みの手のリスト（history のペナルティ用）
pub type SearchedMoveList = SmallVec<[Move; 32]>;

// =============================================================================
// RootMove
// =============================================================================

/// ルートの候補手
#[derive(Debug, Clone)]
pub struct RootMove {
    /// 今回の反復での評価値（未探索は `-INFINITE`）
    pub score: Value,
    /// 前回の反復での評価値
    pub previous_score: Value,
    /// 反復ごとの評価値の平均（aspiration window の中心）
    pub average_score: Value,
    /// 表示用の評価値（fail low/high 中の値を含む）
    pub uci_score: Value,
    pub score_lowerbound: bool,
    pub score_upperbound: bool,
    pub sel_depth: i32,
    /// 読み筋（先頭がこの手）
    pub pv: Vec<Move>,
}

impl RootMove {
    pub fn new(mv: Move) -> Self {
        Self {
            score: -Value::INFINITE,
            previous_score: -Value::INFINITE,
            average_score: -Value::INFINITE,
            uci_score: -Value::INFINITE,
            score_lowerbound: false,
            score_upperbound: false,
            sel_depth: 0,
            pv: vec![mv],
        }
    }

    /// この候補手
    #[inline]
    pub fn mv(&self) -> Move {
        self.pv[0]
    }

    /// 反復の評価値を平均に織り込む
    pub fn update_average(&mut self, value: Value) {
        self.average_score = if self.average_score == -Value::INFINITE {
            value
        } else {
            Value::new((value.raw() + self.average_score.raw()) / 2)
        };
    }
}

/// ルートの候補手リスト
#[derive(Debug, Clone, Default)]
pub struct RootMoves {
    moves: Vec<RootMove>,
}

impl RootMoves {
    pub fn new() -> Self {
        Self::default()
    }

    /// 合法手から作る（`search_moves` が空でなければその手に限定する）
    pub fn from_moves(legal: &[Move], search_moves: &[Move]) -> Self {
        let moves = legal
            .iter()
            .filter(|mv| search_moves.is_empty() || search_moves.contains(mv))
            .map(|&mv| RootMove::new(mv))
            .collect();
        Self { moves }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<&RootMove> {
        self.moves.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RootMove> {
        self.moves.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, RootMove> {
        self.moves.iter_mut()
    }

    /// 指し手で検索
    pub fn find_mut(&mut self, mv: Move) -> Option<&mut RootMove> {
        self.moves.iter_mut().find(|rm| rm.mv() == mv)
    }

    pub fn find(&self, mv: Move) -> Option<&RootMove> {
        self.moves.iter().find(|rm| rm.mv() == mv)
    }

    /// `[start, end)` を評価値の降順で安定ソートする
    ///
    /// 同点は前回の評価値が高い方を先にする。
    pub fn stable_sort_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.moves.len());
        if start >= end {
            return;
        }
        self.moves[start..end].sort_by(|a, b| {
            b.score.cmp(&a.score).then_with(|| b.previous_score.cmp(&a.previous_score))
        });
    }

    /// 反復の開始時に前回の評価値を保存する
    pub fn save_previous_scores(&mut self) {
        for rm in &mut self.moves {
            rm.previous_score = rm.score;
        }
    }

    /// 指定の手を先頭に移動する（それ以外の順序は保つ）
    pub fn move_to_front(&mut self, mv: Move) {
        if let Some(idx) = self.moves.iter().position(|rm| rm.mv() == mv) {
            self.moves[..=idx].rotate_right(1);
        }
    }
}

impl std::ops::Index<usize> for RootMoves {
    type Output = RootMove;

    #[inline]
    fn index(&self, idx: usize) -> &RootMove {
        &self.moves[idx]
    }
}

impl std::ops::IndexMut<usize> for RootMoves {
    #[inline]
    fn index_mut(&mut self, idx: usize) -> &mut RootMove {
        &mut self.moves[idx]
    }
}

/// 探索深さの上限（ルートの反復深化で使う）
pub const MAX_SEARCH_DEPTH: Depth = MAX_PLY - 1;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, Piece, PieceType, Square};

    fn mv(from: u8, to: u8) -> Move {
        Move::new(
            Square::from_index_masked(from as u16),
            Square::from_index_masked(to as u16),
            Piece::new(Color::White, PieceType::Knight),
        )
    }

    #[test]
    fn test_stack_size_covers_max_ply() {
        assert!(STACK_SIZE > MAX_PLY as usize + 6);
        let stack = new_stack();
        assert_eq!(stack.len(), STACK_SIZE);
        assert!(stack[0].current_move.is_none());
        assert_eq!(stack[0].static_eval, Value::NONE);
    }

    #[test]
    fn test_update_killers_no_duplicates() {
        let mut ss = Stack::default();
        let a = mv(1, 18);
        let b = mv(6, 21);
        ss.update_killers(a);
        ss.update_killers(a);
        assert_eq!(ss.killers, [a, Move::NONE]);
        ss.update_killers(b);
        assert_eq!(ss.killers, [b, a]);
    }

    #[test]
    fn test_root_moves_search_moves_filter() {
        let legal = [mv(1, 16), mv(1, 18), mv(6, 21)];
        let all = RootMoves::from_moves(&legal, &[]);
        assert_eq!(all.len(), 3);
        let only = RootMoves::from_moves(&legal, &[mv(6, 21)]);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].mv(), mv(6, 21));
    }

    #[test]
    fn test_stable_sort_range_keeps_ties_in_order() {
        let legal = [mv(1, 16), mv(1, 18), mv(6, 21), mv(6, 23)];
        let mut rms = RootMoves::from_moves(&legal, &[]);
        rms[0].score = Value::new(10);
        rms[1].score = Value::new(50);
        rms[2].score = Value::new(10);
        rms[3].score = Value::new(90);
        rms.stable_sort_range(1, 4);
        // 先頭は範囲外なので動かない
        assert_eq!(rms[0].mv(), mv(1, 16));
        assert_eq!(rms[1].mv(), mv(6, 23));
        assert_eq!(rms[2].mv(), mv(1, 18));
        assert_eq!(rms[3].mv(), mv(6, 21));
    }

    #[test]
    fn test_move_to_front() {
        let legal = [mv(1, 16), mv(1, 18), mv(6, 21)];
        let mut rms = RootMoves::from_moves(&legal, &[]);
        rms.move_to_front(mv(6, 21));
        let order: Vec<_> = rms.iter().map(|rm| rm.mv()).collect();
        assert_eq!(order, vec![mv(6, 21), mv(1, 16), mv(1, 18)]);
    }

    #[test]
    fn test_average_score() {
        let mut rm = RootMove::new(mv(1, 18));
        rm.update_average(Value::new(100));
        assert_eq!(rm.average_score, Value::new(100));
        rm.update_average(Value::new(0));
        assert_eq!(rm.average_score, Value::new(50));
    }
}
