//! History統計
//!
//! 探索中の手の成功/失敗を記録し、手の順序付けに利用する。
//!
//! - `StatsEntry`: 範囲制限付き履歴エントリ
//! - `ButterflyHistory`: [Color][from_to] -> score
//! - `CapturePieceToHistory`: [piece][to][captured_pt] -> score
//! - `ContinuationHistory`: [prev_pc][prev_to][pc][to] -> score
//! - `CounterMoveHistory`: [piece][square] -> Move
//!
//! 各テーブルはヒープ上の平坦な配列で持ち、スレッドごとに1組を所有する。

use crate::types::{Color, Move, Piece, PieceType, Square};

use super::tune_params::SearchTuneParams;

// =============================================================================
// 定数
// =============================================================================

/// from_toインデックスのサイズ
pub const FROM_TO_SIZE: usize = Square::NUM * Square::NUM;

/// 駒種の数（None含む）
const PIECE_TYPE_NUM: usize = PieceType::NUM;

/// 駒の数（先後含む、NONE含む）
const PIECE_NUM: usize = Piece::NUM;

/// ButterflyHistory の上限
pub const BUTTERFLY_LIMIT: i32 = 7183;
/// CapturePieceToHistory の上限
pub const CAPTURE_LIMIT: i32 = 10692;
/// ContinuationHistory の上限
pub const CONTINUATION_LIMIT: i32 = 30000;

/// MovePicker が参照する継続手の手数（1,2,4,6手前）
pub const CONTINUATION_PLIES: [usize; 4] = [1, 2, 4, 6];

// =============================================================================
// StatsEntry
// =============================================================================

/// 履歴統計の1エントリ
///
/// 値の範囲を [-D, D] に制限しながら更新できる。
#[derive(Clone, Copy, Debug, Default)]
pub struct StatsEntry<const D: i32> {
    value: i16,
}

impl<const D: i32> StatsEntry<D> {
    /// 値を取得
    #[inline]
    pub fn get(&self) -> i16 {
        self.value
    }

    /// 値を設定
    #[inline]
    pub fn set(&mut self, v: i16) {
        self.value = v;
    }

    /// ボーナス値を加算（範囲制限付き）
    ///
    /// 更新式: entry += clamp(bonus, -D, D) - entry * |clamp(bonus, -D, D)| / D
    ///
    /// - bonus == D のとき、entry が D に収束
    /// - bonus が小さいとき、ほぼそのまま加算
    /// - 自然にゼロ方向に引っ張られる
    #[inline]
    pub fn update(&mut self, bonus: i32) {
        let clamped = bonus.clamp(-D, D);
        let delta = clamped - (self.value as i32) * clamped.abs() / D;
        self.value = (self.value as i32 + delta) as i16;
        debug_assert!(
            (self.value as i32).abs() <= D,
            "StatsEntry out of range: {} (D={})",
            self.value,
            D
        );
    }
}

fn zeroed<const D: i32>(len: usize) -> Box<[StatsEntry<D>]> {
    vec![StatsEntry::default(); len].into_boxed_slice()
}

fn fill_zero<const D: i32>(table: &mut [StatsEntry<D>]) {
    table.iter_mut().for_each(|e| e.set(0));
}

// =============================================================================
// ButterflyHistory
// =============================================================================

/// ButterflyHistory: [Color][from_to] -> score
///
/// 静かな手（quiet moves）の成功/失敗を記録。
/// 手の移動元と移動先でインデックス。
pub struct ButterflyHistory {
    table: Box<[StatsEntry<BUTTERFLY_LIMIT>]>,
}

impl ButterflyHistory {
    pub fn new() -> Self {
        Self {
            table: zeroed(Color::NUM * FROM_TO_SIZE),
        }
    }

    #[inline]
    fn index(color: Color, mv: Move) -> usize {
        color.index() * FROM_TO_SIZE + mv.from().index() * Square::NUM + mv.to().index()
    }

    /// 値を取得
    #[inline]
    pub fn get(&self, color: Color, mv: Move) -> i16 {
        self.table[Self::index(color, mv)].get()
    }

    /// 値を更新
    #[inline]
    pub fn update(&mut self, color: Color, mv: Move, bonus: i32) {
        self.table[Self::index(color, mv)].update(bonus);
    }

    pub fn clear(&mut self) {
        fill_zero(&mut self.table);
    }
}

impl Default for ButterflyHistory {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// CapturePieceToHistory
// =============================================================================

/// CapturePieceToHistory: [piece][to][captured_piece_type] -> score
///
/// 駒取り・成りの履歴。成りで駒を取らない手は captured_pt = 0 を使う。
pub struct CapturePieceToHistory {
    table: Box<[StatsEntry<CAPTURE_LIMIT>]>,
}

impl CapturePieceToHistory {
    pub fn new() -> Self {
        Self {
            table: zeroed(PIECE_NUM * Square::NUM * PIECE_TYPE_NUM),
        }
    }

    #[inline]
    fn index(pc: Piece, to: Square, captured: Piece) -> usize {
        (pc.index() * Square::NUM + to.index()) * PIECE_TYPE_NUM + captured.type_index()
    }

    /// 値を取得（捕獲がない場合 captured = NONE）
    #[inline]
    pub fn get(&self, pc: Piece, to: Square, captured: Piece) -> i16 {
        self.table[Self::index(pc, to, captured)].get()
    }

    /// 指し手から取得
    #[inline]
    pub fn get_move(&self, mv: Move) -> i16 {
        self.get(mv.piece(), mv.to(), mv.captured())
    }

    #[inline]
    pub fn update(&mut self, pc: Piece, to: Square, captured: Piece, bonus: i32) {
        self.table[Self::index(pc, to, captured)].update(bonus);
    }

    #[inline]
    pub fn update_move(&mut self, mv: Move, bonus: i32) {
        self.update(mv.piece(), mv.to(), mv.captured(), bonus);
    }

    pub fn clear(&mut self) {
        fill_zero(&mut self.table);
    }
}

impl Default for CapturePieceToHistory {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ContinuationHistory
// =============================================================================

/// 継続手履歴のキー（その ply に到達した手の駒と移動先）
///
/// null move やルートでは `NONE` を使い、参照は 0、更新は無視する。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContHistKey {
    pub piece: Piece,
    pub to: Square,
}

impl ContHistKey {
    pub const NONE: ContHistKey = ContHistKey {
        piece: Piece::NONE,
        to: Square::A1,
    };

    /// 指し手からキーを作る
    #[inline]
    pub const fn of(mv: Move) -> ContHistKey {
        ContHistKey {
            piece: mv.piece(),
            to: mv.to(),
        }
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.piece.is_none()
    }
}

impl Default for ContHistKey {
    fn default() -> Self {
        Self::NONE
    }
}

/// ContinuationHistory: [prev_piece][prev_to][piece][to] -> score
///
/// 連続する2手の組み合わせ履歴。
/// 過去の手の駒と移動先から、現在の駒と移動先へのスコア。
pub struct ContinuationHistory {
    table: Box<[StatsEntry<CONTINUATION_LIMIT>]>,
}

impl ContinuationHistory {
    pub fn new() -> Self {
        let side = PIECE_NUM * Square::NUM;
        Self {
            table: zeroed(side * side),
        }
    }

    #[inline]
    fn index(prev: ContHistKey, pc: Piece, to: Square) -> usize {
        let side = PIECE_NUM * Square::NUM;
        (prev.piece.index() * Square::NUM + prev.to.index()) * side
            + pc.index() * Square::NUM
            + to.index()
    }

    /// 値を取得
    #[inline]
    pub fn get(&self, prev: ContHistKey, pc: Piece, to: Square) -> i16 {
        if prev.is_none() {
            return 0;
        }
        self.table[Self::index(prev, pc, to)].get()
    }

    /// 値を更新
    #[inline]
    pub fn update(&mut self, prev: ContHistKey, pc: Piece, to: Square, bonus: i32) {
        if prev.is_none() {
            return;
        }
        self.table[Self::index(prev, pc, to)].update(bonus);
    }

    pub fn clear(&mut self) {
        fill_zero(&mut self.table);
    }
}

impl Default for ContinuationHistory {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// CounterMoveHistory
// =============================================================================

/// CounterMoveHistory: [piece][square] -> Move
///
/// 直前の相手の手に対するカウンター手。
pub struct CounterMoveHistory {
    table: Vec<Move>,
}

impl CounterMoveHistory {
    pub fn new() -> Self {
        Self {
            table: vec![Move::NONE; PIECE_NUM * Square::NUM],
        }
    }

    /// 値を取得
    #[inline]
    pub fn get(&self, prev: ContHistKey) -> Move {
        self.table[prev.piece.index() * Square::NUM + prev.to.index()]
    }

    /// 値を設定
    #[inline]
    pub fn set(&mut self, prev: ContHistKey, mv: Move) {
        if prev.is_none() {
            return;
        }
        self.table[prev.piece.index() * Square::NUM + prev.to.index()] = mv;
    }

    pub fn clear(&mut self) {
        self.table.fill(Move::NONE);
    }
}

impl Default for CounterMoveHistory {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// HistoryTables
// =============================================================================

/// 履歴/統計テーブルをまとめて保持するコンテナ
pub struct HistoryTables {
    pub main_history: ButterflyHistory,
    pub capture_history: CapturePieceToHistory,
    pub continuation_history: ContinuationHistory,
    pub counter_moves: CounterMoveHistory,
}

impl HistoryTables {
    /// 新しいHistoryTablesを作成（ヒープ確保）
    pub fn new_boxed() -> Box<Self> {
        Box::new(Self {
            main_history: ButterflyHistory::new(),
            capture_history: CapturePieceToHistory::new(),
            continuation_history: ContinuationHistory::new(),
            counter_moves: CounterMoveHistory::new(),
        })
    }

    /// すべての履歴テーブルをクリア
    pub fn clear(&mut self) {
        self.main_history.clear();
        self.capture_history.clear();
        self.continuation_history.clear();
        self.counter_moves.clear();
    }

    /// quiet の手の順序付けスコア
    ///
    /// `2 * butterfly + cont(1) + cont(2) + cont(4) + cont(6)`
    #[inline]
    pub fn quiet_score(&self, color: Color, mv: Move, cont: &[ContHistKey; 4]) -> i32 {
        let pc = mv.piece();
        let to = mv.to();
        2 * self.main_history.get(color, mv) as i32
            + cont
                .iter()
                .map(|&key| self.continuation_history.get(key, pc, to) as i32)
                .sum::<i32>()
    }
}

// =============================================================================
// ボーナス計算
// =============================================================================

/// History更新用のボーナスを計算
///
/// `min(mult*depth + offset, max) + tt_bonus*(bestMove == ttMove)`
#[inline]
pub fn stat_bonus(depth: i32, is_tt_move: bool, tune_params: &SearchTuneParams) -> i32 {
    let base = (tune_params.stat_bonus_depth_mult * depth + tune_params.stat_bonus_offset)
        .min(tune_params.stat_bonus_max);
    if is_tt_move {
        base + tune_params.stat_bonus_tt_bonus
    } else {
        base
    }
}

/// マイナスボーナス（ペナルティ）を計算
///
/// quiet/capture 共通で使用。
#[inline]
pub fn stat_malus(depth: i32, move_count: i32, tune_params: &SearchTuneParams) -> i32 {
    ((tune_params.stat_malus_depth_mult * depth + tune_params.stat_malus_offset)
        .min(tune_params.stat_malus_max)
        - tune_params.stat_malus_move_count_mult * move_count)
        .max(0)
}

// =============================================================================
// テスト
// =============================================================================
