//! 探索から見た局面
//!
//! 探索は盤面表現を直接知らず、`SearchPosition` トレイト越しに
//! 指し手生成・do/undo・評価・SEE・テーブルベースを呼ぶ。

mod chess;
mod see;

pub use chess::{ChessPosition, START_FEN};
#[cfg(feature = "syzygy")]
pub use chess::Tablebase;

use smallvec::SmallVec;

use crate::types::{Color, Move, Value};

/// 指し手リスト（通常は64手に収まるのでスタック上に確保）
pub type MoveList = SmallVec<[Move; 64]>;

/// 生成する指し手の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenType {
    /// すべての手
    All,
    /// 駒取りと成り
    Captures,
    /// 駒取りでも成りでもない手
    Quiets,
    /// 王手回避（王手されているときのみ意味を持つ）
    Evasions,
}

/// テーブルベースの勝敗（手番側から見た値）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TbWdl {
    Loss,
    /// 50手ルールで引き分けになる負け
    BlessedLoss,
    Draw,
    /// 50手ルールで引き分けになる勝ち
    CursedWin,
    Win,
}

/// テーブルベースの probe 結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TbProbe {
    pub wdl: TbWdl,
    pub dtz: Option<i32>,
}

/// 探索が要求する局面のインターフェース
///
/// `do_move` は自玉を王手に晒す手や指せない手に対して `false` を返し、局面を変更しない。
pub trait SearchPosition: Clone + Send {
    /// 64bit Zobrist キー
    fn key(&self) -> u64;

    fn side_to_move(&self) -> Color;

    fn in_check(&self) -> bool;

    /// 開始局面からの手数（ply）
    fn game_ply(&self) -> i32;

    /// 50手ルールのカウンタ（半手単位）
    fn rule50_count(&self) -> i32;

    /// 千日手判定
    ///
    /// 探索ルートから `ply` 以内での2回目の出現、または3回目の出現で真。
    fn is_repetition(&self, ply: i32) -> bool;

    /// 指し手を生成して `list` に追加する
    fn generate(&self, kind: GenType, list: &mut MoveList);

    /// 現局面で指せる手か（置換表の手やキラーの検証用）
    fn is_pseudo_legal(&self, mv: Move) -> bool;

    fn gives_check(&self, mv: Move) -> bool;

    fn do_move(&mut self, mv: Move) -> bool;

    fn undo_move(&mut self, mv: Move);

    /// 手番だけを渡す。王手中など指せない場合は `false`。
    fn do_null_move(&mut self) -> bool;

    fn undo_null_move(&mut self);

    /// 手番側から見た静的評価値
    fn evaluate(&self) -> Value;

    /// 静的交換評価が `threshold` 以上か
    fn see_ge(&self, mv: Move, threshold: i32) -> bool;

    /// 手番側の（ポーン・キング以外の）駒の価値合計
    fn non_pawn_material(&self, color: Color) -> i32;

    /// 盤上の駒数（キング含む）
    fn piece_count(&self) -> u32;

    /// テーブルベースを引く（対応していなければ None）
    fn probe_tablebase(&self) -> Option<TbProbe> {
        None
    }

    /// 置換表の16bit表現から指し手を復元する（該当手がなければ `Move::NONE`）
    fn decode_move(&self, raw: u16) -> Move;

    /// 次の一手で成れるポーンがあるか（静止探索のデルタ枝刈り用）
    fn has_promotion_candidate(&self) -> bool;
}
