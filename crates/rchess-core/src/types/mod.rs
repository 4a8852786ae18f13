//! 基本型
//!
//! 手番・駒・マス・指し手・評価値と、探索深さ関連の定数。

mod color;
mod moves;
mod piece;
mod square;
mod value;

pub use color::Color;
pub use moves::{CastleSide, Move, MoveKind};
pub use piece::{Piece, PieceType};
pub use square::Square;
pub use value::Value;

/// 探索深さ
pub type Depth = i32;

/// 最大探索手数
pub const MAX_PLY: i32 = 128;

/// 1局面の合法手の最大数
pub const MAX_MOVES: usize = 256;

/// 静止探索の深さ
pub const DEPTH_QS: Depth = 0;

/// 未探索（静的評価のみ）を表す深さ
pub const DEPTH_UNSEARCHED: Depth = -2;

/// 置換表に格納する深さのオフセット（depth8 = depth - DEPTH_ENTRY_OFFSET）
pub const DEPTH_ENTRY_OFFSET: Depth = -3;

/// 置換表エントリの境界
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Bound {
    #[default]
    None = 0,
    /// 上界（fail low）
    Upper = 1,
    /// 下界（fail high）
    Lower = 2,
    /// 正確な値
    Exact = 3,
}

impl Bound {
    /// 2bit値から変換
    #[inline]
    pub const fn from_u8(v: u8) -> Bound {
        match v & 3 {
            1 => Bound::Upper,
            2 => Bound::Lower,
            3 => Bound::Exact,
            _ => Bound::None,
        }
    }

    /// 下界として使えるか
    #[inline]
    pub const fn is_lower(self) -> bool {
        (self as u8) & (Bound::Lower as u8) != 0
    }

    /// 上界として使えるか
    #[inline]
    pub const fn is_upper(self) -> bool {
        (self as u8) & (Bound::Upper as u8) != 0
    }
}
