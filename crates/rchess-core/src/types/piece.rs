//! 駒種（PieceType）と駒（Piece）

use super::Color;

/// 駒種
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PieceType {
    Pawn = 1,
    Knight = 2,
    Bishop = 3,
    Rook = 4,
    Queen = 5,
    King = 6,
}

impl PieceType {
    /// 駒種の数（インデックス 0 は「駒なし」に予約）
    pub const NUM: usize = 7;

    /// 全ての駒種（価値の低い順）
    pub const ALL: [PieceType; 6] = [
        PieceType::Pawn,
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
        PieceType::King,
    ];

    /// インデックスとして使用
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 生の値から変換（1..=6 以外は None）
    #[inline]
    pub const fn from_u8(v: u8) -> Option<PieceType> {
        match v {
            1 => Some(PieceType::Pawn),
            2 => Some(PieceType::Knight),
            3 => Some(PieceType::Bishop),
            4 => Some(PieceType::Rook),
            5 => Some(PieceType::Queen),
            6 => Some(PieceType::King),
            _ => None,
        }
    }

    /// 成り駒を表す小文字（UCI表記）
    #[inline]
    pub const fn to_char(self) -> char {
        match self {
            PieceType::Pawn => 'p',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Rook => 'r',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
        }
    }
}

/// 駒（手番付き）
///
/// 白は 1..=6、黒は 9..=14。0 は駒なし。
/// 履歴テーブルのインデックスとしてそのまま使えるよう `NUM = 16` とする。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Piece(u8);

impl Piece {
    /// 駒なし
    pub const NONE: Piece = Piece(0);

    /// インデックス空間の大きさ
    pub const NUM: usize = 16;

    /// 手番と駒種から生成
    #[inline]
    pub const fn new(color: Color, pt: PieceType) -> Piece {
        Piece(((color as u8) << 3) | pt as u8)
    }

    /// 駒なしかどうか
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// 駒があるかどうか
    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    /// 駒種を取得（駒なしなら None）
    #[inline]
    pub const fn piece_type(self) -> Option<PieceType> {
        PieceType::from_u8(self.0 & 7)
    }

    /// 手番を取得
    #[inline]
    pub const fn color(self) -> Color {
        if self.0 & 8 != 0 {
            Color::Black
        } else {
            Color::White
        }
    }

    /// インデックスとして使用
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// 駒種インデックス（駒なしは 0）
    #[inline]
    pub const fn type_index(self) -> usize {
        (self.0 & 7) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piece_roundtrip() {
        for color in [Color::White, Color::Black] {
            for pt in PieceType::ALL {
                let pc = Piece::new(color, pt);
                assert!(pc.is_some());
                assert_eq!(pc.color(), color);
                assert_eq!(pc.piece_type(), Some(pt));
                assert!(pc.index() < Piece::NUM);
            }
        }
    }

    #[test]
    fn test_piece_none() {
        assert!(Piece::NONE.is_none());
        assert_eq!(Piece::NONE.piece_type(), None);
        assert_eq!(Piece::NONE.type_index(), 0);
    }
}
