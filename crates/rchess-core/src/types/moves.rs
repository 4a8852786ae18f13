//! 指し手（Move）
//!
//! 探索内部では各要素を明示的に持つ構造体として扱い、
//! 置換表に格納するときだけ 16bit に圧縮する。

use std::fmt;

use super::{Piece, PieceType, Square};

/// キャスリングの方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastleSide {
    King,
    Queen,
}

/// 指し手の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Normal,
    Castle(CastleSide),
    EnPassant,
    DoublePush,
}

/// 指し手
///
/// `captured` は取られる駒（アンパッサンでは相手のポーン）、
/// キャスリングは `from` = キングの元位置、`to` = キングの移動先で表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    from: Square,
    to: Square,
    piece: Piece,
    captured: Piece,
    promotion: Option<PieceType>,
    kind: MoveKind,
}

impl Move {
    /// 無効な指し手
    pub const NONE: Move = Move {
        from: Square::A1,
        to: Square::A1,
        piece: Piece::NONE,
        captured: Piece::NONE,
        promotion: None,
        kind: MoveKind::Normal,
    };

    /// 駒を取らない通常の手を生成
    #[inline]
    pub const fn new(from: Square, to: Square, piece: Piece) -> Move {
        Move {
            from,
            to,
            piece,
            captured: Piece::NONE,
            promotion: None,
            kind: MoveKind::Normal,
        }
    }

    /// 取る駒を設定
    #[inline]
    pub const fn with_capture(mut self, captured: Piece) -> Move {
        self.captured = captured;
        self
    }

    /// 成りを設定
    #[inline]
    pub const fn with_promotion(mut self, pt: PieceType) -> Move {
        self.promotion = Some(pt);
        self
    }

    /// 種別を設定
    #[inline]
    pub const fn with_kind(mut self, kind: MoveKind) -> Move {
        self.kind = kind;
        self
    }

    #[inline]
    pub const fn from(self) -> Square {
        self.from
    }

    #[inline]
    pub const fn to(self) -> Square {
        self.to
    }

    /// 動かす駒
    #[inline]
    pub const fn piece(self) -> Piece {
        self.piece
    }

    /// 取られる駒（取らない手は `Piece::NONE`）
    #[inline]
    pub const fn captured(self) -> Piece {
        self.captured
    }

    #[inline]
    pub const fn promotion(self) -> Option<PieceType> {
        self.promotion
    }

    #[inline]
    pub const fn kind(self) -> MoveKind {
        self.kind
    }

    /// 無効な指し手かどうか
    #[inline]
    pub const fn is_none(self) -> bool {
        self.piece.is_none()
    }

    /// 有効な指し手かどうか
    #[inline]
    pub const fn is_some(self) -> bool {
        self.piece.is_some()
    }

    /// 駒を取る手か
    #[inline]
    pub const fn is_capture(self) -> bool {
        self.captured.is_some()
    }

    /// 成る手か
    #[inline]
    pub const fn is_promotion(self) -> bool {
        self.promotion.is_some()
    }

    /// 駒取りまたは成り（MovePicker の tactical 扱い）
    #[inline]
    pub const fn is_tactical(self) -> bool {
        self.is_capture() || self.is_promotion()
    }

    #[inline]
    pub const fn is_castle(self) -> bool {
        matches!(self.kind, MoveKind::Castle(_))
    }

    /// 移動後の駒（成りなら成った駒）
    #[inline]
    pub const fn moved_piece_after(self) -> Piece {
        match self.promotion {
            Some(pt) => Piece::new(self.piece.color(), pt),
            None => self.piece,
        }
    }

    /// 置換表用の16bit表現
    ///
    /// bit 0-5: from, bit 6-11: to, bit 12-14: 成り駒種（0 = 成りなし）
    #[inline]
    pub const fn to_u16(self) -> u16 {
        if self.is_none() {
            return 0;
        }
        let promo = match self.promotion {
            Some(pt) => pt as u16,
            None => 0,
        };
        (self.from.raw() as u16) | ((self.to.raw() as u16) << 6) | (promo << 12)
    }

    /// 16bit表現と一致するか
    #[inline]
    pub const fn matches_u16(self, raw: u16) -> bool {
        raw != 0 && self.to_u16() == raw
    }

    /// UCI形式の文字列
    pub fn to_uci(self) -> String {
        self.to_string()
    }
}

impl Default for Move {
    fn default() -> Self {
        Move::NONE
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("0000");
        }
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(pt) = self.promotion {
            write!(f, "{}", pt.to_char())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Color;

    fn sq(name: &str) -> Square {
        let b = name.as_bytes();
        Square::from_file_rank(b[0] - b'a', b[1] - b'1')
    }

    #[test]
    fn test_move_none() {
        assert!(Move::NONE.is_none());
        assert_eq!(Move::NONE.to_u16(), 0);
        assert!(!Move::NONE.matches_u16(0));
        assert_eq!(Move::NONE.to_string(), "0000");
    }

    #[test]
    fn test_move_compact_encoding() {
        let pawn = Piece::new(Color::White, PieceType::Pawn);
        let rook = Piece::new(Color::Black, PieceType::Rook);
        let mv = Move::new(sq("b7"), sq("a8"), pawn)
            .with_capture(rook)
            .with_promotion(PieceType::Queen);
        let raw = mv.to_u16();
        assert!(mv.matches_u16(raw));
        assert_eq!(raw & 63, sq("b7").raw() as u16);
        assert_eq!((raw >> 6) & 63, sq("a8").raw() as u16);
        assert_eq!(raw >> 12, PieceType::Queen as u16);
        assert!(mv.is_tactical());
        assert_eq!(mv.to_string(), "b7a8q");
        assert_eq!(mv.moved_piece_after(), Piece::new(Color::White, PieceType::Queen));
    }

    #[test]
    fn test_move_kinds() {
        let king = Piece::new(Color::White, PieceType::King);
        let castle = Move::new(sq("e1"), sq("g1"), king).with_kind(MoveKind::Castle(CastleSide::King));
        assert!(castle.is_castle());
        assert!(!castle.is_tactical());
        assert_eq!(castle.to_uci(), "e1g1");
    }
}
