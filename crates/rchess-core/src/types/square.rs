//! マス（Square）

use std::fmt;

/// マス（a1 = 0, b1 = 1, ..., h8 = 63）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Square(u8);

impl Square {
    /// マスの数
    pub const NUM: usize = 64;

    pub const A1: Square = Square(0);
    pub const H8: Square = Square(63);

    /// インデックスから生成（範囲外は None）
    #[inline]
    pub const fn new(index: u8) -> Option<Square> {
        if index < 64 { Some(Square(index)) } else { None }
    }

    /// インデックスから生成（下位6bitのみ使用）
    #[inline]
    pub const fn from_index_masked(index: u16) -> Square {
        Square((index & 63) as u8)
    }

    /// 筋と段から生成（それぞれ 0..8）
    #[inline]
    pub const fn from_file_rank(file: u8, rank: u8) -> Square {
        Square(((rank & 7) << 3) | (file & 7))
    }

    /// 筋（0 = a）
    #[inline]
    pub const fn file(self) -> u8 {
        self.0 & 7
    }

    /// 段（0 = 1段目）
    #[inline]
    pub const fn rank(self) -> u8 {
        self.0 >> 3
    }

    /// インデックスとして使用
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// 生の値
    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// 白から見た段に正規化した位置（黒の駒のPST参照用）
    #[inline]
    pub const fn flip_rank(self) -> Square {
        Square(self.0 ^ 56)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = (b'a' + self.file()) as char;
        let rank = (b'1' + self.rank()) as char;
        write!(f, "{file}{rank}")
    }
}
