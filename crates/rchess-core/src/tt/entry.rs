//! 置換表エントリー
//!
//! TTEntry: 2ワードのアトミックなエントリ構造
//! TTData: 読み取り用のデータ構造
//!
//! 探索スレッド間で同期せずに読み書きするため、各ワードは Relaxed のアトミック操作で扱う。
//! 2ワードの間で読み取りが千切れることは許容し、キー照合と指し手の再検証で弾く。

use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

use super::{GENERATION_CYCLE, GENERATION_MASK};
use crate::types::{Bound, Depth, Move, Value, DEPTH_ENTRY_OFFSET};

/// 置換表エントリー
#[derive(Default)]
pub struct TTEntry {
    /// key16 | move16 << 16 | value16 << 32 | eval16 << 48
    data: AtomicU64,
    /// depth8 | gen_bound8 << 8
    ///
    /// gen_bound8 = generation(5bit) | pv(1bit) | bound(2bit)
    meta: AtomicU16,
}

/// アトミックに読み取った生の値
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct RawEntry {
    key16: u16,
    move16: u16,
    value16: i16,
    eval16: i16,
    depth8: u8,
    gen_bound8: u8,
}

impl RawEntry {
    #[inline]
    fn unpack(data: u64, meta: u16) -> Self {
        Self {
            key16: data as u16,
            move16: (data >> 16) as u16,
            value16: (data >> 32) as u16 as i16,
            eval16: (data >> 48) as u16 as i16,
            depth8: meta as u8,
            gen_bound8: (meta >> 8) as u8,
        }
    }

    #[inline]
    fn pack_data(self) -> u64 {
        (self.key16 as u64)
            | ((self.move16 as u64) << 16)
            | ((self.value16 as u16 as u64) << 32)
            | ((self.eval16 as u16 as u64) << 48)
    }

    #[inline]
    fn pack_meta(self) -> u16 {
        (self.depth8 as u16) | ((self.gen_bound8 as u16) << 8)
    }

    #[inline]
    fn bound(self) -> Bound {
        Bound::from_u8(self.gen_bound8)
    }

    #[inline]
    fn relative_age(self, generation8: u8) -> u8 {
        let age = GENERATION_CYCLE
            .wrapping_add(generation8 as u16)
            .wrapping_sub(self.gen_bound8 as u16);
        (age & GENERATION_MASK) as u8
    }
}

impl TTEntry {
    /// 新しい空のエントリを作成
    #[inline]
    pub const fn new() -> Self {
        Self {
            data: AtomicU64::new(0),
            meta: AtomicU16::new(0),
        }
    }

    #[inline]
    fn load(&self) -> RawEntry {
        RawEntry::unpack(self.data.load(Ordering::Relaxed), self.meta.load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, raw: RawEntry) {
        self.data.store(raw.pack_data(), Ordering::Relaxed);
        self.meta.store(raw.pack_meta(), Ordering::Relaxed);
    }

    /// 空にする
    #[inline]
    pub fn clear(&self) {
        self.data.store(0, Ordering::Relaxed);
        self.meta.store(0, Ordering::Relaxed);
    }

    /// エントリが使用されているか
    #[inline]
    pub fn is_occupied(&self) -> bool {
        (self.meta.load(Ordering::Relaxed) as u8) != 0
    }

    /// キーを取得
    #[inline]
    pub fn key16(&self) -> u16 {
        self.data.load(Ordering::Relaxed) as u16
    }

    /// 保存されている生のdepth8を取得
    #[inline]
    pub fn depth8(&self) -> u8 {
        self.meta.load(Ordering::Relaxed) as u8
    }

    /// エントリを読み取る
    pub fn read(&self) -> TTData {
        let raw = self.load();
        TTData {
            move16: raw.move16,
            value: Value::new(raw.value16 as i32),
            eval: Value::new(raw.eval16 as i32),
            depth: raw.depth8 as Depth + DEPTH_ENTRY_OFFSET,
            bound: raw.bound(),
            is_pv: (raw.gen_bound8 & 0x4) != 0,
        }
    }

    /// エントリに保存
    ///
    /// 同じ局面の EXACT エントリ（現世代）を、ほぼ同じ深さの非 EXACT 書き込みで潰さない。
    /// その場合は指し手が空のときだけ埋める。
    #[allow(clippy::too_many_arguments)]
    pub fn save(
        &self,
        key16: u16,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: Depth,
        mv: Move,
        eval: Value,
        generation8: u8,
    ) {
        let mut raw = self.load();
        let same_key = raw.key16 == key16 && raw.depth8 != 0;

        // 新しい手がない場合は古い手を保持
        if mv.is_some() || !same_key {
            raw.move16 = mv.to_u16();
        }

        let d8 = (depth - DEPTH_ENTRY_OFFSET).clamp(1, 255);
        let age = raw.relative_age(generation8);

        let protected_exact = same_key
            && age == 0
            && bound != Bound::Exact
            && raw.bound() == Bound::Exact
            && d8 < raw.depth8 as i32 + 2;

        if !protected_exact
            && (bound == Bound::Exact
                || !same_key
                || d8 + 2 * (is_pv as i32) > raw.depth8 as i32 - 4
                || age != 0)
        {
            raw.key16 = key16;
            raw.depth8 = d8 as u8;
            raw.gen_bound8 = generation8 | ((is_pv as u8) << 2) | bound as u8;
            raw.value16 = value.raw().clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            raw.eval16 = eval.raw().clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        } else if raw.depth8 as Depth + DEPTH_ENTRY_OFFSET >= 5 && raw.bound() != Bound::Exact {
            // 浅い置換を防ぐため、EXACT以外の深い項目はわずかに劣化させる
            raw.depth8 = raw.depth8.saturating_sub(1);
        }

        self.store(raw);
    }

    /// 相対的な世代（0 = 最新）
    #[inline]
    pub fn relative_age(&self, generation8: u8) -> u8 {
        self.load().relative_age(generation8)
    }
}

/// 置換表から読み取ったデータ
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TTData {
    /// 最善手（16bit形式、局面で復元する）
    pub move16: u16,
    /// 探索値（ルートからの距離に補正前）
    pub value: Value,
    /// 評価値
    pub eval: Value,
    /// 探索深さ
    pub depth: Depth,
    /// 境界タイプ
    pub bound: Bound,
    /// PVノードかどうか
    pub is_pv: bool,
}

impl TTData {
    /// 空のデータ
    pub const EMPTY: Self = Self {
        move16: 0,
        value: Value::NONE,
        eval: Value::NONE,
        depth: DEPTH_ENTRY_OFFSET,
        bound: Bound::None,
        is_pv: false,
    };
}

impl Default for TTData {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, Piece, PieceType, Square};

    fn sample_move() -> Move {
        Move::new(
            Square::from_file_rank(4, 1),
            Square::from_file_rank(4, 3),
            Piece::new(Color::White, PieceType::Pawn),
        )
    }

    #[test]
    fn test_tt_entry_new() {
        let entry = TTEntry::new();
        assert!(!entry.is_occupied());
        assert_eq!(entry.key16(), 0);
        assert_eq!(std::mem::size_of::<TTEntry>(), 16);
    }

    #[test]
    fn test_tt_entry_save_and_read() {
        let entry = TTEntry::new();
        let mv = sample_move();

        entry.save(0x1234, Value::new(100), true, Bound::Exact, 10, mv, Value::new(-50), 8);

        assert!(entry.is_occupied());
        assert_eq!(entry.key16(), 0x1234);

        let data = entry.read();
        assert_eq!(data.value.raw(), 100);
        assert_eq!(data.eval.raw(), -50);
        assert_eq!(data.depth, 10);
        assert_eq!(data.bound, Bound::Exact);
        assert_eq!(data.move16, mv.to_u16());
        assert!(data.is_pv);
    }

    #[test]
    fn test_tt_entry_negative_values_survive_packing() {
        let entry = TTEntry::new();
        entry.save(7, Value::mated_in(3), false, Bound::Upper, 1, Move::NONE, Value::new(-1), 0);
        let data = entry.read();
        assert_eq!(data.value, Value::mated_in(3));
        assert_eq!(data.eval, Value::new(-1));
        assert_eq!(data.bound, Bound::Upper);
        assert_eq!(data.depth, 1);
    }

    #[test]
    fn test_tt_entry_relative_age() {
        let entry = TTEntry::new();
        entry.save(0, Value::ZERO, false, Bound::Lower, 10, Move::NONE, Value::ZERO, 8);

        // 同じ世代では0
        assert_eq!(entry.relative_age(8), 0);

        // 世代が進むと8刻みでageが増える（GENERATION_DELTA = 8）
        assert_eq!(entry.relative_age(16), 8);
    }

    #[test]
    fn test_tt_entry_keeps_move_when_new_move_is_none() {
        let entry = TTEntry::new();
        let mv = sample_move();
        entry.save(0x55, Value::new(10), false, Bound::Lower, 4, mv, Value::ZERO, 0);
        entry.save(0x55, Value::new(20), false, Bound::Lower, 6, Move::NONE, Value::ZERO, 0);

        let data = entry.read();
        assert_eq!(data.move16, mv.to_u16());
        assert_eq!(data.value.raw(), 20);
    }

    #[test]
    fn test_tt_entry_exact_not_evicted_by_cheaper_bound() {
        let entry = TTEntry::new();
        entry.save(0x99, Value::new(35), true, Bound::Exact, 8, Move::NONE, Value::ZERO, 16);
        // 同じ世代・同じ局面・ほぼ同じ深さの Upper 書き込みは無視される
        entry.save(0x99, Value::new(-80), false, Bound::Upper, 9, Move::NONE, Value::ZERO, 16);

        let data = entry.read();
        assert_eq!(data.bound, Bound::Exact);
        assert_eq!(data.value.raw(), 35);

        // 十分深い探索なら上書きされる
        entry.save(0x99, Value::new(-80), false, Bound::Upper, 12, Move::NONE, Value::ZERO, 16);
        assert_eq!(entry.read().bound, Bound::Upper);
    }

    #[test]
    fn test_tt_entry_decay_non_exact() {
        let entry = TTEntry::new();
        entry.save(0x1234, Value::new(1), false, Bound::Lower, 20, Move::NONE, Value::ZERO, 8);
        let before = entry.depth8();

        // 浅い非EXACTの書き込みは拒否され、既存の深さが1減る
        entry.save(0x1234, Value::new(2), false, Bound::Lower, 5, Move::NONE, Value::ZERO, 8);
        assert_eq!(entry.depth8(), before - 1);
        assert_eq!(entry.read().value.raw(), 1);
    }
}
