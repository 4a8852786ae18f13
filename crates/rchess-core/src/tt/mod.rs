//! 置換表モジュール
//!
//! 探索結果をキャッシュする置換表（Transposition Table）。
//!
//! - `TTEntry`: エントリ（アトミック2ワード、16bitタグ）
//! - `Cluster`: エントリのグループ（64バイト）
//! - `TranspositionTable`: テーブル本体
//! - 世代管理
//!
//! クラスターインデックスは64bitキーの下位ビットで決定し、
//! クラスター内マッチングに上位16bitを使用する。
//! 16bytes × 3 + 16padding = 64bytes/クラスター。

mod entry;
mod table;

pub use entry::{TTData, TTEntry};
pub use table::{ProbeResult, TranspositionTable, TtHit};

use crate::types::Value;

/// クラスターサイズ（エントリ数）
pub const CLUSTER_SIZE: usize = 3;

/// Generation関連の定数
pub const GENERATION_BITS: u32 = 3;
pub const GENERATION_DELTA: u8 = 1 << GENERATION_BITS; // 8
pub const GENERATION_CYCLE: u16 = 255 + GENERATION_DELTA as u16;
pub const GENERATION_MASK: u16 = 0xF8; // (0xFF << GENERATION_BITS) as u8

/// 詰み・TBスコアを「ルートからの手数」から「この局面からの手数」に変換して格納用にする
#[inline]
pub fn value_to_tt(v: Value, ply: i32) -> Value {
    if v == Value::NONE {
        return v;
    }
    if v >= Value::TB_WIN_IN_MAX_PLY {
        v + ply
    } else if v <= Value::TB_LOSS_IN_MAX_PLY {
        v - ply
    } else {
        v
    }
}

/// `value_to_tt` の逆変換。probe したノードの ply を渡す。
#[inline]
pub fn value_from_tt(v: Value, ply: i32) -> Value {
    if v == Value::NONE {
        return v;
    }
    if v >= Value::TB_WIN_IN_MAX_PLY {
        v - ply
    } else if v <= Value::TB_LOSS_IN_MAX_PLY {
        v + ply
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mate_distance_relative_to_probing_node() {
        for p in [0, 1, 7, 40] {
            for q in [0, 2, 9, 33] {
                let stored = value_to_tt(Value::mate_in(p + 3), p);
                assert_eq!(value_from_tt(stored, q), Value::mate_in(q + 3));

                let stored = value_to_tt(Value::mated_in(p + 4), p);
                assert_eq!(value_from_tt(stored, q), Value::mated_in(q + 4));
            }
        }
    }

    #[test]
    fn test_ordinary_values_pass_through() {
        for v in [-900, -1, 0, 35, 2500] {
            assert_eq!(value_to_tt(Value::new(v), 12), Value::new(v));
            assert_eq!(value_from_tt(Value::new(v), 5), Value::new(v));
        }
        assert_eq!(value_from_tt(Value::NONE, 3), Value::NONE);
    }
}
