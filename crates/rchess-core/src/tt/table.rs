//! TranspositionTable本体
//!
//! - Cluster: エントリのグループ
//! - TranspositionTable: テーブル本体
//! - probe/store操作

use std::sync::atomic::{AtomicU8, Ordering};

use super::entry::{TTData, TTEntry};
use super::{value_from_tt, value_to_tt, CLUSTER_SIZE, GENERATION_BITS, GENERATION_DELTA};
use crate::types::{Bound, Depth, Move, Value};

/// クラスター構造
/// 同じハッシュインデックスに対して複数のエントリを持つ
/// 16bytes × 3 = 48bytes（キャッシュライン64バイトに収まる）
#[repr(C, align(64))]
pub struct Cluster {
    entries: [TTEntry; CLUSTER_SIZE],
    _padding: [u8; 16], // 16 * 3 + 16 = 64 bytes
}

impl Cluster {
    /// 新しいクラスターを作成
    const fn new() -> Self {
        Self {
            entries: [TTEntry::new(), TTEntry::new(), TTEntry::new()],
            _padding: [0; 16],
        }
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}

// クラスターは64バイトであることを保証（キャッシュラインサイズ）
const _: () = assert!(std::mem::size_of::<Cluster>() == 64);

/// 置換表
pub struct TranspositionTable {
    /// クラスターの配列（要素数は2の累乗）
    table: Box<[Cluster]>,
    /// 世代カウンター（下位3bitは使用しない）
    generation8: AtomicU8,
}

/// `probe` の結果
///
/// タグが一致しても深さや境界が足りない場合は `sufficient_depth = false` で
/// `value` を返さない。指し手は手順付けに使える。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtHit {
    /// カットオフに使える値（ply補正済み）
    pub value: Option<Value>,
    /// 保存されていた静的評価値
    pub static_eval: Value,
    /// 16bit形式の指し手（局面で復元・検証する）
    pub mv: u16,
    /// 深さ・境界ともに今回の窓で結論が出せるか
    pub sufficient_depth: bool,
    pub bound: Bound,
    pub depth: Depth,
}

fn cluster_count_for(mb_size: usize) -> usize {
    let raw = mb_size.saturating_mul(1024 * 1024) / std::mem::size_of::<Cluster>();
    // 2の累乗に切り下げ
    if raw == 0 {
        1
    } else {
        1usize << (usize::BITS - 1 - raw.leading_zeros())
    }
}

fn allocate(count: usize) -> Box<[Cluster]> {
    (0..count).map(|_| Cluster::new()).collect::<Vec<_>>().into_boxed_slice()
}

impl TranspositionTable {
    /// 新しい置換表を作成（サイズはMB単位）
    pub fn new(mb_size: usize) -> Self {
        let cluster_count = cluster_count_for(mb_size);
        log::debug!("transposition table: {mb_size} MB, {cluster_count} clusters");
        Self {
            table: allocate(cluster_count),
            generation8: AtomicU8::new(0),
        }
    }

    /// サイズを変更
    pub fn resize(&mut self, mb_size: usize) {
        let new_count = cluster_count_for(mb_size);
        if new_count != self.table.len() {
            log::debug!("transposition table resized: {} -> {new_count} clusters", self.table.len());
            self.table = allocate(new_count);
        }
        self.generation8.store(0, Ordering::Relaxed);
    }

    /// クラスター数
    #[inline]
    pub fn cluster_count(&self) -> usize {
        self.table.len()
    }

    /// クリア
    ///
    /// エントリはアトミックなので共有参照のままスレッド分割でゼロクリアできる。
    pub fn clear(&self) {
        self.generation8.store(0, Ordering::Relaxed);
        let len = self.table.len();
        let threads = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);

        // サイズが小さい場合やスレッド数が1の場合は逐次クリア
        if threads <= 1 || len < threads * 1024 {
            clear_clusters(&self.table);
            return;
        }

        let chunk = len.div_ceil(threads);
        std::thread::scope(|scope| {
            for part in self.table.chunks(chunk) {
                scope.spawn(move || clear_clusters(part));
            }
        });
    }

    /// 新しい探索を開始（世代を進める）
    pub fn new_search(&self) {
        self.generation8.fetch_add(GENERATION_DELTA, Ordering::Relaxed);
    }

    /// 現在の世代を取得
    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation8.load(Ordering::Relaxed)
    }

    /// 置換表を検索
    ///
    /// ヒットしなければ置換候補（価値が最小のエントリ）を書き込み先として返す。
    pub fn probe_entry(&self, key: u64) -> ProbeResult<'_> {
        let cluster = self.cluster(key);
        let key16 = tag_of(key);

        for entry in &cluster.entries {
            if entry.key16() == key16 && entry.is_occupied() {
                return ProbeResult {
                    found: true,
                    data: entry.read(),
                    writer: entry,
                };
            }
        }

        // 置換価値 = depth8 - relative_age
        let gen8 = self.generation();
        let mut replace = &cluster.entries[0];
        let mut min_value = i32::MAX;
        for entry in &cluster.entries {
            let value = entry.depth8() as i32 - entry.relative_age(gen8) as i32;
            if value < min_value {
                min_value = value;
                replace = entry;
            }
        }

        ProbeResult {
            found: false,
            data: TTData::EMPTY,
            writer: replace,
        }
    }

    /// 窓と深さを考慮して検索する
    pub fn probe(&self, key: u64, depth: Depth, alpha: Value, beta: Value, ply: i32) -> Option<TtHit> {
        let result = self.probe_entry(key);
        if !result.found {
            return None;
        }
        let data = result.data;
        let value = value_from_tt(data.value, ply);

        let bound_ok = value != Value::NONE
            && match data.bound {
                Bound::Exact => true,
                Bound::Lower => value >= beta,
                Bound::Upper => value <= alpha,
                Bound::None => false,
            };
        let sufficient_depth = data.depth >= depth && bound_ok;

        Some(TtHit {
            value: sufficient_depth.then_some(value),
            static_eval: data.eval,
            mv: data.move16,
            sufficient_depth,
            bound: data.bound,
            depth: data.depth,
        })
    }

    /// 探索結果を保存する（値は ply を使って置換表用に補正する）
    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        key: u64,
        value: Value,
        static_eval: Value,
        bound: Bound,
        depth: Depth,
        mv: Move,
        is_pv: bool,
        ply: i32,
    ) {
        self.probe_entry(key).write(
            key,
            value_to_tt(value, ply),
            is_pv,
            bound,
            depth,
            mv,
            static_eval,
            self.generation(),
        );
    }

    /// 置換表の使用率を1000分率で返す
    pub fn hashfull(&self, max_age: u8) -> i32 {
        let max_age_internal = max_age << GENERATION_BITS;
        let gen8 = self.generation();
        let mut count = 0;
        let sample_count = 1000.min(self.table.len());

        for cluster in self.table.iter().take(sample_count) {
            for entry in &cluster.entries {
                if entry.is_occupied() && entry.relative_age(gen8) <= max_age_internal {
                    count += 1;
                }
            }
        }

        count * 1000 / (sample_count * CLUSTER_SIZE) as i32
    }

    #[inline]
    fn cluster(&self, key: u64) -> &Cluster {
        let index = (key as usize) & (self.table.len() - 1);
        &self.table[index]
    }
}

#[inline]
fn tag_of(key: u64) -> u16 {
    (key >> 48) as u16
}

fn clear_clusters(clusters: &[Cluster]) {
    for cluster in clusters {
        for entry in &cluster.entries {
            entry.clear();
        }
    }
}

/// probe結果
pub struct ProbeResult<'a> {
    /// ヒットしたか
    pub found: bool,
    /// 読み取ったデータ
    pub data: TTData,
    /// 書き込み用エントリ
    writer: &'a TTEntry,
}

impl ProbeResult<'_> {
    /// エントリに書き込む（value は `value_to_tt` 済みであること）
    #[allow(clippy::too_many_arguments)]
    pub fn write(
        &self,
        key: u64,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: Depth,
        mv: Move,
        eval: Value,
        generation8: u8,
    ) {
        self.writer.save(tag_of(key), value, is_pv, bound, depth, mv, eval, generation8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, Piece, PieceType, Square};
    use proptest::prelude::*;

    const KEY: u64 = 0xDEAD_BEEF_1234_5678;

    #[test]
    fn test_tt_new() {
        let tt = TranspositionTable::new(1); // 1MB
        assert_eq!(tt.cluster_count(), 1024 * 1024 / 64);
        assert!(tt.cluster_count().is_power_of_two());
        assert_eq!(tt.generation(), 0);
    }

    #[test]
    fn test_tt_new_search() {
        let tt = TranspositionTable::new(1);
        assert_eq!(tt.generation(), 0);

        tt.new_search();
        assert_eq!(tt.generation(), GENERATION_DELTA);

        tt.new_search();
        assert_eq!(tt.generation(), GENERATION_DELTA * 2);
    }

    #[test]
    fn test_tt_probe_empty() {
        let tt = TranspositionTable::new(1);
        assert!(!tt.probe_entry(12345).found);
        assert!(tt.probe(12345, 1, -Value::INFINITE, Value::INFINITE, 0).is_none());
    }

    #[test]
    fn test_tt_probe_and_write() {
        let tt = TranspositionTable::new(1);

        // 最初はヒットしない
        let probe1 = tt.probe_entry(KEY);
        assert!(!probe1.found);

        probe1.write(KEY, Value::new(50), true, Bound::Exact, 10, Move::NONE, Value::ZERO, tt.generation());

        // 2回目はヒット
        let probe2 = tt.probe_entry(KEY);
        assert!(probe2.found);
        assert_eq!(probe2.data.value.raw(), 50);
        assert_eq!(probe2.data.bound, Bound::Exact);
        assert!(probe2.data.is_pv);
    }

    #[test]
    fn test_tt_exact_round_trip() {
        let tt = TranspositionTable::new(1);
        let mv = Move::new(
            Square::from_file_rank(6, 0),
            Square::from_file_rank(5, 2),
            Piece::new(Color::White, PieceType::Knight),
        );
        tt.store(KEY, Value::new(42), Value::new(17), Bound::Exact, 8, mv, true, 3);

        for depth in [1, 5, 8] {
            let hit = tt.probe(KEY, depth, Value::new(-100), Value::new(100), 3).unwrap();
            assert!(hit.sufficient_depth);
            assert_eq!(hit.value, Some(Value::new(42)));
            assert_eq!(hit.static_eval, Value::new(17));
            assert_eq!(hit.mv, mv.to_u16());
        }

        // 深さ不足: タグは一致するが値は返さない
        let hit = tt.probe(KEY, 9, Value::new(-100), Value::new(100), 3).unwrap();
        assert!(!hit.sufficient_depth);
        assert_eq!(hit.value, None);
        assert_eq!(hit.mv, mv.to_u16());
    }

    #[test]
    fn test_tt_bound_semantics() {
        let tt = TranspositionTable::new(1);
        tt.store(KEY, Value::new(120), Value::ZERO, Bound::Lower, 6, Move::NONE, false, 0);
        assert!(tt.probe(KEY, 6, Value::new(0), Value::new(100), 0).unwrap().sufficient_depth);
        assert!(!tt.probe(KEY, 6, Value::new(0), Value::new(200), 0).unwrap().sufficient_depth);

        let other = KEY ^ 0x0001_0000_0000_0000;
        tt.store(other, Value::new(-50), Value::ZERO, Bound::Upper, 6, Move::NONE, false, 0);
        assert!(tt.probe(other, 6, Value::new(-10), Value::new(10), 0).unwrap().sufficient_depth);
        assert!(!tt.probe(other, 6, Value::new(-60), Value::new(10), 0).unwrap().sufficient_depth);
    }

    #[test]
    fn test_tt_mate_score_adjusted_by_ply() {
        let tt = TranspositionTable::new(1);
        tt.store(KEY, Value::mate_in(5 + 3), Value::ZERO, Bound::Exact, 4, Move::NONE, false, 5);
        let hit = tt.probe(KEY, 1, -Value::INFINITE, Value::INFINITE, 11).unwrap();
        assert_eq!(hit.value, Some(Value::mate_in(11 + 3)));
    }

    #[test]
    fn test_tt_replacement_prefers_stale_entries() {
        let tt = TranspositionTable::new(1);
        let count = tt.cluster_count() as u64;
        // 同じクラスターに入る異なるタグ
        let keys: Vec<u64> = (1..=4u64).map(|i| (i << 48) | 7).collect();
        assert!(keys.iter().all(|k| k & (count - 1) == 7));

        tt.store(keys[0], Value::new(1), Value::ZERO, Bound::Lower, 20, Move::NONE, false, 0);
        tt.new_search();
        tt.new_search();
        tt.store(keys[1], Value::new(2), Value::ZERO, Bound::Lower, 10, Move::NONE, false, 0);
        tt.store(keys[2], Value::new(3), Value::ZERO, Bound::Lower, 10, Move::NONE, false, 0);

        // 古い深いエントリより新しい浅いエントリが残る
        tt.store(keys[3], Value::new(4), Value::ZERO, Bound::Lower, 5, Move::NONE, false, 0);
        assert!(!tt.probe_entry(keys[0]).found);
        assert!(tt.probe_entry(keys[1]).found);
        assert!(tt.probe_entry(keys[2]).found);
        assert!(tt.probe_entry(keys[3]).found);
    }

    #[test]
    fn test_tt_generation_cycle() {
        let tt = TranspositionTable::new(1);
        for _ in 0..300 {
            tt.new_search();
        }
        // u8でwrapする: 300 * 8 = 2400, 2400 % 256 = 96
        assert_eq!(tt.generation(), 96);
    }

    #[test]
    fn test_tt_hashfull() {
        let tt = TranspositionTable::new(1);

        // 空の状態では0
        assert_eq!(tt.hashfull(0), 0);

        for i in 0..1000u64 {
            tt.store((i << 48) | i, Value::ZERO, Value::ZERO, Bound::Lower, 3, Move::NONE, false, 0);
        }
        let full = tt.hashfull(0);
        assert!(full > 300 && full <= 334, "hashfull = {full}");

        // 世代が進むと max_age = 0 では数えない
        tt.new_search();
        assert_eq!(tt.hashfull(0), 0);
        assert_eq!(tt.hashfull(1), full);
    }

    #[test]
    fn test_tt_clear() {
        let tt = TranspositionTable::new(4);
        tt.store(KEY, Value::new(50), Value::ZERO, Bound::Exact, 10, Move::NONE, true, 0);
        tt.new_search();
        assert!(tt.probe_entry(KEY).found);

        tt.clear();

        assert!(!tt.probe_entry(KEY).found);
        assert_eq!(tt.generation(), 0);
    }

    #[test]
    fn test_tt_resize() {
        let mut tt = TranspositionTable::new(1);
        tt.resize(2);
        assert_eq!(tt.cluster_count(), 2 * 1024 * 1024 / 64);
        tt.resize(3);
        // 2の累乗に切り下げ
        assert_eq!(tt.cluster_count(), 2 * 1024 * 1024 / 64);
    }

    proptest! {
        #[test]
        fn prop_exact_store_is_found_within_window(
            key in any::<u64>(),
            v in -3000i32..3000,
            depth in 1i32..60,
        ) {
            let tt = TranspositionTable::new(1);
            tt.store(key, Value::new(v), Value::ZERO, Bound::Exact, depth, Move::NONE, false, 0);
            let hit = tt.probe(key, depth, Value::new(v - 1), Value::new(v + 1), 0);
            prop_assert_eq!(hit.and_then(|h| h.value), Some(Value::new(v)));
        }
    }
}
