//! 探索制限（LimitsType）
//!
//! `go` のパラメータ（持ち時間・深さ・ノード数など）を表現する。

use std::time::Instant;

use crate::types::{Color, Move, Value};

// =============================================================================
// TimePoint
// =============================================================================

/// 時間（ミリ秒）
pub type TimePoint = i64;

// =============================================================================
// LimitsType
// =============================================================================

/// 探索制限条件
#[derive(Clone, Debug)]
pub struct LimitsType {
    /// 両者の残り時間（ミリ秒）
    pub time: [TimePoint; Color::NUM],

    /// 1手ごとの時間加算（ミリ秒）
    pub inc: [TimePoint; Color::NUM],

    /// 次の時間加算までの手数（0なら切れ負け/フィッシャー）
    pub movestogo: i32,

    /// 思考時間固定（ミリ秒、0以外なら有効）
    pub movetime: TimePoint,

    /// 探索深さ固定（0以外なら有効）
    pub depth: i32,

    /// 詰み探索の手数（0以外なら有効、1手=先後1回ずつ）
    pub mate: i32,

    /// 思考時間無制限フラグ（`stop` まで探索を続ける）
    pub infinite: bool,

    /// 探索ノード数制限（0以外なら有効）
    pub nodes: u64,

    /// 候補手を何本探索するか（1以上）
    pub multi_pv: usize,

    /// 探索対象の手のリスト（空なら全合法手）
    pub search_moves: Vec<Move>,

    /// 最初の反復の aspiration window を固定する
    ///
    /// 狭い窓での再探索経路を確かめるために使う。
    pub initial_window: Option<(Value, Value)>,

    /// 探索開始時刻
    pub(crate) start_time: Option<Instant>,
}

impl Default for LimitsType {
    fn default() -> Self {
        Self {
            time: [0; Color::NUM],
            inc: [0; Color::NUM],
            movestogo: 0,
            movetime: 0,
            depth: 0,
            mate: 0,
            infinite: false,
            nodes: 0,
            multi_pv: 1,
            search_moves: Vec::new(),
            initial_window: None,
            start_time: None,
        }
    }
}

impl LimitsType {
    pub fn new() -> Self {
        Self::default()
    }

    /// 深さ固定の制限
    pub fn depth(depth: i32) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }

    /// ノード数固定の制限
    pub fn nodes(nodes: u64) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }

    /// 思考時間固定の制限
    pub fn movetime(ms: TimePoint) -> Self {
        Self {
            movetime: ms,
            ..Self::default()
        }
    }

    /// 停止指示まで探索し続ける制限
    pub fn infinite() -> Self {
        Self {
            infinite: true,
            ..Self::default()
        }
    }

    /// 探索する手を絞る
    pub fn with_search_moves(mut self, moves: Vec<Move>) -> Self {
        self.search_moves = moves;
        self
    }

    /// 最初の反復の aspiration window を固定する
    pub fn with_initial_window(mut self, alpha: Value, beta: Value) -> Self {
        self.initial_window = Some((alpha, beta));
        self
    }

    /// MultiPV の本数
    pub fn with_multi_pv(mut self, n: usize) -> Self {
        self.multi_pv = n.max(1);
        self
    }

    /// 両者の残り時間と加算
    pub fn with_clock(mut self, time: [TimePoint; Color::NUM], inc: [TimePoint; Color::NUM]) -> Self {
        self.time = time;
        self.inc = inc;
        self
    }

    /// 持ち時間による時間制御を行うか
    ///
    /// mate / movetime / depth / nodes / infinite のいずれかが指定されていれば行わない。
    #[inline]
    pub fn use_time_management(&self) -> bool {
        self.mate == 0
            && self.movetime == 0
            && self.depth == 0
            && self.nodes == 0
            && !self.infinite
    }

    /// 時間で打ち切る必要があるか
    #[inline]
    pub fn is_time_limited(&self) -> bool {
        self.use_time_management() || self.has_movetime()
    }

    /// 探索開始時刻を設定
    pub fn set_start_time(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// 探索開始からの経過時間（ミリ秒）
    pub fn elapsed(&self) -> TimePoint {
        self.start_time.map_or(0, |t| t.elapsed().as_millis() as TimePoint)
    }

    #[inline]
    pub fn time_left(&self, color: Color) -> TimePoint {
        self.time[color.index()]
    }

    #[inline]
    pub fn increment(&self, color: Color) -> TimePoint {
        self.inc[color.index()]
    }

    #[inline]
    pub fn has_depth_limit(&self) -> bool {
        self.depth > 0
    }

    #[inline]
    pub fn has_nodes_limit(&self) -> bool {
        self.nodes > 0
    }

    #[inline]
    pub fn has_movetime(&self) -> bool {
        self.movetime > 0
    }
}

// =============================================================================
// テスト
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_default() {
        let limits = LimitsType::default();
        assert_eq!(limits.time, [0, 0]);
        assert_eq!(limits.depth, 0);
        assert_eq!(limits.multi_pv, 1);
        assert!(!limits.infinite);
        assert!(limits.search_moves.is_empty());
        assert!(limits.initial_window.is_none());
    }

    #[test]
    fn test_use_time_management() {
        let mut limits = LimitsType::new();
        assert!(limits.use_time_management());

        limits.depth = 10;
        assert!(!limits.use_time_management());
        limits.depth = 0;

        limits.infinite = true;
        assert!(!limits.use_time_management());
        limits.infinite = false;

        limits.nodes = 10000;
        assert!(!limits.use_time_management());
        limits.nodes = 0;

        limits.movetime = 1000;
        assert!(!limits.use_time_management());
        assert!(limits.is_time_limited());
    }

    #[test]
    fn test_constructors() {
        assert!(LimitsType::depth(4).has_depth_limit());
        assert!(LimitsType::nodes(1000).has_nodes_limit());
        assert!(LimitsType::movetime(100).has_movetime());
        assert!(!LimitsType::depth(4).is_time_limited());
    }

    #[test]
    fn test_builders() {
        let mv = Move::NONE;
        let limits = LimitsType::depth(6)
            .with_search_moves(vec![mv])
            .with_initial_window(Value::new(-10), Value::new(10))
            .with_multi_pv(0);
        assert_eq!(limits.depth, 6);
        assert_eq!(limits.search_moves, vec![mv]);
        assert_eq!(limits.initial_window, Some((Value::new(-10), Value::new(10))));
        assert_eq!(limits.multi_pv, 1);

        let limits = LimitsType::infinite();
        assert!(limits.infinite);
        assert!(!limits.use_time_management());

        let limits = LimitsType::new().with_clock([1000, 2000], [10, 20]);
        assert_eq!(limits.time_left(Color::Black), 2000);
        assert_eq!(limits.increment(Color::White), 10);
        assert!(limits.use_time_management());
    }

    #[test]
    fn test_time_left() {
        let mut limits = LimitsType::new();
        limits.time[Color::White.index()] = 60000;
        limits.inc[Color::Black.index()] = 1000;

        assert_eq!(limits.time_left(Color::White), 60000);
        assert_eq!(limits.time_left(Color::Black), 0);
        assert_eq!(limits.increment(Color::Black), 1000);
    }

    #[test]
    fn test_elapsed() {
        let mut limits = LimitsType::new();
        assert_eq!(limits.elapsed(), 0);
        limits.set_start_time();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let elapsed = limits.elapsed();
        assert!(elapsed >= 10);
        assert!(elapsed < 1000);
    }
}
