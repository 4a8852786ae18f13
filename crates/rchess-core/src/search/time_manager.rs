//! 時間管理（TimeManagement）
//!
//! 残り時間・加算時間・残り手数などから今回の思考時間を決め、
//! 反復の境目で評価値の変動や最善手の安定度に応じて伸縮させる。

use std::time::Instant;

use super::{LimitsType, TimeOptions, TimePoint};
use crate::types::Color;

// =============================================================================
// 定数
// =============================================================================

/// `movestogo` が無いときに想定する残り手数
const DEFAULT_MOVE_HORIZON: i32 = 50;

/// 合法手1つの場合の時間上限（ミリ秒）
const SINGLE_MOVE_TIME_LIMIT: TimePoint = 500;

/// 最善手不安定性係数の定数
const BEST_MOVE_INSTABILITY_BASE: f64 = 1.04;
const BEST_MOVE_INSTABILITY_FACTOR: f64 = 1.8956;

// =============================================================================
// 公開関数
// =============================================================================

/// 最善手不安定性係数を計算
///
/// `1.04 + 1.8956 * totBestMoveChanges / threads`
pub fn calculate_best_move_instability(tot_best_move_changes: f64, thread_count: usize) -> f64 {
    BEST_MOVE_INSTABILITY_BASE
        + BEST_MOVE_INSTABILITY_FACTOR * tot_best_move_changes / thread_count.max(1) as f64
}

/// fallingEvalを計算
///
/// fallingEval = (11.396 + 2.035 * (best_prev_avg - best) + 0.968 * (iter_value - best)) / 100
/// を [0.5786, 1.6752] にクランプする。
#[inline]
pub fn calculate_falling_eval(best_prev_avg: i32, iter_value: i32, best_value: i32) -> f64 {
    let delta_avg = (best_prev_avg - best_value) as f64;
    let delta_iter = (iter_value - best_value) as f64;
    let eval = (11.396 + 2.035 * delta_avg + 0.968 * delta_iter) / 100.0;
    eval.clamp(0.5786, 1.6752)
}

/// timeReductionを計算
///
/// timeReduction = 0.8 + 0.84 / (1.077 + exp(-0.527 * (depth - (last_best_move_depth + 11))))
#[inline]
pub fn calculate_time_reduction(completed_depth: i32, last_best_move_depth: i32) -> f64 {
    let k = 0.527;
    let center = last_best_move_depth as f64 + 11.0;
    0.8 + 0.84 / (1.077 + (-k * (completed_depth as f64 - center)).exp())
}

// =============================================================================
// TimeManagement
// =============================================================================

/// 時間管理
///
/// 最大思考時間はノード単位の中断チェックで、
/// 伸縮後の最適思考時間は反復深化の境目で使う。
#[derive(Debug, Clone)]
pub struct TimeManagement {
    /// 探索開始時刻
    start_time: Instant,
    /// 最適思考時間（ミリ秒）
    optimum_time: TimePoint,
    /// 最大思考時間（ミリ秒）
    maximum_time: TimePoint,
    /// 反復ごとの係数を掛けた最適思考時間
    scaled_optimum: TimePoint,
    options: TimeOptions,
    /// 合法手が1つだった場合に500ms上限を再適用するためのフラグ
    single_move_limit: bool,
    /// 前回のtime_reduction（次の反復の reduction 計算に持ち回る）
    previous_time_reduction: f64,
}

impl TimeManagement {
    pub fn new(options: TimeOptions) -> Self {
        Self {
            start_time: Instant::now(),
            optimum_time: TimePoint::MAX / 2,
            maximum_time: TimePoint::MAX / 2,
            scaled_optimum: TimePoint::MAX / 2,
            options,
            single_move_limit: false,
            previous_time_reduction: 1.0,
        }
    }

    pub fn set_options(&mut self, opts: &TimeOptions) {
        self.options = TimeOptions {
            move_overhead: opts.move_overhead.max(0),
            minimum_thinking_time: opts.minimum_thinking_time.max(0),
            slow_mover: opts.slow_mover.clamp(1, 1000),
        };
    }

    pub fn options(&self) -> TimeOptions {
        self.options
    }

    /// 今回の思考時間を決定する
    ///
    /// # Arguments
    /// * `limits` - 探索制限
    /// * `us` - 自分の手番
    /// * `ply` - 開始局面からの手数
    pub fn init(&mut self, limits: &LimitsType, us: Color, ply: i32) {
        self.start_time = limits.start_time.unwrap_or_else(Instant::now);
        self.single_move_limit = false;
        self.previous_time_reduction = 1.0;

        if limits.has_movetime() {
            let movetime = (limits.movetime - self.options.move_overhead).max(1);
            self.optimum_time = movetime;
            self.maximum_time = movetime;
            self.scaled_optimum = movetime;
            return;
        }

        if !limits.use_time_management() {
            self.optimum_time = TimePoint::MAX / 2;
            self.maximum_time = TimePoint::MAX / 2;
            self.scaled_optimum = TimePoint::MAX / 2;
            return;
        }

        let time = limits.time_left(us);
        let inc = limits.increment(us);
        let overhead = self.options.move_overhead;

        let mtg = if limits.movestogo > 0 {
            limits.movestogo.min(DEFAULT_MOVE_HORIZON)
        } else {
            DEFAULT_MOVE_HORIZON
        };
        let mtg_t = mtg as TimePoint;

        // 残り手数ぶんの加算を見込んだ今回の持ち時間
        let time_left = (time + inc * (mtg_t - 1) - overhead * (2 + mtg_t)).max(1);

        let (opt_scale, max_scale) = if limits.movestogo == 0 {
            let opt = (0.0120 + (ply as f64 + 3.0).powf(0.45) * 0.0039)
                .min(0.2 * time as f64 / time_left as f64);
            let max = (4.0 + ply as f64 / 12.0).min(7.0);
            (opt, max)
        } else {
            let opt = ((0.88 + ply as f64 / 116.4) / mtg as f64)
                .min(0.88 * time as f64 / time_left as f64);
            let max = (1.5 + 0.11 * mtg as f64).min(6.3);
            (opt, max)
        };

        let optimum = (opt_scale * time_left as f64) as TimePoint;
        let maximum =
            ((0.84 * time as f64 - overhead as f64).min(max_scale * optimum as f64) - 10.0) as TimePoint;

        self.optimum_time = (optimum * self.options.slow_mover as TimePoint / 100)
            .max(self.options.minimum_thinking_time)
            .max(1);
        self.maximum_time = maximum.max(self.optimum_time);
        self.scaled_optimum = self.optimum_time;

        log::debug!(
            "time budget: optimum={}ms maximum={}ms (time={time} inc={inc} mtg={mtg})",
            self.optimum_time,
            self.maximum_time
        );
    }

    /// 今回の思考時間を決定する（合法手数を考慮）
    pub fn init_with_root_moves_count(
        &mut self,
        limits: &LimitsType,
        us: Color,
        ply: i32,
        root_moves_count: usize,
    ) {
        self.init(limits, us, ply);
        if root_moves_count == 1 && limits.use_time_management() {
            self.apply_single_move_limit();
        }
    }

    /// 合法手1つの場合は使用時間を500ms以下に制限する
    pub fn apply_single_move_limit(&mut self) {
        self.optimum_time = self.optimum_time.min(SINGLE_MOVE_TIME_LIMIT);
        self.maximum_time = self.maximum_time.min(SINGLE_MOVE_TIME_LIMIT);
        self.scaled_optimum = self.scaled_optimum.min(SINGLE_MOVE_TIME_LIMIT);
        self.single_move_limit = true;
    }

    /// fallingEval / timeReduction / bestMoveInstability をまとめて適用
    ///
    /// 最適思考時間そのものは変えず、係数を掛けた値を `scaled_optimum` に置く。
    pub fn apply_time_multipliers(
        &mut self,
        falling_eval: f64,
        time_reduction: f64,
        tot_best_move_changes: f64,
        thread_count: usize,
    ) {
        let instability = calculate_best_move_instability(tot_best_move_changes, thread_count);
        let reduction =
            (1.455 + self.previous_time_reduction) / (2.2375 * time_reduction.max(0.0001));
        self.previous_time_reduction = time_reduction;

        let factor = falling_eval * reduction * instability;
        let scaled = (self.optimum_time as f64 * factor) as TimePoint;
        self.scaled_optimum = scaled.clamp(1, self.maximum_time);

        if self.single_move_limit {
            self.scaled_optimum = self.scaled_optimum.min(SINGLE_MOVE_TIME_LIMIT);
        }

        log::debug!(
            "time factors: falling_eval={falling_eval:.3} reduction={reduction:.3} \
             instability={instability:.3} -> {}ms",
            self.scaled_optimum
        );
    }

    #[inline]
    pub fn optimum(&self) -> TimePoint {
        self.optimum_time
    }

    #[inline]
    pub fn maximum(&self) -> TimePoint {
        self.maximum_time
    }

    /// 係数を掛けた最適思考時間
    #[inline]
    pub fn scaled_optimum(&self) -> TimePoint {
        self.scaled_optimum
    }

    /// 探索開始からの経過時間（ミリ秒）
    #[inline]
    pub fn elapsed(&self) -> TimePoint {
        self.start_time.elapsed().as_millis() as TimePoint
    }

    /// 反復の境目で探索を打ち切るべきか
    pub fn should_stop(&self) -> bool {
        self.elapsed() >= self.scaled_optimum
    }

    /// 最大思考時間を超えたか（ノード単位の中断チェック用）
    #[inline]
    pub fn should_stop_immediately(&self) -> bool {
        self.elapsed() >= self.maximum_time
    }
}

impl Default for TimeManagement {
    fn default() -> Self {
        Self::new(TimeOptions::default())
    }
}

// =============================================================================
// テスト
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn limits_with_time(ms: TimePoint, inc: TimePoint) -> LimitsType {
        let mut limits = LimitsType::new();
        limits.time = [ms, ms];
        limits.inc = [inc, inc];
        limits
    }

    #[test]
    fn test_budget_monotonic_in_remaining_time() {
        let mut prev_opt = 0;
        let mut prev_max = 0;
        for ms in [1_000, 5_000, 30_000, 60_000, 300_000, 900_000] {
            let mut tm = TimeManagement::default();
            tm.init(&limits_with_time(ms, 0), Color::White, 20);
            assert!(tm.optimum() >= prev_opt, "optimum shrank at {ms}");
            assert!(tm.maximum() >= prev_max, "maximum shrank at {ms}");
            assert!(tm.optimum() <= tm.maximum());
            assert!(tm.maximum() < ms);
            prev_opt = tm.optimum();
            prev_max = tm.maximum();
        }
    }

    #[test]
    fn test_increment_extends_budget() {
        let mut without = TimeManagement::default();
        without.init(&limits_with_time(60_000, 0), Color::Black, 30);
        let mut with = TimeManagement::default();
        with.init(&limits_with_time(60_000, 2_000), Color::Black, 30);
        assert!(with.optimum() > without.optimum());
    }

    #[test]
    fn test_moves_to_go() {
        let mut limits = limits_with_time(60_000, 0);
        limits.movestogo = 2;
        let mut tm = TimeManagement::default();
        tm.init(&limits, Color::White, 60);
        // 残り2手なら持ち時間のかなりの割合を使う
        assert!(tm.optimum() > 20_000);
        assert!(tm.maximum() <= 60_000);
    }

    #[test]
    fn test_movetime_is_fixed() {
        let mut tm = TimeManagement::default();
        tm.init(&LimitsType::movetime(1000), Color::White, 0);
        let expected = 1000 - TimeOptions::default().move_overhead;
        assert_eq!(tm.optimum(), expected);
        assert_eq!(tm.maximum(), expected);
    }

    #[test]
    fn test_no_time_management() {
        let mut tm = TimeManagement::default();
        tm.init(&LimitsType::depth(5), Color::White, 0);
        assert!(tm.maximum() > 1_000_000_000);
        assert!(!tm.should_stop_immediately());
    }

    #[test]
    fn test_single_move_limit() {
        let mut tm = TimeManagement::default();
        tm.init_with_root_moves_count(&limits_with_time(600_000, 0), Color::White, 10, 1);
        assert!(tm.optimum() <= 500);
        assert!(tm.maximum() <= 500);
        tm.apply_time_multipliers(1.6, 0.8, 10.0, 1);
        assert!(tm.scaled_optimum() <= 500);
    }

    #[test]
    fn test_multipliers_do_not_compound() {
        let mut tm = TimeManagement::default();
        tm.init(&limits_with_time(600_000, 0), Color::White, 10);
        let base = tm.optimum();
        tm.apply_time_multipliers(1.0, 1.0, 0.0, 1);
        let first = tm.scaled_optimum();
        tm.apply_time_multipliers(1.0, 1.0, 0.0, 1);
        assert_eq!(tm.optimum(), base);
        assert!((tm.scaled_optimum() - first).abs() <= 1 + first / 100);
    }

    #[test]
    fn test_falling_eval_clamped() {
        assert_eq!(calculate_falling_eval(1000, 1000, -1000), 1.6752);
        assert_eq!(calculate_falling_eval(-1000, -1000, 1000), 0.5786);
        // 変動が無ければ下限に張り付く
        assert_eq!(calculate_falling_eval(0, 0, 0), 0.5786);
    }

    #[test]
    fn test_time_reduction_grows_with_stability() {
        let unstable = calculate_time_reduction(10, 10);
        let stable = calculate_time_reduction(30, 10);
        assert!(stable > unstable);
        assert!(stable < 0.8 + 0.84 / 1.077 + 1e-9);
    }

    #[test]
    fn test_best_move_instability() {
        assert_eq!(calculate_best_move_instability(0.0, 1), 1.04);
        let two_threads = calculate_best_move_instability(2.0, 2);
        let one_thread = calculate_best_move_instability(1.0, 1);
        assert!((two_threads - one_thread).abs() < 1e-12);
    }
}
