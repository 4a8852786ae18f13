//! 時間管理オプション
use super::TimePoint;

/// 時間管理に関するオプション
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeOptions {
    /// 通信・GUI処理の遅延見込み（ミリ秒）
    pub move_overhead: TimePoint,
    /// 最小思考時間（ミリ秒）
    pub minimum_thinking_time: TimePoint,
    /// 思考時間の配分（百分率）
    pub slow_mover: i32,
}

impl Default for TimeOptions {
    fn default() -> Self {
        Self {
            move_overhead: 10,
            minimum_thinking_time: 20,
            slow_mover: 100,
        }
    }
}
