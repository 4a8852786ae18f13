//! 探索の停止信号
//!
//! 停止要求は段階的に強くなる方向にだけ変化する（`fetch_max`）。

use std::sync::atomic::{AtomicU8, Ordering};

/// 停止の段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum StopLevel {
    /// 探索中
    Run = 0,
    /// 現在の反復を終えたら止める
    StopSoon = 1,
    /// 直ちに止める（中断した反復の結果は捨てる）
    StopNow = 2,
    /// 全スレッドの終了後
    Terminated = 3,
}

impl StopLevel {
    #[inline]
    const fn from_u8(v: u8) -> StopLevel {
        match v {
            0 => StopLevel::Run,
            1 => StopLevel::StopSoon,
            2 => StopLevel::StopNow,
            _ => StopLevel::Terminated,
        }
    }
}

/// スレッド間で共有する停止信号
#[derive(Debug)]
pub struct SearchSignals {
    level: AtomicU8,
}

impl SearchSignals {
    pub fn new() -> Self {
        Self {
            level: AtomicU8::new(StopLevel::Run as u8),
        }
    }

    /// 現在の段階
    #[inline]
    pub fn level(&self) -> StopLevel {
        StopLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// 段階を引き上げる（下げる方向の要求は無視される）
    #[inline]
    pub fn escalate(&self, level: StopLevel) {
        self.level.fetch_max(level as u8, Ordering::Relaxed);
    }

    /// 反復の途中で打ち切るべきか
    #[inline]
    pub fn stop_now(&self) -> bool {
        self.level() >= StopLevel::StopNow
    }

    /// 次の反復に進まないべきか
    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.level() >= StopLevel::StopSoon
    }

    /// 新しい探索のために `Run` に戻す
    pub(crate) fn reset(&self) {
        self.level.store(StopLevel::Run as u8, Ordering::Relaxed);
    }
}

impl Default for SearchSignals {
    fn default() -> Self {
        Self::new()
    }
}
