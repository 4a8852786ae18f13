//! 探索モジュール
//!
//! Alpha-Beta探索と各種枝刈り。
//!
//! - Iterative Deepening
//! - Alpha-Beta with PVS
//! - Aspiration Windows
//! - 静止探索（Quiescence Search）
//! - 各種枝刈り（NMP, LMR, Futility, SEE, Razoring, ProbCut, Singular Extension）
//! - Lazy SMP

mod alpha_beta;
mod engine;
mod history;
mod limits;
mod movepicker;
mod pruning;
mod qsearch;
mod search_helpers;
mod signals;
mod stats;
mod time_manager;
mod time_options;
mod tune_params;
mod types;

pub use alpha_beta::{SearchContext, SearchState, SearchWorker};
pub use engine::{Search, SearchInfo, SearchResult, DEFAULT_HASH_MB, MAX_HASH_MB};
pub use history::{
    stat_bonus, stat_malus, ButterflyHistory, CapturePieceToHistory, ContHistKey,
    ContinuationHistory, CounterMoveHistory, HistoryTables, StatsEntry,
};
pub use limits::{LimitsType, TimePoint};
pub use movepicker::{MovePicker, Stage};
pub use signals::{SearchSignals, StopLevel};
#[cfg(feature = "search-stats")]
pub use stats::SearchStats;
pub use time_manager::{
    calculate_best_move_instability, calculate_falling_eval, calculate_time_reduction,
    TimeManagement,
};
pub use time_options::TimeOptions;
pub use tune_params::{SearchTuneOptionSpec, SearchTuneParams};
pub use types::{NodeType, RootMove, RootMoves, Stack, MAX_SEARCH_DEPTH, STACK_SIZE};
