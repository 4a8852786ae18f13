//! # rchess-core
//!
//! チェスの探索エンジンコアライブラリ。
//!
//! ## モジュール構成
//!
//! - `types`: 基本型（Color, Square, Piece, Move, Value, etc.）
//! - `position`: 探索から見た局面（`SearchPosition`）と shakmaty による実装
//! - `eval`: 駒割り + 駒位置の評価と SEE の駒価値
//! - `tt`: 置換表（Transposition Table）
//! - `search`: 探索アルゴリズムと反復深化ドライバ
//! - `config`: エンジン設定
//! - `error`: 設定時のエラー

pub mod config;
pub mod error;
pub mod eval;
pub mod position;
pub mod search;
pub mod tt;
pub mod types;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
