//! エンジンのエラー型
//!
//! 設定時（置換表サイズ・スレッド数・オプション・局面構築）にのみ発生する。
//! 探索そのものはエラーを返さない。

use std::path::PathBuf;

/// Engine setup errors
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// Hash size outside the supported range
    #[error("Hash size must be in 1..={max} MB, got {got}")]
    InvalidHashSize { got: usize, max: usize },

    /// Zero search threads
    #[error("Thread count must be at least 1")]
    InvalidThreadCount,

    /// Option name not known to the engine
    #[error("Unknown option: {0}")]
    UnknownOption(String),

    /// Option value could not be parsed
    #[error("Invalid value for {name}: {value}")]
    InvalidOptionValue { name: String, value: String },

    /// Option value outside its declared range
    #[error("{name} = {value} is out of range {min}..={max}")]
    OptionOutOfRange {
        name: String,
        value: i32,
        min: i32,
        max: i32,
    },

    /// FEN string rejected by the board parser
    #[error("Invalid FEN `{fen}`: {reason}")]
    InvalidFen { fen: String, reason: String },

    /// Move text that is not legal in the current position
    #[error("Illegal move: {0}")]
    IllegalMove(String),

    /// Tablebase directory could not be read
    #[error("Tablebase directory {path:?}: {source}")]
    Tablebase {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for engine setup operations
pub type Result<T> = std::result::Result<T, EngineError>;
