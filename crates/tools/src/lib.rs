//! rchess-core 用の計測ツール

pub mod bench;
