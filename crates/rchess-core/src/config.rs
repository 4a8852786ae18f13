//! エンジン設定
//!
//! TOML などから読み込む設定値。省略した項目は既定値になる。

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::search::{TimeOptions, DEFAULT_HASH_MB};

/// エンジン設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 置換表サイズ（MB）
    pub hash_mb: usize,
    /// 探索スレッド数
    pub threads: usize,
    /// 候補手を何本探索するか
    pub multi_pv: usize,
    /// 通信遅延の見込み（ミリ秒）
    pub move_overhead_ms: i64,
    /// 最小思考時間（ミリ秒）
    pub minimum_thinking_time_ms: i64,
    /// 思考時間の配分（百分率）
    pub slow_mover: i32,
    /// Syzygy テーブルベースのディレクトリ
    pub syzygy_path: Option<PathBuf>,
    /// テーブルベースを引く最大駒数（0 で無効）
    pub syzygy_probe_limit: i32,
    /// 探索係数の上書き（`SearchTuneParams` のオプション名 → 値）
    pub tune: BTreeMap<String, i32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let time = TimeOptions::default();
        Self {
            hash_mb: DEFAULT_HASH_MB,
            threads: 1,
            multi_pv: 1,
            move_overhead_ms: time.move_overhead,
            minimum_thinking_time_ms: time.minimum_thinking_time,
            slow_mover: time.slow_mover,
            syzygy_path: None,
            syzygy_probe_limit: 7,
            tune: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::search::Search;

    #[test]
    fn test_default_config_builds_engine() {
        let config = EngineConfig::default();
        let search = Search::from_config(&config).expect("default config is valid");
        assert_eq!(search.hash_size(), DEFAULT_HASH_MB);
        assert_eq!(search.num_threads(), 1);
        assert_eq!(search.time_options(), TimeOptions::default());
    }

    #[test]
    fn test_config_applies_tune_overrides() {
        let mut config = EngineConfig {
            hash_mb: 2,
            threads: 2,
            syzygy_probe_limit: 0,
            ..EngineConfig::default()
        };
        config.tune.insert("LmpBase".to_string(), 5);
        let search = Search::from_config(&config).expect("valid config");
        assert_eq!(search.num_threads(), 2);
        assert_eq!(search.tune_params().lmp_base, 5);
        assert_eq!(search.tune_params().syzygy_probe_limit, 0);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let zero_threads = EngineConfig {
            threads: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Search::from_config(&zero_threads),
            Err(EngineError::InvalidThreadCount)
        ));

        let mut unknown = EngineConfig::default();
        unknown.tune.insert("NotATunable".to_string(), 1);
        assert!(matches!(
            Search::from_config(&unknown),
            Err(EngineError::UnknownOption(_))
        ));
    }
}
