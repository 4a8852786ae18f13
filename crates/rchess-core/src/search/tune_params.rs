//! 探索チューニングパラメータ
//!
//! 枝刈り・延長・手順付けの係数を集約し、名前で実行時に更新できるようにする。

use crate::error::{EngineError, Result};

/// 1つのチューニング項目の定義。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTuneOptionSpec {
    /// オプション名
    pub name: &'static str,
    /// デフォルト値
    pub default: i32,
    /// 最小値（inclusive）
    pub min: i32,
    /// 最大値（inclusive）
    pub max: i32,
}

macro_rules! search_tune_params {
    ($(
        $(#[doc = $doc:literal])*
        $field:ident: $name:literal = $default:literal, $min:literal..=$max:literal;
    )*) => {
        /// 探索係数の集合。
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct SearchTuneParams {
            $(
                $(#[doc = $doc])*
                pub $field: i32,
            )*
        }

        impl Default for SearchTuneParams {
            fn default() -> Self {
                Self {
                    $($field: $default,)*
                }
            }
        }

        const OPTION_SPECS: &[SearchTuneOptionSpec] = &[
            $(SearchTuneOptionSpec {
                name: $name,
                default: $default,
                min: $min,
                max: $max,
            },)*
        ];

        impl SearchTuneParams {
            fn field_mut(&mut self, name: &str) -> Option<&mut i32> {
                match name {
                    $($name => Some(&mut self.$field),)*
                    _ => None,
                }
            }

            fn field(&self, name: &str) -> Option<i32> {
                match name {
                    $($name => Some(self.$field),)*
                    _ => None,
                }
            }
        }
    };
}

search_tune_params! {
    /// Razoring: 適用する最大深さ
    razoring_depth: "RazoringDepth" = 3, 0..=8;
    /// Razoring: depth 1 あたりのマージン
    razoring_margin: "RazoringMargin" = 260, 0..=2048;

    /// Reverse futility: 適用深さの上限（未満）
    rfp_depth: "RfpDepth" = 9, 0..=32;
    /// Reverse futility: depth 1 あたりのマージン
    rfp_margin: "RfpMargin" = 85, 0..=1024;

    /// NMP: reduction のベース
    nmp_reduction_base: "NmpReductionBase" = 4, 1..=16;
    /// NMP: reduction の depth 除算
    nmp_reduction_depth_div: "NmpReductionDepthDiv" = 3, 1..=32;
    /// NMP: (eval - beta) の除算
    nmp_eval_div: "NmpEvalDiv" = 200, 1..=4096;
    /// NMP: eval 由来の reduction の上限
    nmp_eval_max: "NmpEvalMax" = 3, 0..=16;
    /// NMP: verification search を行う深さ
    nmp_verification_depth: "NmpVerificationDepth" = 14, 1..=128;
    /// NMP: verification search を行うか（0 = 行わない）
    nmp_verification: "NmpVerification" = 1, 0..=1;

    /// IID: PV ノードで TT 手がないときに適用する最小深さ
    iid_depth: "IidDepth" = 6, 2..=64;
    /// IID: 浅い探索の reduction
    iid_reduction: "IidReduction" = 7, 1..=32;

    /// ProbCut: 最小深さ
    probcut_depth: "ProbCutDepth" = 5, 1..=64;
    /// ProbCut: beta に足すマージン
    probcut_margin: "ProbCutMargin" = 200, 0..=2048;
    /// ProbCut: 検証探索の reduction
    probcut_reduction: "ProbCutReduction" = 4, 1..=16;

    /// LMP: quiet 手数上限のベース（(base + depth^2) / (2 - improving)）
    lmp_base: "LmpBase" = 3, 0..=64;

    /// Futility: 適用する lmr_depth の上限（未満）
    futility_lmr_depth: "FutilityLmrDepth" = 7, 0..=32;
    /// Futility: ベースマージン
    futility_base: "FutilityBase" = 256, 0..=2048;
    /// Futility: lmr_depth 1 あたりのマージン
    futility_per_depth: "FutilityPerDepth" = 200, 0..=2048;

    /// SEE pruning: quiet の閾値係数（-coef * lmr_depth^2）
    see_quiet_margin: "SeeQuietMargin" = 30, 0..=512;
    /// SEE pruning: 駒取りの閾値係数（-coef * depth）
    see_capture_margin: "SeeCaptureMargin" = 120, 0..=1024;

    /// Singular extension: 最小深さ
    singular_depth: "SingularDepth" = 6, 1..=64;
    /// Singular extension: TT の深さがこれだけ浅くても適用する
    singular_tt_depth_margin: "SingularTtDepthMargin" = 3, 0..=16;
    /// Singular extension: singular beta の depth 係数
    singular_beta_mult: "SingularBetaMult" = 2, 0..=16;
    /// Singular extension: 二重延長のマージン
    double_extension_margin: "DoubleExtensionMargin" = 20, 0..=512;
    /// Singular extension: 1系列あたりの二重延長の上限
    double_extension_limit: "DoubleExtensionLimit" = 6, 0..=32;

    /// LMR: log テーブルの係数（x100）
    lmr_table_scale: "LmrTableScale" = 2100, 100..=10000;
    /// LMR: reduction のオフセット（1024 = 1手）
    lmr_base_offset: "LmrBaseOffset" = 1000, -4096..=4096;
    /// LMR: stat score の除算
    lmr_history_div: "LmrHistoryDiv" = 8192, 1..=65536;

    /// Aspiration: 初期 delta
    aspiration_delta: "AspirationDelta" = 10, 1..=512;
    /// Aspiration: 平均スコアからの delta 加算の除算
    aspiration_avg_div: "AspirationAvgDiv" = 128, 1..=65536;

    /// QSearch: futility のマージン
    qsearch_futility_margin: "QsFutilityMargin" = 200, 0..=2048;
    /// QSearch: delta pruning のマージン
    qsearch_delta_margin: "QsDeltaMargin" = 200, 0..=2048;

    /// history ボーナス: depth 係数
    stat_bonus_depth_mult: "StatBonusDepthMult" = 150, 0..=2048;
    /// history ボーナス: オフセット
    stat_bonus_offset: "StatBonusOffset" = -80, -2048..=2048;
    /// history ボーナス: 上限
    stat_bonus_max: "StatBonusMax" = 1600, 0..=8192;
    /// history ボーナス: best == tt のときの追加量
    stat_bonus_tt_bonus: "StatBonusTtBonus" = 300, 0..=4096;
    /// history ペナルティ: depth 係数
    stat_malus_depth_mult: "StatMalusDepthMult" = 160, 0..=2048;
    /// history ペナルティ: オフセット
    stat_malus_offset: "StatMalusOffset" = -60, -2048..=2048;
    /// history ペナルティ: 上限
    stat_malus_max: "StatMalusMax" = 1400, 0..=8192;
    /// history ペナルティ: 手数あたりの減算
    stat_malus_move_count_mult: "StatMalusMoveCountMult" = 8, 0..=256;

    /// テーブルベース: probe する最大駒数
    syzygy_probe_limit: "SyzygyProbeLimit" = 7, 0..=7;
}

impl SearchTuneParams {
    /// すべての項目の定義
    pub fn option_specs() -> &'static [SearchTuneOptionSpec] {
        OPTION_SPECS
    }

    /// 名前で値を設定する
    pub fn set_option(&mut self, name: &str, value: i32) -> Result<()> {
        let spec = OPTION_SPECS
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| EngineError::UnknownOption(name.to_string()))?;
        if !(spec.min..=spec.max).contains(&value) {
            return Err(EngineError::OptionOutOfRange {
                name: spec.name.to_string(),
                value,
                min: spec.min,
                max: spec.max,
            });
        }
        let slot = self
            .field_mut(spec.name)
            .ok_or_else(|| EngineError::UnknownOption(name.to_string()))?;
        *slot = value;
        Ok(())
    }

    /// 名前で値を取得する
    pub fn get_option(&self, name: &str) -> Option<i32> {
        let spec = OPTION_SPECS.iter().find(|spec| spec.name.eq_ignore_ascii_case(name))?;
        self.field(spec.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_specs() {
        let defaults = SearchTuneParams::default();
        for spec in SearchTuneParams::option_specs() {
            assert_eq!(defaults.get_option(spec.name), Some(spec.default), "{}", spec.name);
            assert!(spec.min <= spec.default && spec.default <= spec.max, "{}", spec.name);
        }
    }

    #[test]
    fn test_set_option_by_name() {
        let mut params = SearchTuneParams::default();
        params.set_option("NmpReductionDepthDiv", 4).unwrap();
        assert_eq!(params.nmp_reduction_depth_div, 4);
        // 大文字小文字は区別しない
        params.set_option("rfpmargin", 100).unwrap();
        assert_eq!(params.rfp_margin, 100);
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let mut params = SearchTuneParams::default();
        let err = params.set_option("NmpReductionDepthDiv", 0).unwrap_err();
        assert!(matches!(err, EngineError::OptionOutOfRange { min: 1, .. }));
        assert_eq!(params.nmp_reduction_depth_div, 3);
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let mut params = SearchTuneParams::default();
        assert!(matches!(
            params.set_option("NoSuchOption", 1),
            Err(EngineError::UnknownOption(_))
        ));
    }

    #[test]
    fn test_all_specs_accept_bounds() {
        for spec in SearchTuneParams::option_specs() {
            let mut params = SearchTuneParams::default();
            params.set_option(spec.name, spec.min).unwrap();
            params.set_option(spec.name, spec.max).unwrap();
            assert!(params.set_option(spec.name, spec.max + 1).is_err());
        }
    }
}
