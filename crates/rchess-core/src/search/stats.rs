//! 探索統計（search-stats feature有効時のみ）
//!
//! 探索中の各種枝刈りの発生回数を記録し、チューニングやデバッグに使用する。

/// 深度別統計の最大深度
#[cfg(feature = "search-stats")]
pub(super) const STATS_MAX_DEPTH: usize = 32;

/// 探索統計カウンタ
#[cfg(feature = "search-stats")]
#[derive(Debug, Clone)]
pub struct SearchStats {
    /// 総ノード数（探索関数の呼び出し回数）
    pub nodes_searched: u64,
    /// 静止探索のノード数
    pub qsearch_nodes: u64,
    /// TT（置換表）カットオフ回数
    pub tt_cutoff: u64,
    /// テーブルベースでの打ち切り回数
    pub tb_cutoff: u64,
    /// Razoring適用回数
    pub razoring_applied: u64,
    /// Reverse futility pruning 回数
    pub futility_pruned: u64,
    /// NMP（Null Move Pruning）試行回数
    pub nmp_attempted: u64,
    /// NMPによる枝刈り成功回数
    pub nmp_cutoff: u64,
    /// ProbCut試行回数
    pub probcut_attempted: u64,
    /// ProbCutによる枝刈り成功回数
    pub probcut_cutoff: u64,
    /// Move Loop内の枝刈り回数（LMP, Futility, SEE の合計）
    pub move_loop_pruned: u64,
    /// LMR適用回数
    pub lmr_applied: u64,
    /// LMRによる再探索回数
    pub lmr_research: u64,
    /// Singular Extension適用回数
    pub singular_extension: u64,
    /// Multi-Cut発動回数
    pub multi_cut: u64,
    /// 深度別ノード数
    pub nodes_by_depth: [u64; STATS_MAX_DEPTH],
    /// 深度別TTカットオフ数
    pub tt_cutoff_by_depth: [u64; STATS_MAX_DEPTH],
    /// 深度別 first move cutoff 回数（Move Ordering品質）
    pub first_move_cutoff_by_depth: [u64; STATS_MAX_DEPTH],
    /// 深度別カットオフ回数
    pub cutoff_by_depth: [u64; STATS_MAX_DEPTH],
}

#[cfg(feature = "search-stats")]
impl Default for SearchStats {
    fn default() -> Self {
        Self {
            nodes_searched: 0,
            qsearch_nodes: 0,
            tt_cutoff: 0,
            tb_cutoff: 0,
            razoring_applied: 0,
            futility_pruned: 0,
            nmp_attempted: 0,
            nmp_cutoff: 0,
            probcut_attempted: 0,
            probcut_cutoff: 0,
            move_loop_pruned: 0,
            lmr_applied: 0,
            lmr_research: 0,
            singular_extension: 0,
            multi_cut: 0,
            nodes_by_depth: [0; STATS_MAX_DEPTH],
            tt_cutoff_by_depth: [0; STATS_MAX_DEPTH],
            first_move_cutoff_by_depth: [0; STATS_MAX_DEPTH],
            cutoff_by_depth: [0; STATS_MAX_DEPTH],
        }
    }
}

#[cfg(feature = "search-stats")]
impl SearchStats {
    /// 統計をリセット
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 別スレッドの統計を加算
    pub fn merge(&mut self, other: &SearchStats) {
        self.nodes_searched += other.nodes_searched;
        self.qsearch_nodes += other.qsearch_nodes;
        self.tt_cutoff += other.tt_cutoff;
        self.tb_cutoff += other.tb_cutoff;
        self.razoring_applied += other.razoring_applied;
        self.futility_pruned += other.futility_pruned;
        self.nmp_attempted += other.nmp_attempted;
        self.nmp_cutoff += other.nmp_cutoff;
        self.probcut_attempted += other.probcut_attempted;
        self.probcut_cutoff += other.probcut_cutoff;
        self.move_loop_pruned += other.move_loop_pruned;
        self.lmr_applied += other.lmr_applied;
        self.lmr_research += other.lmr_research;
        self.singular_extension += other.singular_extension;
        self.multi_cut += other.multi_cut;
        for d in 0..STATS_MAX_DEPTH {
            self.nodes_by_depth[d] += other.nodes_by_depth[d];
            self.tt_cutoff_by_depth[d] += other.tt_cutoff_by_depth[d];
            self.first_move_cutoff_by_depth[d] += other.first_move_cutoff_by_depth[d];
            self.cutoff_by_depth[d] += other.cutoff_by_depth[d];
        }
    }

    /// 統計をフォーマットして文字列として返す
    pub fn format_report(&self) -> String {
        let mut report = String::new();
        report.push_str("=== Search Statistics ===\n");
        report.push_str(&format!("Nodes searched:      {:>12}\n", self.nodes_searched));
        report.push_str(&format!("QSearch nodes:       {:>12}\n", self.qsearch_nodes));
        report.push_str(&format!("TT cutoffs:          {:>12}\n", self.tt_cutoff));
        report.push_str(&format!("TB cutoffs:          {:>12}\n", self.tb_cutoff));
        report.push_str("--- Pre-Move Pruning ---\n");
        report.push_str(&format!("Razoring:            {:>12}\n", self.razoring_applied));
        report.push_str(&format!("Futility (static):   {:>12}\n", self.futility_pruned));
        report.push_str(&format!("NMP attempted:       {:>12}\n", self.nmp_attempted));
        report.push_str(&format!("NMP cutoffs:         {:>12}\n", self.nmp_cutoff));
        report.push_str(&format!("ProbCut attempted:   {:>12}\n", self.probcut_attempted));
        report.push_str(&format!("ProbCut cutoffs:     {:>12}\n", self.probcut_cutoff));
        report.push_str("--- Move Loop ---\n");
        report.push_str(&format!("Move loop pruned:    {:>12}\n", self.move_loop_pruned));
        report.push_str(&format!("LMR applied:         {:>12}\n", self.lmr_applied));
        report.push_str(&format!("LMR re-search:       {:>12}\n", self.lmr_research));
        report.push_str("--- Extensions ---\n");
        report.push_str(&format!("Singular extension:  {:>12}\n", self.singular_extension));
        report.push_str(&format!("Multi-cut:           {:>12}\n", self.multi_cut));
        report.push_str("--- Nodes by Depth ---\n");
        for (d, &count) in self.nodes_by_depth.iter().enumerate() {
            if count > 0 {
                let tt_cut = self.tt_cutoff_by_depth[d];
                let cutoffs = self.cutoff_by_depth[d];
                let first_rate = if cutoffs > 0 {
                    self.first_move_cutoff_by_depth[d] as f64 / cutoffs as f64 * 100.0
                } else {
                    0.0
                };
                report.push_str(&format!(
                    "  depth {:>2}: {:>10} nodes, {:>8} TT cuts, first-move cut {:>5.1}%\n",
                    d, count, tt_cut, first_rate
                ));
            }
        }
        report
    }
}

// =============================================================================
// マクロ
// =============================================================================

/// 統計カウンタをインクリメントするマクロ（feature有効時のみ実行）
#[cfg(feature = "search-stats")]
macro_rules! inc_stat {
    ($st:expr, $field:ident) => {
        $st.stats.$field += 1;
    };
}

#[cfg(not(feature = "search-stats"))]
macro_rules! inc_stat {
    ($st:expr, $field:ident) => {
        let _ = &$st;
    };
}

/// 深度別統計をカウントするマクロ（feature有効時のみ実行）
#[cfg(feature = "search-stats")]
macro_rules! inc_stat_by_depth {
    ($st:expr, $field:ident, $depth:expr) => {
        let d = (($depth as i32).max(0) as usize).min($crate::search::stats::STATS_MAX_DEPTH - 1);
        $st.stats.$field[d] += 1;
    };
}

#[cfg(not(feature = "search-stats"))]
macro_rules! inc_stat_by_depth {
    ($st:expr, $field:ident, $depth:expr) => {
        let _ = (&$st, $depth);
    };
}

// マクロを search モジュール内で使えるようにする
pub(super) use inc_stat;
pub(super) use inc_stat_by_depth;

#[cfg(all(test, not(feature = "search-stats")))]
mod disabled_tests {
    struct Counted {
        hits: u32,
    }

    // 統計無効時も引数を使用済みとして扱い、副作用は起こさない
    #[test]
    #[deny(unused_variables)]
    fn test_macros_accept_state_without_counting() {
        let st = Counted { hits: 0 };
        let depth = 3;
        inc_stat!(st, nmp_attempted);
        inc_stat_by_depth!(st, cutoff_by_depth, depth);
        assert_eq!(st.hits, 0);
    }
}
