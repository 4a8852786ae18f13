//! MovePicker（指し手オーダリング）
//!
//! 探索中に指し手を順序付けして1手ずつ返す。
//! カットオフを起こしやすい手を先に返すことで αβ の効率を上げる。
//!
//! ## Lazy Generation
//!
//! 指し手は段階的に生成する。LMP 等の条件が成立したら `skip_quiets()` で
//! 残りの静かな手を生成せずに打ち切れる。
//!
//! ## History参照を保持しない設計
//!
//! 探索ループ内で局面を動かしたり history を更新したりするため、
//! MovePicker は局面や `HistoryTables` への参照を持たない。
//! `next_move()` を呼ぶたびに借用を受け取る。
//!
//! ## Stage
//!
//! ### 通常探索（王手なし）
//! 1. MainTT - 置換表の指し手
//! 2. CaptureInit - 駒取り・成りの生成
//! 3. GoodCapture - SEE が閾値以上の駒取り
//! 4. Killer1 / Killer2 - キラー手
//! 5. CounterMove - カウンター手
//! 6. QuietInit - 静かな手の生成
//! 7. Quiet - 静かな手
//! 8. BadCapture - 後回しにした駒取り
//!
//! ### 王手回避
//! EvasionTT → EvasionInit → Evasion
//!
//! ### 静止探索
//! QSearchTT → QCaptureInit → QCapture
//!
//! ### ProbCut
//! ProbCutTT → ProbCutInit → ProbCut

use smallvec::SmallVec;

use crate::eval::see_value;
use crate::position::{GenType, MoveList, SearchPosition};
use crate::types::{Color, Move};

use super::history::{ContHistKey, HistoryTables};

// =============================================================================
// Stage（指し手生成の段階）
// =============================================================================

/// 指し手生成の段階
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Stage {
    // 通常探索（王手なし）
    /// 置換表の指し手
    MainTT,
    /// 駒取りの生成
    CaptureInit,
    /// 良い駒取り（SEE >= threshold）
    GoodCapture,
    /// 1番目のキラー手
    Killer1,
    /// 2番目のキラー手
    Killer2,
    /// カウンター手
    CounterMove,
    /// 静かな手の生成
    QuietInit,
    /// 静かな手
    Quiet,
    /// 悪い駒取り
    BadCapture,
    /// 終端
    End,

    // 王手回避
    EvasionTT,
    EvasionInit,
    Evasion,

    // 静止探索
    QSearchTT,
    QCaptureInit,
    QCapture,

    // ProbCut
    ProbCutTT,
    ProbCutInit,
    ProbCut,
}

impl Stage {
    /// 次のステージを取得
    pub fn next(self) -> Self {
        match self {
            Stage::MainTT => Stage::CaptureInit,
            Stage::CaptureInit => Stage::GoodCapture,
            Stage::GoodCapture => Stage::Killer1,
            Stage::Killer1 => Stage::Killer2,
            Stage::Killer2 => Stage::CounterMove,
            Stage::CounterMove => Stage::QuietInit,
            Stage::QuietInit => Stage::Quiet,
            Stage::Quiet => Stage::BadCapture,
            Stage::BadCapture => Stage::End,
            Stage::End => Stage::End,

            Stage::EvasionTT => Stage::EvasionInit,
            Stage::EvasionInit => Stage::Evasion,
            Stage::Evasion => Stage::End,

            Stage::QSearchTT => Stage::QCaptureInit,
            Stage::QCaptureInit => Stage::QCapture,
            Stage::QCapture => Stage::End,

            Stage::ProbCutTT => Stage::ProbCutInit,
            Stage::ProbCutInit => Stage::ProbCut,
            Stage::ProbCut => Stage::End,
        }
    }
}

/// スコア付きの指し手
#[derive(Clone, Copy, Debug)]
struct ExtMove {
    mv: Move,
    value: i32,
}

/// 回避手の駒取りに加えるボーナス
const EVASION_CAPTURE_BONUS: i32 = 1 << 28;

// =============================================================================
// MovePicker
// =============================================================================

/// 指し手オーダリング器
///
/// ```ignore
/// let mut mp = MovePicker::new(pos, tt_move, killers, counter, cont_keys);
/// loop {
///     let mv = mp.next_move(pos, &st.history);
///     if mv.is_none() { break; }
///     ...
/// }
/// ```
pub struct MovePicker {
    stage: Stage,
    tt_move: Move,
    killers: [Move; 2],
    counter_move: Move,
    /// 1, 2, 4, 6手前の continuation history キー
    cont: [ContHistKey; 4],
    side_to_move: Color,
    /// ProbCut の SEE 閾値
    threshold: i32,
    moves: SmallVec<[ExtMove; 64]>,
    cur: usize,
    bad_captures: SmallVec<[Move; 16]>,
    bad_cur: usize,
    skip_quiets: bool,
}

impl MovePicker {
    /// 通常探索用（王手中なら回避手のステージになる）
    ///
    /// キラー・カウンター手は現局面で復元できる静かな手のみ採用する。
    pub fn new<P: SearchPosition>(
        pos: &P,
        tt_move: Move,
        killers: [Move; 2],
        counter_move: Move,
        cont: [ContHistKey; 4],
    ) -> Self {
        let in_check = pos.in_check();
        let tt_move = validate(pos, tt_move);
        let stage = match (in_check, tt_move.is_some()) {
            (true, true) => Stage::EvasionTT,
            (true, false) => Stage::EvasionInit,
            (false, true) => Stage::MainTT,
            (false, false) => Stage::CaptureInit,
        };

        let mut refutations = [Move::NONE; 3];
        if !in_check {
            for (i, &m) in killers.iter().chain(std::iter::once(&counter_move)).enumerate() {
                let m = validate(pos, m);
                if m.is_some()
                    && !m.is_tactical()
                    && m != tt_move
                    && !refutations[..i].contains(&m)
                {
                    refutations[i] = m;
                }
            }
        }

        Self {
            stage,
            tt_move,
            killers: [refutations[0], refutations[1]],
            counter_move: refutations[2],
            cont,
            side_to_move: pos.side_to_move(),
            threshold: 0,
            moves: SmallVec::new(),
            cur: 0,
            bad_captures: SmallVec::new(),
            bad_cur: 0,
            skip_quiets: false,
        }
    }

    /// 静止探索用（王手中なら回避手のステージになる）
    ///
    /// 王手でなければ置換表の手は駒取り・成りのときだけ使う。
    pub fn new_qsearch<P: SearchPosition>(
        pos: &P,
        tt_move: Move,
        cont: [ContHistKey; 4],
    ) -> Self {
        let in_check = pos.in_check();
        let mut tt_move = validate(pos, tt_move);
        if !in_check && !tt_move.is_tactical() {
            tt_move = Move::NONE;
        }
        let stage = match (in_check, tt_move.is_some()) {
            (true, true) => Stage::EvasionTT,
            (true, false) => Stage::EvasionInit,
            (false, true) => Stage::QSearchTT,
            (false, false) => Stage::QCaptureInit,
        };
        Self {
            stage,
            tt_move,
            killers: [Move::NONE; 2],
            counter_move: Move::NONE,
            cont,
            side_to_move: pos.side_to_move(),
            threshold: 0,
            moves: SmallVec::new(),
            cur: 0,
            bad_captures: SmallVec::new(),
            bad_cur: 0,
            skip_quiets: true,
        }
    }

    /// ProbCut用（SEE が `threshold` 以上の駒取り・成りのみ返す）
    pub fn new_probcut<P: SearchPosition>(pos: &P, tt_move: Move, threshold: i32) -> Self {
        let mut tt_move = validate(pos, tt_move);
        if !(tt_move.is_tactical() && pos.see_ge(tt_move, threshold)) {
            tt_move = Move::NONE;
        }
        Self {
            stage: if tt_move.is_some() {
                Stage::ProbCutTT
            } else {
                Stage::ProbCutInit
            },
            tt_move,
            killers: [Move::NONE; 2],
            counter_move: Move::NONE,
            cont: [ContHistKey::NONE; 4],
            side_to_move: pos.side_to_move(),
            threshold,
            moves: SmallVec::new(),
            cur: 0,
            bad_captures: SmallVec::new(),
            bad_cur: 0,
            skip_quiets: true,
        }
    }

    /// 以降の静かな手（キラー・カウンター手を含む）を返さない
    pub fn skip_quiets(&mut self) {
        self.skip_quiets = true;
    }

    /// 現在のステージ
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// 次の指し手を取得（尽きたら `Move::NONE`）
    pub fn next_move<P: SearchPosition>(&mut self, pos: &P, history: &HistoryTables) -> Move {
        loop {
            match self.stage {
                Stage::MainTT | Stage::EvasionTT | Stage::QSearchTT | Stage::ProbCutTT => {
                    self.stage = self.stage.next();
                    return self.tt_move;
                }

                Stage::CaptureInit | Stage::QCaptureInit | Stage::ProbCutInit => {
                    self.generate(pos, GenType::Captures);
                    self.score_captures(history);
                    self.stage = self.stage.next();
                }

                Stage::GoodCapture => {
                    while let Some(ext) = self.pick_best() {
                        // 駒取りのスコアに応じて SEE の要求を緩める
                        if pos.see_ge(ext.mv, -ext.value / 18) {
                            return ext.mv;
                        }
                        self.bad_captures.push(ext.mv);
                    }
                    self.stage = self.stage.next();
                }

                Stage::Killer1 | Stage::Killer2 | Stage::CounterMove => {
                    let mv = match self.stage {
                        Stage::Killer1 => self.killers[0],
                        Stage::Killer2 => self.killers[1],
                        _ => self.counter_move,
                    };
                    self.stage = self.stage.next();
                    if mv.is_some() && !self.skip_quiets {
                        return mv;
                    }
                }

                Stage::QuietInit => {
                    if !self.skip_quiets {
                        self.generate(pos, GenType::Quiets);
                        self.score_quiets(history);
                    } else {
                        self.moves.clear();
                        self.cur = 0;
                    }
                    self.stage = self.stage.next();
                }

                Stage::Quiet => {
                    if !self.skip_quiets {
                        while let Some(ext) = self.pick_best() {
                            if !self.is_refutation(ext.mv) {
                                return ext.mv;
                            }
                        }
                    }
                    self.stage = self.stage.next();
                }

                Stage::BadCapture => {
                    if self.bad_cur < self.bad_captures.len() {
                        let mv = self.bad_captures[self.bad_cur];
                        self.bad_cur += 1;
                        return mv;
                    }
                    self.stage = Stage::End;
                }

                Stage::EvasionInit => {
                    self.generate(pos, GenType::Evasions);
                    self.score_evasions(history);
                    self.stage = self.stage.next();
                }

                Stage::Evasion | Stage::QCapture => {
                    if let Some(ext) = self.pick_best() {
                        return ext.mv;
                    }
                    self.stage = Stage::End;
                }

                Stage::ProbCut => {
                    while let Some(ext) = self.pick_best() {
                        if pos.see_ge(ext.mv, self.threshold) {
                            return ext.mv;
                        }
                    }
                    self.stage = Stage::End;
                }

                Stage::End => return Move::NONE,
            }
        }
    }

    // =========================================================================
    // 生成とスコアリング
    // =========================================================================

    fn generate<P: SearchPosition>(&mut self, pos: &P, kind: GenType) {
        let mut list = MoveList::new();
        pos.generate(kind, &mut list);
        self.moves.clear();
        self.cur = 0;
        // 置換表の手は既に返しているので最初から除く
        self.moves.extend(
            list.into_iter()
                .filter(|&mv| mv != self.tt_move)
                .map(|mv| ExtMove { mv, value: 0 }),
        );
    }

    /// `7 * 取られる駒の価値 - 動かす駒の種類 + capture history`
    fn score_captures(&mut self, history: &HistoryTables) {
        for ext in &mut self.moves {
            let m = ext.mv;
            let victim = m.captured().piece_type().map_or(0, see_value);
            ext.value = 7 * victim - m.piece().type_index() as i32
                + history.capture_history.get_move(m) as i32;
        }
    }

    fn score_quiets(&mut self, history: &HistoryTables) {
        let us = self.side_to_move;
        for ext in &mut self.moves {
            ext.value = history.quiet_score(us, ext.mv, &self.cont);
        }
    }

    fn score_evasions(&mut self, history: &HistoryTables) {
        let us = self.side_to_move;
        for ext in &mut self.moves {
            let m = ext.mv;
            ext.value = if m.is_capture() {
                m.captured().piece_type().map_or(0, see_value) + EVASION_CAPTURE_BONUS
            } else {
                history.main_history.get(us, m) as i32
                    + history.continuation_history.get(self.cont[0], m.piece(), m.to()) as i32
            };
        }
    }

    // =========================================================================
    // ヘルパー
    // =========================================================================

    /// 残りの手から最大スコアの手を取り出す
    fn pick_best(&mut self) -> Option<ExtMove> {
        if self.cur >= self.moves.len() {
            return None;
        }
        let mut best = self.cur;
        for i in self.cur + 1..self.moves.len() {
            if self.moves[i].value > self.moves[best].value {
                best = i;
            }
        }
        self.moves.swap(self.cur, best);
        let ext = self.moves[self.cur];
        self.cur += 1;
        Some(ext)
    }

    #[inline]
    fn is_refutation(&self, mv: Move) -> bool {
        mv == self.killers[0] || mv == self.killers[1] || mv == self.counter_move
    }
}

/// 別局面由来の手を現局面の表現に直す（指せなければ `Move::NONE`）
#[inline]
fn validate<P: SearchPosition>(pos: &P, mv: Move) -> Move {
    if mv.is_none() {
        return Move::NONE;
    }
    pos.decode_move(mv.to_u16())
}
