//! shakmaty による `SearchPosition` の実装
//!
//! 局面は状態スタック（`StateInfo` の Vec）で持ち、do_move で子局面を積み、
//! undo_move で取り除く。合法手リストは状態ごとに遅延生成してキャッシュする。

use std::cell::OnceCell;
#[cfg(feature = "syzygy")]
use std::path::Path;
#[cfg(feature = "syzygy")]
use std::sync::Arc;

use shakmaty::fen::Fen;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{Bitboard, CastlingMode, Chess, EnPassantMode, Position, Role};

use super::{see, GenType, MoveList, SearchPosition};
#[cfg(feature = "syzygy")]
use super::{TbProbe, TbWdl};
use crate::error::{EngineError, Result};
use crate::eval::{self, piece_type_of};
use crate::types::{CastleSide, Color, Move, MoveKind, Piece, Square, Value};

/// 平手初期局面
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// テーブルベース
#[cfg(feature = "syzygy")]
pub type Tablebase = shakmaty_syzygy::Tablebase<Chess>;

#[derive(Clone)]
struct StateInfo {
    pos: Chess,
    key: u64,
    /// 直前のnull moveからの手数
    plies_from_null: i32,
    /// 合法手（探索用の表現と shakmaty の表現の組）
    moves: OnceCell<Vec<(Move, shakmaty::Move)>>,
}

impl StateInfo {
    fn new(pos: Chess, plies_from_null: i32) -> Self {
        let key = pos.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0;
        Self {
            pos,
            key,
            plies_from_null,
            moves: OnceCell::new(),
        }
    }

    fn moves(&self) -> &[(Move, shakmaty::Move)] {
        self.moves.get_or_init(|| {
            let turn = self.pos.turn();
            self.pos
                .legal_moves()
                .into_iter()
                .map(|m| (convert_move(&m, turn), m))
                .collect()
        })
    }

    fn find(&self, mv: Move) -> Option<&shakmaty::Move> {
        if mv.is_none() {
            return None;
        }
        self.moves().iter().find(|(m, _)| *m == mv).map(|(_, sm)| sm)
    }
}

/// チェスの局面
#[derive(Clone)]
pub struct ChessPosition {
    states: Vec<StateInfo>,
    /// 現在の状態より前の対局履歴のキー（千日手判定用）
    history: Vec<u64>,
    #[cfg(feature = "syzygy")]
    tablebase: Option<Arc<Tablebase>>,
}

impl Default for ChessPosition {
    fn default() -> Self {
        Self::startpos()
    }
}

impl ChessPosition {
    /// 平手初期局面
    pub fn startpos() -> Self {
        Self::from_chess(Chess::default())
    }

    /// FEN から局面を作る
    pub fn from_fen(fen: &str) -> Result<Self> {
        let invalid = |reason: String| EngineError::InvalidFen {
            fen: fen.to_string(),
            reason,
        };
        let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{e}")))?;
        let pos: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| invalid(format!("{e}")))?;
        Ok(Self::from_chess(pos))
    }

    fn from_chess(pos: Chess) -> Self {
        Self {
            states: vec![StateInfo::new(pos, i32::MAX / 2)],
            history: Vec::new(),
            #[cfg(feature = "syzygy")]
            tablebase: None,
        }
    }

    /// テーブルベースを読み込む
    #[cfg(feature = "syzygy")]
    pub fn load_tablebase(path: &Path) -> Result<Arc<Tablebase>> {
        let mut tables = Tablebase::new();
        let count = tables.add_directory(path).map_err(|source| EngineError::Tablebase {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("loaded {count} tablebase files from {}", path.display());
        Ok(Arc::new(tables))
    }

    /// テーブルベースを使う局面にする
    #[cfg(feature = "syzygy")]
    pub fn with_tablebase(mut self, tablebase: Arc<Tablebase>) -> Self {
        self.tablebase = Some(tablebase);
        self
    }

    /// 対局の手を進める（探索のルートを進める）
    ///
    /// 探索中の do/undo とは異なり、戻す前提のない手として履歴に積む。
    pub fn push_uci(&mut self, uci: &str) -> Result<()> {
        let mv = self
            .legal_moves()
            .into_iter()
            .find(|m| m.to_uci() == uci)
            .ok_or_else(|| EngineError::IllegalMove(uci.to_string()))?;
        self.play(mv)
    }

    /// 対局の手を進める
    pub fn play(&mut self, mv: Move) -> Result<()> {
        if !self.do_move(mv) {
            return Err(EngineError::IllegalMove(mv.to_uci()));
        }
        // 現在の状態だけを残し、それ以前はキーのみ保持する
        let last = self.states.len() - 1;
        self.history.extend(self.states.drain(..last).map(|st| st.key));
        Ok(())
    }

    /// 合法手の一覧
    pub fn legal_moves(&self) -> MoveList {
        self.state().moves().iter().map(|(m, _)| *m).collect()
    }

    /// FEN 文字列
    pub fn fen(&self) -> String {
        Fen::from_position(self.pos(), EnPassantMode::Legal).to_string()
    }

    /// 探索ルートからの状態数
    #[inline]
    pub fn stack_depth(&self) -> usize {
        self.states.len() - 1
    }

    #[inline]
    fn state(&self) -> &StateInfo {
        // states は常に1要素以上
        &self.states[self.states.len() - 1]
    }

    #[inline]
    fn pos(&self) -> &Chess {
        &self.state().pos
    }

    /// k 手前の局面のキー
    fn key_back(&self, k: usize) -> Option<u64> {
        let n = self.states.len();
        if k < n {
            Some(self.states[n - 1 - k].key)
        } else {
            let j = k - n;
            self.history.len().checked_sub(j + 1).map(|i| self.history[i])
        }
    }

    fn push_state(&mut self, pos: Chess, null: bool) {
        let plies_from_null = if null {
            0
        } else {
            self.state().plies_from_null.saturating_add(1)
        };
        self.states.push(StateInfo::new(pos, plies_from_null));
    }
}

impl SearchPosition for ChessPosition {
    #[inline]
    fn key(&self) -> u64 {
        self.state().key
    }

    #[inline]
    fn side_to_move(&self) -> Color {
        color_of(self.pos().turn())
    }

    #[inline]
    fn in_check(&self) -> bool {
        self.pos().is_check()
    }

    fn game_ply(&self) -> i32 {
        let pos = self.pos();
        let full = pos.fullmoves().get() as i32;
        (full - 1) * 2 + (pos.turn() == shakmaty::Color::Black) as i32
    }

    #[inline]
    fn rule50_count(&self) -> i32 {
        self.pos().halfmoves() as i32
    }

    fn is_repetition(&self, ply: i32) -> bool {
        let end = self.rule50_count().min(self.state().plies_from_null);
        if end < 4 {
            return false;
        }
        let current = self.key();
        let mut count = 0;
        let mut k = 4;
        while k <= end {
            let Some(key) = self.key_back(k as usize) else {
                break;
            };
            if key == current {
                // ルートより後での2回目、または通算3回目
                if k < ply {
                    return true;
                }
                count += 1;
                if count >= 2 {
                    return true;
                }
            }
            k += 2;
        }
        false
    }

    fn generate(&self, kind: GenType, list: &mut MoveList) {
        let moves = self.state().moves().iter().map(|(m, _)| *m);
        match kind {
            GenType::All | GenType::Evasions => list.extend(moves),
            GenType::Captures => list.extend(moves.filter(|m| m.is_tactical())),
            GenType::Quiets => list.extend(moves.filter(|m| !m.is_tactical())),
        }
    }

    #[inline]
    fn is_pseudo_legal(&self, mv: Move) -> bool {
        self.state().find(mv).is_some()
    }

    fn gives_check(&self, mv: Move) -> bool {
        let Some(sm) = self.state().find(mv) else {
            return false;
        };
        let mut next = self.pos().clone();
        next.play_unchecked(*sm);
        next.is_check()
    }

    fn do_move(&mut self, mv: Move) -> bool {
        let Some(sm) = self.state().find(mv).copied() else {
            return false;
        };
        let mut next = self.pos().clone();
        next.play_unchecked(sm);
        self.push_state(next, false);
        true
    }

    fn undo_move(&mut self, _mv: Move) {
        if self.states.len() > 1 {
            self.states.pop();
        }
    }

    fn do_null_move(&mut self) -> bool {
        if self.in_check() {
            return false;
        }
        match self.pos().clone().swap_turn() {
            Ok(next) => {
                self.push_state(next, true);
                true
            }
            Err(_) => false,
        }
    }

    fn undo_null_move(&mut self) {
        if self.states.len() > 1 {
            self.states.pop();
        }
    }

    #[inline]
    fn evaluate(&self) -> Value {
        let pos = self.pos();
        Value::new(eval::evaluate(pos.board(), pos.turn()))
    }

    #[inline]
    fn see_ge(&self, mv: Move, threshold: i32) -> bool {
        see::see_ge(self.pos().board(), mv, threshold)
    }

    fn non_pawn_material(&self, color: Color) -> i32 {
        eval::non_pawn_material(self.pos().board(), to_shakmaty_color(color))
    }

    #[inline]
    fn piece_count(&self) -> u32 {
        self.pos().board().occupied().count() as u32
    }

    #[cfg(feature = "syzygy")]
    fn probe_tablebase(&self) -> Option<TbProbe> {
        let tables = self.tablebase.as_ref()?;
        let pos = self.pos();
        if self.piece_count() as usize > tables.max_pieces() || pos.halfmoves() != 0 {
            return None;
        }
        let wdl = tables.probe_wdl_after_zeroing(pos).ok()?;
        let wdl = match wdl {
            shakmaty_syzygy::Wdl::Loss => TbWdl::Loss,
            shakmaty_syzygy::Wdl::BlessedLoss => TbWdl::BlessedLoss,
            shakmaty_syzygy::Wdl::Draw => TbWdl::Draw,
            shakmaty_syzygy::Wdl::CursedWin => TbWdl::CursedWin,
            shakmaty_syzygy::Wdl::Win => TbWdl::Win,
        };
        Some(TbProbe { wdl, dtz: None })
    }

    fn decode_move(&self, raw: u16) -> Move {
        if raw == 0 {
            return Move::NONE;
        }
        self.state()
            .moves()
            .iter()
            .find(|(m, _)| m.matches_u16(raw))
            .map_or(Move::NONE, |(m, _)| *m)
    }

    fn has_promotion_candidate(&self) -> bool {
        let pos = self.pos();
        let board = pos.board();
        let seventh = match pos.turn() {
            shakmaty::Color::White => Bitboard(0x00FF_0000_0000_0000),
            shakmaty::Color::Black => Bitboard(0x0000_0000_0000_FF00),
        };
        (board.pawns() & board.by_color(pos.turn()) & seventh).any()
    }
}

#[inline]
fn color_of(c: shakmaty::Color) -> Color {
    match c {
        shakmaty::Color::White => Color::White,
        shakmaty::Color::Black => Color::Black,
    }
}

#[inline]
fn to_shakmaty_color(c: Color) -> shakmaty::Color {
    match c {
        Color::White => shakmaty::Color::White,
        Color::Black => shakmaty::Color::Black,
    }
}

#[inline]
fn square_of(sq: shakmaty::Square) -> Square {
    Square::from_index_masked(sq as u16)
}

/// shakmaty の指し手を探索用の表現に変換する
fn convert_move(m: &shakmaty::Move, turn: shakmaty::Color) -> Move {
    let us = color_of(turn);
    let piece = |role: Role| Piece::new(us, piece_type_of(role));
    let theirs = |role: Role| Piece::new(!us, piece_type_of(role));

    match *m {
        shakmaty::Move::Normal {
            role,
            from,
            capture,
            to,
            promotion,
        } => {
            let (from, to) = (square_of(from), square_of(to));
            let mut mv = Move::new(from, to, piece(role));
            if let Some(captured) = capture {
                mv = mv.with_capture(theirs(captured));
            }
            if let Some(pt) = promotion {
                mv = mv.with_promotion(piece_type_of(pt));
            }
            if role == Role::Pawn && from.rank().abs_diff(to.rank()) == 2 {
                mv = mv.with_kind(MoveKind::DoublePush);
            }
            mv
        }
        shakmaty::Move::EnPassant { from, to } => {
            Move::new(square_of(from), square_of(to), piece(Role::Pawn))
                .with_capture(theirs(Role::Pawn))
                .with_kind(MoveKind::EnPassant)
        }
        shakmaty::Move::Castle { king, rook } => {
            let king = square_of(king);
            let rook = square_of(rook);
            let (side, file) = if rook.file() > king.file() {
                (CastleSide::King, 6)
            } else {
                (CastleSide::Queen, 2)
            };
            Move::new(king, Square::from_file_rank(file, king.rank()), piece(Role::King))
                .with_kind(MoveKind::Castle(side))
        }
        shakmaty::Move::Put { role, to } => {
            let to = square_of(to);
            Move::new(to, to, piece(role))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pos: &ChessPosition) -> (u64, Color, String, bool) {
        (pos.key(), pos.side_to_move(), pos.fen(), pos.in_check())
    }

    #[test]
    fn test_startpos_basics() {
        let pos = ChessPosition::startpos();
        assert_eq!(pos.legal_moves().len(), 20);
        assert_eq!(pos.side_to_move(), Color::White);
        assert_eq!(pos.game_ply(), 0);
        assert_eq!(pos.rule50_count(), 0);
        assert_eq!(pos.piece_count(), 32);
        assert!(!pos.in_check());
        assert_eq!(pos.fen(), START_FEN);
    }

    #[test]
    fn test_fen_round_trip() {
        let pos = ChessPosition::from_fen(START_FEN).unwrap();
        assert_eq!(pos.fen(), START_FEN);

        let kiwipete = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let pos = ChessPosition::from_fen(kiwipete).unwrap();
        assert_eq!(pos.fen(), kiwipete);
        assert_eq!(ChessPosition::from_fen(&pos.fen()).unwrap().key(), pos.key());

        let mut pos = ChessPosition::startpos();
        pos.push_uci("e2e4").unwrap();
        let reparsed = ChessPosition::from_fen(&pos.fen()).unwrap();
        assert_eq!(reparsed.key(), pos.key());
        assert_eq!(reparsed.side_to_move(), Color::Black);
    }

    #[test]
    fn test_invalid_fen_is_rejected() {
        let err = ChessPosition::from_fen("not a fen").err().unwrap();
        assert!(matches!(err, EngineError::InvalidFen { .. }));
    }

    #[test]
    fn test_do_undo_restores_state() {
        let mut pos = ChessPosition::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        let before = snapshot(&pos);
        for mv in pos.legal_moves() {
            assert!(pos.do_move(mv), "{mv}");
            assert_ne!(pos.key(), before.0);
            pos.undo_move(mv);
            assert_eq!(snapshot(&pos), before, "{mv}");
        }
    }

    #[test]
    fn test_move_conversion_kinds() {
        let pos = ChessPosition::from_fen("r3k2r/8/8/3pP3/8/8/8/R3K2R w KQkq d6 0 1").unwrap();
        let moves = pos.legal_moves();
        let by_uci = |s: &str| moves.iter().copied().find(|m| m.to_uci() == s).unwrap();

        assert_eq!(by_uci("e1g1").kind(), MoveKind::Castle(CastleSide::King));
        assert_eq!(by_uci("e1c1").kind(), MoveKind::Castle(CastleSide::Queen));
        let ep = by_uci("e5d6");
        assert_eq!(ep.kind(), MoveKind::EnPassant);
        assert!(ep.is_capture());

        let black = ChessPosition::from_fen("4k3/p7/8/8/8/8/1p6/R3K3 b - - 0 1").unwrap();
        let moves = black.legal_moves();
        let push = moves.iter().find(|m| m.to_uci() == "a7a5").unwrap();
        assert_eq!(push.kind(), MoveKind::DoublePush);
        let promo = moves.iter().find(|m| m.to_uci() == "b2a1q").unwrap();
        assert!(promo.is_capture() && promo.is_promotion());
    }

    #[test]
    fn test_decode_move_round_trip() {
        let pos = ChessPosition::startpos();
        for mv in pos.legal_moves() {
            assert_eq!(pos.decode_move(mv.to_u16()), mv);
        }
        assert_eq!(pos.decode_move(0), Move::NONE);
        // e2e5 は指せない
        let bogus = Square::from_file_rank(4, 1).raw() as u16 | ((Square::from_file_rank(4, 4).raw() as u16) << 6);
        assert_eq!(pos.decode_move(bogus), Move::NONE);
    }

    #[test]
    fn test_generate_partitions_moves() {
        let pos = ChessPosition::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        let mut all = MoveList::new();
        let mut captures = MoveList::new();
        let mut quiets = MoveList::new();
        pos.generate(GenType::All, &mut all);
        pos.generate(GenType::Captures, &mut captures);
        pos.generate(GenType::Quiets, &mut quiets);
        assert_eq!(all.len(), 48);
        assert_eq!(captures.len() + quiets.len(), all.len());
        assert!(captures.iter().all(|m| m.is_tactical()));
    }

    #[test]
    fn test_null_move() {
        let mut pos = ChessPosition::startpos();
        let key = pos.key();
        assert!(pos.do_null_move());
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_ne!(pos.key(), key);
        pos.undo_null_move();
        assert_eq!(pos.key(), key);

        let mut checked = ChessPosition::from_fen("4k3/8/8/8/8/8/8/R3K2r w - - 0 1").unwrap();
        assert!(checked.in_check());
        assert!(!checked.do_null_move());
    }

    #[test]
    fn test_threefold_repetition() {
        let mut pos = ChessPosition::startpos();
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            pos.push_uci(uci).unwrap();
        }
        // 2回目の出現: ルート以前なので千日手ではない
        assert!(!pos.is_repetition(0));
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            pos.push_uci(uci).unwrap();
        }
        // 3回目
        assert!(pos.is_repetition(0));
    }

    #[test]
    fn test_twofold_inside_search_tree() {
        let mut pos = ChessPosition::startpos();
        let moves: Vec<Move> = ["g1f3", "g8f6", "f3g1", "f6g8"]
            .iter()
            .map(|uci| {
                let mv = pos.legal_moves().into_iter().find(|m| m.to_uci() == *uci).unwrap();
                assert!(pos.do_move(mv));
                mv
            })
            .collect();
        // 探索木の中（ply 5 から見て 4 手前）での2回目の出現
        assert!(pos.is_repetition(5));
        // ルートそのものとの一致は2回目では引き分けにしない
        assert!(!pos.is_repetition(4));
        for mv in moves.into_iter().rev() {
            pos.undo_move(mv);
        }
        assert_eq!(pos.key(), ChessPosition::startpos().key());
    }

    #[test]
    fn test_illegal_push_is_rejected() {
        let mut pos = ChessPosition::startpos();
        assert!(matches!(pos.push_uci("e2e5"), Err(EngineError::IllegalMove(_))));
        assert!(pos.push_uci("e2e4").is_ok());
        assert_eq!(pos.game_ply(), 1);
        assert_eq!(pos.stack_depth(), 0);
    }

    #[test]
    fn test_promotion_candidate() {
        let pos = ChessPosition::from_fen("4k3/1P6/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(pos.has_promotion_candidate());
        let pos = ChessPosition::from_fen("4k3/8/1P6/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(!pos.has_promotion_candidate());
    }

    #[test]
    fn test_probe_tablebase_defaults_to_none() {
        let pos = ChessPosition::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        assert_eq!(pos.probe_tablebase(), None);
    }
}
