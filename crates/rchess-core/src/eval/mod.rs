//! 静的評価
//!
//! 駒得 + 駒位置テーブル（序盤/終盤をフェーズで補間）。
//! テーブルは白から見た配置で、`[rank 8 .. rank 1][file a .. h]` の順に並べる。

#![allow(clippy::unusual_byte_groupings)]

use shakmaty::{Board, Color, Role};

use crate::types::PieceType;

type Pst = [[i32; 8]; 8];

/// 駒の価値（序盤）
pub const fn piece_value_mg(pt: PieceType) -> i32 {
    match pt {
        PieceType::Pawn => 82,
        PieceType::Knight => 337,
        PieceType::Bishop => 365,
        PieceType::Rook => 477,
        PieceType::Queen => 1025,
        PieceType::King => 0,
    }
}

/// 駒の価値（終盤）
pub const fn piece_value_eg(pt: PieceType) -> i32 {
    match pt {
        PieceType::Pawn => 94,
        PieceType::Knight => 281,
        PieceType::Bishop => 297,
        PieceType::Rook => 512,
        PieceType::Queen => 936,
        PieceType::King => 0,
    }
}

/// SEE と手順付けで使う駒の価値
pub const fn see_value(pt: PieceType) -> i32 {
    match pt {
        PieceType::Pawn => 100,
        PieceType::Knight => 320,
        PieceType::Bishop => 330,
        PieceType::Rook => 500,
        PieceType::Queen => 900,
        PieceType::King => 20000,
    }
}

/// shakmaty の駒種から変換
pub const fn piece_type_of(role: Role) -> PieceType {
    match role {
        Role::Pawn => PieceType::Pawn,
        Role::Knight => PieceType::Knight,
        Role::Bishop => PieceType::Bishop,
        Role::Rook => PieceType::Rook,
        Role::Queen => PieceType::Queen,
        Role::King => PieceType::King,
    }
}

const PHASE_WEIGHT: [i32; 7] = [0, 0, 1, 1, 2, 4, 0];
const TOTAL_PHASE: i32 = 24;

/// 手番側に与えるボーナス
const TEMPO: i32 = 12;

#[rustfmt::skip]
const PAWN_MG: Pst = [
    [  0,   0,   0,   0,   0,   0,   0,   0],
    [ 98, 134,  61,  95,  68, 126,  34, -11],
    [ -6,   7,  26,  31,  65,  56,  25, -20],
    [-14,  13,   6,  21,  23,  12,  17, -23],
    [-27,  -2,  -5,  12,  17,   6,  10, -25],
    [-26,  -4,  -4, -10,   3,   3,  33, -12],
    [-35,  -1, -20, -23, -15,  24,  38, -22],
    [  0,   0,   0,   0,   0,   0,   0,   0],
];

#[rustfmt::skip]
const PAWN_EG: Pst = [
    [  0,   0,   0,   0,   0,   0,   0,   0],
    [178, 173, 158, 134, 147, 132, 165, 187],
    [ 94, 100,  85,  67,  56,  53,  82,  84],
    [ 32,  24,  13,   5,  -2,   4,  17,  17],
    [ 13,   9,  -3,  -7,  -7,  -8,   3,  -1],
    [  4,   7,  -6,   1,   0,  -5,  -1,  -8],
    [ 13,   8,   8,  10,  13,   0,   2,  -7],
    [  0,   0,   0,   0,   0,   0,   0,   0],
];

#[rustfmt::skip]
const KNIGHT: Pst = [
    [-50, -40, -30, -30, -30, -30, -40, -50],
    [-40, -20,   0,   0,   0,   0, -20, -40],
    [-30,   0,  10,  15,  15,  10,   0, -30],
    [-30,   5,  15,  20,  20,  15,   5, -30],
    [-30,   0,  15,  20,  20,  15,   0, -30],
    [-30,   5,  10,  15,  15,  10,   5, -30],
    [-40, -20,   0,   5,   5,   0, -20, -40],
    [-50, -40, -30, -30, -30, -30, -40, -50],
];

#[rustfmt::skip]
const BISHOP: Pst = [
    [-20, -10, -10, -10, -10, -10, -10, -20],
    [-10,   0,   0,   0,   0,   0,   0, -10],
    [-10,   0,   5,  10,  10,   5,   0, -10],
    [-10,   5,   5,  10,  10,   5,   5, -10],
    [-10,   0,  10,  10,  10,  10,   0, -10],
    [-10,  10,  10,  10,  10,  10,  10, -10],
    [-10,   5,   0,   0,   0,   0,   5, -10],
    [-20, -10, -10, -10, -10, -10, -10, -20],
];

#[rustfmt::skip]
const ROOK: Pst = [
    [  0,   0,   0,   0,   0,   0,   0,   0],
    [  5,  10,  10,  10,  10,  10,  10,   5],
    [ -5,   0,   0,   0,   0,   0,   0,  -5],
    [ -5,   0,   0,   0,   0,   0,   0,  -5],
    [ -5,   0,   0,   0,   0,   0,   0,  -5],
    [ -5,   0,   0,   0,   0,   0,   0,  -5],
    [ -5,   0,   0,   0,   0,   0,   0,  -5],
    [  0,   0,   0,   5,   5,   0,   0,   0],
];

#[rustfmt::skip]
const QUEEN: Pst = [
    [-20, -10, -10,  -5,  -5, -10, -10, -20],
    [-10,   0,   0,   0,   0,   0,   0, -10],
    [-10,   0,   5,   5,   5,   5,   0, -10],
    [ -5,   0,   5,   5,   5,   5,   0,  -5],
    [  0,   0,   5,   5,   5,   5,   0,  -5],
    [-10,   5,   5,   5,   5,   5,   0, -10],
    [-10,   0,   5,   0,   0,   0,   0, -10],
    [-20, -10, -10,  -5,  -5, -10, -10, -20],
];

#[rustfmt::skip]
const KING_MG: Pst = [
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-30, -40, -40, -50, -50, -40, -40, -30],
    [-20, -30, -30, -40, -40, -30, -30, -20],
    [-10, -20, -20, -20, -20, -20, -20, -10],
    [ 20,  20,   0,   0,   0,   0,  20,  20],
    [ 20,  30,  10,   0,   0,  10,  30,  20],
];

#[rustfmt::skip]
const KING_EG: Pst = [
    [-50, -40, -30, -20, -20, -30, -40, -50],
    [-30, -20, -10,   0,   0, -10, -20, -30],
    [-30, -10,  20,  30,  30,  20, -10, -30],
    [-30, -10,  30,  40,  40,  30, -10, -30],
    [-30, -10,  30,  40,  40,  30, -10, -30],
    [-30, -10,  20,  30,  30,  20, -10, -30],
    [-30, -30,   0,   0,   0,   0, -30, -30],
    [-50, -30, -30, -30, -30, -30, -30, -50],
];

const fn pst_pair(pt: PieceType) -> (&'static Pst, &'static Pst) {
    match pt {
        PieceType::Pawn => (&PAWN_MG, &PAWN_EG),
        PieceType::Knight => (&KNIGHT, &KNIGHT),
        PieceType::Bishop => (&BISHOP, &BISHOP),
        PieceType::Rook => (&ROOK, &ROOK),
        PieceType::Queen => (&QUEEN, &QUEEN),
        PieceType::King => (&KING_MG, &KING_EG),
    }
}

/// 手番側から見た評価値（センチポーン）
pub fn evaluate(board: &Board, turn: Color) -> i32 {
    let mut mg = [0i32; 2];
    let mut eg = [0i32; 2];
    let mut phase = 0;

    for sq in board.occupied() {
        let Some(piece) = board.piece_at(sq) else {
            continue;
        };
        let pt = piece_type_of(piece.role);
        let side = piece.color as usize;
        let file = sq.file() as usize;
        let rank = sq.rank() as usize;
        // テーブルは rank 8 が先頭。白はそのまま裏返し、黒は鏡映。
        let row = if piece.color == Color::White { 7 - rank } else { rank };
        let (mg_table, eg_table) = pst_pair(pt);

        mg[side] += piece_value_mg(pt) + mg_table[row][file];
        eg[side] += piece_value_eg(pt) + eg_table[row][file];
        phase += PHASE_WEIGHT[pt as usize];
    }

    let phase = phase.min(TOTAL_PHASE);
    let us = turn as usize;
    let them = 1 - us;
    let mg_score = mg[us] - mg[them];
    let eg_score = eg[us] - eg[them];

    (mg_score * phase + eg_score * (TOTAL_PHASE - phase)) / TOTAL_PHASE + TEMPO
}

/// ポーンとキング以外の駒の価値合計
pub fn non_pawn_material(board: &Board, color: Color) -> i32 {
    [Role::Knight, Role::Bishop, Role::Rook, Role::Queen]
        .into_iter()
        .map(|role| {
            (board.by_role(role) & board.by_color(color)).count() as i32
                * piece_value_mg(piece_type_of(role))
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::fen::Fen;
    use shakmaty::{CastlingMode, Chess, Position};

    fn board(fen: &str) -> Chess {
        let fen: Fen = fen.parse().unwrap();
        fen.into_position(CastlingMode::Standard).unwrap()
    }

    #[test]
    fn test_startpos_is_balanced() {
        let pos = Chess::default();
        assert_eq!(evaluate(pos.board(), Color::White), TEMPO);
        assert_eq!(evaluate(pos.board(), Color::Black), TEMPO);
    }

    #[test]
    fn test_extra_queen_is_winning() {
        let pos = board("4k3/8/8/8/8/8/8/3QK3 w - - 0 1");
        assert!(evaluate(pos.board(), Color::White) > 800);
        assert!(evaluate(pos.board(), Color::Black) < -800);
    }

    #[test]
    fn test_evaluation_is_color_symmetric() {
        let white = board("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3");
        let black = board("rnbqkb1r/pppp1ppp/5n2/4p3/4P3/2N5/PPPP1PPP/R1BQKBNR b KQkq - 2 3");
        assert_eq!(
            evaluate(white.board(), Color::White),
            evaluate(black.board(), Color::Black)
        );
    }

    #[test]
    fn test_non_pawn_material() {
        let pos = Chess::default();
        let expected = 2 * 337 + 2 * 365 + 2 * 477 + 1025;
        assert_eq!(non_pawn_material(pos.board(), Color::White), expected);
        let kp = board("4k3/4p3/8/8/8/8/4P3/4K3 w - - 0 1");
        assert_eq!(non_pawn_material(kp.board(), Color::Black), 0);
    }
}
