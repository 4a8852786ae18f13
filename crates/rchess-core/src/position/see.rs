//! 静的交換評価（SEE）
//!
//! 移動先のマスで取り合いを続けたときの駒得が閾値以上かを判定する。
//! 最も安い駒から取り返し、スライダーの背後の駒（x-ray）も考慮する。

use shakmaty::{Bitboard, Board, Color, Role, Square};

use crate::eval::{piece_type_of, see_value};
use crate::types::{Move, MoveKind};

#[inline]
fn value_of(role: Role) -> i32 {
    see_value(piece_type_of(role))
}

const ROLES_BY_VALUE: [Role; 6] = [
    Role::Pawn,
    Role::Knight,
    Role::Bishop,
    Role::Rook,
    Role::Queen,
    Role::King,
];

#[inline]
fn attackers_to(board: &Board, sq: Square, occupied: Bitboard) -> Bitboard {
    (board.attacks_to(sq, Color::White, occupied) | board.attacks_to(sq, Color::Black, occupied))
        & occupied
}

/// SEE値が `threshold` 以上か
///
/// キャスリング・アンパッサン・成りは 0 として扱う。
pub(super) fn see_ge(board: &Board, mv: Move, threshold: i32) -> bool {
    if mv.is_promotion() || !matches!(mv.kind(), MoveKind::Normal | MoveKind::DoublePush) {
        return 0 >= threshold;
    }

    let from = to_sq(mv.from().raw());
    let to = to_sq(mv.to().raw());
    let Some(mover) = board.piece_at(from) else {
        return 0 >= threshold;
    };

    let mut swap = board.role_at(to).map_or(0, value_of) - threshold;
    if swap < 0 {
        return false;
    }

    swap = value_of(mover.role) - swap;
    if swap <= 0 {
        return true;
    }

    let mut occupied = board.occupied();
    occupied.discard(from);
    occupied.discard(to);

    let mut stm = mover.color;
    let mut attackers = attackers_to(board, to, occupied);
    let mut res = true;

    loop {
        stm = !stm;
        attackers &= occupied;

        let stm_attackers = attackers & board.by_color(stm);
        if stm_attackers.is_empty() {
            break;
        }

        res = !res;

        let Some(role) = ROLES_BY_VALUE
            .into_iter()
            .find(|&role| (stm_attackers & board.by_role(role)).any())
        else {
            break;
        };

        if role == Role::King {
            // 相手にまだ取り返す駒があればキングでは取れない
            return if (attackers & board.by_color(!stm)).any() { !res } else { res };
        }

        swap = value_of(role) - swap;
        if swap < res as i32 {
            break;
        }

        if let Some(sq) = (stm_attackers & board.by_role(role)).first() {
            occupied.discard(sq);
        }
        // 取り除いた駒の背後にいるスライダーを加える
        attackers = attackers_to(board, to, occupied);
    }

    res
}

#[inline]
fn to_sq(raw: u8) -> Square {
    Square::new(u32::from(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{ChessPosition, SearchPosition};

    fn find(pos: &ChessPosition, uci: &str) -> Move {
        pos.legal_moves().into_iter().find(|m| m.to_uci() == uci).unwrap()
    }

    #[test]
    fn test_see_free_capture() {
        let pos = ChessPosition::from_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let mv = find(&pos, "e4d5");
        assert!(pos.see_ge(mv, 0));
        assert!(pos.see_ge(mv, 100));
        assert!(!pos.see_ge(mv, 101));
    }

    #[test]
    fn test_see_defended_pawn_with_queen() {
        // d5 はポーンで守られている
        let pos = ChessPosition::from_fen("4k3/8/4p3/3p4/8/8/3Q4/4K3 w - - 0 1").unwrap();
        let mv = find(&pos, "d2d5");
        assert!(!pos.see_ge(mv, 0));
        assert!(pos.see_ge(mv, 100 - 900));
    }

    #[test]
    fn test_see_xray_recapture() {
        // ルークの二重取り: Rxd5 pxd5(なし) / 後ろのルークが支える
        let pos = ChessPosition::from_fen("3rk3/8/8/3p4/8/8/3R4/3RK3 w - - 0 1").unwrap();
        let mv = find(&pos, "d2d5");
        // RxP, RxR, RxR で白は P + R - R = +100
        assert!(pos.see_ge(mv, 0));
        assert!(pos.see_ge(mv, 100));
        assert!(!pos.see_ge(mv, 101));
    }

    #[test]
    fn test_see_quiet_move_to_attacked_square() {
        // d4 のポーンが c3 と e3 に利いている
        let pos = ChessPosition::from_fen("4k3/8/8/8/3p4/8/8/3NK3 w - - 0 1").unwrap();
        assert!(!pos.see_ge(find(&pos, "d1c3"), 0));
        assert!(!pos.see_ge(find(&pos, "d1e3"), 0));
        assert!(pos.see_ge(find(&pos, "d1b2"), 0));
    }
}
