//! 評価値（Value）
//!
//! `Value::MATE` 付近を詰みスコア、その直下をテーブルベース勝敗スコアとして予約している。
//! 通常の評価値は [-TB_WIN_IN_MAX_PLY, TB_WIN_IN_MAX_PLY] の範囲で用いる。

use super::MAX_PLY;

/// 評価値（センチポーン、手番側から見た値）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Value(i32);

impl Value {
    /// ゼロ
    pub const ZERO: Value = Value(0);
    /// 引き分け
    pub const DRAW: Value = Value(0);
    /// 詰み（勝ち側の最大スコア）
    pub const MATE: Value = Value(32000);
    /// 無限大
    pub const INFINITE: Value = Value(32001);
    /// 無効値
    pub const NONE: Value = Value(32002);

    /// 最大探索深度内での詰みスコア
    pub const MATE_IN_MAX_PLY: Value = Value(Self::MATE.0 - MAX_PLY);
    /// 最大探索深度内での詰まされスコア
    pub const MATED_IN_MAX_PLY: Value = Value(-Self::MATE_IN_MAX_PLY.0);

    /// テーブルベース勝ち（ルートからの距離を引いて使う）
    pub const TB_WIN: Value = Value(Self::MATE_IN_MAX_PLY.0 - 1);
    /// 最大探索深度内でのテーブルベース勝ち
    pub const TB_WIN_IN_MAX_PLY: Value = Value(Self::TB_WIN.0 - MAX_PLY);
    /// 最大探索深度内でのテーブルベース負け
    pub const TB_LOSS_IN_MAX_PLY: Value = Value(-Self::TB_WIN_IN_MAX_PLY.0);

    /// 値から生成
    #[inline]
    pub const fn new(v: i32) -> Value {
        Value(v)
    }

    /// ply手で詰ますスコア
    #[inline]
    pub const fn mate_in(ply: i32) -> Value {
        Value(Self::MATE.0 - ply)
    }

    /// ply手で詰まされるスコア
    #[inline]
    pub const fn mated_in(ply: i32) -> Value {
        Value(-Self::MATE.0 + ply)
    }

    /// 勝ちスコアかどうか
    #[inline]
    pub const fn is_win(self) -> bool {
        self.0 >= Self::MATE_IN_MAX_PLY.0
    }

    /// 負けスコアかどうか
    #[inline]
    pub const fn is_loss(self) -> bool {
        self.0 <= Self::MATED_IN_MAX_PLY.0
    }

    /// 詰みスコア（勝ちまたは負け）かどうか
    #[inline]
    pub const fn is_mate_score(self) -> bool {
        self.is_win() || self.is_loss()
    }

    /// 詰みまたはテーブルベースで勝敗が確定したスコアか
    #[inline]
    pub const fn is_decisive(self) -> bool {
        self.0 >= Self::TB_WIN_IN_MAX_PLY.0 || self.0 <= Self::TB_LOSS_IN_MAX_PLY.0
    }

    /// 生の値を取得
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// 詰み手数（ply）を取得（詰みスコアの場合のみ有効）
    #[inline]
    pub const fn mate_ply(self) -> i32 {
        if self.is_win() {
            Self::MATE.0 - self.0
        } else if self.is_loss() {
            self.0 + Self::MATE.0
        } else {
            0
        }
    }

    /// UCIの `score mate N` 用の手数（負値は詰まされる側）
    #[inline]
    pub const fn mate_moves(self) -> i32 {
        let ply = self.mate_ply();
        if self.is_win() { (ply + 1) / 2 } else { -(ply / 2) }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::ZERO
    }
}

impl std::ops::Neg for Value {
    type Output = Value;

    #[inline]
    fn neg(self) -> Value {
        Value(-self.0)
    }
}

impl std::ops::Add for Value {
    type Output = Value;

    #[inline]
    fn add(self, rhs: Value) -> Value {
        Value(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Value {
    type Output = Value;

    #[inline]
    fn sub(self, rhs: Value) -> Value {
        Value(self.0 - rhs.0)
    }
}

impl std::ops::Add<i32> for Value {
    type Output = Value;

    #[inline]
    fn add(self, rhs: i32) -> Value {
        Value(self.0 + rhs)
    }
}

impl std::ops::Sub<i32> for Value {
    type Output = Value;

    #[inline]
    fn sub(self, rhs: i32) -> Value {
        Value(self.0 - rhs)
    }
}

impl std::ops::AddAssign for Value {
    #[inline]
    fn add_assign(&mut self, rhs: Value) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Value {
    #[inline]
    fn sub_assign(&mut self, rhs: Value) {
        self.0 -= rhs.0;
    }
}

impl std::ops::Mul<i32> for Value {
    type Output = Value;

    #[inline]
    fn mul(self, rhs: i32) -> Value {
        Value(self.0 * rhs)
    }
}

impl std::ops::Div<i32> for Value {
    type Output = Value;

    #[inline]
    fn div(self, rhs: i32) -> Value {
        Value(self.0 / rhs)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value(v)
    }
}

impl From<Value> for i32 {
    fn from(v: Value) -> i32 {
        v.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_constants() {
        assert_eq!(Value::ZERO.raw(), 0);
        assert_eq!(Value::DRAW.raw(), 0);
        assert_eq!(Value::MATE.raw(), 32000);
        assert_eq!(Value::INFINITE.raw(), 32001);
        assert_eq!(Value::NONE.raw(), 32002);
        assert!(Value::TB_WIN < Value::MATE_IN_MAX_PLY);
        assert!(Value::TB_WIN_IN_MAX_PLY > Value::new(20000));
    }

    #[test]
    fn test_value_mate_in() {
        let v = Value::mate_in(5);
        assert!(v.is_win());
        assert!(!v.is_loss());
        assert!(v.is_mate_score());
        assert!(v.is_decisive());
        assert_eq!(v.mate_ply(), 5);
        assert_eq!(v.mate_moves(), 3);
    }

    #[test]
    fn test_value_mated_in() {
        let v = Value::mated_in(4);
        assert!(v.is_loss());
        assert_eq!(v.mate_ply(), 4);
        assert_eq!(v.mate_moves(), -2);
    }

    #[test]
    fn test_value_tb_scores_are_not_mates() {
        let v = Value::TB_WIN - 3;
        assert!(!v.is_mate_score());
        assert!(v.is_decisive());
        assert!(!Value::new(500).is_decisive());
    }

    #[test]
    fn test_value_ops() {
        let a = Value::new(100);
        let b = Value::new(50);
        assert_eq!(a + b, Value::new(150));
        assert_eq!(a - b, Value::new(50));
        assert_eq!(-a, Value::new(-100));
        assert_eq!(a * 3, Value::new(300));
        assert_eq!(a / 4, Value::new(25));
        assert_eq!(a + 1, Value::new(101));
    }
}
