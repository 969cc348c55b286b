//! 六边形地图坐标
//!
//! 游戏内坐标是 "odd-r" 偏移坐标（奇数行右移半格）。距离计算先换算为轴坐标 (q, r)，
//! 再用标准六边形距离公式。

use serde::{Deserialize, Serialize};

/// 地图上的偏移坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct HexPos {
    pub x: i32,
    pub y: i32,
}

impl HexPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// 转为轴坐标 (q, r)
    pub fn to_axial(self) -> (i64, i64) {
        let x = self.x as i64;
        let y = self.y as i64;
        // y - (y & 1) 恒为偶数，除法是精确的
        let q = x - (y - (y & 1)) / 2;
        (q, y)
    }

    /// 精确的六边形距离，对任意 i32 坐标都不会溢出
    pub fn distance(self, other: HexPos) -> u64 {
        let (q1, r1) = self.to_axial();
        let (q2, r2) = other.to_axial();
        // 轴坐标差不超过 3 * 2^31，i64 足够
        let dq = q1 - q2;
        let dr = r1 - r2;
        // |dq| + |dr| + |dq + dr| 必为偶数
        (dq.unsigned_abs() + dr.unsigned_abs() + (dq + dr).unsigned_abs()) / 2
    }

    /// |dx| + |dy|，只用于粗略比较
    pub fn manhattan(self, other: HexPos) -> u64 {
        u64::from(self.x.abs_diff(other.x)) + u64::from(self.y.abs_diff(other.y))
    }
}

impl From<(i32, i32)> for HexPos {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// 两点之间的六边形距离
pub fn distance(x1: i32, y1: i32, x2: i32, y2: i32) -> u64 {
    HexPos::new(x1, y1).distance(HexPos::new(x2, y2))
}

/// 具有地图坐标的对象
pub trait Positioned {
    fn pos(&self) -> HexPos;
}

impl Positioned for HexPos {
    fn pos(&self) -> HexPos {
        *self
    }
}

impl<T: Positioned + ?Sized> Positioned for &T {
    fn pos(&self) -> HexPos {
        (**self).pos()
    }
}

/// 按距离升序返回最近的 `limit` 个候选，距离相同保持输入顺序
pub fn nearest<'a, T: Positioned>(
    target: HexPos,
    candidates: &'a [T],
    limit: usize,
) -> Vec<(u64, &'a T)> {
    let mut with_dist: Vec<(u64, &T)> = candidates
        .iter()
        .map(|c| (target.distance(c.pos()), c))
        .collect();

    // sort_by_key 是稳定排序
    with_dist.sort_by_key(|(d, _)| *d);
    with_dist.truncate(limit);
    with_dist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_row_distance_is_column_difference() {
        assert_eq!(distance(0, 0, 5, 0), 5);
        assert_eq!(distance(10, 3, 4, 3), 6);
    }

    #[test]
    fn odd_row_neighbours_are_one_step_away() {
        // 奇数行右移：(2,1) 的上下邻居是 (2,0)/(3,0) 与 (2,2)/(3,2)
        let c = HexPos::new(2, 1);
        for n in [(2, 0), (3, 0), (1, 1), (3, 1), (2, 2), (3, 2)] {
            assert_eq!(c.distance(n.into()), 1, "neighbour {:?}", n);
        }
        assert_eq!(c.distance(HexPos::new(1, 0)), 2);
    }

    #[test]
    fn even_row_neighbours_are_one_step_away() {
        let c = HexPos::new(2, 2);
        for n in [(1, 1), (2, 1), (1, 2), (3, 2), (1, 3), (2, 3)] {
            assert_eq!(c.distance(n.into()), 1, "neighbour {:?}", n);
        }
    }

    #[test]
    fn vertical_moves_zigzag() {
        // 纯竖直移动两行，列坐标不变，距离为 2
        assert_eq!(distance(100, 100, 100, 102), 2);
        assert_eq!(distance(100, 100, 100, 150), 50);
    }

    #[test]
    fn negative_rows_use_parity_consistently() {
        assert_eq!(distance(0, -1, 0, 0), 1);
        assert_eq!(distance(0, -3, 0, -3), 0);
        assert_eq!(distance(0, -1, 0, 1), 2);
    }

    #[test]
    fn extreme_coordinates_are_exact() {
        assert_eq!(distance(i32::MIN, i32::MIN, i32::MAX, i32::MAX), 6_442_450_943);
        assert_eq!(distance(i32::MAX, 0, i32::MIN, 0), u64::from(u32::MAX));
        assert_eq!(distance(i32::MIN, i32::MIN, i32::MIN, i32::MIN), 0);

        let a = HexPos::new(i32::MIN, i32::MIN);
        let b = HexPos::new(i32::MAX, i32::MAX);
        assert_eq!(a.manhattan(b), 2 * u64::from(u32::MAX));
        assert_eq!(b.manhattan(a), a.manhattan(b));
    }

    #[test]
    fn nearest_is_sorted_stable_and_truncated() {
        let pts = [
            HexPos::new(10, 0),
            HexPos::new(1, 0),
            HexPos::new(0, 1),
            HexPos::new(3, 0),
        ];
        let got = nearest(HexPos::new(0, 0), &pts, 3);
        let dists: Vec<u64> = got.iter().map(|(d, _)| *d).collect();
        assert_eq!(dists, vec![1, 1, 3]);
        // (1,0) 与 (0,1) 等距，保持输入顺序
        assert_eq!(*got[0].1, HexPos::new(1, 0));
        assert_eq!(*got[1].1, HexPos::new(0, 1));
    }

    #[test]
    fn nearest_with_zero_limit_is_empty() {
        let pts = [HexPos::new(1, 1)];
        assert!(nearest(HexPos::new(0, 0), &pts, 0).is_empty());
    }
}
