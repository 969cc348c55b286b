use super::ResourcePoint;
use crate::hex::{HexPos, Positioned};

/// 粗筛的轴对齐范围（±50 格）
pub const COUNTY_BOX: u32 = 50;

/// 判断起点所在的郡
///
/// 先找 ±50 范围内的任意资源点（按存储顺序取第一个），找不到再退回到全局最近点。
/// 退回时用 |dx| + |dy| 近似比较，而不是六边形距离。
/// 赛季没有任何资源点时返回 None。
pub fn resolve_county(points: &[ResourcePoint], start: HexPos) -> Option<&str> {
    if let Some(p) = points.iter().find(|p| {
        let pos = p.pos();
        pos.x.abs_diff(start.x) <= COUNTY_BOX && pos.y.abs_diff(start.y) <= COUNTY_BOX
    }) {
        return Some(&p.county);
    }

    points
        .iter()
        .min_by_key(|p| p.pos().manhattan(start))
        .map(|p| p.county.as_str())
}
