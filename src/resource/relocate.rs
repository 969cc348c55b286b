use serde::Serialize;
use std::collections::HashMap;

use crate::hex::HexPos;

/// 迁城搜索参数
#[derive(Debug, Clone, Copy)]
pub struct RelocationParams {
    /// 近距离计分半径
    pub near_radius: u64,
    /// 远距离计分半径
    pub far_radius: u64,
    /// 候选点离起点的最大距离
    pub search_radius: u64,
    /// 超出该距离的资源点不可能影响任何候选点
    pub prune_radius: u64,
    pub map_min: i32,
    pub map_max: i32,
    pub limit: usize,
}

impl Default for RelocationParams {
    fn default() -> Self {
        Self {
            near_radius: 5,
            far_radius: 20,
            search_radius: 20,
            prune_radius: 40,
            map_min: 0,
            map_max: 1500,
            limit: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelocationCandidate {
    pub x: i32,
    pub y: i32,
    pub score_near: u32,
    pub score_far: u32,
    pub distance: u64,
}

impl RelocationCandidate {
    pub fn pos(&self) -> HexPos {
        HexPos::new(self.x, self.y)
    }
}

/// 对一批候选点计分：返回 (近距离资源数, 远距离资源数)，与 candidates 一一对应
pub trait Scorer: Send + Sync {
    fn score(&self, candidates: &[HexPos], nodes: &[HexPos], near: u64, far: u64)
    -> Vec<(u32, u32)>;
}

/// 逐个候选点遍历全部资源点
pub struct BruteForce;

impl Scorer for BruteForce {
    fn score(
        &self,
        candidates: &[HexPos],
        nodes: &[HexPos],
        near: u64,
        far: u64,
    ) -> Vec<(u32, u32)> {
        candidates
            .iter()
            .map(|&c| count_within(c, nodes.iter().copied(), near, far))
            .collect()
    }
}

/// 按坐标分桶，只检查候选点附近桶内的资源点
///
/// 每走一格 x、y 最多变化 1，所以距离 ≤ R 的点一定落在 ±R 的方框里，
/// 结果与 BruteForce 完全一致。
pub struct GridBuckets;

impl Scorer for GridBuckets {
    fn score(
        &self,
        candidates: &[HexPos],
        nodes: &[HexPos],
        near: u64,
        far: u64,
    ) -> Vec<(u32, u32)> {
        // 桶边长不小于半径，每个候选点最多检查 3x3 个桶；坐标在 i64 中计算
        let reach = i64::try_from(near.max(far).max(1)).unwrap_or(i64::MAX / 4);
        let cell = reach;
        let bucket = |v: i32| i64::from(v).div_euclid(cell);

        let mut buckets: HashMap<(i64, i64), Vec<HexPos>> = HashMap::new();
        for &n in nodes {
            buckets.entry((bucket(n.x), bucket(n.y))).or_default().push(n);
        }

        candidates
            .iter()
            .map(|&c| {
                let (x, y) = (i64::from(c.x), i64::from(c.y));
                let (cx0, cx1) = ((x - reach).div_euclid(cell), (x + reach).div_euclid(cell));
                let (cy0, cy1) = ((y - reach).div_euclid(cell), (y + reach).div_euclid(cell));

                let nearby = (cy0..=cy1)
                    .flat_map(|by| (cx0..=cx1).map(move |bx| (bx, by)))
                    .filter_map(|key| buckets.get(&key))
                    .flat_map(|b| b.iter().copied());

                count_within(c, nearby, near, far)
            })
            .collect()
    }
}

fn count_within(c: HexPos, nodes: impl Iterator<Item = HexPos>, near: u64, far: u64) -> (u32, u32) {
    let mut score_near = 0;
    let mut score_far = 0;
    for n in nodes {
        let d = c.distance(n);
        if d <= near {
            score_near += 1;
        }
        if d <= far {
            score_far += 1;
        }
    }
    (score_near, score_far)
}

/// 配置中的策略名转为计分器，未知名称使用 BruteForce
pub fn scorer_by_name(name: &str) -> Box<dyn Scorer> {
    match name.trim() {
        "grid" | "grid_buckets" => Box::new(GridBuckets),
        _ => Box::new(BruteForce),
    }
}

/// 起点附近、地图范围内的所有候选点，按行扫描顺序
pub fn candidate_cells(start: HexPos, params: &RelocationParams) -> Vec<HexPos> {
    let r = i32::try_from(params.search_radius).unwrap_or(i32::MAX);
    // 先裁剪到地图范围，起点远在地图外时区间为空
    let (y0, y1) = clamp_span(start.y, r, params);
    let (x0, x1) = clamp_span(start.x, r, params);

    let mut cells = Vec::new();
    for y in y0..=y1 {
        for x in x0..=x1 {
            let cell = HexPos::new(x, y);
            if start.distance(cell) <= params.search_radius {
                cells.push(cell);
            }
        }
    }
    cells
}

/// `[center - r, center + r]` 与地图范围的交集，无交集时返回空区间
fn clamp_span(center: i32, r: i32, params: &RelocationParams) -> (i32, i32) {
    let lo = center.saturating_sub(r).max(params.map_min);
    let hi = center.saturating_add(r).min(params.map_max);
    if lo > hi { (1, 0) } else { (lo, hi) }
}

/// 在起点附近寻找资源最密集的迁城点
///
/// `nodes` 应已按郡和等级过滤。排序键为 (score_near 降序, score_far 降序)，
/// 其余保持扫描顺序。
pub fn recommend(
    start: HexPos,
    nodes: &[HexPos],
    params: &RelocationParams,
    scorer: &dyn Scorer,
) -> Vec<RelocationCandidate> {
    let relevant: Vec<HexPos> = nodes
        .iter()
        .copied()
        .filter(|n| start.distance(*n) <= params.prune_radius)
        .collect();
    if relevant.is_empty() {
        return Vec::new();
    }

    let cells = candidate_cells(start, params);
    let scores = scorer.score(&cells, &relevant, params.near_radius, params.far_radius);

    let mut results: Vec<RelocationCandidate> = cells
        .iter()
        .zip(scores)
        .filter(|(_, (_, far))| *far > 0)
        .map(|(c, (near, far))| RelocationCandidate {
            x: c.x,
            y: c.y,
            score_near: near,
            score_far: far,
            distance: start.distance(*c),
        })
        .collect();

    results.sort_by(|a, b| {
        b.score_near
            .cmp(&a.score_near)
            .then(b.score_far.cmp(&a.score_far))
    });
    results.truncate(params.limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<HexPos> {
        vec![
            HexPos::new(100, 100),
            HexPos::new(102, 100),
            HexPos::new(100, 150),
        ]
    }

    #[test]
    fn dense_cluster_ranks_first() {
        let params = RelocationParams::default();
        let result = recommend(HexPos::new(100, 100), &nodes(), &params, &BruteForce);

        let top = result.first().unwrap();
        assert_eq!(top.score_near, 2);
        // (101,100) 同时在两个 8铜 的 5 格内
        let c = result.iter().find(|c| c.x == 101 && c.y == 100).unwrap();
        assert_eq!(c.score_near, 2);
        assert_eq!(c.score_far, 2);
    }

    #[test]
    fn results_respect_radius_bounds_and_order() {
        let params = RelocationParams::default();
        let start = HexPos::new(10, 5);
        let nodes = vec![HexPos::new(0, 0), HexPos::new(12, 8), HexPos::new(30, 20)];
        let result = recommend(start, &nodes, &params, &BruteForce);

        assert!(!result.is_empty());
        assert!(result.len() <= params.limit);
        for c in &result {
            assert!(c.score_far >= 1);
            assert!(c.distance <= params.search_radius);
            assert!((0..=1500).contains(&c.x) && (0..=1500).contains(&c.y));
        }
        for w in result.windows(2) {
            assert!((w[0].score_near, w[0].score_far) >= (w[1].score_near, w[1].score_far));
        }
    }

    #[test]
    fn far_nodes_are_pruned() {
        let params = RelocationParams::default();
        let result = recommend(
            HexPos::new(100, 100),
            &[HexPos::new(100, 150)],
            &params,
            &BruteForce,
        );
        assert!(result.is_empty());
    }

    #[test]
    fn candidate_count_for_full_radius() {
        let params = RelocationParams::default();
        // 半径 20 的六边形共有 3*20*21 + 1 个格子
        assert_eq!(candidate_cells(HexPos::new(500, 500), &params).len(), 1261);
        // 贴近地图角落时被裁剪
        assert!(candidate_cells(HexPos::new(0, 0), &params).len() < 1261);
    }

    #[test]
    fn start_far_outside_map_has_no_candidates() {
        let params = RelocationParams::default();
        for start in [
            HexPos::new(i32::MAX, i32::MAX),
            HexPos::new(i32::MIN, i32::MIN),
            HexPos::new(i32::MAX, 100),
        ] {
            assert!(candidate_cells(start, &params).is_empty(), "{:?}", start);
            let nodes = [start, HexPos::new(100, 100)];
            assert!(recommend(start, &nodes, &params, &BruteForce).is_empty());
            assert!(recommend(start, &nodes, &params, &GridBuckets).is_empty());
        }
    }

    #[test]
    fn start_just_outside_map_keeps_in_range_cells() {
        let params = RelocationParams::default();
        let cells = candidate_cells(HexPos::new(1510, 700), &params);
        assert!(!cells.is_empty());
        assert!(cells.iter().all(|c| c.x <= params.map_max));
    }

    #[test]
    fn grid_scorer_handles_extreme_coordinates() {
        let cells = [HexPos::new(i32::MAX, i32::MAX), HexPos::new(i32::MIN, 0)];
        let nodes = [
            HexPos::new(i32::MAX, i32::MAX),
            HexPos::new(i32::MAX - 3, i32::MAX),
            HexPos::new(i32::MIN + 1, 0),
        ];
        let grid = GridBuckets.score(&cells, &nodes, 5, 20);
        assert_eq!(grid, BruteForce.score(&cells, &nodes, 5, 20));
        assert_eq!(grid, vec![(2, 2), (1, 1)]);
    }

    #[test]
    fn grid_scorer_matches_brute_force() {
        let params = RelocationParams::default();
        let start = HexPos::new(57, 33);
        let nodes: Vec<HexPos> = (0..60)
            .map(|i| HexPos::new(20 + (i * 37) % 80, 5 + (i * 53) % 60))
            .collect();

        let a = recommend(start, &nodes, &params, &BruteForce);
        let b = recommend(start, &nodes, &params, &GridBuckets);
        assert_eq!(a, b);
    }

    #[test]
    fn ties_keep_scan_order() {
        let params = RelocationParams {
            limit: 10_000,
            ..Default::default()
        };
        let result = recommend(HexPos::new(50, 50), &[HexPos::new(50, 50)], &params, &BruteForce);
        // 同分的候选点按 (y, x) 扫描顺序排列
        for w in result.windows(2) {
            if (w[0].score_near, w[0].score_far) == (w[1].score_near, w[1].score_far) {
                assert!((w[0].y, w[0].x) < (w[1].y, w[1].x));
            }
        }
    }
}
