use proptest::prelude::*;

use sanzhan::hex::{self, HexPos};
use sanzhan::resource::relocate::{
    BruteForce, GridBuckets, RelocationParams, Scorer, candidate_cells, recommend,
};

fn coord() -> impl Strategy<Value = i32> {
    prop_oneof![
        -2000i32..2000,
        any::<i32>(),
        Just(i32::MIN),
        Just(i32::MAX),
    ]
}

fn pos() -> impl Strategy<Value = HexPos> {
    (coord(), coord()).prop_map(|(x, y)| HexPos::new(x, y))
}

fn map_pos() -> impl Strategy<Value = HexPos> {
    (0i32..=1500, 0i32..=1500).prop_map(|(x, y)| HexPos::new(x, y))
}

proptest! {
    #[test]
    fn distance_is_symmetric(a in pos(), b in pos()) {
        prop_assert_eq!(a.distance(b), b.distance(a));
        prop_assert_eq!(hex::distance(a.x, a.y, b.x, b.y), a.distance(b));
    }

    #[test]
    fn distance_is_zero_only_for_same_cell(a in pos(), b in pos()) {
        prop_assert_eq!(a.distance(a), 0);
        prop_assert_eq!(a.distance(b) == 0, a == b);
    }

    #[test]
    fn triangle_inequality(a in pos(), b in pos(), c in pos()) {
        prop_assert!(a.distance(c) <= a.distance(b) + b.distance(c));
    }

    #[test]
    fn nearest_is_bounded_and_sorted(
        target in pos(),
        points in prop::collection::vec(pos(), 0..60),
        limit in 0usize..50,
    ) {
        let result = hex::nearest(target, &points, limit);
        prop_assert!(result.len() <= limit);
        prop_assert_eq!(result.len(), limit.min(points.len()));
        for pair in result.windows(2) {
            prop_assert!(pair[0].0 <= pair[1].0);
        }
        for (d, p) in &result {
            prop_assert_eq!(*d, target.distance(**p));
        }
    }
}

proptest! {
    #[test]
    fn candidate_cells_stay_on_map_from_any_start(start in pos()) {
        let params = RelocationParams::default();
        for c in candidate_cells(start, &params) {
            prop_assert!((params.map_min..=params.map_max).contains(&c.x));
            prop_assert!((params.map_min..=params.map_max).contains(&c.y));
            prop_assert!(start.distance(c) <= params.search_radius);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn relocation_candidates_respect_bounds(
        start in map_pos(),
        offsets in prop::collection::vec((-30i32..=30, -30i32..=30), 1..12),
    ) {
        let params = RelocationParams::default();
        let nodes: Vec<HexPos> = offsets
            .iter()
            .map(|(dx, dy)| HexPos::new(start.x + dx, start.y + dy))
            .collect();

        let result = recommend(start, &nodes, &params, &BruteForce);
        prop_assert!(result.len() <= params.limit);
        for c in &result {
            prop_assert!(c.score_far >= 1);
            prop_assert!(c.distance <= params.search_radius);
            prop_assert_eq!(c.distance, start.distance(c.pos()));
            prop_assert!((params.map_min..=params.map_max).contains(&c.x));
            prop_assert!((params.map_min..=params.map_max).contains(&c.y));
        }
        for pair in result.windows(2) {
            prop_assert!(
                (pair[0].score_near, pair[0].score_far) >= (pair[1].score_near, pair[1].score_far)
            );
        }
    }

    #[test]
    fn grid_buckets_match_brute_force(
        start in map_pos(),
        offsets in prop::collection::vec((-45i32..=45, -45i32..=45), 0..20),
    ) {
        let params = RelocationParams::default();
        let nodes: Vec<HexPos> = offsets
            .iter()
            .map(|(dx, dy)| HexPos::new(start.x + dx, start.y + dy))
            .collect();
        let cells = candidate_cells(start, &params);

        let brute = BruteForce.score(&cells, &nodes, params.near_radius, params.far_radius);
        let grid = GridBuckets.score(&cells, &nodes, params.near_radius, params.far_radius);
        prop_assert_eq!(brute, grid);
    }
}
