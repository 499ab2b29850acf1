use crate::{FeaturePoint, DESCRIPTOR_SIZE};
use cv_core::FeatureMatch;
use float_ord::FloatOrd;
use log::*;
use wide::f64x4;

/// A best match is kept only if it is closer than this fraction of the
/// second best match.
const RATIO_THRESHOLD: f64 = 0.8;

/// Matched pairs, each labeled `(point from first, point from second)`.
pub type MatchedPoints = Vec<FeatureMatch<FeaturePoint>>;

/// A tentative match between an outer and an inner point.
#[derive(Debug, Clone, Copy)]
struct MatchedPointPairInfo {
    outer: usize,
    inner: usize,
    distance: f64,
}

/// Euclidean distance between the descriptors of two feature points.
pub fn euclidean_distance(first: &FeaturePoint, second: &FeaturePoint) -> f64 {
    let a = first.descriptor();
    let b = second.descriptor();
    (0..DESCRIPTOR_SIZE)
        .step_by(4)
        .map(|i| {
            let d = f64x4::new([a[i], a[i + 1], a[i + 2], a[i + 3]])
                - f64x4::new([b[i], b[i + 1], b[i + 2], b[i + 3]]);
            d * d
        })
        .fold(f64x4::splat(0.0), |acc, sq| acc + sq)
        .reduce_add()
        .sqrt()
}

/// Match the feature points of two collections.
///
/// The smaller collection is scanned in order (the second one if both have the
/// same size). Each scanned point looks for its nearest and second nearest
/// neighbour among the points of the other collection that share its sign and
/// have not been claimed yet. It claims its nearest neighbour only if
/// `best / second_best < 0.8`; a claimed point is never offered again, so an
/// earlier point wins a contested neighbour.
///
/// The distances of the claimed pairs are then divided by the largest of them
/// and pairs with a normalized distance above `threshold` are dropped.
///
/// The pairs come out in scan order and are always labeled
/// `FeatureMatch(point of first, point of second)`.
pub fn match_feature_points(
    first: &[FeaturePoint],
    second: &[FeaturePoint],
    threshold: f64,
) -> MatchedPoints {
    if first.is_empty() || second.is_empty() {
        debug!("Nothing to match: one of the collections is empty.");
        return vec![];
    }

    let swapped = second.len() <= first.len();
    let (outer, inner) = if swapped {
        (second, first)
    } else {
        (first, second)
    };

    let mut pairs = find_tentative_matches(outer, inner);
    debug!(
        "{} tentative matches out of {} points.",
        pairs.len(),
        outer.len()
    );
    normalize_distances(&mut pairs);

    let matches: MatchedPoints = pairs
        .into_iter()
        .filter(|pair| pair.distance <= threshold)
        .map(|pair| {
            let outer_point = outer[pair.outer].clone();
            let inner_point = inner[pair.inner].clone();
            if swapped {
                FeatureMatch(inner_point, outer_point)
            } else {
                FeatureMatch(outer_point, inner_point)
            }
        })
        .collect();
    info!("Matched {} pairs of feature points", matches.len());
    matches
}

/// Greedy nearest neighbour search with ratio pruning, in outer scan order.
fn find_tentative_matches(
    outer: &[FeaturePoint],
    inner: &[FeaturePoint],
) -> Vec<MatchedPointPairInfo> {
    let mut already_matched = vec![false; inner.len()];
    let mut pairs = vec![];
    for (outer_index, point) in outer.iter().enumerate() {
        let mut best: Option<(usize, f64)> = None;
        let mut second_best: Option<f64> = None;
        for (inner_index, candidate) in inner.iter().enumerate() {
            if already_matched[inner_index] || candidate.sign != point.sign {
                continue;
            }
            let distance = euclidean_distance(point, candidate);
            match best {
                Some((_, best_distance)) if distance >= best_distance => {
                    if second_best.map_or(true, |second| distance < second) {
                        second_best = Some(distance);
                    }
                }
                _ => {
                    second_best = best.map(|(_, best_distance)| best_distance);
                    best = Some((inner_index, distance));
                }
            }
        }

        if let (Some((inner_index, distance)), Some(second)) = (best, second_best) {
            if second > 0.0 && distance / second < RATIO_THRESHOLD {
                trace!(
                    "Outer point {} claims inner point {} at distance {}.",
                    outer_index,
                    inner_index,
                    distance
                );
                already_matched[inner_index] = true;
                pairs.push(MatchedPointPairInfo {
                    outer: outer_index,
                    inner: inner_index,
                    distance,
                });
            }
        }
    }
    pairs
}

/// Divide all distances by the largest one, unless it is zero.
fn normalize_distances(pairs: &mut [MatchedPointPairInfo]) {
    let max = pairs
        .iter()
        .map(|pair| FloatOrd(pair.distance))
        .max()
        .map_or(0.0, |max| max.0);
    if max != 0.0 {
        for pair in pairs.iter_mut() {
            pair.distance /= max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    /// A point whose descriptor holds `values` followed by zeros.
    fn point(id: usize, sign: bool, values: &[f64]) -> FeaturePoint {
        let mut descriptor = [0.0; DESCRIPTOR_SIZE];
        descriptor[..values.len()].copy_from_slice(values);
        FeaturePoint::with_descriptor((id, id), 2.0, 13, sign, descriptor)
    }

    fn ids(matches: &MatchedPoints) -> Vec<(usize, usize)> {
        matches.iter().map(|m| (m.0.x(), m.1.x())).collect()
    }

    #[test]
    fn distance_over_all_values() {
        let a = point(0, true, &[3.0]);
        let b = point(1, true, &[0.0, 4.0]);
        assert_eq!(euclidean_distance(&a, &b), 5.0);
        assert_eq!(euclidean_distance(&a, &a), 0.0);

        let mut values = [0.0; DESCRIPTOR_SIZE];
        values[DESCRIPTOR_SIZE - 1] = 2.0;
        let c = point(2, true, &values);
        assert_eq!(euclidean_distance(&point(3, true, &[]), &c), 2.0);
    }

    #[test]
    fn empty_collection_gives_no_pairs() {
        let points = vec![point(0, true, &[1.0])];
        assert!(match_feature_points(&points, &[], 1.0).is_empty());
        assert!(match_feature_points(&[], &points, 1.0).is_empty());
    }

    #[test]
    fn ratio_of_exactly_point_eight_is_rejected() {
        let outer = vec![point(0, true, &[0.0])];
        // Distances 4 and 5.
        let inner = vec![point(10, true, &[4.0]), point(11, true, &[-5.0])];
        assert!(match_feature_points(&outer, &inner, 1.0).is_empty());

        // Distances 3.9 and 5 pass.
        let inner = vec![point(10, true, &[3.9]), point(11, true, &[-5.0])];
        assert_eq!(ids(&match_feature_points(&outer, &inner, 1.0)), vec![(0, 10)]);
    }

    #[test]
    fn single_candidate_is_rejected() {
        let outer = vec![point(0, true, &[0.0])];
        let inner = vec![point(10, true, &[1.0]), point(11, false, &[50.0])];
        assert!(match_feature_points(&outer, &inner, 1.0).is_empty());
    }

    #[test]
    fn normalization_and_threshold() {
        let first = vec![
            point(0, true, &[0.0, 0.0]),
            point(1, true, &[100.0, 0.0]),
            point(2, true, &[200.0, 0.0]),
        ];
        let second = vec![
            point(10, true, &[0.0, 2.0]),
            point(11, true, &[100.0, 4.0]),
            point(12, true, &[200.0, 8.0]),
            point(13, true, &[1000.0, 0.0]),
        ];
        // Raw distances 2, 4 and 8 normalize to 0.25, 0.5 and 1.0.
        assert_eq!(
            ids(&match_feature_points(&first, &second, 0.5)),
            vec![(0, 10), (1, 11)]
        );
        assert_eq!(
            ids(&match_feature_points(&first, &second, 1.0)),
            vec![(0, 10), (1, 11), (2, 12)]
        );
        assert_eq!(ids(&match_feature_points(&first, &second, 0.2)), vec![]);
    }

    #[test]
    fn zero_distances_are_not_normalized() {
        let first = vec![point(0, true, &[0.0]), point(1, true, &[10.0])];
        let second = vec![
            point(10, true, &[0.0]),
            point(11, true, &[10.0]),
            point(12, true, &[100.0]),
        ];
        assert_eq!(
            ids(&match_feature_points(&first, &second, 0.0)),
            vec![(0, 10), (1, 11)]
        );
    }

    #[test]
    fn earlier_outer_point_wins_a_contested_neighbour() {
        let first = vec![point(0, true, &[0.0]), point(1, true, &[0.2])];
        let second = vec![
            point(10, true, &[0.1]),
            point(11, true, &[10.0]),
            point(12, true, &[20.0]),
        ];
        // Both outer points are nearest to 10. The second one falls back to 11.
        assert_eq!(
            ids(&match_feature_points(&first, &second, 1.0)),
            vec![(0, 10), (1, 11)]
        );
    }

    #[test]
    fn signs_must_agree() {
        let first = vec![point(0, true, &[0.0])];
        let second = vec![
            point(10, false, &[0.0]),
            point(11, true, &[1.0]),
            point(12, true, &[9.0]),
        ];
        assert_eq!(ids(&match_feature_points(&first, &second, 1.0)), vec![(0, 11)]);
    }

    #[test]
    fn pairs_keep_caller_roles_when_swapped() {
        let small = vec![point(0, true, &[0.0]), point(1, true, &[50.0])];
        let large = vec![
            point(10, true, &[1.0]),
            point(11, true, &[49.0]),
            point(12, true, &[200.0]),
        ];
        let forward = match_feature_points(&small, &large, 1.0);
        let backward = match_feature_points(&large, &small, 1.0);
        assert_eq!(ids(&forward), vec![(0, 10), (1, 11)]);
        assert_eq!(ids(&backward), vec![(10, 0), (11, 1)]);
        // Pairs are deep copies of the input points.
        assert_eq!(forward[0].0, small[0]);
        assert_eq!(backward[0].0, large[0]);
    }

    #[test]
    fn no_point_is_used_twice() {
        let mut rng = Pcg64::from_seed([7; 32]);
        let mut random_points = |offset: usize, count: usize| -> Vec<FeaturePoint> {
            (0..count)
                .map(|i| {
                    let values: Vec<f64> = (0..DESCRIPTOR_SIZE).map(|_| rng.gen()).collect();
                    point(offset + i, rng.gen(), &values)
                })
                .collect()
        };
        let first = random_points(0, 40);
        let second = random_points(1000, 60);
        let matches = match_feature_points(&first, &second, 1.0);
        let mut firsts: Vec<usize> = matches.iter().map(|m| m.0.x()).collect();
        let mut seconds: Vec<usize> = matches.iter().map(|m| m.1.x()).collect();
        assert!(firsts.iter().all(|&id| id < 1000));
        assert!(seconds.iter().all(|&id| id >= 1000));
        // Scan order is kept.
        assert!(firsts.windows(2).all(|w| w[0] < w[1]));
        seconds.sort_unstable();
        seconds.dedup();
        firsts.dedup();
        assert_eq!(firsts.len(), matches.len());
        assert_eq!(seconds.len(), matches.len());
        assert!(matches.iter().all(|m| m.0.sign == m.1.sign));
    }
}
