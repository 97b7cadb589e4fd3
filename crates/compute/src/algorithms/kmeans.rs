/// Result of a full batch K-means run.
#[derive(Debug, Clone)]
pub struct KmeansResult {
    /// Cluster index of each input point, in input order.
    pub assignments: Vec<usize>,
    /// Final centroid vectors, indexed by cluster id.
    pub centroids: Vec<Vec<f64>>,
    /// Number of clusters.
    pub k: usize,
    /// Number of Lloyd's iterations performed.
    pub iterations: usize,
    /// Sum of squared distances from each point to its assigned centroid.
    pub inertia: f64,
}

/// Run Lloyd's K-means algorithm.
///
/// Uses greedy K-means++ initialization so repeated runs over the same
/// points give the same clusters. Iterates until assignments stabilize or
/// `max_iterations` is reached.
///
/// # Panics
/// Panics if `k` is 0, `points` is empty, or `k > points.len()`.
pub fn kmeans(points: &[Vec<f64>], k: usize, max_iterations: usize) -> KmeansResult {
    assert!(!points.is_empty(), "kmeans: points must not be empty");
    assert!(k >= 1, "kmeans: k must be at least 1");
    assert!(k <= points.len(), "kmeans: k must be <= number of points");

    let n = points.len();
    let dim = points[0].len();

    let mut centroids = kmeanspp_init(points, k);
    let mut assignments = vec![0usize; n];
    let mut iterations = 0;

    for _ in 0..max_iterations {
        iterations += 1;

        // Assignment step.
        let mut changed = false;
        for (i, vec) in points.iter().enumerate() {
            let nearest = nearest_centroid(vec, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        if !changed && iterations > 1 {
            break;
        }

        // Update step: recompute centroids as mean of assigned points.
        let mut new_centroids = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];

        for (vec, &cluster) in points.iter().zip(&assignments) {
            counts[cluster] += 1;
            for (j, &val) in vec.iter().enumerate() {
                new_centroids[cluster][j] += val;
            }
        }

        for (c, centroid) in new_centroids.iter_mut().enumerate() {
            if counts[c] > 0 {
                let count = counts[c] as f64;
                for val in centroid.iter_mut() {
                    *val /= count;
                }
            } else {
                // Empty cluster: keep previous centroid.
                centroid.clone_from(&centroids[c]);
            }
        }

        centroids = new_centroids;
    }

    let inertia = points
        .iter()
        .zip(&assignments)
        .map(|(vec, &cluster)| squared_euclidean(vec, &centroids[cluster]))
        .sum();

    KmeansResult {
        assignments,
        centroids,
        k,
        iterations,
        inertia,
    }
}

/// Compute the mean silhouette score for a clustering result.
///
/// For each point i:
///   a(i) = average distance to other points in the same cluster
///   b(i) = minimum average distance to points in any other cluster
///   s(i) = (b(i) - a(i)) / max(a(i), b(i))
///
/// Returns the mean s(i) across all points. Range: [-1, 1].
pub fn silhouette_score(points: &[Vec<f64>], result: &KmeansResult) -> f64 {
    let n = points.len();
    if n <= 1 || result.k <= 1 || result.assignments.len() != n {
        return 0.0;
    }

    let mut cluster_members: Vec<Vec<usize>> = vec![Vec::new(); result.k];
    for (i, &cluster) in result.assignments.iter().enumerate() {
        cluster_members[cluster].push(i);
    }

    let mut total_silhouette = 0.0;
    let mut counted = 0;

    for (i, vec_i) in points.iter().enumerate() {
        let my_cluster = result.assignments[i];
        let my_members = &cluster_members[my_cluster];

        // a(i): average distance to same-cluster points.
        let a = if my_members.len() <= 1 {
            0.0
        } else {
            let sum: f64 = my_members
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| euclidean(vec_i, &points[j]))
                .sum();
            sum / (my_members.len() - 1) as f64
        };

        // b(i): minimum average distance to any other cluster.
        let mut b = f64::MAX;
        for (cid, members) in cluster_members.iter().enumerate() {
            if cid == my_cluster || members.is_empty() {
                continue;
            }
            let avg: f64 = members.iter().map(|&j| euclidean(vec_i, &points[j])).sum::<f64>()
                / members.len() as f64;
            if avg < b {
                b = avg;
            }
        }

        if b == f64::MAX {
            // Only one populated cluster, silhouette undefined.
            continue;
        }

        let max_ab = a.max(b);
        let s = if max_ab > 0.0 { (b - a) / max_ab } else { 0.0 };

        total_silhouette += s;
        counted += 1;
    }

    if counted == 0 {
        0.0
    } else {
        total_silhouette / counted as f64
    }
}

// ── Internal helpers ─────────────────────────────────────────

/// K-means++ initialization, greedy variant: start from the middle point and
/// repeatedly take the point with max D² to the chosen centroids.
fn kmeanspp_init(points: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[n / 2].clone());

    for _ in 1..k {
        let mut best_idx = 0;
        let mut best_dist = f64::NEG_INFINITY;

        for (i, vec) in points.iter().enumerate() {
            let min_dist = centroids
                .iter()
                .map(|c| squared_euclidean(vec, c))
                .fold(f64::MAX, f64::min);
            if min_dist > best_dist {
                best_dist = min_dist;
                best_idx = i;
            }
        }

        centroids.push(points[best_idx].clone());
    }

    centroids
}

/// Find the index of the nearest centroid.
fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best_idx = 0;
    let mut best_dist = f64::MAX;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_euclidean(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }
    best_idx
}

#[inline]
fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[inline]
fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: generate points in well-separated clusters for testing.
    fn make_clusters(centers: &[(f64, f64)], points_per_cluster: usize) -> Vec<Vec<f64>> {
        let mut result = Vec::new();
        for &(cx, cy) in centers {
            for i in 0..points_per_cluster {
                let offset = (i as f64) * 0.1;
                result.push(vec![cx + offset, cy + offset]);
            }
        }
        result
    }

    #[test]
    fn basic_kmeans_two_clusters() {
        let points = make_clusters(&[(0.0, 0.0), (100.0, 100.0)], 10);
        let result = kmeans(&points, 2, 100);

        assert_eq!(result.k, 2);
        assert_eq!(result.centroids.len(), 2);
        assert_eq!(result.assignments.len(), 20);

        let c0 = result.assignments[0];
        assert!(result.assignments[..10].iter().all(|&c| c == c0));
        let c1 = result.assignments[10];
        assert_ne!(c0, c1);
        assert!(result.assignments[10..].iter().all(|&c| c == c1));
    }

    #[test]
    fn kmeans_single_cluster() {
        let points = make_clusters(&[(5.0, 5.0)], 20);
        let result = kmeans(&points, 1, 100);

        assert_eq!(result.k, 1);
        assert!(result.assignments.iter().all(|&c| c == 0));
    }

    #[test]
    fn kmeans_three_clusters() {
        let points = make_clusters(&[(0.0, 0.0), (50.0, 50.0), (100.0, 100.0)], 15);
        let result = kmeans(&points, 3, 100);

        let groups: Vec<usize> = (0..3).map(|g| result.assignments[g * 15]).collect();
        for (g, &cluster) in groups.iter().enumerate() {
            assert!(result.assignments[g * 15..(g + 1) * 15].iter().all(|&c| c == cluster));
        }
        assert_ne!(groups[0], groups[1]);
        assert_ne!(groups[1], groups[2]);
        assert_ne!(groups[0], groups[2]);
    }

    #[test]
    fn k_equal_to_point_count_separates_every_point() {
        let points = vec![vec![1.0], vec![2.0]];
        let result = kmeans(&points, 2, 10);
        assert_ne!(result.assignments[0], result.assignments[1]);
        assert_eq!(result.inertia, 0.0);
    }

    #[test]
    fn identical_points_share_a_cluster() {
        let points = vec![vec![0.0, 0.0]; 6];
        let result = kmeans(&points, 4, 50);
        let first = result.assignments[0];
        assert!(result.assignments.iter().all(|&c| c == first));
        assert_eq!(result.inertia, 0.0);
    }

    #[test]
    fn kmeans_converges_quickly_on_separable_data() {
        let points = make_clusters(&[(0.0, 0.0), (1000.0, 1000.0)], 5);
        let result = kmeans(&points, 2, 100);
        assert!(result.iterations <= 5, "iterations: {}", result.iterations);
    }

    #[test]
    fn silhouette_well_separated() {
        let points = make_clusters(&[(0.0, 0.0), (100.0, 100.0)], 10);
        let result = kmeans(&points, 2, 100);
        let score = silhouette_score(&points, &result);
        assert!(score > 0.8, "silhouette score = {}", score);
    }

    #[test]
    fn silhouette_single_cluster_is_zero() {
        let points = make_clusters(&[(5.0, 5.0)], 10);
        let result = kmeans(&points, 1, 100);
        assert!(silhouette_score(&points, &result).abs() < 1e-10);
    }

    #[test]
    fn kmeanspp_init_picks_spread_centroids() {
        let points = make_clusters(&[(0.0, 0.0), (100.0, 100.0)], 5);
        let centroids = kmeanspp_init(&points, 2);
        let dist = squared_euclidean(&centroids[0], &centroids[1]);
        assert!(dist > 1000.0, "centroids too close: dist²={}", dist);
    }

    #[test]
    #[should_panic(expected = "points must not be empty")]
    fn kmeans_panics_on_empty() {
        kmeans(&[], 1, 10);
    }

    #[test]
    #[should_panic(expected = "k must be <= number of points")]
    fn kmeans_panics_on_k_greater_than_n() {
        kmeans(&[vec![1.0], vec![2.0]], 3, 10);
    }
}
