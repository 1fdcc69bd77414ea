//! Derived simplex geometry on free coordinates.
//!
//! All functions take vertex coordinates already restricted to the free
//! variables; `SimplexSet` does the restriction (and the mesh scaling for the
//! normalized quantities) before calling in here.

use nalgebra::{DMatrix, DVector};

/// Mean of the given points.
pub fn centroid<'a, I>(points: I) -> Option<DVector<f64>>
where
    I: IntoIterator<Item = &'a DVector<f64>>,
{
    let mut it = points.into_iter();
    let mut sum = it.next()?.clone();
    let mut count = 1usize;
    for p in it {
        sum += p;
        count += 1;
    }
    Some(sum / count as f64)
}

/// `DZ = [z1 - z0, ..., zk - z0]`, one column per non-reference vertex.
pub fn direction_matrix(z: &[DVector<f64>]) -> DMatrix<f64> {
    let rows = z.first().map_or(0, |z0| z0.len());
    let cols = z.len().saturating_sub(1);
    let mut dz = DMatrix::zeros(rows, cols);
    for (j, zj) in z.iter().skip(1).enumerate() {
        dz.set_column(j, &(zj - &z[0]));
    }
    dz
}

/// Numerical rank: singular values above `rel_eps * sigma_max`.
pub fn rank(dz: &DMatrix<f64>, rel_eps: f64) -> usize {
    if dz.nrows() == 0 || dz.ncols() == 0 {
        return 0;
    }
    let sv = dz.clone().svd(false, false).singular_values;
    let smax = sv.max();
    if !(smax > 0.0) || !smax.is_finite() {
        return 0;
    }
    sv.iter().filter(|&&s| s > rel_eps * smax).count()
}

/// k-dimensional volume of the simplex spanned by `DZ`: `sqrt(det(DZ^T DZ)) / k!`.
pub fn volume(dz: &DMatrix<f64>) -> f64 {
    let k = dz.ncols();
    if k == 0 || dz.nrows() < k {
        return 0.0;
    }
    let gram = dz.transpose() * dz;
    let det = gram.determinant().max(0.0);
    det.sqrt() / factorial(k)
}

/// Largest pairwise distance and the pair of indices realizing it.
pub fn diameter(z: &[DVector<f64>]) -> (f64, Option<(usize, usize)>) {
    let mut best = 0.0;
    let mut pair = None;
    for i in 0..z.len() {
        for j in i + 1..z.len() {
            let d = (&z[i] - &z[j]).norm();
            if pair.is_none() || d > best {
                best = d;
                pair = Some((i, j));
            }
        }
    }
    (best, pair)
}

fn factorial(k: usize) -> f64 {
    (1..=k).map(|i| i as f64).product()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    #[test]
    fn unit_triangle() {
        let z = vec![dvector![0.0, 0.0], dvector![1.0, 0.0], dvector![0.0, 1.0]];
        let dz = direction_matrix(&z);
        assert_eq!(dz.shape(), (2, 2));
        assert_eq!(rank(&dz, 1e-2), 2);
        assert!((volume(&dz) - 0.5).abs() < 1e-12);
        let (d, pair) = diameter(&z);
        assert!((d - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(pair, Some((1, 2)));
        let c = centroid(&z[1..]).unwrap();
        assert_eq!(c, dvector![0.5, 0.5]);
    }

    #[test]
    fn flat_simplices_lose_rank() {
        let repeated = vec![dvector![0.0, 0.0], dvector![1.0, 0.0], dvector![1.0, 0.0]];
        assert_eq!(rank(&direction_matrix(&repeated), 1e-2), 1);
        assert!(volume(&direction_matrix(&repeated)) < 1e-12);
        let nearly_flat = vec![dvector![0.0, 0.0], dvector![1.0, 0.0], dvector![2.0, 1e-4]];
        assert_eq!(rank(&direction_matrix(&nearly_flat), 1e-2), 1);
        assert_eq!(rank(&direction_matrix(&nearly_flat), 1e-9), 2);
    }

    #[test]
    fn lower_dimensional_volume_is_edge_length() {
        // Two points in R^3: 1-dimensional volume is their distance.
        let z = vec![dvector![0.0, 0.0, 0.0], dvector![0.0, 3.0, 4.0]];
        assert!((volume(&direction_matrix(&z)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(centroid(std::iter::empty::<&DVector<f64>>()).is_none());
        let single = vec![dvector![1.0, 2.0]];
        assert_eq!(rank(&direction_matrix(&single), 1e-2), 0);
        assert_eq!(volume(&direction_matrix(&single)), 0.0);
        assert_eq!(diameter(&single), (0.0, None));
    }
}
