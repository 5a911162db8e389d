use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Scale a vector to unit length. Zero vectors come back unchanged.
#[must_use]
pub fn normalize(mut v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm > 0.0 {
        v /= norm;
    }
    v
}

/// Row-wise [`normalize`].
#[must_use]
pub fn normalize_rows(mut m: Array2<f32>) -> Array2<f32> {
    for mut row in m.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row /= norm;
        }
    }
    m
}

/// Positions of `scores` ordered by descending score. The sort is stable, so
/// equal scores keep ascending position order.
#[must_use]
pub fn rank_descending(scores: ArrayView1<f32>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}
