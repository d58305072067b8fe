use std::collections::BTreeSet;

// Shared members divided by the smaller group's size. 0 when either side is empty
pub fn overlap_ratio<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let smaller = a.len().min(b.len());
    if smaller == 0 { return 0.0; }

    a.intersection(b).count() as f64 / smaller as f64
}

pub fn jaccard_similarity<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    if union == 0 { return 0.0; }

    shared as f64 / union as f64
}

// Ratio that falls back to 0 instead of NaN when nothing was counted
pub fn ratio_or_zero(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole } else { 0.0 }
}

pub fn round_to(val: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (val * scale).round() / scale
}
