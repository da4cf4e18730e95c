/// Returns `round(done / total * 100)` clamped to 0-100.
///
/// A zero `total` counts as finished.
pub fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let done = done.min(total);
    ((done as f64 / total as f64) * 100.0).round() as u8
}
