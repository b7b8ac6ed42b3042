/// Rounds to two decimal places, halves away from zero.
///
/// Scaling first means a sum like `10.005` (stored as `10.00499...`) lands on
/// `1000.5000000000001` and rounds up, matching the decimal the value prints as.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sums the present values of an optional column. Returns 0.0 for empty input.
pub fn sum_present<I>(values: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    values.into_iter().flatten().fold(0.0, |acc, v| acc + v)
}
