use argminmax::ArgMinMax;

/// Arithmetic mean. Empty input yields 0.0 so callers can treat
/// "no data" and "zero signal" the same way in score composition.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Is `value` within `tolerance_pct` (fractional, e.g. 0.01 = 1%) of `reference`?
pub fn within_pct(value: f64, reference: f64, tolerance_pct: f64) -> bool {
    if reference == 0.0 {
        return value == 0.0;
    }
    ((value - reference) / reference).abs() <= tolerance_pct
}

pub fn get_max(vec: &[f64]) -> f64 {
    let max_index: usize = vec.argmax();
    vec[max_index]
}

pub fn get_min(vec: &[f64]) -> f64 {
    let min_index: usize = vec.argmin();
    vec[min_index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[2.0, 4.0]), 3.0);
    }

    #[test]
    fn within_pct_tolerance() {
        assert!(within_pct(100.9, 100.0, 0.01));
        assert!(!within_pct(101.1, 100.0, 0.01));
        assert!(within_pct(99.1, 100.0, 0.01));
    }

    #[test]
    fn min_max_scan() {
        let v = [3.0, 9.5, 1.25, 7.0];
        assert_eq!(get_max(&v), 9.5);
        assert_eq!(get_min(&v), 1.25);
    }
}
