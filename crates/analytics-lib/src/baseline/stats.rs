//! Descriptive statistics shared by the baseline and forecasting code

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (Bessel's correction), 0 for fewer than 2 values
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_degenerate_inputs() {
        assert_eq!(sample_std(&[]), 0.0);
        assert_eq!(sample_std(&[42.0]), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_std_uses_n_minus_one() {
        let std = sample_std(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!((std - 1.5811).abs() < 1e-4, "std was {}", std);
    }

    #[test]
    fn test_constant_values_have_zero_std() {
        assert_eq!(sample_std(&[99.9; 25]), 0.0);
        assert!((mean(&[99.9; 25]) - 99.9).abs() < 1e-9);
    }
}
