//! Numeric helpers for metric reporting.

/// Rounds a value to the given number of decimal places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
	let factor = 10f64.powi(decimals as i32);
	(value * factor).round() / factor
}

/// Arithmetic mean of the samples, zero when there are none.
pub fn mean(samples: &[f64]) -> f64 {
	if samples.is_empty() {
		return 0.0;
	}
	samples.iter().sum::<f64>() / samples.len() as f64
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_round_to() {
		assert_eq!(round_to(1.23456, 2), 1.23);
		assert_eq!(round_to(2.005_1, 2), 2.01);
		assert_eq!(round_to(3.0, 2), 3.0);
	}

	#[test]
	fn test_mean() {
		assert_eq!(mean(&[]), 0.0);
		assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
	}
}
