//! Audio level metering.

/// RMS level of `samples` scaled to 0-100.
pub fn calculate_rms_level(samples: &[f32]) -> u32 {
    if samples.is_empty() {
        return 0;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64;
            v * v
        })
        .sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();
    (rms * 100.0).min(100.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_level() {
        assert_eq!(calculate_rms_level(&[]), 0);
        assert_eq!(calculate_rms_level(&[0.0; 64]), 0);
        assert_eq!(calculate_rms_level(&[0.5, -0.5]), 50);
        assert_eq!(calculate_rms_level(&[4.0]), 100);
    }
}
