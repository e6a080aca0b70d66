/// Cubic Hermite ease, `t²(3 − 2t)`, on a parameter clamped to `[0, 1]`.
pub fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothstep_fixes_endpoints_and_midpoint() {
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(1.0), 1.0);
        assert_eq!(smoothstep(0.5), 0.5);
    }

    #[test]
    fn smoothstep_is_monotone() {
        let mut previous = smoothstep(0.0);
        for step in 1..=100 {
            let value = smoothstep(step as f64 / 100.0);
            assert!(value >= previous);
            previous = value;
        }
    }
}
