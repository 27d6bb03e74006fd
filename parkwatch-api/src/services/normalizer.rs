//! Occupancy normalization
//!
//! Clamps a raw adapter count into a valid occupancy value bounded by a
//! lot's capacity. Total over all finite inputs; the adapters reject
//! non-numeric counts before this point.

/// Round to nearest, floor at 0, cap at `capacity`.
pub fn normalize(raw: f64, capacity: i64) -> i64 {
    if capacity <= 0 {
        return 0;
    }

    let rounded = raw.round();
    if !(rounded > 0.0) {
        // Also covers NaN
        return 0;
    }
    if rounded >= capacity as f64 {
        return capacity;
    }
    rounded as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_nearest_integer() {
        assert_eq!(normalize(2.4, 100), 2);
        assert_eq!(normalize(2.5, 100), 3);
        assert_eq!(normalize(2.6, 100), 3);
    }

    #[test]
    fn floors_negative_counts_at_zero() {
        assert_eq!(normalize(-1.0, 100), 0);
        assert_eq!(normalize(-0.4, 100), 0);
        assert_eq!(normalize(f64::NEG_INFINITY, 100), 0);
    }

    #[test]
    fn caps_at_capacity() {
        assert_eq!(normalize(150.0, 120), 120);
        assert_eq!(normalize(120.0, 120), 120);
        assert_eq!(normalize(119.6, 120), 120);
        assert_eq!(normalize(f64::INFINITY, 120), 120);
    }

    #[test]
    fn zero_capacity_always_yields_zero() {
        assert_eq!(normalize(0.0, 0), 0);
        assert_eq!(normalize(50.0, 0), 0);
        assert_eq!(normalize(-50.0, 0), 0);
    }

    #[test]
    fn result_always_within_bounds() {
        let raws = [
            -1e12, -7.3, -0.5, 0.0, 0.49, 0.51, 1.0, 33.3, 119.9, 120.0, 1e12,
        ];
        for capacity in [0i64, 1, 40, 120] {
            for raw in raws {
                let occupied = normalize(raw, capacity);
                assert!((0..=capacity.max(0)).contains(&occupied));
            }
        }
    }

    #[test]
    fn monotonic_in_raw_count() {
        let mut raws = vec![-100.0, -1.0, 0.0, 0.5, 1.0, 2.4, 2.5, 50.0, 119.0, 500.0];
        raws.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let mut previous = i64::MIN;
        for raw in raws {
            let occupied = normalize(raw, 120);
            assert!(occupied >= previous);
            previous = occupied;
        }
    }
}
