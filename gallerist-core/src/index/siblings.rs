//! The siblings-centering algorithm (§4.2), isolated as a pure function over
//! ranks so it can be unit-tested without a Redis connection.

/// Computes the inclusive `[start, end]` rank window centered on `position`
/// out of `total` ranked ids, following the spec's centering algorithm:
/// shift right if the window would start before 0, then shift left if it
/// would run past `total - 1`. Always contains `position` when `total > 0`.
pub fn siblings_window(position: u64, total: u64, page_size: u64) -> (u64, u64) {
    assert!(total > 0, "siblings_window requires at least one ranked id");
    let half = (page_size / 2) as i64;
    let mut start = position as i64 - half;
    let mut end = position as i64 + half;

    if start < 0 {
        let shift = -start;
        start += shift;
        end += shift;
    }
    if end >= total as i64 {
        let shift = end - total as i64 + 1;
        start -= shift;
        end -= shift;
    }

    let start = start.max(0) as u64;
    let end = (end.min(total as i64 - 1)).max(0) as u64;
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centers_window_around_an_interior_position() {
        let (start, end) = siblings_window(24_339, 24_424, 20);
        assert_eq!(end - start + 1, 21);
        assert!(start <= 24_339 && 24_339 <= end);
    }

    #[test]
    fn shifts_right_when_window_would_start_before_zero() {
        let (start, end) = siblings_window(5, 24_424, 20);
        assert_eq!((start, end), (0, 20));
    }

    #[test]
    fn shifts_left_when_window_would_run_past_the_end() {
        let (start, end) = siblings_window(24_423, 24_424, 20);
        assert_eq!((start, end), (24_403, 24_423));
    }

    #[test]
    fn window_never_exceeds_total_entries() {
        let (start, end) = siblings_window(2, 5, 20);
        assert_eq!(start, 0);
        assert_eq!(end, 4);
        assert_eq!(end - start + 1, 5);
    }

    #[test]
    fn single_id_total_yields_a_single_element_window() {
        let (start, end) = siblings_window(0, 1, 20);
        assert_eq!((start, end), (0, 0));
    }
}
