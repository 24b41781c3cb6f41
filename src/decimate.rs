//! Nearest-floor index decimation. No filtering or interpolation.

use heapless::Vec;

/// Source index picked for output slot `i` when mapping `src_len` samples
/// onto `out_len` slots.
#[inline]
pub fn source_index(i: usize, src_len: usize, out_len: usize) -> usize {
    i * src_len / out_len
}

/// Fill a length-`M` view of `input` with `input[floor(i * len / M)]`.
///
/// Consecutive slots may repeat a source sample when `len / M` is not an
/// integer, or when the input is shorter than `M`. An empty input gives an
/// empty view.
pub fn decimate<T: Copy, const M: usize>(input: &[T]) -> Vec<T, M> {
    let mut out = Vec::new();
    if input.is_empty() || M == 0 {
        return out;
    }
    for i in 0..M {
        // i < M, so the index is at most len - 1
        let _ = out.push(input[source_index(i, input.len(), M)]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DECIMATED_LEN, PPG_CAPACITY};

    #[test]
    fn thousand_to_six_forty() {
        let input: std::vec::Vec<i32> = (0..PPG_CAPACITY as i32).collect();
        let out = decimate::<i32, DECIMATED_LEN>(&input);

        assert_eq!(out.len(), DECIMATED_LEN);
        assert_eq!(out[0], input[0]);
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*out.last().unwrap(), 998);
        for (i, v) in out.iter().enumerate() {
            assert_eq!(*v as usize, i * 1000 / 640);
        }
    }

    #[test]
    fn short_input_repeats_without_overrun() {
        let input = [10, 20, 30];
        let out = decimate::<i32, 8>(&input);
        assert_eq!(out.as_slice(), &[10, 10, 10, 20, 20, 20, 30, 30]);
    }

    #[test]
    fn integer_ratio_is_plain_stride() {
        let input = [1, 2, 3, 4, 5, 6];
        let out = decimate::<i32, 3>(&input);
        assert_eq!(out.as_slice(), &[1, 3, 5]);
    }

    #[test]
    fn empty_input_gives_empty_view() {
        let out = decimate::<f32, 4>(&[]);
        assert!(out.is_empty());
    }
}
