//! One-dimensional filters on rows and columns of frames and sinograms.
//!
//! Boundaries follow the half-sample symmetric ("reflect") extension:
//! `d c b a | a b c d | d c b a`.

use ndarray::{ArrayView1, ArrayViewMut1};
use ordered_float::OrderedFloat;

/// Map any (possibly out-of-range) index onto `0..n` by half-sample
/// symmetric reflection
#[inline]
pub fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let i = i.rem_euclid(period);
    (if i < n { i } else { period - 1 - i }) as usize
}

/// Median filter of width `size`, centred on `size / 2`. For even sizes the
/// upper of the two middle values is taken.
pub fn median_filter_1d(input: ArrayView1<f32>, size: usize, mut output: ArrayViewMut1<f32>) {
    let n = input.len();
    if n == 0 || size <= 1 { output.assign(&input); return }
    let half = (size / 2) as isize;
    let mut window = Vec::with_capacity(size);
    for (i, out) in output.iter_mut().enumerate() {
        window.clear();
        let first = i as isize - half;
        window.extend((0..size as isize).map(|j| OrderedFloat(input[reflect(first + j, n)])));
        let (_, median, _) = window.select_nth_unstable(size / 2);
        *out = median.0;
    }
}

/// Moving average of width `size`, centred on `size / 2`
pub fn uniform_filter_1d(input: ArrayView1<f32>, size: usize, mut output: ArrayViewMut1<f32>) {
    let n = input.len();
    if n == 0 || size <= 1 { output.assign(&input); return }
    let half = (size / 2) as isize;
    let size_f = size as f64;
    for (i, out) in output.iter_mut().enumerate() {
        let first = i as isize - half;
        let sum: f64 = (0..size as isize).map(|j| input[reflect(first + j, n)] as f64).sum();
        *out = (sum / size_f) as f32;
    }
}

/// Grow every set flag by one element in both directions
pub fn dilate(mask: &[bool]) -> Vec<bool> {
    let n = mask.len();
    (0..n).map(|i| {
        mask[i]
            || (i > 0     && mask[i - 1])
            || (i + 1 < n && mask[i + 1])
    }).collect()
}

/// Replace the values at flagged positions by linear interpolation between
/// the nearest unflagged neighbours. Beyond the outermost unflagged
/// position the nearest unflagged value is repeated. Nothing happens if
/// every position is flagged.
pub fn interpolate_flagged(mut row: ArrayViewMut1<f32>, flagged: &[bool]) {
    let good: Vec<usize> = (0..row.len()).filter(|&i| !flagged[i]).collect();
    let (Some(&first), Some(&last)) = (good.first(), good.last()) else { return };
    let mut next = 0; // index into `good` of the first good position > i
    for i in 0..row.len() {
        while next < good.len() && good[next] <= i { next += 1 }
        if !flagged[i] { continue }
        let value = if i < first { row[first] }
        else if i > last         { row[last] }
        else {
            let (lo, hi) = (good[next - 1], good[next]);
            let t = (i - lo) as f32 / (hi - lo) as f32;
            row[lo] + t * (row[hi] - row[lo])
        };
        row[i] = value;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::{array, Array1};
    use rstest::rstest;

    #[rstest(/**/ i , n, expected,
             case( 0, 4, 0),
             case(-1, 4, 0),
             case(-2, 4, 1),
             case( 4, 4, 3),
             case( 5, 4, 2),
             case( 9, 4, 1),
             case(-3, 1, 0),
    )]
    fn reflection(i: isize, n: usize, expected: usize) {
        assert_eq!(reflect(i, n), expected);
    }

    #[test]
    fn median_removes_isolated_spike() {
        let input = array![1.0, 1.0, 9.0, 1.0, 1.0];
        let mut output = Array1::zeros(5);
        median_filter_1d(input.view(), 3, output.view_mut());
        assert_eq!(output, array![1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn median_at_edges_uses_reflection() {
        let input = array![5.0, 1.0, 2.0];
        let mut output = Array1::zeros(3);
        median_filter_1d(input.view(), 3, output.view_mut());
        // windows: [5 5 1] [5 1 2] [1 2 2]
        assert_eq!(output, array![5.0, 2.0, 2.0]);
    }

    #[test]
    fn uniform_of_ramp_is_ramp_away_from_edges() {
        let input = Array1::from_iter((0..20).map(|i| i as f32));
        let mut output = Array1::zeros(20);
        uniform_filter_1d(input.view(), 3, output.view_mut());
        for i in 1..19 { assert!((output[i] - i as f32).abs() < 1e-5) }
        assert!((output[0] - 1.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn dilation_grows_flags() {
        let m = [false, false, true, false, false, false];
        assert_eq!(dilate(&m), [false, true, true, true, false, false]);
    }

    #[test]
    fn interpolation_across_a_gap() {
        let mut row = array![0.0, 99.0, 99.0, 3.0, 99.0];
        interpolate_flagged(row.view_mut(), &[false, true, true, false, true]);
        assert_eq!(row, array![0.0, 1.0, 2.0, 3.0, 3.0]);
    }
}
