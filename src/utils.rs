use std::ops::Range;

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::io::StepRange;

pub fn parse_range<T: std::str::FromStr>(s: &str) -> Result<Range<T>, String>
where
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    let v = s.split("..").collect::<Vec<_>>();
    if v.len() != 2 {
        return Err(format!("Could not find '..' when parsing range `{s}`."));
    }
    let x = v[0].parse().map_err(|e| format!("{e}"))?;
    let y = v[1].parse().map_err(|e| format!("{e}"))?;
    Ok(x..y)
}

/// Parse `start..stop` or `start..stop;step`, where `stop` may be empty,
/// meaning "to the end"
pub fn parse_step_range(s: &str) -> Result<StepRange, String> {
    let (range, step) = match s.split_once(';') {
        Some((range, step)) => (range, step.parse::<usize>().map_err(|e| format!("{e}"))?),
        None                => (s, 1),
    };
    let v = range.split("..").collect::<Vec<_>>();
    if v.len() != 2 {
        return Err(format!("Could not find '..' when parsing range `{s}`."));
    }
    let start = if v[0].is_empty() { 0 } else { v[0].parse().map_err(|e| format!("{e}"))? };
    let stop  = if v[1].is_empty() { None } else { Some(v[1].parse().map_err(|e| format!("{e}"))?) };
    Ok(StepRange { start, stop, step })
}

/// Group numeric digits to facilitate reading long numbers
pub fn group_digits<F: std::fmt::Display>(n: F) -> String {
    use numsep::{separate, Locale};
    separate(n, Locale::English)
}

/// Evenly spaced values over `[start, stop]`, both ends included, like numpy's
/// `linspace`
pub fn linspace(start: f32, stop: f32, n: usize) -> ndarray::Array1<f32> {
    ndarray::Array1::linspace(start, stop, n)
}

/// Median of a slice of floats, `None` when the slice is empty. NaNs sort
/// last.
pub fn median(values: &[f32]) -> Option<f32> {
    let sorted = values.iter().copied().map(OrderedFloat).sorted_unstable().collect_vec();
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2].0),
        _ => Some(0.5 * (sorted[n / 2 - 1].0 + sorted[n / 2].0)),
    }
}

/// The `q`-th percentile (0 - 100) with linear interpolation between closest
/// ranks, like numpy's default `percentile`.
pub fn percentile<'a>(values: impl IntoIterator<Item = &'a f32>, q: f32) -> Option<f32> {
    let sorted = values.into_iter()
        .copied()
        .filter(|v| v.is_finite())
        .map(OrderedFloat)
        .sorted_unstable()
        .collect_vec();
    if sorted.is_empty() { return None }
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil()  as usize;
    let fraction = rank - lo as f32;
    Some(sorted[lo].0 + (sorted[hi].0 - sorted[lo].0) * fraction)
}

pub mod timing {

    use super::group_digits;
    use std::time::Instant;
    use std::io::Write;

    pub struct Progress {
        previous: Instant,
    }

    impl Progress {

        #[allow(clippy::new_without_default)]
        pub fn new() -> Self { Self { previous: Instant::now() } }

        /// Print message, append ellipsis, flush stdout, stay on same line, start timer.
        pub fn start(&mut self, message: &str) {
            print!("{message} ... ");
            // A failed flush only delays the message
            std::io::stdout().flush().ok();
            self.start_timer();
        }

        // Print time elapsed since last start or done
        pub fn done(&mut self) {
            println!("{} ms", self.elapsed_ms());
            self.start_timer();
        }

        // Print message followed by time elapsed since last start or done
        pub fn done_with_message(&mut self, message: &str) {
            println!("{message}: {} ms", self.elapsed_ms());
            self.start_timer();
        }

        /// Like `done_with_message`, but to the debug log rather than stdout,
        /// for library code timing its steps
        pub fn lap(&mut self, message: &str) {
            log::debug!("{message}: {} ms", self.elapsed_ms());
            self.start_timer();
        }

        fn elapsed_ms(&self) -> String { group_digits(self.previous.elapsed().as_millis()) }

        fn start_timer(&mut self) { self.previous = Instant::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use float_eq::assert_float_eq;

    #[rstest(/**/ input       , start, stop    , step,
             case("0..10"     , 0    , Some(10), 1   ),
             case("..10"      , 0    , Some(10), 1   ),
             case("5.."       , 5    , None    , 1   ),
             case("0..;1500"  , 0    , None    , 1500),
             case("2..20;3"   , 2    , Some(20), 3   ),
    )]
    fn step_ranges(input: &str, start: usize, stop: Option<usize>, step: usize) {
        let parsed = parse_step_range(input).unwrap();
        assert_eq!(parsed, StepRange { start, stop, step });
    }

    #[test]
    fn step_range_without_dots_is_rejected() {
        assert!(parse_step_range("10").is_err());
        assert!(parse_range::<usize>("10").is_err());
    }

    #[rstest(/**/ values              , expected,
             case(&[]                 , None     ),
             case(&[3.0]              , Some(3.0)),
             case(&[3.0, 1.0, 2.0]    , Some(2.0)),
             case(&[4.0, 1.0, 2.0, 3.0], Some(2.5)),
    )]
    fn medians(values: &[f32], expected: Option<f32>) {
        assert_eq!(median(values), expected);
    }

    #[test]
    fn percentiles_interpolate_like_numpy() {
        let data: Vec<f32> = (0..=100).map(|i| i as f32).collect();
        assert_float_eq!(percentile(&data,  1.0).unwrap(),  1.0, abs <= 1e-5);
        assert_float_eq!(percentile(&data, 99.0).unwrap(), 99.0, abs <= 1e-5);
        let data = [0.0, 10.0];
        assert_float_eq!(percentile(&data, 25.0).unwrap(), 2.5, abs <= 1e-5);
    }

    #[test]
    fn digits_are_grouped() {
        assert_eq!(group_digits(1234567), "1,234,567");
    }
}
