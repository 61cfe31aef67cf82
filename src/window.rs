use std::collections::VecDeque;

use rust_decimal::Decimal;

/// Bounded window of committed (finished-bar) values.
///
/// A provisional candidate is evaluated as if it were the newest element,
/// displacing the oldest committed one when the window is full, without
/// changing the window.
#[derive(Clone, Debug)]
pub(crate) struct Window {
    size: usize,
    values: VecDeque<Decimal>,
    /// Running sum of `values`. Exact, since decimal addition does not drift.
    sum: Decimal,
}

impl Window {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            values: VecDeque::new(),
            sum: Decimal::ZERO,
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.size > 0 && self.values.len() >= self.size
    }

    /// True when `candidate` would complete a full window.
    #[inline]
    fn fills_with_candidate(&self) -> bool {
        self.size > 0 && self.values.len() + 1 >= self.size
    }

    /// Sum of the last `size - 1` committed values plus `candidate`.
    pub fn sum_with(&self, candidate: Decimal) -> Option<Decimal> {
        if !self.fills_with_candidate() {
            return None;
        }
        let evicted = if self.is_full() {
            self.values.front().copied().unwrap_or_default()
        } else {
            Decimal::ZERO
        };
        Some(self.sum - evicted + candidate)
    }

    /// Extremum over the last `size - 1` committed values plus `candidate`,
    /// keeping whichever side `prefer(new, current)` selects.
    pub fn extreme_with(
        &self,
        candidate: Decimal,
        prefer: impl Fn(Decimal, Decimal) -> bool,
    ) -> Option<Decimal> {
        if !self.fills_with_candidate() {
            return None;
        }
        let skip = self.values.len() + 1 - self.size;
        let extreme = self
            .values
            .iter()
            .skip(skip)
            .fold(candidate, |acc, &v| if prefer(v, acc) { v } else { acc });
        Some(extreme)
    }

    /// Commits a value, evicting the oldest if the window is full.
    pub fn push(&mut self, value: Decimal) {
        if self.size == 0 {
            return;
        }
        if self.values.len() == self.size {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.values.push_back(value);
        self.sum += value;
    }

    /// Changes the capacity and drops all committed values.
    pub fn resize(&mut self, size: usize) {
        self.size = size;
        self.values.clear();
        self.sum = Decimal::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn window(size: usize, values: &[Decimal]) -> Window {
        let mut w = Window::new(size);
        for v in values {
            w.push(*v);
        }
        w
    }

    mod filling {
        use super::*;

        #[test]
        fn sum_none_until_candidate_fills() {
            let w = window(3, &[dec!(1)]);
            assert_eq!(w.sum_with(dec!(2)), None);
        }

        #[test]
        fn candidate_completes_window() {
            let w = window(3, &[dec!(1), dec!(2)]);
            assert_eq!(w.sum_with(dec!(3)), Some(dec!(6)));
            assert!(!w.is_full());
        }
    }

    mod sliding {
        use super::*;

        #[test]
        fn candidate_displaces_oldest() {
            let w = window(2, &[dec!(10), dec!(20)]);
            assert_eq!(w.sum_with(dec!(30)), Some(dec!(50)));
        }

        #[test]
        fn push_evicts_oldest() {
            let w = window(2, &[dec!(1), dec!(2), dec!(3), dec!(4)]);
            assert_eq!(w.values.len(), 2);
            assert_eq!(w.sum_with(dec!(5)), Some(dec!(9)));
        }
    }

    mod extremes {
        use super::*;

        #[test]
        fn highest_includes_candidate() {
            let w = window(3, &[dec!(10), dec!(12)]);
            assert_eq!(w.extreme_with(dec!(15), |a, b| a > b), Some(dec!(15)));
            assert_eq!(w.extreme_with(dec!(11), |a, b| a > b), Some(dec!(12)));
        }

        #[test]
        fn evicted_value_is_ignored() {
            let w = window(2, &[dec!(100), dec!(5)]);
            assert_eq!(w.extreme_with(dec!(4), |a, b| a > b), Some(dec!(5)));
        }

        #[test]
        fn lowest_includes_candidate() {
            let w = window(3, &[dec!(8), dec!(9)]);
            assert_eq!(w.extreme_with(dec!(7), |a, b| a < b), Some(dec!(7)));
        }
    }

    mod provisional {
        use super::*;

        #[test]
        fn evaluation_does_not_mutate() {
            let w = window(2, &[dec!(1), dec!(2)]);
            let first = w.sum_with(dec!(7));
            let second = w.sum_with(dec!(7));
            assert_eq!(first, second);
            assert_eq!(w.values.len(), 2);
        }
    }

    mod size_one {
        use super::*;

        #[test]
        fn candidate_alone_fills() {
            let w = Window::new(1);
            assert_eq!(w.sum_with(dec!(42)), Some(dec!(42)));
            assert_eq!(w.extreme_with(dec!(42), |a, b| a > b), Some(dec!(42)));
        }
    }

    mod zero_size {
        use super::*;

        #[test]
        fn never_fills() {
            let mut w = Window::new(0);
            w.push(dec!(1));
            assert_eq!(w.values.len(), 0);
            assert_eq!(w.sum_with(dec!(1)), None);
            assert!(!w.is_full());
        }
    }

    mod huge_size {
        use super::*;

        #[test]
        fn nothing_allocated_up_front() {
            let mut w = Window::new(usize::MAX);
            w.push(dec!(1));
            assert_eq!(w.sum_with(dec!(2)), None);
            w.resize(usize::MAX);
            assert_eq!(w.values.len(), 0);
        }
    }

    #[test]
    fn resize_clears() {
        let mut w = window(2, &[dec!(1), dec!(2)]);
        w.resize(3);
        assert_eq!(w.values.len(), 0);
        assert_eq!(w.sum_with(dec!(1)), None);
    }
}
