//! Candle pattern recognition
//!
//! A [`CandlePattern`] is fed one bar at a time and answers whether the
//! pattern completes on that bar. Single-bar elements are stateless;
//! [`ComplexCandlePattern`] chains them into a multi-bar automaton.

mod complex;
mod elements;

use std::fmt;

pub use complex::ComplexCandlePattern;
pub use elements::{BlackCandle, Doji, Hammer, Marubozu, ShootingStar, SpinningTop, WhiteCandle};

use crate::{
    storage::{Persistable, SettingsStorage},
    Error, Ohlcv, Result,
};

/// Bar-by-bar pattern recognizer
pub trait CandlePattern: Persistable + fmt::Debug + Send {
    /// Stable tag used by [`save_entire`] / [`load_entire`].
    fn kind(&self) -> &'static str;

    /// Display name.
    fn name(&self) -> &str;

    /// Number of bars the pattern spans.
    fn candles_count(&self) -> usize;

    /// Checks parameters and structure without mutating anything.
    fn validate(&self) -> Result<()>;

    /// Returns to the initial state.
    fn reset(&mut self);

    /// True when the pattern completes on `candle`.
    ///
    /// Only finished bars advance multi-bar state. A still-forming bar is
    /// checked against the current state and may report a tentative match.
    fn recognize(&mut self, candle: &dyn Ohlcv) -> bool;
}

// ============================================================
// REGISTRY
// ============================================================

macro_rules! define_builtin_patterns {
    ($($ty:ty),* $(,)?) => {
        /// Type tags of every pattern [`create_pattern`] can build
        pub const BUILTIN_PATTERNS: &[&str] = &[$(<$ty>::KIND),*];

        /// Builds a default-configured pattern from its type tag.
        pub fn create_pattern(kind: &str) -> Result<Box<dyn CandlePattern>> {
            $(
                if kind == <$ty>::KIND {
                    return Ok(Box::new(<$ty>::default()));
                }
            )*
            Err(Error::UnknownKind(kind.to_string()))
        }
    };
}

define_builtin_patterns! {
    WhiteCandle,
    BlackCandle,
    Doji,
    Hammer,
    ShootingStar,
    Marubozu,
    SpinningTop,
    ComplexCandlePattern,
}

/// Saves a pattern as a self-describing unit (type tag plus settings).
pub fn save_entire(pattern: &dyn CandlePattern) -> SettingsStorage {
    let mut settings = SettingsStorage::new();
    pattern.save(&mut settings);
    SettingsStorage::tagged(pattern.kind(), settings)
}

/// Rebuilds a pattern of the exact stored type.
pub fn load_entire(storage: &SettingsStorage) -> Result<Box<dyn CandlePattern>> {
    let (kind, settings) = storage.untag()?;
    let mut pattern = create_pattern(kind)?;
    pattern.load(settings)?;
    Ok(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;
    use rust_decimal_macros::dec;

    #[test]
    fn test_every_builtin_is_constructible() {
        for kind in BUILTIN_PATTERNS {
            let pattern = create_pattern(kind).unwrap();
            assert_eq!(pattern.kind(), *kind);
        }
    }

    #[test]
    fn test_single_bar_defaults_are_valid() {
        for kind in BUILTIN_PATTERNS.iter().filter(|k| **k != ComplexCandlePattern::KIND) {
            let pattern = create_pattern(kind).unwrap();
            assert!(pattern.validate().is_ok(), "{kind}");
            assert_eq!(pattern.candles_count(), 1);
        }
    }

    #[test]
    fn test_unknown_kind() {
        assert!(matches!(create_pattern("Nope"), Err(Error::UnknownKind(_))));
    }

    #[test]
    fn test_save_load_entire() {
        let doji = Doji::new(dec!(0.05));
        let mut restored = load_entire(&save_entire(&doji)).unwrap();
        assert_eq!(restored.kind(), Doji::KIND);

        // Body ratio 0.08 is a doji only under the default threshold
        let bar = Candle::new(dec!(10), dec!(15), dec!(5), dec!(10.8));
        assert!(!restored.recognize(&bar));
        assert!(Doji::default().recognize(&bar));
    }
}
