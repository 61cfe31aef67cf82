//! Indicator contract and registry
//!
//! Every indicator consumes one [`IndicatorValue`] per bar through
//! [`Indicator::process`]. Inputs built from [`CandleState::Active`] bars are
//! evaluated against committed history only, so re-feeding the same
//! provisional bar yields the same output. A finished input is committed.
//!
//! [`CandleState::Active`]: crate::CandleState::Active

use std::fmt;

use crate::{
    indicators::{
        AverageDirectionalIndex, AverageTrueRange, ChandeKrollStop, ComplexIndicator, DiMinus,
        DiPlus, DirectionalIndex, ExponentialMovingAverage, Highest, Lowest,
        SimpleMovingAverage, WilderMovingAverage,
    },
    storage::{Persistable, SettingsStorage},
    value::{IndicatorId, IndicatorValue},
    Error, Ohlcv, Result,
};

/// Streaming indicator
///
/// Inputs must arrive in non-decreasing time order. This is not checked.
pub trait Indicator: Persistable + fmt::Display + fmt::Debug + Send + BoxedIndicator {
    /// Process-unique identity, used as the key of this indicator's entry in
    /// a parent composite value.
    fn id(&self) -> IndicatorId;

    /// Stable tag used by [`save_entire`] / [`load_entire`].
    fn kind(&self) -> &'static str;

    /// True once enough committed history exists. Stays true until
    /// [`reset`](Self::reset).
    fn is_formed(&self) -> bool;

    /// Runs one computation step.
    ///
    /// An empty input produces an empty output and leaves state untouched.
    /// A conversion error is returned before anything is mutated.
    fn process(&mut self, input: &IndicatorValue) -> Result<IndicatorValue>;

    fn process_candle(&mut self, candle: &dyn Ohlcv) -> Result<IndicatorValue> {
        self.process(&IndicatorValue::from_candle(candle))
    }

    /// Clears all memory and the formed flag. Recursive for composites.
    fn reset(&mut self);

    /// Checks parameters and structure without mutating anything.
    fn validate(&self) -> Result<()>;
}

/// Copying a boxed indicator, state and id included
///
/// Implemented for every `Indicator + Clone`.
pub trait BoxedIndicator {
    fn boxed_clone(&self) -> Box<dyn Indicator>;
}

impl<T: Indicator + Clone + 'static> BoxedIndicator for T {
    fn boxed_clone(&self) -> Box<dyn Indicator> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Indicator> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

// ============================================================
// REGISTRY
// ============================================================

macro_rules! define_builtin_indicators {
    ($($ty:ty),* $(,)?) => {
        /// Type tags of every indicator [`create_indicator`] can build
        pub const BUILTIN_INDICATORS: &[&str] = &[$(<$ty>::KIND),*];

        /// Builds a default-configured indicator from its type tag.
        pub fn create_indicator(kind: &str) -> Result<Box<dyn Indicator>> {
            $(
                if kind == <$ty>::KIND {
                    return Ok(Box::new(<$ty>::default()));
                }
            )*
            Err(Error::UnknownKind(kind.to_string()))
        }
    };
}

define_builtin_indicators! {
    SimpleMovingAverage,
    ExponentialMovingAverage,
    WilderMovingAverage,
    Highest,
    Lowest,
    AverageTrueRange,
    DiPlus,
    DiMinus,
    DirectionalIndex,
    AverageDirectionalIndex,
    ChandeKrollStop,
    ComplexIndicator,
}

/// Saves an indicator as a self-describing unit (type tag plus settings).
pub fn save_entire(indicator: &dyn Indicator) -> SettingsStorage {
    let mut settings = SettingsStorage::new();
    indicator.save(&mut settings);
    SettingsStorage::tagged(indicator.kind(), settings)
}

/// Rebuilds an indicator of the exact stored type.
pub fn load_entire(storage: &SettingsStorage) -> Result<Box<dyn Indicator>> {
    let (kind, settings) = storage.untag()?;
    let mut indicator = create_indicator(kind)?;
    indicator.load(settings)?;
    Ok(indicator)
}
