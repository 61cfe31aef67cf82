//! # candleflow
//!
//! Streaming technical indicators and candle pattern automata.
//!
//! Bars are fed one at a time, in chronological order. A bar that is still
//! forming ([`CandleState::Active`]) may be delivered any number of times; it
//! is evaluated against committed history without changing it. Only the single
//! [`CandleState::Finished`] delivery is committed.
//!
//! ## Quick Start
//!
//! ```rust
//! use candleflow::prelude::*;
//! use rust_decimal_macros::dec;
//!
//! let mut cks = ChandeKrollStop::new(3, dec!(1), 1);
//!
//! let bars = [
//!     Candle::new(dec!(9), dec!(10), dec!(8), dec!(9)).at(1),
//!     Candle::new(dec!(10), dec!(12), dec!(9), dec!(11)).at(2),
//!     Candle::new(dec!(11), dec!(15), dec!(7), dec!(8)).at(3),
//! ];
//!
//! for bar in &bars {
//!     let value = cks.process_candle(bar).unwrap();
//!     if cks.is_formed() {
//!         let (stop_long, stop_short) = cks.stops(&value).unwrap();
//!         assert_eq!(stop_long, dec!(7));
//!         assert_eq!(stop_short, dec!(15));
//!     }
//! }
//! ```

pub mod analytics;
pub mod indicator;
pub mod indicators;
pub mod patterns;
pub mod storage;
pub mod value;
mod window;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub mod prelude {
    pub use crate::{
        // Harness
        analytics::{
            biggest_candles, process_parallel, recognize_parallel, BiggestCandles,
            CancellationToken, ChartSeries, IndicatorRun, InstrumentCandle, PatternHits,
            ScanConfig, ScanError,
        },
        // Indicators
        indicator::{create_indicator, Indicator},
        indicators::*,
        // Patterns
        patterns::{
            create_pattern, BlackCandle, CandlePattern, ComplexCandlePattern, Doji, Hammer,
            Marubozu, ShootingStar, SpinningTop, WhiteCandle,
        },
        // Persistence
        storage::{Persistable, SettingValue, SettingsStorage},
        // Values
        value::{CompositeValue, FromDecimal, IndicatorId, IndicatorValue, Payload},
        // Core types
        Candle,
        CandleState,
        Error,
        Ohlcv,
        OhlcvExt,
        PriceSource,
        Result,
        Timestamp,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, Error>;

/// Longest window any indicator accepts
pub const MAX_LENGTH: usize = 1_000_000;

/// Errors surfaced by indicators, patterns, values and the settings store
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("{field} = {value} must be in 1..={max}")]
    InvalidLength {
        field: &'static str,
        value: usize,
        max: usize,
    },

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("Cannot convert {from} value to {to}")]
    Conversion { from: &'static str, to: &'static str },

    #[error("No child value produced by {0}")]
    MissingChild(value::IndicatorId),

    #[error("Missing setting `{0}`")]
    MissingSetting(String),

    #[error("Setting `{key}` is not a {expected}")]
    SettingType { key: String, expected: &'static str },

    #[error("Unknown settings type tag `{0}`")]
    UnknownKind(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Processing cancelled")]
    Cancelled,
}

impl Error {
    /// True for errors raised by `validate()` on bad parameters or structure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_) | Error::InvalidLength { .. } | Error::OutOfRange { .. }
        )
    }
}

pub(crate) fn check_length(field: &'static str, value: usize) -> Result<()> {
    if value == 0 || value > MAX_LENGTH {
        return Err(Error::InvalidLength {
            field,
            value,
            max: MAX_LENGTH,
        });
    }
    Ok(())
}

pub(crate) fn check_ratio(field: &'static str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(Error::OutOfRange {
            field,
            value,
            min: Decimal::ZERO,
            max: Decimal::ONE,
        });
    }
    Ok(())
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Bar open timestamp (epoch millis) or sequence number.
///
/// Must be non-decreasing between consecutive deliveries to the same
/// indicator or pattern.
pub type Timestamp = i64;

/// Lifecycle of a bar
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum CandleState {
    /// Still forming; later revisions supersede this one.
    Active,
    /// Closed; never revised again.
    #[default]
    Finished,
}

impl CandleState {
    #[inline]
    pub fn is_finished(self) -> bool {
        matches!(self, CandleState::Finished)
    }
}

/// Core OHLCV data trait
///
/// Implement this on your own bar type to feed indicators and patterns
/// without conversion.
pub trait Ohlcv {
    fn open(&self) -> Decimal;
    fn high(&self) -> Decimal;
    fn low(&self) -> Decimal;
    fn close(&self) -> Decimal;

    /// Total traded volume. Defaults to zero.
    fn volume(&self) -> Decimal {
        Decimal::ZERO
    }

    fn open_time(&self) -> Timestamp;

    fn close_time(&self) -> Timestamp {
        self.open_time()
    }

    /// Defaults to [`CandleState::Finished`] for purely historical sources.
    fn state(&self) -> CandleState {
        CandleState::Finished
    }
}

impl<T: Ohlcv + ?Sized> Ohlcv for &T {
    fn open(&self) -> Decimal {
        (**self).open()
    }

    fn high(&self) -> Decimal {
        (**self).high()
    }

    fn low(&self) -> Decimal {
        (**self).low()
    }

    fn close(&self) -> Decimal {
        (**self).close()
    }

    fn volume(&self) -> Decimal {
        (**self).volume()
    }

    fn open_time(&self) -> Timestamp {
        (**self).open_time()
    }

    fn close_time(&self) -> Timestamp {
        (**self).close_time()
    }

    fn state(&self) -> CandleState {
        (**self).state()
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OhlcvExt: Ohlcv {
    #[inline]
    fn body(&self) -> Decimal {
        (self.close() - self.open()).abs()
    }

    /// High minus low, the bar "length".
    #[inline]
    fn range(&self) -> Decimal {
        self.high() - self.low()
    }

    #[inline]
    fn upper_shadow(&self) -> Decimal {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_shadow(&self) -> Decimal {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn middle_price(&self) -> Decimal {
        (self.high() + self.low()) / dec!(2)
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    #[inline]
    fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    /// Body as ratio of range. Returns None if range is zero
    #[inline]
    fn body_ratio(&self) -> Option<Decimal> {
        self.body().checked_div(self.range())
    }

    #[inline]
    fn upper_shadow_ratio(&self) -> Option<Decimal> {
        self.upper_shadow().checked_div(self.range())
    }

    #[inline]
    fn lower_shadow_ratio(&self) -> Option<Decimal> {
        self.lower_shadow().checked_div(self.range())
    }
}

impl<T: Ohlcv + ?Sized> OhlcvExt for T {}

// ============================================================
// CANDLE
// ============================================================

/// Owned bar snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub open_time: Timestamp,
    pub close_time: Timestamp,
    pub state: CandleState,
}

impl Candle {
    /// Finished bar at time 0 with zero volume.
    pub fn new(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume: Decimal::ZERO,
            open_time: 0,
            close_time: 0,
            state: CandleState::Finished,
        }
    }

    pub fn from_ohlcv<T: Ohlcv + ?Sized>(bar: &T) -> Self {
        Self {
            open: bar.open(),
            high: bar.high(),
            low: bar.low(),
            close: bar.close(),
            volume: bar.volume(),
            open_time: bar.open_time(),
            close_time: bar.close_time(),
            state: bar.state(),
        }
    }

    /// Sets both open and close time.
    #[must_use]
    pub fn at(mut self, open_time: Timestamp) -> Self {
        self.open_time = open_time;
        self.close_time = open_time;
        self
    }

    #[must_use]
    pub fn closing_at(mut self, close_time: Timestamp) -> Self {
        self.close_time = close_time;
        self
    }

    #[must_use]
    pub fn with_volume(mut self, volume: Decimal) -> Self {
        self.volume = volume;
        self
    }

    #[must_use]
    pub fn active(mut self) -> Self {
        self.state = CandleState::Active;
        self
    }

    #[must_use]
    pub fn finished(mut self) -> Self {
        self.state = CandleState::Finished;
        self
    }
}

impl Ohlcv for Candle {
    fn open(&self) -> Decimal {
        self.open
    }

    fn high(&self) -> Decimal {
        self.high
    }

    fn low(&self) -> Decimal {
        self.low
    }

    fn close(&self) -> Decimal {
        self.close
    }

    fn volume(&self) -> Decimal {
        self.volume
    }

    fn open_time(&self) -> Timestamp {
        self.open_time
    }

    fn close_time(&self) -> Timestamp {
        self.close_time
    }

    fn state(&self) -> CandleState {
        self.state
    }
}

// ============================================================
// PRICE SOURCE
// ============================================================

/// Field extracted from a bar before it is fed into a scalar indicator.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum PriceSource {
    Open,
    High,
    Low,
    #[default]
    Close,
    /// `(high + low) / 2`
    Median,
    /// `(high + low + close) / 3`
    Typical,
    Volume,
}

impl PriceSource {
    pub const ALL: [PriceSource; 7] = [
        PriceSource::Open,
        PriceSource::High,
        PriceSource::Low,
        PriceSource::Close,
        PriceSource::Median,
        PriceSource::Typical,
        PriceSource::Volume,
    ];

    #[inline]
    pub fn extract<T: Ohlcv + ?Sized>(self, bar: &T) -> Decimal {
        match self {
            Self::Open => bar.open(),
            Self::High => bar.high(),
            Self::Low => bar.low(),
            Self::Close => bar.close(),
            Self::Median => (bar.high() + bar.low()) / dec!(2),
            Self::Typical => (bar.high() + bar.low() + bar.close()) / dec!(3),
            Self::Volume => bar.volume(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::High => "High",
            Self::Low => "Low",
            Self::Close => "Close",
            Self::Median => "Median",
            Self::Typical => "Typical",
            Self::Volume => "Volume",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl std::fmt::Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// TESTS
// ============================================================
