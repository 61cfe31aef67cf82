//! Moving averages
//!
//! [`SimpleMovingAverage`] is the arithmetic mean over a sliding window.
//! [`ExponentialMovingAverage`] and [`WilderMovingAverage`] are recursive
//! averages seeded with the SMA of the first `length` committed values:
//!
//! ```text
//! avg = prev + k × (price − prev)
//! ```
//!
//! with `k = 2 / (length + 1)` for EMA and `k = 1 / length` for Wilder's
//! smoothing.

use std::fmt;

use rust_decimal::Decimal;

use crate::{
    check_length,
    indicator::Indicator,
    storage::{Persistable, SettingsStorage},
    value::{IndicatorId, IndicatorValue},
    window::Window,
    PriceSource, Result,
};

const DEFAULT_LENGTH: usize = 10;

// ============================================================
// SMA
// ============================================================

/// Simple Moving Average
///
/// Output is empty until `length` values are available counting the current
/// input. Formed once `length` finished values have been committed.
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    id: IndicatorId,
    length: usize,
    source: PriceSource,
    window: Window,
    formed: bool,
}

impl SimpleMovingAverage {
    pub const KIND: &'static str = "SMA";

    pub fn new(length: usize) -> Self {
        Self {
            id: IndicatorId::next(),
            length,
            source: PriceSource::Close,
            window: Window::new(length),
            formed: false,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: PriceSource) -> Self {
        self.set_source(source);
        self
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn set_length(&mut self, length: usize) {
        self.length = length;
        self.reset();
    }

    #[inline]
    pub fn source(&self) -> PriceSource {
        self.source
    }

    pub fn set_source(&mut self, source: PriceSource) {
        self.source = source;
        self.reset();
    }
}

impl Default for SimpleMovingAverage {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH)
    }
}

impl Indicator for SimpleMovingAverage {
    fn id(&self) -> IndicatorId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn is_formed(&self) -> bool {
        self.formed
    }

    fn process(&mut self, input: &IndicatorValue) -> Result<IndicatorValue> {
        if input.is_empty() {
            return Ok(input.to_empty(self.id));
        }
        let price = input.price(self.source)?;
        let average = self
            .window
            .sum_with(price)
            .map(|sum| sum / Decimal::from(self.length));

        if input.is_final() {
            self.window.push(price);
            self.formed |= self.window.is_full();
        }

        Ok(match average {
            Some(v) => input.with_scalar(self.id, v),
            None => input.to_empty(self.id),
        })
    }

    fn reset(&mut self) {
        self.window.resize(self.length);
        self.formed = false;
    }

    fn validate(&self) -> Result<()> {
        check_length("Length", self.length)
    }
}

impl Persistable for SimpleMovingAverage {
    fn save(&self, storage: &mut SettingsStorage) {
        storage.set("Length", self.length);
        storage.set("Source", self.source);
    }

    fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
        let length = storage.get_length("Length")?;
        let source = storage.get_source("Source")?;
        self.length = length;
        self.source = source;
        self.reset();
        Ok(())
    }
}

impl fmt::Display for SimpleMovingAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SMA({}, {})", self.length, self.source)
    }
}

// ============================================================
// RECURSIVE AVERAGES
// ============================================================

/// State shared by SMA-seeded recursive averages
#[derive(Debug, Clone)]
struct Recursive {
    length: usize,
    seed: Window,
    last: Option<Decimal>,
}

impl Recursive {
    fn new(length: usize) -> Self {
        Self {
            length,
            seed: Window::new(length),
            last: None,
        }
    }

    /// Average for `price` against committed state; `None` while seeding.
    fn evaluate(
        &self,
        price: Decimal,
        numerator: Decimal,
        denominator: Decimal,
    ) -> Option<Decimal> {
        match self.last {
            Some(prev) => Some(prev + (price - prev) * numerator / denominator),
            None => self
                .seed
                .sum_with(price)
                .map(|sum| sum / Decimal::from(self.length)),
        }
    }

    fn commit(&mut self, price: Decimal, average: Option<Decimal>) {
        match average {
            Some(v) => self.last = Some(v),
            None => self.seed.push(price),
        }
    }

    fn reset(&mut self) {
        self.seed.resize(self.length);
        self.last = None;
    }
}

macro_rules! recursive_average {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal, |$n:ident| ($num:expr, $den:expr)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            id: IndicatorId,
            source: PriceSource,
            state: Recursive,
        }

        impl $name {
            pub const KIND: &'static str = $kind;

            pub fn new(length: usize) -> Self {
                Self {
                    id: IndicatorId::next(),
                    source: PriceSource::Close,
                    state: Recursive::new(length),
                }
            }

            #[must_use]
            pub fn with_source(mut self, source: PriceSource) -> Self {
                self.set_source(source);
                self
            }

            #[inline]
            pub fn length(&self) -> usize {
                self.state.length
            }

            pub fn set_length(&mut self, length: usize) {
                self.state.length = length;
                self.reset();
            }

            #[inline]
            pub fn source(&self) -> PriceSource {
                self.source
            }

            pub fn set_source(&mut self, source: PriceSource) {
                self.source = source;
                self.reset();
            }

            fn weights(&self) -> (Decimal, Decimal) {
                let $n = Decimal::from(self.state.length);
                ($num, $den)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new(DEFAULT_LENGTH)
            }
        }

        impl Indicator for $name {
            fn id(&self) -> IndicatorId {
                self.id
            }

            fn kind(&self) -> &'static str {
                Self::KIND
            }

            fn is_formed(&self) -> bool {
                self.state.last.is_some()
            }

            fn process(&mut self, input: &IndicatorValue) -> Result<IndicatorValue> {
                if input.is_empty() {
                    return Ok(input.to_empty(self.id));
                }
                let price = input.price(self.source)?;
                let (numerator, denominator) = self.weights();
                let average = self.state.evaluate(price, numerator, denominator);

                if input.is_final() {
                    self.state.commit(price, average);
                }

                Ok(match average {
                    Some(v) => input.with_scalar(self.id, v),
                    None => input.to_empty(self.id),
                })
            }

            fn reset(&mut self) {
                self.state.reset();
            }

            fn validate(&self) -> Result<()> {
                check_length("Length", self.state.length)
            }
        }

        impl Persistable for $name {
            fn save(&self, storage: &mut SettingsStorage) {
                storage.set("Length", self.state.length);
                storage.set("Source", self.source);
            }

            fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
                let length = storage.get_length("Length")?;
                let source = storage.get_source("Source")?;
                self.state.length = length;
                self.source = source;
                self.reset();
                Ok(())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}, {})", $kind, self.state.length, self.source)
            }
        }
    };
}

recursive_average! {
    /// Exponential Moving Average, `k = 2 / (length + 1)`
    ExponentialMovingAverage, "EMA", |n| (Decimal::TWO, n + Decimal::ONE)
}

recursive_average! {
    /// Wilder's smoothed moving average (SMMA), `k = 1 / length`
    ///
    /// Used by the true range and directional movement indicators.
    WilderMovingAverage, "SMMA", |n| (Decimal::ONE, n)
}
