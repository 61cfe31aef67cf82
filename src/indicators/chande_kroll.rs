//! Chande Kroll Stop
//!
//! Volatility stop band built from the highest high and lowest low over
//! `period` bars:
//!
//! ```text
//! range      = highest − lowest
//! stop_long  = SMA(highest − range × multiplier, stop_period)
//! stop_short = SMA(lowest  + range × multiplier, stop_period)
//! ```

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::trace;

use crate::{
    check_length,
    indicator::Indicator,
    storage::{Persistable, SettingsStorage},
    value::{IndicatorId, IndicatorValue},
    Error, Result,
};

use super::{Highest, Lowest, SimpleMovingAverage};

const DEFAULT_PERIOD: usize = 10;
const DEFAULT_MULTIPLIER: Decimal = dec!(1.5);
const DEFAULT_STOP_PERIOD: usize = 9;

/// Chande Kroll Stop
///
/// Output is a composite with one entry per stop line, keyed by
/// [`long_line`](Self::long_line) and [`short_line`](Self::short_line).
/// Until both extrema are formed the composite has no entries.
#[derive(Debug, Clone)]
pub struct ChandeKrollStop {
    id: IndicatorId,
    highest: Highest,
    lowest: Lowest,
    sma_long: SimpleMovingAverage,
    sma_short: SimpleMovingAverage,
    multiplier: Decimal,
    formed: bool,
}

impl ChandeKrollStop {
    pub const KIND: &'static str = "CKS";

    pub fn new(period: usize, multiplier: Decimal, stop_period: usize) -> Self {
        Self {
            id: IndicatorId::next(),
            highest: Highest::new(period),
            lowest: Lowest::new(period),
            sma_long: SimpleMovingAverage::new(stop_period),
            sma_short: SimpleMovingAverage::new(stop_period),
            multiplier,
            formed: false,
        }
    }

    #[inline]
    pub fn period(&self) -> usize {
        self.highest.length()
    }

    pub fn set_period(&mut self, period: usize) {
        self.highest.set_length(period);
        self.lowest.set_length(period);
        self.reset();
    }

    #[inline]
    pub fn multiplier(&self) -> Decimal {
        self.multiplier
    }

    pub fn set_multiplier(&mut self, multiplier: Decimal) {
        self.multiplier = multiplier;
        self.reset();
    }

    #[inline]
    pub fn stop_period(&self) -> usize {
        self.sma_long.length()
    }

    pub fn set_stop_period(&mut self, stop_period: usize) {
        self.sma_long.set_length(stop_period);
        self.sma_short.set_length(stop_period);
        self.reset();
    }

    /// Key of the smoothed long stop inside the output composite.
    pub fn long_line(&self) -> IndicatorId {
        self.sma_long.id()
    }

    /// Key of the smoothed short stop inside the output composite.
    pub fn short_line(&self) -> IndicatorId {
        self.sma_short.id()
    }

    /// Extracts `(stop_long, stop_short)` from an output of this indicator.
    pub fn stops(&self, value: &IndicatorValue) -> Result<(Decimal, Decimal)> {
        let long = value.child(self.long_line())?.to_decimal()?;
        let short = value.child(self.short_line())?.to_decimal()?;
        Ok((long, short))
    }
}

impl Default for ChandeKrollStop {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD, DEFAULT_MULTIPLIER, DEFAULT_STOP_PERIOD)
    }
}

impl Indicator for ChandeKrollStop {
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
        let (_, high, low, _) = input.ohlc()?;
        let highest = self.highest.process(&input.with_scalar(self.id, high))?;
        let lowest = self.lowest.process(&input.with_scalar(self.id, low))?;

        let mut result =
            IndicatorValue::composite(self.id, input.time()).with_final(input.is_final());
        if !(self.highest.is_formed() && self.lowest.is_formed()) {
            return Ok(result);
        }
        if !self.formed {
            self.formed = true;
            trace!(indicator = %self, time = input.time(), "formed");
        }

        let highest = highest.to_decimal()?;
        let lowest = lowest.to_decimal()?;
        let band = (highest - lowest) * self.multiplier;

        let long = self
            .sma_long
            .process(&input.with_scalar(self.id, highest - band))?;
        let short = self
            .sma_short
            .process(&input.with_scalar(self.id, lowest + band))?;
        result.add(self.sma_long.id(), long)?;
        result.add(self.sma_short.id(), short)?;
        Ok(result)
    }

    fn reset(&mut self) {
        self.highest.reset();
        self.lowest.reset();
        self.sma_long.reset();
        self.sma_short.reset();
        self.formed = false;
    }

    fn validate(&self) -> Result<()> {
        check_length("Period", self.period())?;
        check_length("StopPeriod", self.stop_period())?;
        if self.multiplier <= Decimal::ZERO {
            return Err(Error::InvalidConfig(format!(
                "Multiplier = {} must be > 0",
                self.multiplier
            )));
        }
        Ok(())
    }
}

impl Persistable for ChandeKrollStop {
    fn save(&self, storage: &mut SettingsStorage) {
        storage.set("Period", self.period());
        storage.set("Multiplier", self.multiplier);
        storage.set("StopPeriod", self.stop_period());
    }

    fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
        let period = storage.get_length("Period")?;
        let multiplier = storage.get_decimal("Multiplier")?;
        let stop_period = storage.get_length("StopPeriod")?;
        self.set_period(period);
        self.set_multiplier(multiplier);
        self.set_stop_period(stop_period);
        Ok(())
    }
}

impl fmt::Display for ChandeKrollStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CKS({}, {}, {})",
            self.period(),
            self.multiplier,
            self.stop_period()
        )
    }
}
