//! True range and directional movement
//!
//! * [`AverageTrueRange`] - Wilder-smoothed true range
//! * [`DiPlus`] / [`DiMinus`] - `100 × smoothed DM / ATR`
//! * [`DirectionalIndex`] - `100 × |DI+ − DI−| / (DI+ + DI−)`
//! * [`AverageDirectionalIndex`] - Wilder-smoothed DX

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::trace;

use crate::{
    check_length,
    indicator::Indicator,
    storage::{Persistable, SettingsStorage},
    value::{IndicatorId, IndicatorValue},
    Result,
};

use super::WilderMovingAverage;

const DEFAULT_LENGTH: usize = 14;
const HUNDRED: Decimal = dec!(100);

// ============================================================
// AVERAGE TRUE RANGE
// ============================================================

/// Average True Range
///
/// True range is `max(high − low, |high − prev_close|, |low − prev_close|)`
/// against the last committed close, or `high − low` for the first bar.
#[derive(Debug, Clone)]
pub struct AverageTrueRange {
    id: IndicatorId,
    smoother: WilderMovingAverage,
    prev_close: Option<Decimal>,
}

impl AverageTrueRange {
    pub const KIND: &'static str = "ATR";

    pub fn new(length: usize) -> Self {
        Self {
            id: IndicatorId::next(),
            smoother: WilderMovingAverage::new(length),
            prev_close: None,
        }
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.smoother.length()
    }

    pub fn set_length(&mut self, length: usize) {
        self.smoother.set_length(length);
        self.reset();
    }
}

impl Default for AverageTrueRange {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH)
    }
}

impl Indicator for AverageTrueRange {
    fn id(&self) -> IndicatorId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn is_formed(&self) -> bool {
        self.smoother.is_formed()
    }

    fn process(&mut self, input: &IndicatorValue) -> Result<IndicatorValue> {
        if input.is_empty() {
            return Ok(input.to_empty(self.id));
        }
        let (_, high, low, close) = input.ohlc()?;
        let true_range = match self.prev_close {
            Some(prev) => (high - low).max((high - prev).abs()).max((low - prev).abs()),
            None => high - low,
        };

        let smoothed = self.smoother.process(&input.with_scalar(self.id, true_range))?;
        if input.is_final() {
            self.prev_close = Some(close);
        }

        Ok(match smoothed.to_decimal() {
            Ok(v) => input.with_scalar(self.id, v),
            Err(_) => input.to_empty(self.id),
        })
    }

    fn reset(&mut self) {
        self.smoother.reset();
        self.prev_close = None;
    }

    fn validate(&self) -> Result<()> {
        self.smoother.validate()
    }
}

impl Persistable for AverageTrueRange {
    fn save(&self, storage: &mut SettingsStorage) {
        storage.set("Length", self.length());
    }

    fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
        let length = storage.get_length("Length")?;
        self.set_length(length);
        Ok(())
    }
}

impl fmt::Display for AverageTrueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ATR({})", self.length())
    }
}

// ============================================================
// DIRECTIONAL MOVEMENT
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Plus,
    Minus,
}

impl Direction {
    /// +DM is `high − prev_high` when positive and larger than the downward
    /// move; −DM mirrors it.
    fn movement(
        self,
        (high, low): (Decimal, Decimal),
        (prev_high, prev_low): (Decimal, Decimal),
    ) -> Decimal {
        let up = high - prev_high;
        let down = prev_low - low;
        let (this, other) = match self {
            Direction::Plus => (up, down),
            Direction::Minus => (down, up),
        };
        if this > Decimal::ZERO && this > other {
            this
        } else {
            Decimal::ZERO
        }
    }
}

/// One side of the directional movement system
#[derive(Debug, Clone)]
struct DiPart {
    id: IndicatorId,
    direction: Direction,
    atr: AverageTrueRange,
    smoother: WilderMovingAverage,
    prev: Option<(Decimal, Decimal)>,
}

impl DiPart {
    fn new(direction: Direction, length: usize) -> Self {
        Self {
            id: IndicatorId::next(),
            direction,
            atr: AverageTrueRange::new(length),
            smoother: WilderMovingAverage::new(length),
            prev: None,
        }
    }

    fn length(&self) -> usize {
        self.smoother.length()
    }

    fn set_length(&mut self, length: usize) {
        self.atr.set_length(length);
        self.smoother.set_length(length);
        self.prev = None;
    }

    fn is_formed(&self) -> bool {
        self.atr.is_formed() && self.smoother.is_formed()
    }

    fn process(&mut self, input: &IndicatorValue) -> Result<IndicatorValue> {
        if input.is_empty() {
            return Ok(input.to_empty(self.id));
        }
        let (_, high, low, _) = input.ohlc()?;
        let atr = self.atr.process(input)?;

        let smoothed = match self.prev {
            Some(prev) => {
                let dm = self.direction.movement((high, low), prev);
                self.smoother.process(&input.with_scalar(self.id, dm))?
            }
            None => input.to_empty(self.id),
        };
        if input.is_final() {
            self.prev = Some((high, low));
        }

        let (Ok(atr), Ok(dm)) = (atr.to_decimal(), smoothed.to_decimal()) else {
            return Ok(input.to_empty(self.id));
        };
        let di = if atr.is_zero() {
            Decimal::ZERO
        } else {
            HUNDRED * dm / atr
        };
        Ok(input.with_scalar(self.id, di))
    }

    fn reset(&mut self) {
        self.atr.reset();
        self.smoother.reset();
        self.prev = None;
    }

    fn validate(&self) -> Result<()> {
        check_length("Length", self.length())
    }
}

macro_rules! directional_part {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $direction:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(DiPart);

        impl $name {
            pub const KIND: &'static str = $kind;

            pub fn new(length: usize) -> Self {
                Self(DiPart::new($direction, length))
            }

            #[inline]
            pub fn length(&self) -> usize {
                self.0.length()
            }

            pub fn set_length(&mut self, length: usize) {
                self.0.set_length(length);
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new(DEFAULT_LENGTH)
            }
        }

        impl Indicator for $name {
            fn id(&self) -> IndicatorId {
                self.0.id
            }

            fn kind(&self) -> &'static str {
                Self::KIND
            }

            fn is_formed(&self) -> bool {
                self.0.is_formed()
            }

            fn process(&mut self, input: &IndicatorValue) -> Result<IndicatorValue> {
                self.0.process(input)
            }

            fn reset(&mut self) {
                self.0.reset();
            }

            fn validate(&self) -> Result<()> {
                self.0.validate()
            }
        }

        impl Persistable for $name {
            fn save(&self, storage: &mut SettingsStorage) {
                storage.set("Length", self.length());
            }

            fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
                let length = storage.get_length("Length")?;
                self.set_length(length);
                Ok(())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $kind, self.length())
            }
        }
    };
}

directional_part! {
    /// Positive directional indicator (DI+)
    DiPlus, "DiPlus", Direction::Plus
}

directional_part! {
    /// Negative directional indicator (DI−)
    DiMinus, "DiMinus", Direction::Minus
}

// ============================================================
// DIRECTIONAL INDEX
// ============================================================

/// Directional Movement Index (DX)
///
/// Composite of [`DiPlus`] and [`DiMinus`]. The percentage is attached as
/// the composite's scalar once both sides produce a value; it is `0` when
/// both sides are zero.
#[derive(Debug, Clone)]
pub struct DirectionalIndex {
    id: IndicatorId,
    plus: DiPlus,
    minus: DiMinus,
}

impl DirectionalIndex {
    pub const KIND: &'static str = "DX";

    pub fn new(length: usize) -> Self {
        Self {
            id: IndicatorId::next(),
            plus: DiPlus::new(length),
            minus: DiMinus::new(length),
        }
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.plus.length()
    }

    pub fn set_length(&mut self, length: usize) {
        self.plus.set_length(length);
        self.minus.set_length(length);
        self.reset();
    }

    pub fn plus(&self) -> &DiPlus {
        &self.plus
    }

    pub fn minus(&self) -> &DiMinus {
        &self.minus
    }

    /// `100 × |plus − minus| / (plus + minus)`, or `0` when the sum is zero.
    pub fn index(plus: Decimal, minus: Decimal) -> Decimal {
        let sum = plus + minus;
        if sum.is_zero() {
            Decimal::ZERO
        } else {
            HUNDRED * (plus - minus).abs() / sum
        }
    }
}

impl Default for DirectionalIndex {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH)
    }
}

impl Indicator for DirectionalIndex {
    fn id(&self) -> IndicatorId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn is_formed(&self) -> bool {
        self.plus.is_formed() && self.minus.is_formed()
    }

    fn process(&mut self, input: &IndicatorValue) -> Result<IndicatorValue> {
        if input.is_empty() {
            return Ok(input.to_empty(self.id));
        }
        input.ohlc()?;
        let plus = self.plus.process(input)?;
        let minus = self.minus.process(input)?;

        let mut result =
            IndicatorValue::composite(self.id, input.time()).with_final(input.is_final());
        if let (Ok(p), Ok(m)) = (plus.to_decimal(), minus.to_decimal()) {
            result.set_scalar(Self::index(p, m))?;
        }
        result.add(self.plus.id(), plus)?;
        result.add(self.minus.id(), minus)?;
        Ok(result)
    }

    fn reset(&mut self) {
        self.plus.reset();
        self.minus.reset();
    }

    fn validate(&self) -> Result<()> {
        self.plus.validate()?;
        self.minus.validate()
    }
}

impl Persistable for DirectionalIndex {
    fn save(&self, storage: &mut SettingsStorage) {
        storage.set("Length", self.length());
    }

    fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
        let length = storage.get_length("Length")?;
        self.set_length(length);
        Ok(())
    }
}

impl fmt::Display for DirectionalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DX({})", self.length())
    }
}

// ============================================================
// AVERAGE DIRECTIONAL INDEX
// ============================================================

/// Average Directional Index (ADX)
///
/// Wilder smoothing of the [`DirectionalIndex`] percentage. The output is a
/// composite holding the DX value and the smoothed line, with the smoothed
/// value as its scalar.
#[derive(Debug, Clone)]
pub struct AverageDirectionalIndex {
    id: IndicatorId,
    dx: DirectionalIndex,
    smoother: WilderMovingAverage,
}

impl AverageDirectionalIndex {
    pub const KIND: &'static str = "ADX";

    pub fn new(length: usize) -> Self {
        Self {
            id: IndicatorId::next(),
            dx: DirectionalIndex::new(length),
            smoother: WilderMovingAverage::new(length),
        }
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.dx.length()
    }

    pub fn set_length(&mut self, length: usize) {
        self.dx.set_length(length);
        self.smoother.set_length(length);
        self.reset();
    }

    pub fn dx(&self) -> &DirectionalIndex {
        &self.dx
    }

    /// Id of the smoothed line inside the output composite.
    pub fn smoothed_line(&self) -> IndicatorId {
        self.smoother.id()
    }
}

impl Default for AverageDirectionalIndex {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH)
    }
}

impl Indicator for AverageDirectionalIndex {
    fn id(&self) -> IndicatorId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn is_formed(&self) -> bool {
        self.smoother.is_formed()
    }

    fn process(&mut self, input: &IndicatorValue) -> Result<IndicatorValue> {
        if input.is_empty() {
            return Ok(input.to_empty(self.id));
        }
        let was_formed = self.is_formed();
        let dx = self.dx.process(input)?;

        let mut result =
            IndicatorValue::composite(self.id, input.time()).with_final(input.is_final());
        if let Ok(index) = dx.to_decimal() {
            let smoothed = self
                .smoother
                .process(&input.with_scalar(self.id, index))?;
            if let Ok(v) = smoothed.to_decimal() {
                result.set_scalar(v)?;
            }
            result.add(self.smoother.id(), smoothed)?;
        }
        result.add(self.dx.id(), dx)?;

        if !was_formed && self.is_formed() {
            trace!(indicator = %self, "formed");
        }
        Ok(result)
    }

    fn reset(&mut self) {
        self.dx.reset();
        self.smoother.reset();
    }

    fn validate(&self) -> Result<()> {
        self.dx.validate()?;
        self.smoother.validate()
    }
}

impl Persistable for AverageDirectionalIndex {
    fn save(&self, storage: &mut SettingsStorage) {
        storage.set("Length", self.length());
    }

    fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
        let length = storage.get_length("Length")?;
        self.set_length(length);
        Ok(())
    }
}

impl fmt::Display for AverageDirectionalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ADX({})", self.length())
    }
}
