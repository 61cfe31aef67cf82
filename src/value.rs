//! Indicator values
//!
//! An [`IndicatorValue`] is the result of one computation step. It carries the
//! producing indicator's identity, the bar time, a finality flag mirroring the
//! bar lifecycle, and a [`Payload`].

use std::{
    collections::BTreeMap,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use rust_decimal::{prelude::ToPrimitive, Decimal};

use crate::{Candle, Error, Ohlcv, PriceSource, Result, Timestamp};

// ============================================================
// IDENTITY
// ============================================================

/// Process-unique identity of an indicator instance
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct IndicatorId(u64);

impl IndicatorId {
    /// Producer of raw bar input.
    pub const SOURCE: IndicatorId = IndicatorId(0);

    /// Allocates a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================
// PAYLOAD
// ============================================================

/// What a value holds
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Scalar(Decimal),
    Candle(Candle),
    Composite(CompositeValue),
}

impl Payload {
    fn type_name(&self) -> &'static str {
        match self {
            Payload::Empty => "empty",
            Payload::Scalar(_) => "scalar",
            Payload::Candle(_) => "candle",
            Payload::Composite(_) => "composite",
        }
    }
}

/// Child values of a composite indicator, keyed by producer.
///
/// A composite may also carry a scalar it derived from its children (for
/// example the directional index percentage).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeValue {
    inner: BTreeMap<IndicatorId, IndicatorValue>,
    scalar: Option<Decimal>,
}

impl CompositeValue {
    pub fn get(&self, producer: IndicatorId) -> Option<&IndicatorValue> {
        self.inner.get(&producer)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IndicatorId, &IndicatorValue)> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scalar.is_none() && self.inner.values().all(IndicatorValue::is_empty)
    }

    pub fn scalar(&self) -> Option<Decimal> {
        self.scalar
    }
}

// ============================================================
// FROM DECIMAL
// ============================================================

/// Numeric representations a scalar value can be extracted as
pub trait FromDecimal: Sized {
    const NAME: &'static str;

    fn from_decimal(value: Decimal) -> Option<Self>;
}

impl FromDecimal for Decimal {
    const NAME: &'static str = "Decimal";

    fn from_decimal(value: Decimal) -> Option<Self> {
        Some(value)
    }
}

impl FromDecimal for f64 {
    const NAME: &'static str = "f64";

    fn from_decimal(value: Decimal) -> Option<Self> {
        value.to_f64()
    }
}

impl FromDecimal for i64 {
    const NAME: &'static str = "i64";

    fn from_decimal(value: Decimal) -> Option<Self> {
        if value.fract().is_zero() {
            value.to_i64()
        } else {
            None
        }
    }
}

impl FromDecimal for u64 {
    const NAME: &'static str = "u64";

    fn from_decimal(value: Decimal) -> Option<Self> {
        if value.fract().is_zero() {
            value.to_u64()
        } else {
            None
        }
    }
}

// ============================================================
// INDICATOR VALUE
// ============================================================

/// Result of one computation step
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorValue {
    producer: IndicatorId,
    time: Timestamp,
    is_final: bool,
    payload: Payload,
}

impl IndicatorValue {
    pub fn scalar(producer: IndicatorId, time: Timestamp, value: Decimal, is_final: bool) -> Self {
        Self {
            producer,
            time,
            is_final,
            payload: Payload::Scalar(value),
        }
    }

    pub fn empty(producer: IndicatorId, time: Timestamp, is_final: bool) -> Self {
        Self {
            producer,
            time,
            is_final,
            payload: Payload::Empty,
        }
    }

    /// Composite with no children. Its base finality is `false` until set
    /// with [`with_final`](Self::with_final); once it holds a non-empty child,
    /// finality is derived from the children.
    pub fn composite(producer: IndicatorId, time: Timestamp) -> Self {
        Self {
            producer,
            time,
            is_final: false,
            payload: Payload::Composite(CompositeValue::default()),
        }
    }

    /// Wraps a bar as raw input. Final iff the bar is finished.
    pub fn from_candle<T: Ohlcv + ?Sized>(bar: &T) -> Self {
        let candle = Candle::from_ohlcv(bar);
        Self {
            producer: IndicatorId::SOURCE,
            time: candle.open_time,
            is_final: candle.state.is_finished(),
            payload: Payload::Candle(candle),
        }
    }

    #[must_use]
    pub fn with_final(mut self, is_final: bool) -> Self {
        self.is_final = is_final;
        self
    }

    /// New scalar value sharing this value's time and finality.
    pub fn with_scalar(&self, producer: IndicatorId, value: Decimal) -> Self {
        Self::scalar(producer, self.time, value, self.is_final())
    }

    /// Empty value sharing this value's time and finality.
    pub fn to_empty(&self, producer: IndicatorId) -> Self {
        Self::empty(producer, self.time, self.is_final())
    }

    #[inline]
    pub fn producer(&self) -> IndicatorId {
        self.producer
    }

    #[inline]
    pub fn time(&self) -> Timestamp {
        self.time
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// For composites: true iff every non-empty child is final.
    pub fn is_final(&self) -> bool {
        match &self.payload {
            Payload::Composite(c) => {
                let mut filled = c.inner.values().filter(|v| !v.is_empty()).peekable();
                if filled.peek().is_none() {
                    self.is_final
                } else {
                    filled.all(IndicatorValue::is_final)
                }
            }
            _ => self.is_final,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.payload {
            Payload::Empty => true,
            Payload::Scalar(_) | Payload::Candle(_) => false,
            Payload::Composite(c) => c.is_empty(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.payload, Payload::Composite(_))
    }

    /// Inserts or overwrites a child entry.
    pub fn add(&mut self, producer: IndicatorId, value: IndicatorValue) -> Result<()> {
        let from = self.payload.type_name();
        match &mut self.payload {
            Payload::Composite(c) => {
                c.inner.insert(producer, value);
                Ok(())
            }
            _ => Err(Error::Conversion {
                from,
                to: "composite",
            }),
        }
    }

    /// Attaches the scalar a composite derived from its children.
    pub fn set_scalar(&mut self, value: Decimal) -> Result<()> {
        let from = self.payload.type_name();
        match &mut self.payload {
            Payload::Composite(c) => {
                c.scalar = Some(value);
                Ok(())
            }
            _ => Err(Error::Conversion {
                from,
                to: "composite",
            }),
        }
    }

    /// Scalar payload as a decimal.
    ///
    /// A candle converts to its close, a composite to its derived scalar.
    pub fn to_decimal(&self) -> Result<Decimal> {
        match &self.payload {
            Payload::Scalar(v) => Ok(*v),
            Payload::Candle(c) => Ok(c.close),
            Payload::Composite(CompositeValue {
                scalar: Some(v), ..
            }) => Ok(*v),
            other => Err(Error::Conversion {
                from: other.type_name(),
                to: "Decimal",
            }),
        }
    }

    /// Scalar payload in the requested numeric representation.
    pub fn get<T: FromDecimal>(&self) -> Result<T> {
        let value = self.to_decimal()?;
        T::from_decimal(value).ok_or(Error::Conversion {
            from: self.payload.type_name(),
            to: T::NAME,
        })
    }

    pub fn child(&self, producer: IndicatorId) -> Result<&IndicatorValue> {
        match &self.payload {
            Payload::Composite(c) => c.get(producer).ok_or(Error::MissingChild(producer)),
            other => Err(Error::Conversion {
                from: other.type_name(),
                to: "composite",
            }),
        }
    }

    pub fn children(&self) -> impl Iterator<Item = (&IndicatorId, &IndicatorValue)> {
        let composite = match &self.payload {
            Payload::Composite(c) => Some(c),
            _ => None,
        };
        composite.into_iter().flat_map(CompositeValue::iter)
    }

    pub fn candle(&self) -> Result<&Candle> {
        match &self.payload {
            Payload::Candle(c) => Ok(c),
            other => Err(Error::Conversion {
                from: other.type_name(),
                to: "candle",
            }),
        }
    }

    /// Open, high, low and close of the originating bar.
    ///
    /// A scalar stands in for all four prices.
    pub fn ohlc(&self) -> Result<(Decimal, Decimal, Decimal, Decimal)> {
        match &self.payload {
            Payload::Candle(c) => Ok((c.open, c.high, c.low, c.close)),
            Payload::Scalar(v) => Ok((*v, *v, *v, *v)),
            other => Err(Error::Conversion {
                from: other.type_name(),
                to: "ohlc",
            }),
        }
    }

    /// Price selected by `source`, or the scalar itself.
    pub fn price(&self, source: PriceSource) -> Result<Decimal> {
        match &self.payload {
            Payload::Candle(c) => Ok(source.extract(c)),
            _ => self.to_decimal(),
        }
    }
}

// ============================================================
// TESTS
// ============================================================
