//! User-assembled composite indicator

use std::fmt;

use tracing::trace;

use crate::{
    indicator::{load_entire, save_entire, Indicator},
    storage::{Persistable, SettingsStorage},
    value::{IndicatorId, IndicatorValue},
    Error, Result,
};

/// How a [`ComplexIndicator`] routes input to its children
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComplexMode {
    /// Every child receives the same input.
    #[default]
    Parallel,
    /// Each child consumes the previous child's output.
    Sequence,
}

impl ComplexMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ComplexMode::Parallel => "Parallel",
            ComplexMode::Sequence => "Sequence",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Parallel" => Some(ComplexMode::Parallel),
            "Sequence" => Some(ComplexMode::Sequence),
            _ => None,
        }
    }
}

/// Ordered set of child indicators producing one composite value per bar
///
/// The output holds one entry per child keyed by the child's id. In
/// [`ComplexMode::Sequence`] the last child's scalar, when present, is also
/// attached as the composite's scalar.
///
/// # Example
///
/// ```rust
/// use candleflow::prelude::*;
/// use rust_decimal_macros::dec;
///
/// let mut smoothed_high = ComplexIndicator::new("smoothed high")
///     .with_mode(ComplexMode::Sequence)
///     .with(Highest::new(2))
///     .with(SimpleMovingAverage::new(2))
///     .build()
///     .unwrap();
///
/// for high in [dec!(10), dec!(12), dec!(11)] {
///     smoothed_high
///         .process_candle(&Candle::new(high, high, high, high))
///         .unwrap();
/// }
/// assert!(smoothed_high.is_formed());
/// ```
#[derive(Debug, Clone)]
pub struct ComplexIndicator {
    id: IndicatorId,
    name: String,
    mode: ComplexMode,
    inner: Vec<Box<dyn Indicator>>,
    formed: bool,
}

impl ComplexIndicator {
    pub const KIND: &'static str = "Complex";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: IndicatorId::next(),
            name: name.into(),
            mode: ComplexMode::default(),
            inner: Vec::new(),
            formed: false,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ComplexMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with(mut self, child: impl Indicator + 'static) -> Self {
        self.push(Box::new(child));
        self
    }

    /// Validates and returns the assembled indicator.
    pub fn build(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn push(&mut self, child: Box<dyn Indicator>) {
        self.inner.push(child);
        self.reset();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ComplexMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ComplexMode) {
        self.mode = mode;
        self.reset();
    }

    pub fn inner(&self) -> &[Box<dyn Indicator>] {
        &self.inner
    }

    fn run(
        id: IndicatorId,
        mode: ComplexMode,
        inner: &mut [Box<dyn Indicator>],
        input: &IndicatorValue,
    ) -> Result<IndicatorValue> {
        let mut result = IndicatorValue::composite(id, input.time()).with_final(input.is_final());
        match mode {
            ComplexMode::Parallel => {
                for child in inner.iter_mut() {
                    let value = child.process(input)?;
                    result.add(child.id(), value)?;
                }
            }
            ComplexMode::Sequence => {
                let mut current = input.clone();
                for child in inner.iter_mut() {
                    current = child.process(&current)?;
                    result.add(child.id(), current.clone())?;
                }
                if !inner.is_empty() {
                    if let Ok(v) = current.to_decimal() {
                        result.set_scalar(v)?;
                    }
                }
            }
        }
        Ok(result)
    }
}

impl Default for ComplexIndicator {
    fn default() -> Self {
        Self::new("")
    }
}

impl Indicator for ComplexIndicator {
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
        // A later child may reject what an earlier one already committed, so
        // finished input runs on copies that replace the children on success.
        let result = if input.is_final() && self.inner.len() > 1 {
            let mut staged = self.inner.clone();
            let result = Self::run(self.id, self.mode, &mut staged, input)?;
            self.inner = staged;
            result
        } else {
            Self::run(self.id, self.mode, &mut self.inner, input)?
        };

        if !self.formed && !self.inner.is_empty() && self.inner.iter().all(|c| c.is_formed()) {
            self.formed = true;
            trace!(indicator = %self, time = input.time(), "formed");
        }
        Ok(result)
    }

    fn reset(&mut self) {
        for child in &mut self.inner {
            child.reset();
        }
        self.formed = false;
    }

    fn validate(&self) -> Result<()> {
        if self.inner.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "{} has no inner indicators",
                Self::KIND
            )));
        }
        self.inner.iter().try_for_each(|c| c.validate())
    }
}

impl Persistable for ComplexIndicator {
    fn save(&self, storage: &mut SettingsStorage) {
        storage.set("Name", self.name.as_str());
        storage.set("Mode", self.mode.as_str());
        let inner: Vec<SettingsStorage> = self
            .inner
            .iter()
            .map(|c| save_entire(c.as_ref()))
            .collect();
        storage.set("Inner", inner);
    }

    fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
        let name = storage.get_text("Name")?.to_string();
        let mode = storage.get_text("Mode")?;
        let mode = ComplexMode::parse(mode).ok_or_else(|| Error::SettingType {
            key: "Mode".to_string(),
            expected: "complex mode",
        })?;
        let inner = storage
            .get_list("Inner")?
            .iter()
            .map(load_entire)
            .collect::<Result<Vec<_>>>()?;

        self.name = name;
        self.mode = mode;
        self.inner = inner;
        self.reset();
        Ok(())
    }
}

impl fmt::Display for ComplexIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.name.is_empty() {
            return f.write_str(&self.name);
        }
        f.write_str("[")?;
        for (i, child) in self.inner.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{child}")?;
        }
        f.write_str("]")
    }
}
