use tracing::trace;

use crate::{
    storage::{Persistable, SettingsStorage},
    Error, Ohlcv, OhlcvExt, Result,
};

use super::{load_entire, save_entire, CandlePattern};

/// Ordered chain of elements matched on consecutive bars
///
/// The cursor points at the element the next bar is checked against. A
/// finished bar that matches advances it; completing the chain reports a
/// match and rewinds to the first element. A finished bar that fails rewinds
/// without being re-checked against the first element. Still-forming bars
/// never move the cursor; they report a tentative match only when they would
/// complete the chain.
///
/// # Example
///
/// ```rust
/// use candleflow::prelude::*;
/// use rust_decimal_macros::dec;
///
/// let mut pattern = ComplexCandlePattern::new("black then white")
///     .with(BlackCandle::default())
///     .with(WhiteCandle::default());
///
/// let black = Candle::new(dec!(11), dec!(12), dec!(9), dec!(10));
/// let white = Candle::new(dec!(10), dec!(12), dec!(9), dec!(11));
///
/// assert!(!pattern.recognize(&black));
/// assert_eq!(pattern.cursor(), 1);
/// assert!(pattern.recognize(&white));
/// assert_eq!(pattern.cursor(), 0);
/// ```
#[derive(Debug, Default)]
pub struct ComplexCandlePattern {
    name: String,
    inner: Vec<Box<dyn CandlePattern>>,
    cursor: usize,
}

impl ComplexCandlePattern {
    pub const KIND: &'static str = "Complex";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Vec::new(),
            cursor: 0,
        }
    }

    #[must_use]
    pub fn with(mut self, element: impl CandlePattern + 'static) -> Self {
        self.push(Box::new(element));
        self
    }

    pub fn push(&mut self, element: Box<dyn CandlePattern>) {
        self.inner.push(element);
        self.cursor = 0;
    }

    pub fn inner(&self) -> &[Box<dyn CandlePattern>] {
        &self.inner
    }

    /// Index of the element the next bar is checked against.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Restores a previously observed cursor.
    pub fn restore_cursor(&mut self, cursor: usize) -> Result<()> {
        if cursor >= self.inner.len().max(1) {
            return Err(Error::InvalidConfig(format!(
                "cursor {cursor} outside {} elements",
                self.inner.len()
            )));
        }
        self.cursor = cursor;
        Ok(())
    }
}

impl CandlePattern for ComplexCandlePattern {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn candles_count(&self) -> usize {
        self.inner.len()
    }

    fn validate(&self) -> Result<()> {
        if self.inner.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "pattern `{}` has no elements",
                self.name
            )));
        }
        self.inner.iter().try_for_each(|e| e.validate())
    }

    fn reset(&mut self) {
        self.cursor = 0;
        for element in &mut self.inner {
            element.reset();
        }
    }

    fn recognize(&mut self, candle: &dyn Ohlcv) -> bool {
        let len = self.inner.len();
        let Some(element) = self.inner.get_mut(self.cursor) else {
            return false;
        };
        let finished = candle.is_finished();

        if element.recognize(candle) {
            if !finished {
                return self.cursor + 1 == len;
            }
            self.cursor += 1;
            if self.cursor < len {
                return false;
            }
            self.cursor = 0;
            trace!(pattern = %self.name, time = candle.open_time(), "recognized");
            return true;
        }

        if finished {
            self.cursor = 0;
        }
        false
    }
}

impl Persistable for ComplexCandlePattern {
    fn save(&self, storage: &mut SettingsStorage) {
        storage.set("Name", self.name.as_str());
        let inner: Vec<SettingsStorage> = self
            .inner
            .iter()
            .map(|e| save_entire(e.as_ref()))
            .collect();
        storage.set("Inner", inner);
    }

    fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
        let name = storage.get_text("Name")?.to_string();
        let inner = storage
            .get_list("Inner")?
            .iter()
            .map(load_entire)
            .collect::<Result<Vec<_>>>()?;
        self.name = name;
        self.inner = inner;
        self.cursor = 0;
        Ok(())
    }
}
