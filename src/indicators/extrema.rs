//! Rolling extrema over the last `length` values

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

macro_rules! rolling_extremum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal, $source:expr, $prefer:expr
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            id: IndicatorId,
            length: usize,
            source: PriceSource,
            window: Window,
            formed: bool,
        }

        impl $name {
            pub const KIND: &'static str = $kind;

            pub fn new(length: usize) -> Self {
                Self {
                    id: IndicatorId::next(),
                    length,
                    source: $source,
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
                self.formed
            }

            fn process(&mut self, input: &IndicatorValue) -> Result<IndicatorValue> {
                if input.is_empty() {
                    return Ok(input.to_empty(self.id));
                }
                let price = input.price(self.source)?;
                let extreme = self.window.extreme_with(price, $prefer);

                if input.is_final() {
                    self.window.push(price);
                    self.formed |= self.window.is_full();
                }

                Ok(match extreme {
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

        impl Persistable for $name {
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

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}, {})", $kind, self.length, self.source)
            }
        }
    };
}

rolling_extremum! {
    /// Highest value over the window, reading highs by default
    Highest, "Highest", PriceSource::High, |new: Decimal, current: Decimal| new > current
}

rolling_extremum! {
    /// Lowest value over the window, reading lows by default
    Lowest, "Lowest", PriceSource::Low, |new: Decimal, current: Decimal| new < current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;
    use rust_decimal_macros::dec;

    fn bar(high: Decimal, low: Decimal) -> Candle {
        Candle::new(low, high, low, high)
    }

    #[test]
    fn test_highest_tracks_window() {
        let mut highest = Highest::new(3);
        let highs = [dec!(10), dec!(12), dec!(15), dec!(11), dec!(9), dec!(8)];
        let out: Vec<_> = highs
            .iter()
            .map(|h| {
                highest
                    .process_candle(&bar(*h, dec!(1)))
                    .unwrap()
                    .to_decimal()
                    .ok()
            })
            .collect();
        assert_eq!(
            out,
            vec![None, None, Some(dec!(15)), Some(dec!(15)), Some(dec!(15)), Some(dec!(11))]
        );
        assert!(highest.is_formed());
    }

    #[test]
    fn test_lowest_tracks_window() {
        let mut lowest = Lowest::new(2);
        let lows = [dec!(8), dec!(9), dec!(7), dec!(10)];
        let out: Vec<_> = lows
            .iter()
            .map(|l| {
                lowest
                    .process_candle(&bar(dec!(20), *l))
                    .unwrap()
                    .to_decimal()
                    .ok()
            })
            .collect();
        assert_eq!(out, vec![None, Some(dec!(8)), Some(dec!(7)), Some(dec!(7))]);
    }

    #[test]
    fn test_provisional_extreme_not_committed() {
        let mut highest = Highest::new(2);
        highest.process_candle(&bar(dec!(10), dec!(1))).unwrap();

        let spike = highest
            .process_candle(&bar(dec!(99), dec!(1)).active())
            .unwrap();
        assert_eq!(spike.to_decimal().unwrap(), dec!(99));
        assert!(!highest.is_formed());

        let settled = highest.process_candle(&bar(dec!(11), dec!(1))).unwrap();
        assert_eq!(settled.to_decimal().unwrap(), dec!(11));
        assert!(highest.is_formed());
    }

    #[test]
    fn test_default_sources() {
        assert_eq!(Highest::default().source(), PriceSource::High);
        assert_eq!(Lowest::default().source(), PriceSource::Low);
        assert_eq!(Highest::new(5).to_string(), "Highest(5, High)");
    }

    #[test]
    fn test_scalar_input() {
        let mut lowest = Lowest::new(1);
        let out = lowest
            .process(&IndicatorValue::scalar(IndicatorId::next(), 3, dec!(4), true))
            .unwrap();
        assert_eq!(out.to_decimal().unwrap(), dec!(4));
        assert_eq!(out.producer(), lowest.id());
    }

    #[test]
    fn test_set_length_resets() {
        let mut highest = Highest::new(1);
        highest.process_candle(&bar(dec!(3), dec!(1))).unwrap();
        assert!(highest.is_formed());
        highest.set_length(4);
        assert!(!highest.is_formed());
        assert!(highest.validate().is_ok());
        highest.set_length(0);
        assert!(highest.validate().unwrap_err().is_configuration());
    }
}
