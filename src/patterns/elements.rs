//! Single-bar pattern elements
//!
//! Ratio thresholds are fractions of the bar range (`high − low`). A bar with
//! zero range has no defined ratios and only matches [`Doji`].

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{
    check_ratio,
    storage::{Persistable, SettingsStorage},
    Error, Ohlcv, OhlcvExt, Result,
};

use super::CandlePattern;

/// Body at most this share of the range is doji-like
const DOJI_RATIO: Decimal = dec!(0.1);
/// Body at most this share of the range is short
const BODY_SHORT_RATIO: Decimal = dec!(0.3);
/// Shadow at most this share of the range is very short
const SHADOW_VERYSHORT_RATIO: Decimal = dec!(0.1);
/// Shadow at least this share of the range is long
const SHADOW_LONG_RATIO: Decimal = dec!(0.2);
/// Shadow tolerance of a marubozu
const MARUBOZU_SHADOW_RATIO: Decimal = dec!(0.05);
/// Hammer lower shadow must be at least this many bodies
const SHADOW_FACTOR: Decimal = dec!(2);

fn check_positive(field: &'static str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(Error::InvalidConfig(format!("{field} = {value} must be > 0")));
    }
    Ok(())
}

macro_rules! single_bar_pattern {
    ($($ty:ident => $kind:literal),* $(,)?) => {
        $(
            impl $ty {
                pub const KIND: &'static str = $kind;
            }

            impl CandlePattern for $ty {
                fn kind(&self) -> &'static str {
                    Self::KIND
                }

                fn name(&self) -> &str {
                    $kind
                }

                fn candles_count(&self) -> usize {
                    1
                }

                fn validate(&self) -> Result<()> {
                    self.check()
                }

                fn reset(&mut self) {}

                fn recognize(&mut self, candle: &dyn Ohlcv) -> bool {
                    self.matches(candle)
                }
            }
        )*
    };
}

single_bar_pattern! {
    WhiteCandle => "WhiteCandle",
    BlackCandle => "BlackCandle",
    Doji => "Doji",
    Hammer => "Hammer",
    ShootingStar => "ShootingStar",
    Marubozu => "Marubozu",
    SpinningTop => "SpinningTop",
}

// ============================================================
// WHITE / BLACK CANDLE
// ============================================================

/// Close above open, with a body of at least `min_body_ratio` of the range
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WhiteCandle {
    pub min_body_ratio: Decimal,
}

impl WhiteCandle {
    pub fn matches(&self, bar: &dyn Ohlcv) -> bool {
        bar.is_bullish() && bar.body_ratio().unwrap_or_default() >= self.min_body_ratio
    }

    fn check(&self) -> Result<()> {
        check_ratio("min_body_ratio", self.min_body_ratio)
    }
}

impl Persistable for WhiteCandle {
    fn save(&self, storage: &mut SettingsStorage) {
        storage.set("MinBodyRatio", self.min_body_ratio);
    }

    fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
        self.min_body_ratio = storage.get_decimal("MinBodyRatio")?;
        Ok(())
    }
}

/// Close below open, with a body of at least `min_body_ratio` of the range
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlackCandle {
    pub min_body_ratio: Decimal,
}

impl BlackCandle {
    pub fn matches(&self, bar: &dyn Ohlcv) -> bool {
        bar.is_bearish() && bar.body_ratio().unwrap_or_default() >= self.min_body_ratio
    }

    fn check(&self) -> Result<()> {
        check_ratio("min_body_ratio", self.min_body_ratio)
    }
}

impl Persistable for BlackCandle {
    fn save(&self, storage: &mut SettingsStorage) {
        storage.set("MinBodyRatio", self.min_body_ratio);
    }

    fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
        self.min_body_ratio = storage.get_decimal("MinBodyRatio")?;
        Ok(())
    }
}

// ============================================================
// DOJI
// ============================================================

/// Open and close (nearly) equal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Doji {
    pub max_body_ratio: Decimal,
}

impl Doji {
    pub fn new(max_body_ratio: Decimal) -> Self {
        Self { max_body_ratio }
    }

    pub fn matches(&self, bar: &dyn Ohlcv) -> bool {
        // A zero body is a doji under any threshold
        if bar.body().is_zero() {
            return true;
        }
        bar.body_ratio()
            .is_some_and(|ratio| ratio <= self.max_body_ratio)
    }

    fn check(&self) -> Result<()> {
        check_ratio("max_body_ratio", self.max_body_ratio)
    }
}

impl Default for Doji {
    fn default() -> Self {
        Self::new(DOJI_RATIO)
    }
}

impl Persistable for Doji {
    fn save(&self, storage: &mut SettingsStorage) {
        storage.set("MaxBodyRatio", self.max_body_ratio);
    }

    fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
        self.max_body_ratio = storage.get_decimal("MaxBodyRatio")?;
        Ok(())
    }
}

// ============================================================
// HAMMER / SHOOTING STAR
// ============================================================

/// Short body at the top of the range with a long lower shadow
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hammer {
    pub max_body_ratio: Decimal,
    /// Lower shadow must be at least this many bodies long
    pub shadow_factor: Decimal,
    pub max_upper_shadow_ratio: Decimal,
}

impl Default for Hammer {
    fn default() -> Self {
        Self {
            max_body_ratio: BODY_SHORT_RATIO,
            shadow_factor: SHADOW_FACTOR,
            max_upper_shadow_ratio: SHADOW_VERYSHORT_RATIO,
        }
    }
}

impl Hammer {
    pub fn matches(&self, bar: &dyn Ohlcv) -> bool {
        let (Some(body), Some(upper)) = (bar.body_ratio(), bar.upper_shadow_ratio()) else {
            return false;
        };
        let lower = bar.lower_shadow();
        body <= self.max_body_ratio
            && upper <= self.max_upper_shadow_ratio
            && lower > Decimal::ZERO
            && lower >= bar.body() * self.shadow_factor
    }

    fn check(&self) -> Result<()> {
        check_ratio("max_body_ratio", self.max_body_ratio)?;
        check_ratio("max_upper_shadow_ratio", self.max_upper_shadow_ratio)?;
        check_positive("shadow_factor", self.shadow_factor)
    }
}

impl Persistable for Hammer {
    fn save(&self, storage: &mut SettingsStorage) {
        storage.set("MaxBodyRatio", self.max_body_ratio);
        storage.set("ShadowFactor", self.shadow_factor);
        storage.set("MaxUpperShadowRatio", self.max_upper_shadow_ratio);
    }

    fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
        let max_body_ratio = storage.get_decimal("MaxBodyRatio")?;
        let shadow_factor = storage.get_decimal("ShadowFactor")?;
        let max_upper_shadow_ratio = storage.get_decimal("MaxUpperShadowRatio")?;
        *self = Self {
            max_body_ratio,
            shadow_factor,
            max_upper_shadow_ratio,
        };
        Ok(())
    }
}

/// Short body at the bottom of the range with a long upper shadow
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShootingStar {
    pub max_body_ratio: Decimal,
    /// Upper shadow must be at least this many bodies long
    pub shadow_factor: Decimal,
    pub max_lower_shadow_ratio: Decimal,
}

impl Default for ShootingStar {
    fn default() -> Self {
        Self {
            max_body_ratio: BODY_SHORT_RATIO,
            shadow_factor: SHADOW_FACTOR,
            max_lower_shadow_ratio: SHADOW_VERYSHORT_RATIO,
        }
    }
}

impl ShootingStar {
    pub fn matches(&self, bar: &dyn Ohlcv) -> bool {
        let (Some(body), Some(lower)) = (bar.body_ratio(), bar.lower_shadow_ratio()) else {
            return false;
        };
        let upper = bar.upper_shadow();
        body <= self.max_body_ratio
            && lower <= self.max_lower_shadow_ratio
            && upper > Decimal::ZERO
            && upper >= bar.body() * self.shadow_factor
    }

    fn check(&self) -> Result<()> {
        check_ratio("max_body_ratio", self.max_body_ratio)?;
        check_ratio("max_lower_shadow_ratio", self.max_lower_shadow_ratio)?;
        check_positive("shadow_factor", self.shadow_factor)
    }
}

impl Persistable for ShootingStar {
    fn save(&self, storage: &mut SettingsStorage) {
        storage.set("MaxBodyRatio", self.max_body_ratio);
        storage.set("ShadowFactor", self.shadow_factor);
        storage.set("MaxLowerShadowRatio", self.max_lower_shadow_ratio);
    }

    fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
        let max_body_ratio = storage.get_decimal("MaxBodyRatio")?;
        let shadow_factor = storage.get_decimal("ShadowFactor")?;
        let max_lower_shadow_ratio = storage.get_decimal("MaxLowerShadowRatio")?;
        *self = Self {
            max_body_ratio,
            shadow_factor,
            max_lower_shadow_ratio,
        };
        Ok(())
    }
}

// ============================================================
// MARUBOZU / SPINNING TOP
// ============================================================

/// Full-range body with (almost) no shadows, either color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marubozu {
    pub max_shadow_ratio: Decimal,
}

impl Default for Marubozu {
    fn default() -> Self {
        Self {
            max_shadow_ratio: MARUBOZU_SHADOW_RATIO,
        }
    }
}

impl Marubozu {
    pub fn matches(&self, bar: &dyn Ohlcv) -> bool {
        let (Some(upper), Some(lower)) = (bar.upper_shadow_ratio(), bar.lower_shadow_ratio()) else {
            return false;
        };
        !bar.body().is_zero() && upper <= self.max_shadow_ratio && lower <= self.max_shadow_ratio
    }

    fn check(&self) -> Result<()> {
        check_ratio("max_shadow_ratio", self.max_shadow_ratio)
    }
}

impl Persistable for Marubozu {
    fn save(&self, storage: &mut SettingsStorage) {
        storage.set("MaxShadowRatio", self.max_shadow_ratio);
    }

    fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
        self.max_shadow_ratio = storage.get_decimal("MaxShadowRatio")?;
        Ok(())
    }
}

/// Small non-zero body with long shadows on both sides
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinningTop {
    pub max_body_ratio: Decimal,
    pub min_shadow_ratio: Decimal,
}

impl Default for SpinningTop {
    fn default() -> Self {
        Self {
            max_body_ratio: BODY_SHORT_RATIO,
            min_shadow_ratio: SHADOW_LONG_RATIO,
        }
    }
}

impl SpinningTop {
    pub fn matches(&self, bar: &dyn Ohlcv) -> bool {
        let (Some(body), Some(upper), Some(lower)) = (
            bar.body_ratio(),
            bar.upper_shadow_ratio(),
            bar.lower_shadow_ratio(),
        ) else {
            return false;
        };
        !body.is_zero()
            && body <= self.max_body_ratio
            && upper >= self.min_shadow_ratio
            && lower >= self.min_shadow_ratio
    }

    fn check(&self) -> Result<()> {
        check_ratio("max_body_ratio", self.max_body_ratio)?;
        check_ratio("min_shadow_ratio", self.min_shadow_ratio)
    }
}

impl Persistable for SpinningTop {
    fn save(&self, storage: &mut SettingsStorage) {
        storage.set("MaxBodyRatio", self.max_body_ratio);
        storage.set("MinShadowRatio", self.min_shadow_ratio);
    }

    fn load(&mut self, storage: &SettingsStorage) -> Result<()> {
        let max_body_ratio = storage.get_decimal("MaxBodyRatio")?;
        let min_shadow_ratio = storage.get_decimal("MinShadowRatio")?;
        *self = Self {
            max_body_ratio,
            min_shadow_ratio,
        };
        Ok(())
    }
}

// ============================================================
// TESTS
// ============================================================
