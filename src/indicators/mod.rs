//! Built-in indicators
//!
//! All arithmetic is exact decimal. Division by a zero denominator is
//! guarded and never produces an error.

mod chande_kroll;
mod complex;
mod directional;
mod extrema;
mod moving_average;

pub use chande_kroll::ChandeKrollStop;
pub use complex::{ComplexIndicator, ComplexMode};
pub use directional::{
    AverageDirectionalIndex, AverageTrueRange, DiMinus, DiPlus, DirectionalIndex,
};
pub use extrema::{Highest, Lowest};
pub use moving_average::{ExponentialMovingAverage, SimpleMovingAverage, WilderMovingAverage};
