//! Batch analytics across instruments
//!
//! Each instrument is processed sequentially by a single worker with its own
//! indicator or pattern; instruments are spread across the rayon pool.
//! Results are accumulated per worker and merged once every worker is done.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use rayon::prelude::*;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::{
    indicator::Indicator, patterns::CandlePattern, value::IndicatorValue, Candle, Error, Ohlcv,
    OhlcvExt, Result, Timestamp,
};

// ============================================================
// CONFIGURATION
// ============================================================

/// Cooperative cancellation flag shared between the caller and workers
///
/// Workers check it between bars, never in the middle of one.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Harness options
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    finished_only: bool,
    cancel: Option<CancellationToken>,
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip bars that are still forming.
    #[must_use]
    pub fn finished_only(mut self, finished_only: bool) -> Self {
        self.finished_only = finished_only;
        self
    }

    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    fn skips<T: Ohlcv + ?Sized>(&self, bar: &T) -> bool {
        self.finished_only && !bar.is_finished()
    }
}

/// Failure of one instrument
#[derive(Debug, Clone)]
pub struct ScanError {
    pub symbol: String,
    pub error: Error,
}

// ============================================================
// BIGGEST CANDLES
// ============================================================

/// Winning bar of one instrument
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentCandle {
    pub symbol: String,
    pub candle: Candle,
}

/// Chart-ready columns, one row per instrument
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub label: &'static str,
    pub times: Vec<Timestamp>,
    pub middle_prices: Vec<Decimal>,
    pub values: Vec<Decimal>,
}

/// Largest bar per instrument by range and by volume, sorted by symbol
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BiggestCandles {
    pub by_range: Vec<InstrumentCandle>,
    pub by_volume: Vec<InstrumentCandle>,
}

impl BiggestCandles {
    pub fn is_empty(&self) -> bool {
        self.by_range.is_empty() && self.by_volume.is_empty()
    }

    /// Open times, middle prices and ranges of the largest-range bars.
    pub fn price_series(&self) -> Option<ChartSeries> {
        series("prices", &self.by_range, |c| c.range())
    }

    /// Open times, middle prices and volumes of the largest-volume bars.
    pub fn volume_series(&self) -> Option<ChartSeries> {
        series("volumes", &self.by_volume, |c| c.volume)
    }
}

fn series(
    label: &'static str,
    rows: &[InstrumentCandle],
    value: impl Fn(&Candle) -> Decimal,
) -> Option<ChartSeries> {
    if rows.is_empty() {
        return None;
    }
    Some(ChartSeries {
        label,
        times: rows.iter().map(|r| r.candle.open_time).collect(),
        middle_prices: rows.iter().map(|r| r.candle.middle_price()).collect(),
        values: rows.iter().map(|r| value(&r.candle)).collect(),
    })
}

/// Per-worker accumulator
#[derive(Default)]
struct Local {
    instruments: usize,
    found: BiggestCandles,
}

/// Finds, per instrument, the bar with the largest range and the bar with
/// the largest volume. On ties the earliest bar wins. Instruments without
/// bars contribute nothing.
pub fn biggest_candles<'a, T, I>(instruments: I, config: &ScanConfig) -> BiggestCandles
where
    T: Ohlcv + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let locals: Vec<Local> = instruments
        .into_par_iter()
        .fold(Local::default, |mut local, (symbol, bars)| {
            local.instruments += 1;
            debug!(symbol, bars = bars.len(), "scanning for biggest candles");

            let mut by_range: Option<&T> = None;
            let mut by_volume: Option<&T> = None;
            for bar in bars {
                if config.is_cancelled() {
                    debug!(symbol, "cancelled");
                    return local;
                }
                if config.skips(bar) {
                    continue;
                }
                if by_range.map_or(true, |best| bar.range() > best.range()) {
                    by_range = Some(bar);
                }
                if by_volume.map_or(true, |best| bar.volume() > best.volume()) {
                    by_volume = Some(bar);
                }
            }

            let entry = |bar: &T| InstrumentCandle {
                symbol: symbol.to_string(),
                candle: Candle::from_ohlcv(bar),
            };
            local.found.by_range.extend(by_range.map(entry));
            local.found.by_volume.extend(by_volume.map(entry));
            local
        })
        .collect();

    let mut instruments = 0;
    let mut merged = BiggestCandles::default();
    for local in locals {
        instruments += local.instruments;
        merged.by_range.extend(local.found.by_range);
        merged.by_volume.extend(local.found.by_volume);
    }

    if instruments == 0 {
        warn!("No instruments.");
        return merged;
    }

    merged.by_range.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    merged.by_volume.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    merged
}

// ============================================================
// INDICATORS & PATTERNS
// ============================================================

/// Every output of one indicator over one instrument, in bar order
#[derive(Debug, Clone)]
pub struct IndicatorRun {
    pub symbol: String,
    pub values: Vec<IndicatorValue>,
    pub formed: bool,
}

/// Open times of the finished bars on which a pattern completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternHits {
    pub symbol: String,
    pub hits: Vec<Timestamp>,
}

/// Feeds every instrument's bars, in order, to a fresh indicator from
/// `factory`.
pub fn process_parallel<'a, T, I, F>(
    instruments: I,
    factory: F,
    config: &ScanConfig,
) -> (Vec<IndicatorRun>, Vec<ScanError>)
where
    T: Ohlcv + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
    F: Fn() -> Result<Box<dyn Indicator>> + Sync,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            run_indicator(symbol, bars, &factory, config).map_err(|error| ScanError {
                symbol: symbol.to_string(),
                error,
            })
        })
        .collect();

    split(results)
}

fn run_indicator<T, F>(
    symbol: &str,
    bars: &[T],
    factory: &F,
    config: &ScanConfig,
) -> Result<IndicatorRun>
where
    T: Ohlcv,
    F: Fn() -> Result<Box<dyn Indicator>>,
{
    let mut indicator = factory()?;
    if let Err(error) = indicator.validate() {
        debug!(symbol, %error, "indicator rejected");
        return Err(error);
    }
    debug!(symbol, bars = bars.len(), indicator = %indicator, "processing");

    let mut values = Vec::with_capacity(bars.len());
    for bar in bars {
        if config.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if config.skips(bar) {
            continue;
        }
        values.push(indicator.process_candle(bar)?);
    }

    Ok(IndicatorRun {
        symbol: symbol.to_string(),
        values,
        formed: indicator.is_formed(),
    })
}

/// Runs a fresh pattern from `factory` over every instrument.
///
/// Tentative matches on still-forming bars are not reported.
pub fn recognize_parallel<'a, T, I, F>(
    instruments: I,
    factory: F,
    config: &ScanConfig,
) -> (Vec<PatternHits>, Vec<ScanError>)
where
    T: Ohlcv + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
    F: Fn() -> Result<Box<dyn CandlePattern>> + Sync,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            run_pattern(symbol, bars, &factory, config).map_err(|error| ScanError {
                symbol: symbol.to_string(),
                error,
            })
        })
        .collect();

    split(results)
}

fn run_pattern<T, F>(
    symbol: &str,
    bars: &[T],
    factory: &F,
    config: &ScanConfig,
) -> Result<PatternHits>
where
    T: Ohlcv,
    F: Fn() -> Result<Box<dyn CandlePattern>>,
{
    let mut pattern = factory()?;
    if let Err(error) = pattern.validate() {
        debug!(symbol, %error, "pattern rejected");
        return Err(error);
    }
    debug!(symbol, bars = bars.len(), pattern = pattern.name(), "recognizing");

    let mut hits = Vec::new();
    for bar in bars {
        if config.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if config.skips(bar) {
            continue;
        }
        if pattern.recognize(bar) && bar.is_finished() {
            hits.push(bar.open_time());
        }
    }

    Ok(PatternHits {
        symbol: symbol.to_string(),
        hits,
    })
}

fn split<R>(results: Vec<std::result::Result<R, ScanError>>) -> (Vec<R>, Vec<ScanError>) {
    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}
