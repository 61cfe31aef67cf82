//! Integration tests for streaming indicators.
//!
//! Bars come from a caller-owned type to exercise the `Ohlcv` trait rather
//! than the crate's own `Candle`.

use candleflow::{
    indicator::{load_entire, save_entire},
    prelude::*,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Caller-side bar
#[derive(Debug, Clone, Copy)]
struct TestBar {
    t: i64,
    o: Decimal,
    h: Decimal,
    l: Decimal,
    c: Decimal,
    live: bool,
}

impl TestBar {
    fn new(t: i64, o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Self {
        Self {
            t,
            o,
            h,
            l,
            c,
            live: false,
        }
    }

    fn hl(t: i64, h: Decimal, l: Decimal) -> Self {
        Self::new(t, l, h, l, (h + l) / dec!(2))
    }

    fn live(mut self) -> Self {
        self.live = true;
        self
    }
}

impl Ohlcv for TestBar {
    fn open(&self) -> Decimal {
        self.o
    }

    fn high(&self) -> Decimal {
        self.h
    }

    fn low(&self) -> Decimal {
        self.l
    }

    fn close(&self) -> Decimal {
        self.c
    }

    fn volume(&self) -> Decimal {
        dec!(1000)
    }

    fn open_time(&self) -> Timestamp {
        self.t
    }

    fn state(&self) -> CandleState {
        if self.live {
            CandleState::Active
        } else {
            CandleState::Finished
        }
    }
}

/// Deterministic zig-zag series
fn make_series(n: usize) -> Vec<TestBar> {
    (0..n)
        .map(|i| {
            let base =
                dec!(100) + Decimal::from((i * 7 % 11) as i64) - Decimal::from((i % 3) as i64);
            let spread = Decimal::from((i % 4 + 1) as i64);
            TestBar::new(i as i64, base, base + spread, base - spread, base + dec!(0.5))
        })
        .collect()
}

fn all_indicators() -> Vec<Box<dyn Indicator>> {
    vec![
        Box::new(SimpleMovingAverage::new(3)),
        Box::new(ExponentialMovingAverage::new(3)),
        Box::new(WilderMovingAverage::new(3)),
        Box::new(Highest::new(3)),
        Box::new(Lowest::new(3)),
        Box::new(AverageTrueRange::new(3)),
        Box::new(DiPlus::new(3)),
        Box::new(DiMinus::new(3)),
        Box::new(DirectionalIndex::new(3)),
        Box::new(AverageDirectionalIndex::new(3)),
        Box::new(ChandeKrollStop::new(3, dec!(1.5), 2)),
        Box::new(
            ComplexIndicator::new("pair")
                .with(SimpleMovingAverage::new(2))
                .with(Lowest::new(4)),
        ),
    ]
}

/// Every reading in a value: its own scalar, then each child's in id order
fn readings(value: &IndicatorValue) -> Vec<Option<Decimal>> {
    let mut out = vec![value.to_decimal().ok()];
    for (_, child) in value.children() {
        out.extend(readings(child));
    }
    out
}

fn warmed<I: Indicator>(mut indicator: I, bars: &[TestBar]) -> I {
    for bar in bars {
        indicator.process_candle(bar).unwrap();
    }
    assert!(indicator.is_formed(), "{indicator} never formed");
    indicator
}

// ============================================================
// STOP BAND SCENARIO
// ============================================================

#[test]
fn test_chande_kroll_worked_scenario() {
    let mut cks = ChandeKrollStop::new(3, dec!(1), 1);
    let bars = [
        TestBar::hl(1, dec!(10), dec!(8)),
        TestBar::hl(2, dec!(12), dec!(9)),
        TestBar::hl(3, dec!(15), dec!(7)),
    ];

    let first = cks.process_candle(&bars[0]).unwrap();
    assert!(!cks.is_formed());
    assert_eq!(first.children().count(), 0);

    cks.process_candle(&bars[1]).unwrap();
    assert!(!cks.is_formed());

    let third = cks.process_candle(&bars[2]).unwrap();
    assert!(cks.is_formed());
    assert_eq!(third.time(), 3);
    let (stop_long, stop_short) = cks.stops(&third).unwrap();
    assert_eq!(stop_long, dec!(7));
    assert_eq!(stop_short, dec!(15));
}

// ============================================================
// LIFECYCLE LAWS
// ============================================================

#[test]
fn test_formed_is_monotone() {
    let bars = make_series(40);
    for mut indicator in all_indicators() {
        let mut seen_formed = false;
        for bar in &bars {
            indicator.process_candle(bar).unwrap();
            if seen_formed {
                assert!(indicator.is_formed(), "{indicator} lost formed");
            }
            seen_formed = indicator.is_formed();
        }
        assert!(seen_formed, "{indicator} never formed");
    }
}

#[test]
fn test_provisional_revisions_are_idempotent() {
    let bars = make_series(20);
    for mut indicator in all_indicators() {
        for bar in &bars[..10] {
            indicator.process_candle(bar).unwrap();
        }
        let live = bars[10].live();
        let first = indicator.process_candle(&live).unwrap();
        let second = indicator.process_candle(&live).unwrap();
        assert_eq!(first, second, "{indicator}");
        assert!(!first.is_final(), "{indicator}");
    }
}

#[test]
fn test_provisional_input_leaves_history_untouched() {
    let bars = make_series(30);
    for (mut plain, mut revised) in all_indicators().into_iter().zip(all_indicators()) {
        let mut compared = 0;
        for (i, bar) in bars.iter().enumerate() {
            // Wild provisional revisions followed by the finished bar
            let spike = TestBar::new(bar.t, bar.o, bar.h * dec!(3), bar.l / dec!(3), bar.c).live();
            revised.process_candle(&spike).unwrap();

            let a = readings(&plain.process_candle(bar).unwrap());
            let b = readings(&revised.process_candle(bar).unwrap());
            assert_eq!(a, b, "{plain} at {i}");
            assert_eq!(plain.is_formed(), revised.is_formed());
            compared += a.iter().flatten().count();
        }
        assert!(compared > 0, "{plain} produced no readings");
    }
}

#[test]
fn test_stop_band_lines_survive_revisions() {
    let bars = make_series(12);
    let mut plain = ChandeKrollStop::new(3, dec!(1.5), 2);
    let mut revised = ChandeKrollStop::new(3, dec!(1.5), 2);
    let mut stops = 0;
    for bar in &bars {
        revised.process_candle(&TestBar::hl(bar.t, bar.h + dec!(50), bar.l).live()).unwrap();
        let a = plain.process_candle(bar).unwrap();
        let b = revised.process_candle(bar).unwrap();
        let (a, b) = (plain.stops(&a).ok(), revised.stops(&b).ok());
        assert_eq!(a, b, "at {}", bar.t);
        stops += usize::from(a.is_some());
    }
    // Extrema form at bar 3, the stop averages one bar later
    assert_eq!(stops, bars.len() - 3);
}

#[test]
fn test_parameter_change_ignores_earlier_history() {
    let series = make_series(40);
    let (history, after) = series.split_at(20);

    let mut sma = warmed(SimpleMovingAverage::new(2), history);
    sma.set_length(5);
    let mut multiplier = warmed(ChandeKrollStop::new(2, dec!(1), 1), history);
    multiplier.set_multiplier(dec!(2));
    let mut period = warmed(ChandeKrollStop::new(2, dec!(1), 1), history);
    period.set_period(4);
    let mut stop_period = warmed(ChandeKrollStop::new(2, dec!(1), 1), history);
    stop_period.set_stop_period(3);
    let mut dx = warmed(DirectionalIndex::new(2), history);
    dx.set_length(4);

    let cases: Vec<(Box<dyn Indicator>, Box<dyn Indicator>)> = vec![
        (Box::new(sma), Box::new(SimpleMovingAverage::new(5))),
        (Box::new(multiplier), Box::new(ChandeKrollStop::new(2, dec!(2), 1))),
        (Box::new(period), Box::new(ChandeKrollStop::new(4, dec!(1), 1))),
        (Box::new(stop_period), Box::new(ChandeKrollStop::new(2, dec!(1), 3))),
        (Box::new(dx), Box::new(DirectionalIndex::new(4))),
    ];
    for (mut changed, mut fresh) in cases {
        assert!(!changed.is_formed(), "{changed}");
        assert_eq!(changed.to_string(), fresh.to_string());
        // Behaves like a fresh instance
        for bar in after {
            let a = readings(&changed.process_candle(bar).unwrap());
            let b = readings(&fresh.process_candle(bar).unwrap());
            assert_eq!(a, b, "{changed} at {}", bar.t);
        }
        assert!(changed.is_formed(), "{changed}");
    }
}

#[test]
fn test_reset_is_idempotent_and_safe_when_fresh() {
    for mut indicator in all_indicators() {
        indicator.reset();
        indicator.reset();
        assert!(!indicator.is_formed());
    }
}

#[test]
fn test_empty_input_changes_nothing() {
    for mut indicator in all_indicators() {
        let empty = IndicatorValue::empty(IndicatorId::next(), 0, true);
        let out = indicator.process(&empty).unwrap();
        assert!(out.is_empty(), "{indicator}");
        assert!(!indicator.is_formed());
    }
}

#[test]
fn test_conversion_error_before_mutation() {
    let mut atr = AverageTrueRange::new(1);
    let composite = IndicatorValue::composite(IndicatorId::next(), 0).with_final(true);
    let mut with_child = composite.clone();
    let child = IndicatorId::next();
    with_child
        .add(child, IndicatorValue::scalar(child, 0, dec!(1), true))
        .unwrap();

    assert!(matches!(
        atr.process(&with_child),
        Err(Error::Conversion { .. })
    ));
    assert!(!atr.is_formed());
}

// ============================================================
// PERSISTENCE
// ============================================================

#[test]
fn test_persistence_round_trip_reproduces_outputs() {
    let bars = make_series(30);
    for original in all_indicators() {
        let json = save_entire(original.as_ref()).to_json().unwrap();
        let mut restored = load_entire(&SettingsStorage::from_json(&json).unwrap()).unwrap();
        let mut original = original;

        assert_eq!(restored.kind(), original.kind());
        assert_eq!(restored.to_string(), original.to_string());
        let mut compared = 0;
        for bar in &bars {
            let a = readings(&original.process_candle(bar).unwrap());
            let b = readings(&restored.process_candle(bar).unwrap());
            assert_eq!(a, b, "{original}");
            compared += a.iter().flatten().count();
        }
        assert!(compared > 0, "{original} produced no readings");
    }
}

#[test]
fn test_every_builtin_validates_by_default() {
    for kind in candleflow::indicator::BUILTIN_INDICATORS {
        let indicator = create_indicator(kind).unwrap();
        let result = indicator.validate();
        if *kind == ComplexIndicator::KIND {
            assert!(result.unwrap_err().is_configuration());
        } else {
            assert!(result.is_ok(), "{kind}");
        }
    }
}

#[test]
fn test_nested_complex_round_trip() {
    let nested = ComplexIndicator::new("outer")
        .with(ComplexIndicator::new("inner").with(Highest::new(2)))
        .with(ChandeKrollStop::default());
    let stored = save_entire(&nested);
    let restored = load_entire(&stored).unwrap();
    assert_eq!(restored.to_string(), "outer");
    assert!(restored.validate().is_ok());
    assert_eq!(save_entire(restored.as_ref()), stored);
}
