//! Integration tests for the multi-instrument harness.

use candleflow::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn make_bars(n: usize, scale: i64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let base = dec!(100) + Decimal::from(i as i64 % 5 * scale);
            let spread = Decimal::from((i as i64 * 3) % 7 + 1);
            Candle::new(base, base + spread, base - spread, base + dec!(1))
                .at(i as i64)
                .with_volume(Decimal::from((i as i64 * 11) % 13))
        })
        .collect()
}

fn universe() -> Vec<(String, Vec<Candle>)> {
    (0..16)
        .map(|i| (format!("SYM{i:02}"), make_bars(50 + i, i as i64 + 1)))
        .collect()
}

fn borrowed(universe: &[(String, Vec<Candle>)]) -> Vec<(&str, &[Candle])> {
    universe
        .iter()
        .map(|(s, bars)| (s.as_str(), bars.as_slice()))
        .collect()
}

/// Sequential reference for a single instrument
fn biggest_sequential(bars: &[Candle]) -> (Candle, Candle) {
    let mut by_range = bars[0];
    let mut by_volume = bars[0];
    for bar in &bars[1..] {
        if bar.range() > by_range.range() {
            by_range = *bar;
        }
        if bar.volume > by_volume.volume {
            by_volume = *bar;
        }
    }
    (by_range, by_volume)
}

#[test]
fn test_biggest_candles_matches_sequential_scan() {
    let universe = universe();
    let found = biggest_candles(borrowed(&universe), &ScanConfig::new());

    assert_eq!(found.by_range.len(), universe.len());
    assert_eq!(found.by_volume.len(), universe.len());
    for ((symbol, bars), (range, volume)) in universe
        .iter()
        .zip(found.by_range.iter().zip(&found.by_volume))
    {
        let (expected_range, expected_volume) = biggest_sequential(bars);
        assert_eq!(&range.symbol, symbol);
        assert_eq!(range.candle, expected_range);
        assert_eq!(volume.candle, expected_volume);
    }
}

#[test]
fn test_instrument_without_bars_contributes_nothing() {
    let bars = make_bars(5, 1);
    let found = biggest_candles(
        vec![("EMPTY", &[][..]), ("FULL", bars.as_slice())],
        &ScanConfig::new(),
    );
    assert_eq!(found.by_range.len(), 1);
    assert_eq!(found.by_range[0].symbol, "FULL");
    let series = found.volume_series().unwrap();
    assert_eq!(series.label, "volumes");
    assert_eq!(series.times.len(), 1);
}

/// Child values of a composite in id order
fn lines(value: &IndicatorValue) -> Vec<Option<Decimal>> {
    value.children().map(|(_, c)| c.to_decimal().ok()).collect()
}

#[test]
fn test_process_parallel_matches_sequential() {
    let universe = universe();
    let (runs, errors) = process_parallel(
        borrowed(&universe),
        || Ok(Box::new(ChandeKrollStop::new(5, dec!(1.5), 3)) as Box<dyn Indicator>),
        &ScanConfig::new(),
    );
    assert!(errors.is_empty());
    assert_eq!(runs.len(), universe.len());

    for run in &runs {
        let (_, bars) = universe.iter().find(|(s, _)| *s == run.symbol).unwrap();
        let mut cks = ChandeKrollStop::new(5, dec!(1.5), 3);
        let expected: Vec<_> = bars
            .iter()
            .map(|b| lines(&cks.process_candle(b).unwrap()))
            .collect();
        let actual: Vec<_> = run.values.iter().map(lines).collect();
        assert_eq!(actual, expected, "{}", run.symbol);
        assert!(run.formed);
    }
}

#[test]
fn test_factory_errors_are_per_instrument() {
    let universe = universe();
    let (runs, errors) = process_parallel(
        borrowed(&universe),
        || create_indicator("NotAnIndicator"),
        &ScanConfig::new(),
    );
    assert!(runs.is_empty());
    assert_eq!(errors.len(), universe.len());
    assert!(errors
        .iter()
        .all(|e| e.error == Error::UnknownKind("NotAnIndicator".to_string())));
}

#[test]
fn test_recognize_parallel_collects_hit_times() {
    let bars = vec![
        Candle::new(dec!(11), dec!(12), dec!(9), dec!(10)).at(1),
        Candle::new(dec!(10), dec!(12), dec!(9), dec!(11)).at(2),
        Candle::new(dec!(10), dec!(12), dec!(9), dec!(11)).at(3),
        Candle::new(dec!(11), dec!(12), dec!(9), dec!(10)).at(4),
        Candle::new(dec!(10), dec!(12), dec!(9), dec!(11)).at(5).active(),
        Candle::new(dec!(10), dec!(12), dec!(9), dec!(11)).at(5),
    ];
    let factory = || {
        Ok(Box::new(
            ComplexCandlePattern::new("reversal")
                .with(BlackCandle::default())
                .with(WhiteCandle::default()),
        ) as Box<dyn CandlePattern>)
    };

    let (hits, errors) =
        recognize_parallel(vec![("X", bars.as_slice())], factory, &ScanConfig::new());
    assert!(errors.is_empty());
    assert_eq!(hits[0].hits, vec![2, 5]);
}

#[test]
fn test_empty_pattern_rejected() {
    let bars = make_bars(3, 1);
    let (hits, errors) = recognize_parallel(
        vec![("X", bars.as_slice())],
        || Ok(Box::new(ComplexCandlePattern::new("empty")) as Box<dyn CandlePattern>),
        &ScanConfig::new(),
    );
    assert!(hits.is_empty());
    assert!(errors[0].error.is_configuration());
}

#[test]
fn test_cancellation_reports_every_instrument() {
    let universe = universe();
    let token = CancellationToken::new();
    token.cancel();
    let config = ScanConfig::new().cancellation(token.clone());

    let (runs, errors) = process_parallel(
        borrowed(&universe),
        || Ok(Box::new(SimpleMovingAverage::new(3)) as Box<dyn Indicator>),
        &config,
    );
    assert!(runs.is_empty());
    assert_eq!(errors.len(), universe.len());
    assert!(errors.iter().all(|e| e.error == Error::Cancelled));
    assert!(token.is_cancelled());
}

#[test]
fn test_finished_only_ignores_live_bars() {
    let bars = vec![
        Candle::new(dec!(1), dec!(1), dec!(1), dec!(1)).at(1),
        Candle::new(dec!(5), dec!(5), dec!(5), dec!(5)).at(2).active(),
        Candle::new(dec!(3), dec!(3), dec!(3), dec!(3)).at(2),
    ];
    let (runs, _) = process_parallel(
        vec![("X", bars.as_slice())],
        || Ok(Box::new(SimpleMovingAverage::new(2)) as Box<dyn Indicator>),
        &ScanConfig::new().finished_only(true),
    );
    assert_eq!(runs[0].values.len(), 2);
    assert_eq!(runs[0].values[1].to_decimal().unwrap(), dec!(2));
}
