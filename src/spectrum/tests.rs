// Spectrum ranking tests
//
// The two-file scenario: failing runs {a.c:10, a.c:11} and {a.c:10, b.c:5},
// one passing run {a.c:10}.

use super::*;
use crate::coverage::{CoverageSet, StatementId};
use crate::error::SflError;

fn set(stmts: &[(&str, u32)]) -> CoverageSet {
    stmts.iter().map(|(f, l)| StatementId::new(f, *l)).collect()
}

fn scenario() -> (Vec<CoverageSet>, Vec<CoverageSet>) {
    let failing = vec![
        set(&[("a.c", 10), ("a.c", 11)]),
        set(&[("a.c", 10), ("b.c", 5)]),
    ];
    let passing = vec![set(&[("a.c", 10)])];
    (failing, passing)
}

fn counts(ef: usize, nf: usize, ep: usize, np: usize) -> SpectrumCounts {
    SpectrumCounts { ef, nf, ep, np }
}

#[test]
fn test_spectrum_counts_for_scenario() {
    let (failing, passing) = scenario();
    let spectrum = compute_spectrum(&failing, &passing);

    assert_eq!(spectrum.len(), 3);
    assert_eq!(spectrum[&StatementId::new("a.c", 10)], counts(2, 0, 1, 0));
    assert_eq!(spectrum[&StatementId::new("a.c", 11)], counts(1, 1, 0, 1));
    assert_eq!(spectrum[&StatementId::new("b.c", 5)], counts(1, 1, 0, 1));
}

#[test]
fn test_passing_only_statements_are_not_scorable() {
    let failing = vec![set(&[("a.c", 1)])];
    let passing = vec![set(&[("a.c", 1), ("z.c", 9)])];
    let spectrum = compute_spectrum(&failing, &passing);
    assert!(!spectrum.contains_key(&StatementId::new("z.c", 9)));
}

#[test]
fn test_ochiai_file_scores_and_ranks() {
    let (failing, passing) = scenario();
    let scores = SpectrumRanker::new(SbflFormula::Ochiai)
        .rank(&failing, &passing)
        .unwrap();

    let a = (2.0 / 6.0_f64.sqrt() + 1.0 / 2.0_f64.sqrt()) / 2.0;
    assert!((scores.get("a.c").unwrap() - a).abs() < 1e-12);
    assert!((scores.get("a.c").unwrap() - 0.762).abs() < 1e-3);
    assert!((scores.get("b.c").unwrap() - 0.707).abs() < 1e-3);
    assert_eq!(scores.rank_of("a.c"), Some(1));
    assert_eq!(scores.rank_of("b.c"), Some(2));
    assert_eq!(scores.rank_of("c.c"), None);
}

#[test]
fn test_ties_share_rank() {
    let mut map = std::collections::BTreeMap::new();
    map.insert("a.c".to_string(), 0.9);
    map.insert("b.c".to_string(), 0.5);
    map.insert("c.c".to_string(), 0.5);
    map.insert("d.c".to_string(), 0.1);
    let scores = FileScores::new(map);

    assert_eq!(scores.rank_of("b.c"), Some(2));
    assert_eq!(scores.rank_of("c.c"), Some(2));
    assert_eq!(scores.rank_of("d.c"), Some(4));
    let order: Vec<&str> = scores.ranking().into_iter().map(|(f, _)| f).collect();
    assert_eq!(order, vec!["a.c", "b.c", "c.c", "d.c"]);
}

#[test]
fn test_formula_values() {
    let c = counts(2, 0, 1, 0);
    let close = |f: SbflFormula, want: f64| {
        let got = f.score(&c).unwrap();
        assert!((got - want).abs() < 1e-12, "{f}: got {got}, want {want}");
    };
    close(SbflFormula::Ochiai, 2.0 / 6.0_f64.sqrt());
    close(SbflFormula::Tarantula, 0.5);
    close(SbflFormula::DStar, 4.0);
    close(SbflFormula::Dice, 4.0 / 3.0);
    close(SbflFormula::Barinel, 1.0 - 1.0 / 3.0);
    close(SbflFormula::Op2, 2.0 - 0.5);
}

#[test]
fn test_dstar_guard() {
    assert_eq!(SbflFormula::DStar.score(&counts(3, 0, 0, 2)), Some(1.0));
}

#[test]
fn test_tarantula_without_passing_runs_is_an_error() {
    let failing = vec![set(&[("a.c", 1)])];
    let err = SpectrumRanker::new(SbflFormula::Tarantula)
        .rank(&failing, &[])
        .unwrap_err();
    match err {
        SflError::ZeroDenominator { formula, statement } => {
            assert_eq!(formula, "Tarantula");
            assert_eq!(statement, "a.c,1");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_every_formula_ranks_scenario() {
    let (failing, passing) = scenario();
    for formula in SbflFormula::ALL {
        let scores = SpectrumRanker::new(formula).rank(&failing, &passing).unwrap();
        assert_eq!(scores.len(), 2, "{formula}");
    }
}

#[test]
fn test_formula_names() {
    assert_eq!(SbflFormula::default(), SbflFormula::Ochiai);
    assert_eq!(SbflFormula::DStar.to_string(), "DStar");
    let parsed: SbflFormula = serde_json::from_str("\"op2\"").unwrap();
    assert_eq!(parsed, SbflFormula::Op2);
}

#[test]
fn test_no_failing_runs_gives_empty_scores() {
    let scores = SpectrumRanker::default().rank(&[], &[set(&[("a.c", 1)])]).unwrap();
    assert!(scores.is_empty());
}
