//! Integration tests for RuleForge

use ruleforge::{squash, Dataset, Feature, Rule, Similarity, Squasher, Transaction, Value};
use std::io::Write;
use tempfile::NamedTempFile;

/// Create a test CSV file with a slice of heart-disease style data
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "age,sex,cp,chol,oldpeak,thal,target").unwrap();
    writeln!(file, "63,1,3,233,2.3,fixed,1").unwrap();
    writeln!(file, "37,1,2,250,3.5,normal,1").unwrap();
    writeln!(file, "41,0,1,204,1.4,normal,1").unwrap();
    writeln!(file, "56,1,1,236,0.8,normal,1").unwrap();
    writeln!(file, "57,0,0,354,0.6,normal,1").unwrap();
    writeln!(file, "57,1,0,192,0.4,fixed,0").unwrap();
    writeln!(file, "56,0,1,294,1.3,normal,0").unwrap();
    writeln!(file, "44,1,1,263,0.0,reversible,0").unwrap();
    // Duplicate of the third row
    writeln!(file, "41,0,1,204,1.4,normal,1").unwrap();
    file
}

fn single_column_dataset(values: &[f64]) -> Dataset {
    let features = vec![Feature::real("x", 0.0, 100.0).unwrap()];
    let transactions = values
        .iter()
        .map(|&x| Transaction::new(vec![Value::Number(x)]))
        .collect();
    Dataset::new(features, transactions).unwrap()
}

#[test]
fn test_all_features_rule_is_perfect() {
    let test_file = create_test_csv();
    let dataset = Dataset::from_csv(test_file.path()).unwrap();

    assert_eq!(dataset.len(), 9);
    assert_eq!(dataset.features().len(), 7);

    // All features => target over whole domains
    let (antecedent, consequent): (Vec<_>, Vec<_>) = dataset
        .features()
        .iter()
        .map(|feature| feature.whole())
        .partition(|condition| condition.name() != "target");

    let rule = Rule::new(antecedent, consequent, dataset.transactions()).unwrap();

    assert_eq!(rule.support(), 1.0);
    assert_eq!(rule.confidence(), 1.0);
    assert_eq!(rule.lift(), 1.0);
    assert!(rule.to_string().starts_with("IF age ∈ [37, 63] AND sex ∈ [0, 1]"));
    assert!(rule.to_string().ends_with("THEN target ∈ [0, 1]"));
}

#[test]
fn test_rule_on_loaded_data() {
    let test_file = create_test_csv();
    let dataset = Dataset::from_csv(test_file.path()).unwrap();

    let thal = dataset.feature("thal").unwrap();
    let target = dataset.feature("target").unwrap();
    let rule = Rule::new(
        vec![thal.one_of(["normal"]).unwrap()],
        vec![target.equals(&Value::from(1i64)).unwrap()],
        dataset.transactions(),
    )
    .unwrap();

    let counts = rule.counts();
    assert_eq!(counts.total, 9);
    assert_eq!(counts.antecedent, 6);
    assert_eq!(counts.consequent, 6);
    assert_eq!(counts.joint, 5);
    assert!((rule.confidence() - 5.0 / 6.0).abs() < 1e-12);
    assert!((rule.lift() - (5.0 / 6.0) / (6.0 / 9.0)).abs() < 1e-12);
}

#[test]
fn test_squash_merges_duplicate_rows() {
    let test_file = create_test_csv();
    let dataset = Dataset::from_csv(test_file.path()).unwrap();

    let squashed = squash(&dataset, 1.0, "euclidean").unwrap();
    assert_eq!(squashed.len(), 8);
    assert_eq!(squashed.features(), dataset.features());

    let reduced = squash(&dataset, 0.5, "euclidean").unwrap();
    assert!(reduced.len() < dataset.len());
}

#[test]
fn test_two_identical_one_distant() {
    let dataset = single_column_dataset(&[10.0, 10.0, 90.0]);
    let squashed = squash(&dataset, 0.99, "euclidean").unwrap();

    assert_eq!(squashed.len(), 2);
    assert_eq!(
        squashed.transactions().rows()[0].values(),
        &[Value::Number(10.0)]
    );
    assert_eq!(
        squashed.transactions().rows()[1].values(),
        &[Value::Number(90.0)]
    );
}

#[test]
fn test_lower_threshold_never_grows_output() {
    let dataset = single_column_dataset(&[0.0, 0.01, 0.02, 10.0, 10.01, 30.0]);

    let counts: Vec<usize> = [1.0, 0.999, 0.9, 0.6, 0.3]
        .iter()
        .map(|&t| Squasher::new(t, Similarity::Euclidean).unwrap().squash(&dataset).len())
        .collect();

    assert_eq!(counts, vec![6, 3, 3, 2, 1]);
}

#[test]
fn test_threshold_sweep_is_monotone_for_every_measure() {
    let dataset = single_column_dataset(&[0.0, 0.6, 0.8, 0.4, 1.0, 35.0, 36.0, 90.0]);

    for measure in Similarity::ALL {
        let mut previous = dataset.len();
        for step in 0..=100 {
            let threshold = 1.0 - step as f64 * 0.0099;
            let count = Squasher::new(threshold, measure)
                .unwrap()
                .squash(&dataset)
                .len();
            assert!(
                count <= previous,
                "{measure}: {count} clusters at {threshold}, {previous} just above"
            );
            previous = count;
        }
    }
}

#[test]
fn test_exact_threshold_keeps_every_distinct_row() {
    let dataset = single_column_dataset(&[10.0, 40.0, 90.0, 100.0]);
    for measure in Similarity::ALL {
        let squashed = squash(&dataset, 1.0, measure.name()).unwrap();
        assert_eq!(squashed.len(), 4, "{measure}");
    }
}

#[test]
fn test_empty_csv_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "age,thal").unwrap();
    writeln!(file, "41,").unwrap();
    assert!(Dataset::from_csv(file.path()).is_err());
}

#[test]
fn test_rule_matches_squashed_ranges() {
    let dataset = single_column_dataset(&[0.0, 0.01, 0.02, 10.0, 10.01, 30.0]);
    let squashed = Squasher::new(0.999, Similarity::Euclidean)
        .unwrap()
        .squash(&dataset);

    let x = squashed.feature("x").unwrap();
    let y = Feature::real("y", 0.0, 1.0).unwrap();
    let features = vec![x.clone(), y.clone()];
    let transactions = squashed
        .transactions()
        .iter()
        .map(|t| Transaction::new(vec![t.values()[0].clone(), Value::Number(0.5)]))
        .collect();
    let paired = Dataset::new(features, transactions).unwrap();

    // [0, 0.02] and [10, 10.01] fall inside [0, 15]; 30 does not
    let rule = Rule::new(
        vec![x.between(0.0, 15.0).unwrap()],
        vec![y.whole()],
        paired.transactions(),
    )
    .unwrap();
    assert!((rule.support() - 2.0 / 3.0).abs() < 1e-12);

    // A range cutting through a squashed interval does not match it
    let narrow = Rule::new(
        vec![x.between(0.0, 0.01).unwrap()],
        vec![y.whole()],
        paired.transactions(),
    )
    .unwrap();
    assert_eq!(narrow.support(), 0.0);
    assert_eq!(narrow.confidence(), 0.0);
}

#[test]
fn test_error_handling_invalid_threshold() {
    let dataset = single_column_dataset(&[1.0, 2.0]);
    assert!(squash(&dataset, 0.0, "euclidean").is_err());
    assert!(squash(&dataset, 1.01, "cosine").is_err());
    assert!(squash(&dataset, 0.5, "unknown").is_err());
}
