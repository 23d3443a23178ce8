//! Metric aggregation over comparison results.
//!
//! Results are sorted before summation so the aggregate does not depend
//! on the order in which parallel workers produced them.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::evaluation::{ComparisonResult, EvaluationSummary, FieldSummary, RunKey, RunSummary};

/// Precision, recall and F1 from raw counts.
///
/// Returns zeros instead of dividing by zero.
pub fn precision_recall_f1(true_positives: usize, predicted: usize, actual: usize) -> (f64, f64, f64) {
    let precision = ratio(true_positives, predicted);
    let recall = ratio(true_positives, actual);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    (precision, recall, f1)
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Aggregate the results of one field.
///
/// Predicted positives are found fields; true positives are found fields
/// that match. Every compared field has a ground truth value, so the
/// number of actual positives is the result count.
pub fn summarize_field(field_name: &str, results: &[&ComparisonResult]) -> FieldSummary {
    let count = results.len();
    let matches = results.iter().filter(|r| r.exact_match()).count();
    let found = results.iter().filter(|r| r.found()).count();
    let true_positives = results.iter().filter(|r| r.found() && r.exact_match()).count();
    let (precision, recall, f1) = precision_recall_f1(true_positives, found, count);

    FieldSummary {
        field_name: field_name.to_string(),
        count,
        matches,
        not_found: count - found,
        accuracy: ratio(matches, count),
        mean_cer: mean(results.iter().map(|r| r.cer())),
        precision,
        recall,
        f1,
    }
}

/// Aggregate all results of one run.
pub fn summarize_run(run: RunKey, results: &[ComparisonResult]) -> RunSummary {
    let mut sorted: Vec<&ComparisonResult> = results.iter().collect();
    sorted.sort_by(|a, b| {
        a.invoice_id()
            .cmp(b.invoice_id())
            .then_with(|| a.field_name().cmp(b.field_name()))
    });

    let mut by_field: BTreeMap<&str, Vec<&ComparisonResult>> = BTreeMap::new();
    let mut by_document: BTreeMap<&str, Vec<&ComparisonResult>> = BTreeMap::new();
    for result in sorted.iter().copied() {
        by_field.entry(result.field_name()).or_default().push(result);
        by_document.entry(result.invoice_id()).or_default().push(result);
    }

    let fields = by_field
        .iter()
        .map(|(name, results)| (name.to_string(), summarize_field(name, results)))
        .collect();

    let documents = by_document.len();
    let exact_documents = by_document
        .values()
        .filter(|results| results.iter().all(|r| r.exact_match()))
        .count();
    let parse_failures: BTreeSet<&str> = sorted
        .iter()
        .filter(|r| r.error().is_some())
        .map(|r| r.invoice_id())
        .collect();

    RunSummary {
        run,
        documents,
        parse_failures: parse_failures.len(),
        accuracy: ratio(sorted.iter().filter(|r| r.exact_match()).count(), sorted.len()),
        mean_cer: mean(sorted.iter().map(|r| r.cer())),
        exact_match_rate: ratio(exact_documents, documents),
        fields,
    }
}

/// Group results by run and aggregate each group.
pub fn summarize(results: impl IntoIterator<Item = (RunKey, ComparisonResult)>) -> EvaluationSummary {
    let mut runs: BTreeMap<RunKey, Vec<ComparisonResult>> = BTreeMap::new();
    for (run, result) in results {
        runs.entry(run).or_default().push(result);
    }

    EvaluationSummary::from_runs(
        runs.into_iter()
            .map(|(run, results)| summarize_run(run, &results)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result(invoice: &str, field: &str, found: bool, matched: bool, cer: f64) -> ComparisonResult {
        ComparisonResult::new(
            invoice,
            field,
            matched,
            cer,
            "00123".to_string(),
            found.then(|| "00123".to_string()),
            found,
            found,
            None,
        )
    }

    fn sample() -> Vec<ComparisonResult> {
        vec![
            result("1", "work_order", true, true, 0.0),
            result("1", "total", true, true, 0.0),
            result("2", "work_order", true, false, 0.2),
            result("2", "total", false, false, 1.0),
        ]
    }

    #[test]
    fn test_summarize_run() {
        let summary = summarize_run(RunKey::new("pixtral", "basic"), &sample());

        assert_eq!(summary.documents, 2);
        assert_eq!(summary.accuracy, 0.5);
        assert!((summary.mean_cer - 0.3).abs() < 1e-12);
        assert_eq!(summary.exact_match_rate, 0.5);
        assert_eq!(summary.parse_failures, 0);

        let work_order = &summary.fields["work_order"];
        assert_eq!(work_order.count, 2);
        assert_eq!(work_order.matches, 1);
        assert_eq!(work_order.not_found, 0);
        assert_eq!(work_order.precision, 0.5);
        assert_eq!(work_order.recall, 0.5);

        let total = &summary.fields["total"];
        assert_eq!(total.not_found, 1);
        assert_eq!(total.precision, 1.0);
        assert_eq!(total.recall, 0.5);
        assert_eq!(total.f1, 2.0 / 3.0);
    }

    #[test]
    fn test_order_independent() {
        let forward = summarize_run(RunKey::new("m", "p"), &sample());

        let mut reversed = sample();
        reversed.reverse();
        let backward = summarize_run(RunKey::new("m", "p"), &reversed);

        assert_eq!(forward, backward);
    }

    #[test]
    fn test_parse_failures_counted_per_document() {
        let failed = |field: &str| {
            ComparisonResult::new(
                "3",
                field,
                false,
                1.0,
                "x".to_string(),
                None,
                false,
                false,
                Some("model output is empty".to_string()),
            )
        };
        let mut results = sample();
        results.push(failed("work_order"));
        results.push(failed("total"));

        let summary = summarize_run(RunKey::new("m", "p"), &results);
        assert_eq!(summary.parse_failures, 1);
        assert_eq!(summary.documents, 3);
    }

    #[test]
    fn test_summarize_groups_runs() {
        let a = RunKey::new("a", "p");
        let b = RunKey::new("b", "p");
        let grouped = sample()
            .into_iter()
            .map(|r| (a.clone(), r))
            .chain([(b.clone(), result("1", "total", true, true, 0.0))]);

        let summary = summarize(grouped);
        assert_eq!(summary.runs.len(), 2);
        assert_eq!(summary.get(&b).unwrap().accuracy, 1.0);
        assert_eq!(summary.best().unwrap().run, b);
    }

    #[test]
    fn test_empty_input() {
        let summary = summarize_run(RunKey::new("m", "p"), &[]);
        assert_eq!(summary.documents, 0);
        assert_eq!(summary.accuracy, 0.0);
        assert_eq!(precision_recall_f1(0, 0, 0), (0.0, 0.0, 0.0));
    }
}
