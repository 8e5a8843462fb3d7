//! Gap scoring and aggregation.
//!
//! Pure transformation from joined choice rows to the dashboard aggregates:
//! per-question gaps, per-category sums, and overall totals. No I/O and no
//! hidden state; recomputing from the same rows yields identical output.

use serde::Serialize;

use crate::models::ResultRow;

/// Shortfall between the required and actual score, clamped at zero.
/// Exceeding the required rating does not offset deficits elsewhere.
pub fn gap(actual_score: i64, desired_score: i64) -> i64 {
    (desired_score - actual_score).max(0)
}

// A result row with its computed gap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRow {
    pub category: String,
    pub question: String,
    pub actual_answer: String,
    pub actual_score: i64,
    pub desired_answer: String,
    pub desired_score: i64,
    pub gap: i64,
}

impl From<ResultRow> for ScoredRow {
    fn from(row: ResultRow) -> Self {
        let gap = gap(row.actual_score, row.desired_score);
        Self {
            category: row.category,
            question: row.question,
            actual_answer: row.actual_answer,
            actual_score: row.actual_score,
            desired_answer: row.desired_answer,
            desired_score: row.desired_score,
            gap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub actual_sum: i64,
    pub desired_sum: i64,
    // Sum of the already-clamped per-row gaps, NOT desired_sum - actual_sum;
    // the derived subtraction would erase the clamping of individual rows.
    pub gap_sum: i64,
    // None when desired_sum is zero (the percentage is undefined, not NaN).
    pub gap_percentage: Option<f64>,
}

impl CategorySummary {
    fn new(category: String) -> Self {
        Self {
            category,
            actual_sum: 0,
            desired_sum: 0,
            gap_sum: 0,
            gap_percentage: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OverallSummary {
    pub total_actual: i64,
    pub total_desired: i64,
    pub total_gap: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapReport {
    pub summary: OverallSummary,
    pub categories: Vec<CategorySummary>,
    pub rows: Vec<ScoredRow>,
}

impl GapReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Fold the joined rows of one assessment into the full report. Empty input
/// yields zero totals and an empty category list, which callers must treat
/// as "no data yet", not a fault.
pub fn build_report(rows: Vec<ResultRow>) -> GapReport {
    let rows: Vec<ScoredRow> = rows.into_iter().map(ScoredRow::from).collect();

    let mut summary = OverallSummary::default();
    let mut categories: Vec<CategorySummary> = Vec::new();

    for row in &rows {
        summary.total_actual += row.actual_score;
        summary.total_desired += row.desired_score;
        summary.total_gap += row.gap;

        let idx = match categories.iter().position(|c| c.category == row.category) {
            Some(i) => i,
            None => {
                categories.push(CategorySummary::new(row.category.clone()));
                categories.len() - 1
            }
        };
        let cat = &mut categories[idx];
        cat.actual_sum += row.actual_score;
        cat.desired_sum += row.desired_score;
        cat.gap_sum += row.gap;
    }

    for cat in &mut categories {
        cat.gap_percentage = gap_percentage(cat.gap_sum, cat.desired_sum);
    }

    // Largest unmet need first; stable, so equal gaps keep input order
    categories.sort_by(|a, b| b.gap_sum.cmp(&a.gap_sum));

    GapReport {
        summary,
        categories,
        rows,
    }
}

// round(gap_sum / desired_sum * 100, 1), undefined on a zero denominator
fn gap_percentage(gap_sum: i64, desired_sum: i64) -> Option<f64> {
    if desired_sum == 0 {
        None
    } else {
        Some((gap_sum as f64 / desired_sum as f64 * 1000.0).round() / 10.0)
    }
}

/// Drill-down view over one category: optionally restricted to rows with a
/// positive gap, sorted by gap descending. A filter over already-scored
/// rows, never a recomputation.
pub fn category_detail<'a>(
    rows: &'a [ScoredRow],
    category: &str,
    gaps_only: bool,
) -> Vec<&'a ScoredRow> {
    let mut detail: Vec<&ScoredRow> = rows
        .iter()
        .filter(|r| r.category == category && (!gaps_only || r.gap > 0))
        .collect();
    detail.sort_by(|a, b| b.gap.cmp(&a.gap));
    detail
}

const CSV_HEADER: &str =
    "category,question,actual_answer,actual_score,desired_answer,desired_score,gap";

/// Flat export of the scored rows: UTF-8 CSV with a header row, one line
/// per choice in input order.
pub fn to_csv(rows: &[ScoredRow]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for r in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            csv_field(&r.category),
            csv_field(&r.question),
            csv_field(&r.actual_answer),
            r.actual_score,
            csv_field(&r.desired_answer),
            r.desired_score,
            r.gap
        ));
    }
    out
}

fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(category: &str, question: &str, actual: i64, desired: i64) -> ResultRow {
        ResultRow {
            category: category.to_string(),
            question: question.to_string(),
            actual_answer: format!("label {}", actual),
            actual_score: actual,
            desired_answer: format!("label {}", desired),
            desired_score: desired,
        }
    }

    mod gap_tests {
        use super::*;

        #[test]
        fn gap_positive_shortfall() {
            assert_eq!(gap(2, 4), 2);
        }

        #[test]
        fn gap_clamped_when_actual_exceeds_desired() {
            assert_eq!(gap(4, 3), 0);
        }

        #[test]
        fn gap_zero_when_equal() {
            assert_eq!(gap(3, 3), 0);
        }

        #[test]
        fn gap_with_negative_scores() {
            assert_eq!(gap(-2, 1), 3);
            assert_eq!(gap(1, -2), 0);
        }
    }

    mod build_report_tests {
        use super::*;

        #[test]
        fn empty_input_yields_zero_totals_not_error() {
            let report = build_report(vec![]);
            assert!(report.is_empty());
            assert_eq!(report.summary, OverallSummary::default());
            assert!(report.categories.is_empty());
        }

        #[test]
        fn worked_example() {
            // Leadership: gaps [2, 0]; Strategy: gap [3]
            let report = build_report(vec![
                row("Leadership", "q1", 2, 4),
                row("Leadership", "q2", 4, 3),
                row("Strategy", "q3", 1, 4),
            ]);

            let gaps: Vec<i64> = report.rows.iter().map(|r| r.gap).collect();
            assert_eq!(gaps, vec![2, 0, 3]);

            assert_eq!(report.summary.total_actual, 7);
            assert_eq!(report.summary.total_desired, 11);
            assert_eq!(report.summary.total_gap, 5);

            // Strategy ranks first (gap 3 > 2)
            assert_eq!(report.categories.len(), 2);
            let strategy = &report.categories[0];
            assert_eq!(strategy.category, "Strategy");
            assert_eq!(strategy.actual_sum, 1);
            assert_eq!(strategy.desired_sum, 4);
            assert_eq!(strategy.gap_sum, 3);
            assert_eq!(strategy.gap_percentage, Some(75.0));

            let leadership = &report.categories[1];
            assert_eq!(leadership.category, "Leadership");
            assert_eq!(leadership.actual_sum, 6);
            assert_eq!(leadership.desired_sum, 7);
            assert_eq!(leadership.gap_sum, 2);
            assert_eq!(leadership.gap_percentage, Some(28.6));
        }

        #[test]
        fn total_gap_is_sum_of_clamped_row_gaps() {
            // desired_sum - actual_sum would be 0 here; clamping keeps gap 3
            let report = build_report(vec![row("A", "q1", 1, 4), row("A", "q2", 5, 2)]);
            assert_eq!(report.summary.total_gap, 3);
            assert_eq!(report.categories[0].gap_sum, 3);
        }

        #[test]
        fn category_gap_sums_add_up_to_total() {
            let report = build_report(vec![
                row("A", "q1", 1, 3),
                row("B", "q2", 0, 5),
                row("A", "q3", 2, 2),
                row("C", "q4", 4, 1),
            ]);
            let sum: i64 = report.categories.iter().map(|c| c.gap_sum).sum();
            assert_eq!(sum, report.summary.total_gap);
        }

        #[test]
        fn fully_satisfied_category_sorts_last_with_zero_percentage() {
            let report = build_report(vec![
                row("Satisfied", "q1", 4, 3),
                row("Satisfied", "q2", 5, 5),
                row("Lagging", "q3", 1, 4),
            ]);

            assert_eq!(report.categories[0].category, "Lagging");
            let satisfied = &report.categories[1];
            assert_eq!(satisfied.gap_sum, 0);
            assert_eq!(satisfied.gap_percentage, Some(0.0));
        }

        #[test]
        fn zero_desired_sum_yields_undefined_percentage() {
            let report = build_report(vec![row("Zero", "q1", 2, 0)]);
            let zero = &report.categories[0];
            assert_eq!(zero.desired_sum, 0);
            assert_eq!(zero.gap_sum, 0);
            assert_eq!(zero.gap_percentage, None);
        }

        #[test]
        fn zero_desired_sum_with_negative_actual() {
            // gap is clamped positive even though desired_sum stays 0
            let report = build_report(vec![row("Zero", "q1", -3, 1), row("Zero", "q2", 2, -1)]);
            let zero = &report.categories[0];
            assert_eq!(zero.desired_sum, 0);
            assert_eq!(zero.gap_sum, 4);
            assert_eq!(zero.gap_percentage, None);
        }

        #[test]
        fn equal_gap_sums_keep_input_order() {
            let report = build_report(vec![
                row("First", "q1", 1, 3),
                row("Second", "q2", 2, 4),
                row("Third", "q3", 0, 2),
            ]);
            // All gap sums are 2; stable sort preserves first-seen order
            let order: Vec<&str> = report
                .categories
                .iter()
                .map(|c| c.category.as_str())
                .collect();
            assert_eq!(order, vec!["First", "Second", "Third"]);
        }

        #[test]
        fn percentage_rounds_to_one_decimal() {
            // 1/3 -> 33.333... -> 33.3; 2/3 -> 66.666... -> 66.7
            let report = build_report(vec![row("A", "q1", 2, 3), row("B", "q2", 1, 3)]);
            let a = report
                .categories
                .iter()
                .find(|c| c.category == "A")
                .expect("category A");
            assert_eq!(a.gap_percentage, Some(33.3));
            let b = report
                .categories
                .iter()
                .find(|c| c.category == "B")
                .expect("category B");
            assert_eq!(b.gap_percentage, Some(66.7));
        }

        #[test]
        fn recomputation_is_deterministic() {
            let rows = vec![
                row("A", "q1", 1, 4),
                row("B", "q2", 3, 3),
                row("A", "q3", 2, 5),
            ];
            let first = build_report(rows.clone());
            let second = build_report(rows);
            assert_eq!(first, second);
        }
    }

    mod category_detail_tests {
        use super::*;

        fn scored_rows() -> Vec<ScoredRow> {
            build_report(vec![
                row("A", "small gap", 3, 4),
                row("A", "no gap", 4, 2),
                row("A", "big gap", 0, 4),
                row("B", "other category", 0, 5),
            ])
            .rows
        }

        #[test]
        fn filters_to_category_sorted_by_gap_desc() {
            let rows = scored_rows();
            let detail = category_detail(&rows, "A", false);
            let questions: Vec<&str> = detail.iter().map(|r| r.question.as_str()).collect();
            assert_eq!(questions, vec!["big gap", "small gap", "no gap"]);
        }

        #[test]
        fn gaps_only_drops_satisfied_rows() {
            let rows = scored_rows();
            let detail = category_detail(&rows, "A", true);
            let questions: Vec<&str> = detail.iter().map(|r| r.question.as_str()).collect();
            assert_eq!(questions, vec!["big gap", "small gap"]);
        }

        #[test]
        fn unknown_category_is_empty() {
            let rows = scored_rows();
            assert!(category_detail(&rows, "Nope", false).is_empty());
        }

        #[test]
        fn detail_does_not_mutate_rows() {
            let rows = scored_rows();
            let before = rows.clone();
            let _ = category_detail(&rows, "A", true);
            assert_eq!(rows, before);
        }
    }

    mod csv_tests {
        use super::*;

        #[test]
        fn header_and_column_order() {
            let out = to_csv(&[]);
            assert_eq!(
                out,
                "category,question,actual_answer,actual_score,desired_answer,desired_score,gap\n"
            );
        }

        #[test]
        fn rows_follow_input_order_with_gap_column() {
            let rows = build_report(vec![row("Cat", "q1", 2, 4), row("Cat", "q2", 4, 1)]).rows;
            let out = to_csv(&rows);
            let lines: Vec<&str> = out.lines().collect();
            assert_eq!(lines.len(), 3);
            assert_eq!(lines[1], "Cat,q1,label 2,2,label 4,4,2");
            assert_eq!(lines[2], "Cat,q2,label 4,4,label 1,1,0");
        }

        #[test]
        fn fields_with_commas_are_quoted() {
            let rows = build_report(vec![row("Strategy, Vision", "q", 1, 2)]).rows;
            let out = to_csv(&rows);
            assert!(out.contains("\"Strategy, Vision\""));
        }

        #[test]
        fn embedded_quotes_are_doubled() {
            let mut rows = build_report(vec![row("Cat", "placeholder", 1, 2)]).rows;
            rows[0].question = "Is it \"done\"?".to_string();
            let out = to_csv(&rows);
            assert!(out.contains("\"Is it \"\"done\"\"?\""));
        }
    }
}
