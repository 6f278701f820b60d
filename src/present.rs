//! The Presenter (§4.7): renders the result tree as a table, without
//! mutating it, using `comfy-table`.

use std::time::Duration;

use comfy_table::{Cell, ContentArrangement, Table};

use crate::aggregate::aggregate;
use crate::model::{run_passed, EvaluatorqResult, ScoreValue};

const CELL_WIDTH_LIMIT: usize = 40;

/// Renders `results` as a table plus a one-line summary, and returns it as a
/// string - the caller decides whether to print it (§4.7: "never writes
/// directly to stdout; it returns the rendered text").
pub fn render(results: &EvaluatorqResult, elapsed: Duration) -> String {
    let columns = aggregate(results);
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![Cell::new("datapoint"), Cell::new("job")];
    for column in &columns {
        header.push(Cell::new(&column.evaluator_name));
    }
    table.set_header(header);

    for (row_index, entry) in results.iter().enumerate() {
        for job_result in &entry.job_results {
            let mut row = vec![Cell::new(row_index.to_string()), Cell::new(&job_result.job_name)];
            for column in &columns {
                let cell = if column.job_name == job_result.job_name {
                    job_result
                        .evaluator_scores
                        .iter()
                        .find(|es| es.evaluator_name == column.evaluator_name)
                        .map(render_score_cell)
                        .unwrap_or_else(|| "-".to_string())
                } else {
                    String::new()
                };
                row.push(Cell::new(truncate(&cell)));
            }
            table.add_row(row);
        }
    }

    let mut footer = vec![Cell::new(""), Cell::new("aggregate")];
    for column in &columns {
        footer.push(Cell::new(column.value.to_string()));
    }
    table.add_row(footer);

    let total_datapoints = results.len();
    let failed_datapoints = results
        .iter()
        .filter(|entry| {
            entry
                .job_results
                .iter()
                .any(|jr| jr.evaluator_scores.iter().any(|es| es.score.pass == Some(false)))
        })
        .count();
    let pass_rate = if total_datapoints == 0 {
        100.0
    } else {
        100.0 * (total_datapoints - failed_datapoints) as f64 / total_datapoints as f64
    };
    let overall = if run_passed(results) { "PASS" } else { "FAIL" };

    format!(
        "{table}\n\n{overall}: {total_datapoints} datapoint(s), {failed_datapoints} with a failing score, {pass_rate:.1}% clean, {elapsed_ms}ms",
        elapsed_ms = elapsed.as_millis(),
    )
}

fn render_score_cell(evaluator_score: &crate::model::EvaluatorScore) -> String {
    if let Some(ref error) = evaluator_score.error {
        return format!("ERROR: {error}");
    }
    match &evaluator_score.score.value {
        ScoreValue::Bool(b) => b.to_string(),
        ScoreValue::Num(n) => format!("{n:.2}"),
        ScoreValue::Str(s) => s.clone(),
        ScoreValue::Cell(_) => "[structured]".to_string(),
        ScoreValue::Raw(_) => "[structured]".to_string(),
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= CELL_WIDTH_LIMIT {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(CELL_WIDTH_LIMIT.saturating_sub(1)).collect();
        out.push('\u{2026}');
        out
    }
}
