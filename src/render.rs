//! Comparison chart of field subsets that meet or beat the baseline.
//!
//! Output is a CSV of the plotted series plus a Markdown report with a text
//! bar chart of F1.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::evaluation::metrics::SubsetMetrics;
use crate::evaluation::ranking::{at_or_above_baseline, best_subset, RankingError};
use crate::tabular::format_record;

const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    pub rank: usize,
    pub fields: String,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub baseline: String,
    pub baseline_f1: f64,
    pub best: Option<String>,
    pub subsets_scored: usize,
    pub subsets_undefined: usize,
    pub rows: Vec<ChartRow>,
}

impl ChartSeries {
    /// Subsets at or above the baseline's F1, sorted descending by F1.
    pub fn from_metrics(
        metrics: &BTreeMap<String, SubsetMetrics>,
        baseline: &str,
    ) -> Result<Self, RankingError> {
        let kept = at_or_above_baseline(metrics.values(), baseline)?;
        let rows = kept
            .into_iter()
            .filter_map(|m| match (m.f1, m.precision, m.recall) {
                (Some(f1), Some(precision), Some(recall)) => Some((m.name(), f1, precision, recall)),
                _ => None,
            })
            .enumerate()
            .map(|(idx, (fields, f1, precision, recall))| ChartRow {
                rank: idx + 1,
                fields,
                f1,
                precision,
                recall,
            })
            .collect();

        let baseline_f1 = metrics
            .get(baseline)
            .and_then(|m| m.f1)
            .ok_or_else(|| RankingError::BaselineUndefined(baseline.to_string()))?;
        let subsets_undefined = metrics.values().filter(|m| m.f1.is_none()).count();

        Ok(Self {
            baseline: baseline.to_string(),
            baseline_f1,
            best: best_subset(metrics.values()).map(SubsetMetrics::name),
            subsets_scored: metrics.len() - subsets_undefined,
            subsets_undefined,
            rows,
        })
    }
}

pub fn write_chart_csv(series: &ChartSeries, out: &mut impl Write) -> io::Result<()> {
    out.write_all(format_record(&["rank", "fields", "f1", "precision", "recall"]).as_bytes())?;
    for row in &series.rows {
        let rank = row.rank.to_string();
        let f1 = format!("{:.6}", row.f1);
        let precision = format!("{:.6}", row.precision);
        let recall = format!("{:.6}", row.recall);
        out.write_all(format_record(&[&rank, &row.fields, &f1, &precision, &recall]).as_bytes())?;
    }
    Ok(())
}

pub fn render_chart_markdown(series: &ChartSeries) -> String {
    let mut out = String::new();
    out.push_str("# Field Subset Comparison\n\n");
    out.push_str(&format!(
        "- Baseline: `{}` (F1 {:.4})\n",
        series.baseline, series.baseline_f1
    ));
    if let Some(best) = &series.best {
        out.push_str(&format!("- Best subset: `{best}`\n"));
    }
    out.push_str(&format!(
        "- Subsets at or above baseline: {} of {} scored\n",
        series.rows.len(),
        series.subsets_scored
    ));
    if series.subsets_undefined > 0 {
        out.push_str(&format!(
            "- Subsets with undefined F1 (not plotted): {}\n",
            series.subsets_undefined
        ));
    }

    out.push_str("\n## Scores\n\n");
    out.push_str("| Rank | Fields | F1 | Precision | Recall |\n");
    out.push_str("|---:|---|---:|---:|---:|\n");
    for row in &series.rows {
        out.push_str(&format!(
            "| {} | `{}` | {:.4} | {:.4} | {:.4} |\n",
            row.rank, row.fields, row.f1, row.precision, row.recall
        ));
    }

    out.push_str("\n## F1\n\n```text\n");
    let label_width = series
        .rows
        .iter()
        .map(|r| r.fields.len())
        .max()
        .unwrap_or(0);
    for row in &series.rows {
        let filled = (row.f1.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
        out.push_str(&format!(
            "{:<width$} |{}{}| {:.4}\n",
            row.fields,
            "#".repeat(filled),
            " ".repeat(BAR_WIDTH - filled),
            row.f1,
            width = label_width
        ));
    }
    out.push_str("```\n");
    out
}

/// Write `chart.csv` and `chart.md` into `dir`.
pub fn write_chart(series: &ChartSeries, dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut csv = std::fs::File::create(dir.join("chart.csv"))?;
    write_chart_csv(series, &mut csv)?;
    std::fs::write(dir.join("chart.md"), render_chart_markdown(series))?;
    Ok(())
}

/// Dump all metrics as a JSON array; undefined scores are `null`.
pub fn write_metrics_json(metrics: &BTreeMap<String, SubsetMetrics>, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let all: Vec<&SubsetMetrics> = metrics.values().collect();
    let json = serde_json::to_string_pretty(&all).map_err(io::Error::other)?;
    std::fs::write(path, json)
}
