//! Per-trial records and the aggregated sweep report.

use std::fmt;

use convfuse::DType;

use crate::compare::ComparisonResult;

#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    Passed,
    /// Both sides ran but the comparison failed.
    Mismatch,
    /// A primitive, the fused kernel or input generation failed.
    Failed(String),
}

impl TrialOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TrialOutcome::Passed => "ok",
            TrialOutcome::Mismatch => "mismatch",
            TrialOutcome::Failed(_) => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub name: String,
    pub dtype: DType,
    /// Reproducible description of the trial configuration.
    pub summary: String,
    pub outcome: TrialOutcome,
    pub comparison: Option<ComparisonResult>,
}

impl TrialRecord {
    pub fn passed(&self) -> bool {
        self.outcome == TrialOutcome::Passed
    }

    pub fn max_abs_diff(&self) -> Option<f64> {
        self.comparison.as_ref().map(|c| c.max_abs_diff)
    }

    /// Why the trial failed, empty when it passed.
    pub fn detail(&self) -> String {
        match (&self.outcome, &self.comparison) {
            (TrialOutcome::Passed, _) => String::new(),
            (TrialOutcome::Failed(reason), _) => reason.clone(),
            (TrialOutcome::Mismatch, Some(c)) if !c.shape_match => "shape mismatch".to_string(),
            (TrialOutcome::Mismatch, Some(c)) if !c.dtype_match => "dtype mismatch".to_string(),
            (TrialOutcome::Mismatch, Some(c)) => match &c.first_mismatch {
                Some(first) => format!("{} mismatched; {first}", c.mismatched),
                None => format!("{} mismatched", c.mismatched),
            },
            (TrialOutcome::Mismatch, None) => "mismatch".to_string(),
        }
    }
}

/// Result of a whole sweep. It passes only if every trial passed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    records: Vec<TrialRecord>,
}

impl SweepReport {
    pub fn new(records: Vec<TrialRecord>) -> Self {
        SweepReport { records }
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn passed(&self) -> usize {
        self.records.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TrialRecord> {
        self.records.iter().filter(|r| !r.passed())
    }

    /// Bordered text table with one row per trial and a totals line.
    pub fn render_table(&self) -> String {
        let headers = ["trial", "dtype", "status", "max_abs_diff", "detail"];
        let aligns = [
            Align::Left,
            Align::Left,
            Align::Center,
            Align::Right,
            Align::Left,
        ];
        let rows: Vec<[String; 5]> = self
            .records
            .iter()
            .map(|r| {
                [
                    r.name.clone(),
                    r.dtype.to_string(),
                    r.outcome.label().to_string(),
                    format_diff(r.max_abs_diff()),
                    r.detail(),
                ]
            })
            .collect();

        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        let mut out = String::new();
        let line = border(&widths);
        out.push_str(&line);
        out.push('\n');
        let header: Vec<String> = headers
            .iter()
            .zip(&widths)
            .map(|(h, &w)| format_cell(h, w, Align::Center))
            .collect();
        out.push_str(&format!("| {} |\n", header.join(" | ")));
        out.push_str(&line);
        out.push('\n');
        for row in &rows {
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .zip(&aligns)
                .map(|((cell, &w), &align)| format_cell(cell, w, align))
                .collect();
            out.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        out.push_str(&line);
        out.push('\n');
        out.push_str(&format!("{self}\n"));
        out
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_success() { "PASS" } else { "FAIL" };
        write!(
            f,
            "{status}: {} trials, {} passed, {} failed",
            self.len(),
            self.passed(),
            self.failed()
        )
    }
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
    Center,
}

fn format_cell(value: &str, width: usize, align: Align) -> String {
    match align {
        Align::Left => format!("{value:<width$}"),
        Align::Right => format!("{value:>width$}"),
        Align::Center => {
            let pad = width.saturating_sub(value.len());
            let left = pad / 2;
            let right = pad - left;
            format!("{}{}{}", " ".repeat(left), value, " ".repeat(right))
        }
    }
}

fn border(widths: &[usize]) -> String {
    let mut line = String::new();
    line.push('+');
    for width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('+');
    }
    line
}

fn format_diff(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.3e}"),
        Some(v) => v.to_string(),
        None => "n/a".to_string(),
    }
}
