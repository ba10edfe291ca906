//! Formatted terminal output.
//!
//! Formatting lives in one place so the training and prediction code stays
//! free of presentation concerns.

use std::collections::BTreeMap;

use crate::error::AppError;
use crate::pipeline::{PhaseModels, PhaseSchema};
use crate::report::PredictionReport;

/// Per-stage training summary: sample counts, CV policy, metrics and failures.
pub fn format_training_summary(models: &PhaseModels) -> Result<String, AppError> {
    let mut out = String::new();
    out.push_str(&format!("=== icost - {} ===\n", models.phase.display_name()));
    out.push_str(&format!("Trained: {}\n\n", models.trained_at.format("%Y-%m-%d %H:%M:%S UTC")));

    push_row(
        &mut out,
        &format!(
            "{:<28} {:>5} {:>8} {:<18} {:<14} {:>7} {:>8} {:>14}",
            "category", "n", "removed", "regressor", "cv", "R2", "MAPE%", "RMSE"
        ),
    );
    push_row(
        &mut out,
        &format!(
            "{:-<28} {:-<5} {:-<8} {:-<18} {:-<14} {:-<7} {:-<8} {:-<14}",
            "", "", "", "", "", "", "", ""
        ),
    );

    let mut warnings: Vec<String> = Vec::new();
    for m in models.ordered()? {
        let r2 = if m.metrics.r2.is_finite() {
            format!("{:.3}", m.metrics.r2)
        } else {
            "n/a".to_string()
        };
        let cv = if m.cross_validated { m.cv.label() } else { format!("{}*", m.cv.label()) };
        push_row(
            &mut out,
            &format!(
                "{:<28} {:>5} {:>8} {:<18} {:<14} {:>7} {:>8.1} {:>14.0}",
                truncate(&m.category, 28),
                m.n_samples,
                m.outliers.n_removed,
                m.regressor,
                cv,
                r2,
                m.metrics.mape_pct,
                m.metrics.rmse
            ),
        );
        warnings.extend(m.warnings.iter().map(|w| format!("{}: {w}", m.category)));
    }

    if models.ordered()?.iter().any(|m| !m.cross_validated) {
        out.push_str("\n* in-sample metrics (too few samples to cross-validate)\n");
    }
    if !warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for w in &warnings {
            out.push_str(&format!("- {w}\n"));
        }
    }
    if !models.failures.is_empty() {
        out.push_str("\nFailed stages:\n");
        for f in &models.failures {
            out.push_str(&format!("- {} (exit {}): {}\n", f.category, f.exit_code, f.reason));
        }
    }
    Ok(out)
}

/// Predicted items in execution order, plus the total.
pub fn format_prediction(report: &PredictionReport, schema: &PhaseSchema) -> Result<String, AppError> {
    let mut out = String::new();
    out.push_str(&format!("=== icost - {} estimate ===\n", report.phase.display_name()));
    if !report.project.scope.is_empty() {
        out.push_str(&format!("Scope: {}\n", report.project.scope));
    }
    out.push('\n');

    push_row(&mut out, &format!("{:<28} {:>18}", "category", "estimate"));
    push_row(&mut out, &format!("{:-<28} {:-<18}", "", ""));
    for decl in schema.execution_order()? {
        let value = report.items.get(decl.category()).copied().unwrap_or(0.0);
        push_row(&mut out, &format!("{:<28} {:>18}", truncate(decl.category(), 28), fmt_money(value)));
    }
    push_row(&mut out, &format!("{:-<28} {:-<18}", "", ""));
    push_row(&mut out, &format!("{:<28} {:>18}", "total", fmt_money(report.total)));
    Ok(out)
}

/// Stages of a phase in execution order with their modeling choices.
pub fn format_schema(schema: &PhaseSchema) -> Result<String, AppError> {
    let mut out = String::new();
    out.push_str(&format!("=== icost - {} stages ===\n\n", schema.phase.display_name()));
    for (i, decl) in schema.execution_order()?.iter().enumerate() {
        let spec = &decl.stage;
        out.push_str(&format!(
            "{:>2}. {} <- [{}]\n",
            i + 1,
            decl.category(),
            spec.predictors().join(", ")
        ));
        let mut details: BTreeMap<&str, String> = BTreeMap::new();
        details.insert("regressor", spec.regressor.display_name().to_string());
        details.insert("target", format!("{:?}", spec.transform).to_lowercase());
        details.insert("data", decl.preparation.label().to_string());
        if !spec.layout.log_features.is_empty() {
            details.insert("log1p", spec.layout.log_features.join(", "));
        }
        if spec.layout.use_scope {
            details.insert("scope", "one-hot".to_string());
        }
        if !decl.depends_on.is_empty() {
            details.insert("after", decl.depends_on.join(", "));
        }
        if !decl.gates.is_empty() {
            details.insert("zero unless", decl.gates.join(" or "));
        }
        if spec.augmentation.is_some() {
            details.insert("augmented", "yes".to_string());
        }
        for (k, v) in details {
            out.push_str(&format!("      {k}: {v}\n"));
        }
    }
    Ok(out)
}

fn push_row(out: &mut String, row: &str) {
    out.push_str(row.trim_end());
    out.push('\n');
}

/// Thousands-separated, no decimals.
fn fmt_money(v: f64) -> String {
    let rounded = v.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 { format!("-{grouped}") } else { grouped }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
