//! Console rendering of workflow results
//!
//! Pure presentation: every function turns a result structure into a
//! string and never touches the computation.

use crate::analysis::DatasetProfile;
use crate::evaluation::{ClassificationMetrics, EvaluationResult};
use crate::segmentation::RiskTier;
use crate::training::ModelId;
use crate::workflow::WorkflowReport;
use colored::*;
use std::fmt::Write;

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}
fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn tier_color(tier: RiskTier, s: &str) -> ColoredString {
    match tier {
        RiskTier::Safe => s.truecolor(100, 210, 120),
        RiskTier::LowRisk => s.truecolor(230, 210, 90),
        RiskTier::MediumRisk => s.truecolor(240, 150, 60),
        RiskTier::HighRisk => s.truecolor(235, 80, 80),
    }
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' {
            in_escape = true;
            continue;
        }
        if in_escape {
            if c == 'm' {
                in_escape = false;
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Builder for a boxed panel
struct Panel {
    out: String,
}

impl Panel {
    fn new(title: &str) -> Self {
        let mut panel = Self { out: String::new() };
        panel.rule('┌', '┐');
        panel.center(&title.white().bold().to_string());
        panel.rule('├', '┤');
        panel
    }

    fn rule(&mut self, left: char, right: char) {
        let line = format!("{}{}{}", left, "─".repeat(W + 1), right);
        let _ = writeln!(self.out, "  {}", dim(&line));
    }

    fn line(&mut self, content: &str) {
        let visible = strip_ansi(content).chars().count();
        let pad = W.saturating_sub(visible);
        let _ = writeln!(self.out, "  {} {}{}{}", dim("│"), content, " ".repeat(pad), dim("│"));
    }

    fn center(&mut self, content: &str) {
        let visible = strip_ansi(content).chars().count();
        let total = W.saturating_sub(visible);
        let left = total / 2;
        let _ = writeln!(
            self.out,
            "  {} {}{}{}{}",
            dim("│"),
            " ".repeat(left),
            content,
            " ".repeat(total - left),
            dim("│")
        );
    }

    fn kv(&mut self, key: &str, val: &str) {
        self.line(&format!("{:<22} {}", muted(key), val.white()));
    }

    fn sep(&mut self) {
        self.rule('├', '┤');
    }

    fn finish(mut self) -> String {
        self.rule('└', '┘');
        self.out
    }
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}", title.white().bold());
    let _ = writeln!(out, "  {}", dim(&"─".repeat(56)));
}

/// Holdout metrics panel of one model
pub fn render_metrics(title: &str, metrics: &ClassificationMetrics) -> String {
    let mut panel = Panel::new(title);
    panel.kv("Accuracy", &format!("{:.4}", metrics.accuracy));
    panel.kv("ROC AUC", &format!("{:.4}", metrics.roc_auc));
    panel.sep();
    panel.line(&format!(
        "{:<12}{:>11}{:>11}{:>11}{:>11}",
        muted("class"),
        muted("precision"),
        muted("recall"),
        muted("f1"),
        muted("support")
    ));
    for class in &metrics.per_class {
        panel.line(&format!(
            "{:<12}{:>11.3}{:>11.3}{:>11.3}{:>11}",
            class.label, class.precision, class.recall, class.f1, class.support
        ));
    }
    panel.line(&format!(
        "{:<12}{:>11.3}{:>11.3}{:>11.3}{:>11}",
        "macro avg",
        metrics.macro_avg.precision,
        metrics.macro_avg.recall,
        metrics.macro_avg.f1,
        metrics.n_samples
    ));
    panel.sep();
    let cm = &metrics.confusion;
    panel.line(&format!("{:<22}{:>12}{:>12}", muted("confusion"), muted("pred stayed"), muted("pred left")));
    panel.line(&format!("{:<22}{:>12}{:>12}", "actual stayed", cm.true_negative, cm.false_positive));
    panel.line(&format!("{:<22}{:>12}{:>12}", "actual left", cm.false_negative, cm.true_positive));
    panel.finish()
}

/// Search summary and, when present, secondary CV and holdout metrics
pub fn render_evaluation(result: &EvaluationResult) -> String {
    let mut out = String::new();
    let name = result
        .best_config
        .model_id()
        .display_name();

    let mut panel = Panel::new(&format!("{} ({})", name, result.model));
    panel.kv("Best parameters", &result.best_config.to_string());
    panel.kv("CV accuracy", &format!("{:.4}", result.best_score));
    panel.sep();
    for candidate in &result.candidates {
        let marker = if candidate.rank == 1 { ok("●") } else { dim("○") };
        panel.line(&format!(
            "{} {:<34} {:.4} ± {:.4}",
            marker, candidate.config, candidate.cv.mean_score, candidate.cv.std_score
        ));
    }
    if let Some(cv) = &result.cross_validation {
        panel.sep();
        panel.kv("CV recall (left)", &format!("{:.4}", cv.recall.mean_score));
        panel.kv("CV ROC AUC", &format!("{:.4}", cv.roc_auc.mean_score));
        panel.kv("CV precision (macro)", &format!("{:.4}", cv.precision_macro.mean_score));
        panel.kv("CV recall (macro)", &format!("{:.4}", cv.recall_macro.mean_score));
    }
    out.push_str(&panel.finish());

    if let Some(metrics) = &result.test_metrics {
        out.push_str(&render_metrics(&format!("{} holdout", result.model), metrics));
    }
    out
}

/// Full workflow report
pub fn render_report(report: &WorkflowReport) -> String {
    let mut out = String::new();

    section(&mut out, "Data");
    let _ = writeln!(out, "  {:<18} {}", muted("Source"), report.config.data_source);
    let _ = writeln!(out, "  {:<18} {}", muted("Rows"), report.n_rows);
    let _ = writeln!(out, "  {:<18} {}", muted("Features"), report.feature_names.len());
    if report.missing.has_missing() {
        let _ = writeln!(
            out,
            "  {:<18} {} ({} rows dropped)",
            muted("Missing values"),
            report.missing.affected_columns().join(", ").yellow(),
            report.missing.rows_dropped
        );
    } else {
        let _ = writeln!(out, "  {:<18} {}", muted("Missing values"), ok("none"));
    }
    let _ = writeln!(
        out,
        "  {:<18} {} train / {} test",
        muted("Split"),
        report.n_train,
        report.n_test
    );
    let _ = writeln!(
        out,
        "  {:<18} {} stayed / {} left -> {} / {} (+{} synthetic)",
        muted("Oversampling"),
        report.train_balance.retained,
        report.train_balance.departed,
        report.resampled_balance.retained,
        report.resampled_balance.departed,
        report.n_synthetic
    );

    section(&mut out, "Models");
    for result in &report.results {
        out.push_str(&render_evaluation(result));
    }

    section(&mut out, "Risk segmentation");
    let _ = writeln!(
        out,
        "  {:<18} {}",
        muted("Scored by"),
        accent(report.best_model.display_name())
    );
    let seg = &report.segmentation;
    for count in &seg.tier_counts {
        let share = if seg.is_empty() {
            0.0
        } else {
            100.0 * count.count as f64 / seg.len() as f64
        };
        let _ = writeln!(
            out,
            "  {:<18} {:>6} {}",
            tier_color(count.tier, count.tier.label()),
            count.count,
            dim(&format!("({:.1}%)", share))
        );
    }
    if !seg.tier_profiles.is_empty() {
        let _ = writeln!(out);
        let header: String = seg
            .profile_features
            .iter()
            .map(|f| format!("{:>24}", f))
            .collect();
        let _ = writeln!(out, "  {:<18}{}", "", muted(&header));
        for profile in &seg.tier_profiles {
            let values: String = profile.means.iter().map(|m| format!("{:>24.3}", m)).collect();
            let _ = writeln!(out, "  {:<18}{}", tier_color(profile.tier, profile.tier.label()), values);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "  {} {}", ok("✓"), dim(&format!("completed in {:.2}s", report.elapsed_secs)));
    out
}

/// Exploratory profile
pub fn render_profile(profile: &DatasetProfile) -> String {
    let mut out = String::new();

    section(&mut out, "Dataset");
    let _ = writeln!(out, "  {:<18} {}", muted("Rows"), profile.n_rows);
    let _ = writeln!(out, "  {:<18} {}", muted("Columns"), profile.n_columns);
    let missing = if profile.missing.has_missing() {
        format!("{} values", profile.missing.total_missing()).yellow()
    } else {
        ok("none")
    };
    let _ = writeln!(out, "  {:<18} {}", muted("Missing values"), missing);
    let _ = writeln!(
        out,
        "  {:<18} {} stayed / {} left ({:.1}% turnover)",
        muted("Class balance"),
        profile.class_balance.retained,
        profile.class_balance.departed,
        100.0 * profile.class_balance.departure_rate()
    );

    section(&mut out, "Numeric summary");
    let _ = writeln!(
        out,
        "  {:<24}{:>10}{:>10}{:>10}{:>10}",
        muted("column"),
        muted("mean"),
        muted("std"),
        muted("min"),
        muted("max")
    );
    for s in &profile.numeric_summary {
        let _ = writeln!(
            out,
            "  {:<24}{:>10.3}{:>10.3}{:>10.3}{:>10.3}",
            s.column, s.mean, s.std, s.min, s.max
        );
    }

    for table in &profile.crosstabs {
        section(&mut out, &format!("Turnover by {}", table.column));
        for row in &table.rows {
            let _ = writeln!(
                out,
                "  {:<16}{:>8}{:>8}  {}",
                row.category,
                row.retained,
                row.departed,
                dim(&format!("{:.1}% left", 100.0 * row.departure_rate()))
            );
        }
    }

    section(&mut out, "K-means elbow");
    for point in &profile.elbow {
        let _ = writeln!(out, "  k={:<4}{:>16.3}", point.k, point.inertia);
    }

    for clusters in &profile.clusters {
        section(&mut out, &format!("Clusters (k={})", clusters.k));
        let header: String = clusters.features.iter().map(|f| format!("{:>20}", f)).collect();
        let _ = writeln!(out, "  {:<14}{}", muted("size"), muted(&header));
        for (size, means) in &clusters.clusters {
            let values: String = means.iter().map(|m| format!("{:>20.3}", m)).collect();
            let _ = writeln!(out, "  {:<14}{}", size, values);
        }
    }
    out
}

/// Registry listing: codes, names and grids
pub fn render_registry() -> String {
    let mut out = String::new();
    section(&mut out, "Model registry");
    for id in ModelId::ALL {
        let grid = id.param_grid();
        let _ = writeln!(
            out,
            "  {:<4} {:<22} {}",
            accent(id.code()),
            id.display_name(),
            dim(&format!("{} combinations", grid.len()))
        );
        for config in grid {
            let _ = writeln!(out, "       {}", muted(&config.to_string()));
        }
    }
    out
}
