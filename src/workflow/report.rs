//! 终端输出的文本报告

use crate::insights::QuickInsight;
use crate::types::{AnalysisEnvelope, ChartSpec, RunStatus};

/// 把运行结果渲染为 Markdown 文本
pub fn render_envelope(envelope: &AnalysisEnvelope) -> String {
    let mut report = format!("# {}\n\n", envelope.query);
    report.push_str(&format!("- run: `{}`\n", envelope.run_id));

    if envelope.status == RunStatus::Failed {
        report.push_str(&format!(
            "- status: failed ({})\n",
            envelope.reason.as_deref().unwrap_or("unknown reason")
        ));
        return report;
    }

    report.push_str(&format!(
        "- status: completed after {} iteration(s)\n",
        envelope.iteration_count
    ));
    let keys: Vec<&str> = envelope.data.keys().map(String::as_str).collect();
    report.push_str(&format!(
        "- datasets: {}\n\n",
        if keys.is_empty() {
            "(none)".to_string()
        } else {
            keys.join(", ")
        }
    ));

    report.push_str(&format!("## Analysis\n\n{}\n\n", envelope.analysis));
    report.push_str(&format!("## Recommendations\n\n{}\n\n", envelope.recommendations));

    if !envelope.charts.is_empty() {
        report.push_str("## Charts\n\n");
        for chart in &envelope.charts {
            report.push_str(&format!("- {}\n", describe_chart(chart)));
        }
        report.push('\n');
    }

    if !envelope.issues.is_empty() {
        report.push_str("## Issues\n\n");
        for issue in &envelope.issues {
            report.push_str(&format!(
                "- [iteration {}] {:?}{}: {}\n",
                issue.iteration,
                issue.kind,
                issue
                    .key
                    .as_deref()
                    .map(|key| format!(" `{}`", key))
                    .unwrap_or_default(),
                issue.detail
            ));
        }
    }

    report
}

fn describe_chart(chart: &ChartSpec) -> String {
    format!(
        "{} `{}` on `{}` ({})",
        chart.kind(),
        chart.title(),
        chart.data_key(),
        chart.referenced_fields().join(", ")
    )
}

/// 快速洞察的表格
pub fn render_insights(insights: &[QuickInsight]) -> String {
    let mut report = String::from("| Metric | Value | Trend |\n|---|---|---|\n");
    for insight in insights {
        report.push_str(&format!(
            "| {} | {} | {} |\n",
            insight.metric, insight.value, insight.trend
        ));
    }
    report
}
