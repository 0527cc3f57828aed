use std::io::{self, Write};

use anyhow::{Context, Result};

use super::format::{format_count, format_currency, format_percent, format_roas};
use super::{ReportDocument, tally_verdicts};
use crate::aggregate::{HierarchyNode, NodeKind, NodeSummary};
use crate::cli::ReportDepth;
use crate::model::Verdict;

const NAME_WIDTH: usize = 44;

pub(super) fn write_json_report(document: &ReportDocument<'_>) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, document)
        .context("failed to serialize report json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

pub(super) fn write_text_report(document: &ReportDocument<'_>, depth: ReportDepth) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    render_text_report(&mut output, document, depth)?;
    output.flush()?;
    Ok(())
}

pub(super) fn render_text_report<W: Write>(
    output: &mut W,
    document: &ReportDocument<'_>,
    depth: ReportDepth,
) -> Result<()> {
    writeln!(output, "Account: {}", document.account)?;
    match document.period {
        Some(period) => writeln!(output, "Period: {} - {}", period.start, period.end)?,
        None => writeln!(output, "Period: (no data)")?,
    }
    writeln!(
        output,
        "Rules: scale >= {} | watch >= {} | learning below {}",
        format_roas(document.rules.scale_roas),
        format_roas(document.rules.min_roas),
        format_currency(document.rules.learning_spend),
    )?;
    writeln!(
        output,
        "Plan: {} ({} of {} campaigns shown)",
        document.plan.label(),
        document.visible_campaigns,
        document.total_campaigns
    )?;

    let tally = tally_verdicts(document.campaigns);
    for kind in [NodeKind::Campaign, NodeKind::AdSet, NodeKind::Ad] {
        let counts: Vec<String> = Verdict::ALL
            .iter()
            .map(|verdict| {
                let count = tally.get(&(kind, *verdict)).copied().unwrap_or(0);
                format!("{} {count}", verdict.icon())
            })
            .collect();
        writeln!(output, "Verdicts ({}): {}", kind.as_str(), counts.join("  "))?;
    }
    writeln!(output)?;

    writeln!(
        output,
        "{:<NAME_WIDTH$} {:>9} {:>9} {:>11} {:>7} {:>11} {:>7} {:>7} {:>9}",
        "NAME", "IMPR", "CLICKS", "SPEND", "PURCH", "REVENUE", "CTR", "ROAS", "VERDICT"
    )?;
    write_row(output, "", &document.grand_total.summary)?;

    let max_depth = match depth {
        ReportDepth::Campaign => 0,
        ReportDepth::AdSet => 1,
        ReportDepth::Ad => 2,
    };
    for campaign in document.campaigns {
        write_node(output, HierarchyNode::Campaign(campaign), 0, max_depth)?;
    }

    Ok(())
}

fn write_node<W: Write>(
    output: &mut W,
    node: HierarchyNode<'_>,
    level: usize,
    max_depth: usize,
) -> Result<()> {
    let tag = match node.kind() {
        NodeKind::Campaign => "[Camp]",
        NodeKind::AdSet => "[Set]",
        NodeKind::Ad => "[Ad]",
    };
    let prefix = format!("{}{tag} ", "  ".repeat(level + 1));
    write_row(output, &prefix, node.summary())?;

    if level < max_depth {
        for child in node.children() {
            write_node(output, child, level + 1, max_depth)?;
        }
    }
    Ok(())
}

fn write_row<W: Write>(output: &mut W, prefix: &str, summary: &NodeSummary) -> Result<()> {
    let metrics = &summary.metrics;
    writeln!(
        output,
        "{:<NAME_WIDTH$} {:>9} {:>9} {:>11} {:>7} {:>11} {:>7} {:>7} {:>9}",
        truncate_name(&format!("{prefix}{}", summary.name)),
        format_count(metrics.impressions),
        format_count(metrics.clicks),
        format_currency(metrics.spend),
        format_count(metrics.purchases),
        format_currency(metrics.revenue),
        format_percent(summary.ctr),
        format_roas(summary.roas),
        summary.verdict.to_string(),
    )?;
    Ok(())
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() <= NAME_WIDTH {
        return name.to_string();
    }
    let mut truncated: String = name.chars().take(NAME_WIDTH - 1).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::aggregate::aggregate;
    use crate::model::{PerformanceRecord, Rules};
    use crate::plan::PlanTier;

    fn records() -> Vec<PerformanceRecord> {
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid date");
        vec![PerformanceRecord {
            period_start: day,
            period_end: day,
            campaign_name: "Summer Sale".to_string(),
            ad_set_name: "Lookalike".to_string(),
            ad_name: "Video".to_string(),
            impressions: 45_000,
            clicks: 1_100,
            spend: dec!(750),
            purchases: 18,
            revenue: dec!(3400),
        }]
    }

    fn render(depth: ReportDepth) -> String {
        let records = records();
        let rules = Rules::default();
        let hierarchy = aggregate(&records, &rules);
        let document = ReportDocument {
            account: "default",
            generated_at: "2024-02-01T00:00:00Z".to_string(),
            rules,
            plan: PlanTier::Free,
            visible_campaigns: hierarchy.campaigns.len(),
            total_campaigns: hierarchy.campaigns.len(),
            period: hierarchy.period,
            grand_total: &hierarchy.grand_total,
            campaigns: &hierarchy.campaigns,
        };

        let mut buffer = Vec::new();
        render_text_report(&mut buffer, &document, depth).expect("report should render");
        String::from_utf8(buffer).expect("report should be utf-8")
    }

    #[test]
    fn text_report_lists_every_level_at_full_depth() {
        let text = render(ReportDepth::Ad);
        assert!(text.contains("Period: 2024-01-15 - 2024-01-15"));
        assert!(text.contains("All Campaigns"));
        assert!(text.contains("[Camp] Summer Sale"));
        assert!(text.contains("[Set] Lookalike"));
        assert!(text.contains("[Ad] Video"));
        assert!(text.contains("$3,400"));
        assert!(text.contains("4.5x"));
        assert!(text.contains("↑ Scale"));
    }

    #[test]
    fn text_report_respects_depth() {
        let text = render(ReportDepth::Campaign);
        assert!(text.contains("[Camp] Summer Sale"));
        assert!(!text.contains("[Set]"));
        assert!(!text.contains("[Ad]"));
    }

    #[test]
    fn long_names_are_truncated() {
        let name = "x".repeat(NAME_WIDTH + 10);
        let truncated = truncate_name(&name);
        assert_eq!(truncated.chars().count(), NAME_WIDTH);
        assert!(truncated.ends_with('…'));
    }
}
