use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::aggregate::{
    CampaignNode, GrandTotal, HierarchyNode, NodeKind, ReportingPeriod, aggregate,
    duplicate_ad_keys,
};
use crate::cli::ReportArgs;
use crate::model::{Rules, Verdict};
use crate::plan::PlanTier;
use crate::store::Store;
use crate::util::now_utc_string;

mod format;
mod output;

#[derive(Debug, Serialize)]
pub(super) struct ReportDocument<'a> {
    pub account: &'a str,
    pub generated_at: String,
    pub rules: Rules,
    pub plan: PlanTier,
    pub visible_campaigns: usize,
    pub total_campaigns: usize,
    pub period: Option<ReportingPeriod>,
    pub grand_total: &'a GrandTotal,
    pub campaigns: &'a [CampaignNode],
}

pub fn run(args: ReportArgs) -> Result<()> {
    let account_id = args.store.account.as_str();
    let store = Store::open(&args.store.resolved_db_path())?;

    let records = store.load_records(account_id)?;
    let rules = store.effective_rules(account_id)?;
    let plan = match args.plan {
        Some(plan) => plan,
        None => PlanTier::resolve(store.load_subscription(account_id)?.as_ref()),
    };

    info!(
        account = %account_id,
        records = records.len(),
        plan = plan.as_str(),
        "building report"
    );

    for duplicate in duplicate_ad_keys(&records) {
        info!(
            campaign = %duplicate.campaign_name,
            ad_set = %duplicate.ad_set_name,
            ad = %duplicate.ad_name,
            occurrences = duplicate.occurrences,
            "ad appears on several rows; rows are summed"
        );
    }

    let hierarchy = aggregate(&records, &rules);
    let campaigns = plan.visible(&hierarchy.campaigns);
    if campaigns.len() < hierarchy.campaigns.len() {
        info!(
            plan = plan.as_str(),
            visible = campaigns.len(),
            total = hierarchy.campaigns.len(),
            "campaign list truncated by plan"
        );
    }

    let document = ReportDocument {
        account: account_id,
        generated_at: now_utc_string(),
        rules,
        plan,
        visible_campaigns: campaigns.len(),
        total_campaigns: hierarchy.campaigns.len(),
        period: hierarchy.period,
        grand_total: &hierarchy.grand_total,
        campaigns,
    };

    if args.json {
        output::write_json_report(&document)
    } else {
        output::write_text_report(&document, args.depth)
    }
}

pub(super) fn tally_verdicts(campaigns: &[CampaignNode]) -> HashMap<(NodeKind, Verdict), usize> {
    let mut tally = HashMap::new();
    let mut stack: Vec<HierarchyNode<'_>> =
        campaigns.iter().map(HierarchyNode::Campaign).collect();

    while let Some(node) = stack.pop() {
        *tally
            .entry((node.kind(), node.summary().verdict))
            .or_insert(0) += 1;
        stack.extend(node.children());
    }

    tally
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::model::PerformanceRecord;

    fn record(
        campaign: &str,
        ad_set: &str,
        ad: &str,
        spend: Decimal,
        revenue: Decimal,
    ) -> PerformanceRecord {
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid date");
        PerformanceRecord {
            period_start: day,
            period_end: day,
            campaign_name: campaign.to_string(),
            ad_set_name: ad_set.to_string(),
            ad_name: ad.to_string(),
            impressions: 100,
            clicks: 5,
            spend,
            purchases: 1,
            revenue,
        }
    }

    #[test]
    fn tally_counts_every_level() {
        let records = vec![
            record("C1", "S1", "A1", dec!(200), dec!(800)),
            record("C1", "S1", "A2", dec!(200), dec!(100)),
            record("C2", "S2", "A3", dec!(10), dec!(0)),
        ];
        let hierarchy = aggregate(&records, &Rules::default());

        let tally = tally_verdicts(&hierarchy.campaigns);
        assert_eq!(tally.get(&(NodeKind::Ad, Verdict::Scale)), Some(&1));
        assert_eq!(tally.get(&(NodeKind::Ad, Verdict::Cut)), Some(&1));
        assert_eq!(tally.get(&(NodeKind::Ad, Verdict::Learn)), Some(&1));
        assert_eq!(tally.get(&(NodeKind::AdSet, Verdict::Watch)), Some(&1));
        assert_eq!(tally.get(&(NodeKind::Campaign, Verdict::Learn)), Some(&1));
        assert_eq!(tally.values().sum::<usize>(), 7);
    }

    #[test]
    fn truncation_keeps_grand_total_of_all_campaigns() {
        let records: Vec<PerformanceRecord> = (0..5)
            .map(|index| record(&format!("C{index}"), "S", "A", dec!(100), dec!(100)))
            .collect();
        let hierarchy = aggregate(&records, &Rules::default());

        let visible = PlanTier::Free.visible(&hierarchy.campaigns);
        assert_eq!(visible.len(), 3);
        assert_eq!(visible[0].summary.name, "C0");
        assert_eq!(hierarchy.grand_total.summary.metrics.spend, dec!(500));
    }
}
