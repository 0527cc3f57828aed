use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::model::{Metrics, PerformanceRecord, Rules, Verdict};

#[cfg(test)]
mod tests;

pub const GRAND_TOTAL_NAME: &str = "All Campaigns";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub name: String,
    #[serde(flatten)]
    pub metrics: Metrics,
    pub roas: Decimal,
    pub ctr: Decimal,
    pub cpc: Decimal,
    pub cpm: Decimal,
    pub cpa: Decimal,
    pub verdict: Verdict,
}

impl NodeSummary {
    fn classify(name: impl Into<String>, metrics: Metrics, rules: &Rules) -> Self {
        let roas = metrics.roas();
        Self {
            name: name.into(),
            metrics,
            roas,
            ctr: metrics.ctr(),
            cpc: metrics.cpc(),
            cpm: metrics.cpm(),
            cpa: metrics.cpa(),
            verdict: rules.classify(metrics.spend, roas),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdNode {
    #[serde(flatten)]
    pub summary: NodeSummary,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdSetNode {
    #[serde(flatten)]
    pub summary: NodeSummary,
    pub ad_count: usize,
    pub ads: Vec<AdNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignNode {
    #[serde(flatten)]
    pub summary: NodeSummary,
    pub ad_set_count: usize,
    pub ad_count: usize,
    pub ad_sets: Vec<AdSetNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrandTotal {
    #[serde(flatten)]
    pub summary: NodeSummary,
    pub campaign_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hierarchy {
    pub period: Option<ReportingPeriod>,
    pub grand_total: GrandTotal,
    pub campaigns: Vec<CampaignNode>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Campaign,
    AdSet,
    Ad,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Campaign => "campaign",
            Self::AdSet => "ad_set",
            Self::Ad => "ad",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum HierarchyNode<'a> {
    Campaign(&'a CampaignNode),
    AdSet(&'a AdSetNode),
    Ad(&'a AdNode),
}

impl<'a> HierarchyNode<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Campaign(_) => NodeKind::Campaign,
            Self::AdSet(_) => NodeKind::AdSet,
            Self::Ad(_) => NodeKind::Ad,
        }
    }

    pub fn summary(&self) -> &'a NodeSummary {
        match *self {
            Self::Campaign(node) => &node.summary,
            Self::AdSet(node) => &node.summary,
            Self::Ad(node) => &node.summary,
        }
    }

    pub fn children(&self) -> Vec<HierarchyNode<'a>> {
        match *self {
            Self::Campaign(node) => node.ad_sets.iter().map(HierarchyNode::AdSet).collect(),
            Self::AdSet(node) => node.ads.iter().map(HierarchyNode::Ad).collect(),
            Self::Ad(_) => Vec::new(),
        }
    }
}

impl Hierarchy {
    pub fn roots(&self) -> impl Iterator<Item = HierarchyNode<'_>> {
        self.campaigns.iter().map(HierarchyNode::Campaign)
    }

    pub fn walk(&self) -> Vec<HierarchyNode<'_>> {
        let mut out = Vec::new();
        let mut stack: Vec<HierarchyNode<'_>> = self.roots().collect();
        stack.reverse();

        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children().into_iter().rev());
        }

        out
    }
}

struct AdSetGroup<'r> {
    name: &'r str,
    records: Vec<&'r PerformanceRecord>,
}

struct CampaignGroup<'r> {
    name: &'r str,
    ad_sets: Vec<AdSetGroup<'r>>,
    ad_set_index: HashMap<&'r str, usize>,
}

pub fn aggregate(records: &[PerformanceRecord], rules: &Rules) -> Hierarchy {
    let groups = group_records(records);

    let campaigns: Vec<CampaignNode> = groups
        .into_iter()
        .map(|campaign| {
            let ad_sets = campaign
                .ad_sets
                .into_iter()
                .map(|ad_set| {
                    let ads = ad_set
                        .records
                        .into_iter()
                        .map(|record| build_ad(record, rules))
                        .collect();
                    roll_up_ad_set(ad_set.name, ads, rules)
                })
                .collect();
            roll_up_campaign(campaign.name, ad_sets, rules)
        })
        .collect();

    let grand_total = roll_up_total(&campaigns, rules);
    let period = reporting_period(records);

    debug!(
        records = records.len(),
        campaigns = campaigns.len(),
        verdict = grand_total.summary.verdict.as_str(),
        "aggregated hierarchy"
    );

    Hierarchy {
        period,
        grand_total,
        campaigns,
    }
}

fn group_records(records: &[PerformanceRecord]) -> Vec<CampaignGroup<'_>> {
    let mut campaigns: Vec<CampaignGroup<'_>> = Vec::new();
    let mut campaign_index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let slot = *campaign_index
            .entry(record.campaign_name.as_str())
            .or_insert_with(|| {
                campaigns.push(CampaignGroup {
                    name: record.campaign_name.as_str(),
                    ad_sets: Vec::new(),
                    ad_set_index: HashMap::new(),
                });
                campaigns.len() - 1
            });
        let CampaignGroup {
            ad_sets,
            ad_set_index,
            ..
        } = &mut campaigns[slot];

        let ad_set_slot = *ad_set_index
            .entry(record.ad_set_name.as_str())
            .or_insert_with(|| {
                ad_sets.push(AdSetGroup {
                    name: record.ad_set_name.as_str(),
                    records: Vec::new(),
                });
                ad_sets.len() - 1
            });
        ad_sets[ad_set_slot].records.push(record);
    }

    campaigns
}

fn build_ad(record: &PerformanceRecord, rules: &Rules) -> AdNode {
    AdNode {
        summary: NodeSummary::classify(record.ad_name.as_str(), record.metrics(), rules),
        period_start: record.period_start,
        period_end: record.period_end,
    }
}

fn roll_up_ad_set(name: &str, ads: Vec<AdNode>, rules: &Rules) -> AdSetNode {
    let metrics: Metrics = ads.iter().map(|ad| &ad.summary.metrics).sum();
    AdSetNode {
        summary: NodeSummary::classify(name, metrics, rules),
        ad_count: ads.len(),
        ads,
    }
}

fn roll_up_campaign(name: &str, ad_sets: Vec<AdSetNode>, rules: &Rules) -> CampaignNode {
    let metrics: Metrics = ad_sets.iter().map(|ad_set| &ad_set.summary.metrics).sum();
    CampaignNode {
        summary: NodeSummary::classify(name, metrics, rules),
        ad_set_count: ad_sets.len(),
        ad_count: ad_sets.iter().map(|ad_set| ad_set.ad_count).sum(),
        ad_sets,
    }
}

fn roll_up_total(campaigns: &[CampaignNode], rules: &Rules) -> GrandTotal {
    let metrics: Metrics = campaigns
        .iter()
        .map(|campaign| &campaign.summary.metrics)
        .sum();
    GrandTotal {
        summary: NodeSummary::classify(GRAND_TOTAL_NAME, metrics, rules),
        campaign_count: campaigns.len(),
    }
}

fn reporting_period(records: &[PerformanceRecord]) -> Option<ReportingPeriod> {
    let start = records.iter().map(|record| record.period_start).min()?;
    let end = records.iter().map(|record| record.period_end).max()?;
    Some(ReportingPeriod { start, end })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateAd {
    pub campaign_name: String,
    pub ad_set_name: String,
    pub ad_name: String,
    pub occurrences: usize,
}

pub fn duplicate_ad_keys(records: &[PerformanceRecord]) -> Vec<DuplicateAd> {
    let mut order: Vec<(&str, &str, &str)> = Vec::new();
    let mut counts: HashMap<(&str, &str, &str), usize> = HashMap::new();

    for record in records {
        let key = (
            record.campaign_name.as_str(),
            record.ad_set_name.as_str(),
            record.ad_name.as_str(),
        );
        let count = counts.entry(key).or_insert(0);
        if *count == 0 {
            order.push(key);
        }
        *count += 1;
    }

    order
        .into_iter()
        .filter_map(|key| {
            let occurrences = counts.get(&key).copied().unwrap_or(0);
            (occurrences > 1).then(|| DuplicateAd {
                campaign_name: key.0.to_string(),
                ad_set_name: key.1.to_string(),
                ad_name: key.2.to_string(),
                occurrences,
            })
        })
        .collect()
}
