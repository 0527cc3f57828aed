use rust_decimal_macros::dec;

use super::*;

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
        impressions: 1_000,
        clicks: 40,
        spend,
        purchases: 2,
        revenue,
    }
}

fn sample_records() -> Vec<PerformanceRecord> {
    vec![
        record("Summer Sale", "Lookalike", "Video", dec!(750), dec!(3400)),
        record("Summer Sale", "Lookalike", "Carousel", dec!(650), dec!(1800)),
        record("Brand", "Broad", "Story", dec!(1100), dec!(950)),
        record("Summer Sale", "Interest", "Static", dec!(580), dec!(1400)),
        record("Retargeting", "Cart", "Cart", dec!(40), dec!(280)),
        record("Brand", "Broad", "Demo", dec!(700), dec!(1150)),
    ]
}

fn assert_conserved(node: HierarchyNode<'_>) {
    let children = node.children();
    if children.is_empty() {
        return;
    }

    let summed: Metrics = children.iter().map(|child| &child.summary().metrics).sum();
    assert_eq!(
        node.summary().metrics,
        summed,
        "{} {} should equal the sum of its children",
        node.kind().as_str(),
        node.summary().name
    );

    for child in children {
        assert_conserved(child);
    }
}

#[test]
fn rollups_are_conserved_at_every_level() {
    let hierarchy = aggregate(&sample_records(), &Rules::default());

    let campaign_total: Metrics = hierarchy
        .campaigns
        .iter()
        .map(|campaign| &campaign.summary.metrics)
        .sum();
    assert_eq!(hierarchy.grand_total.summary.metrics, campaign_total);
    assert_eq!(hierarchy.grand_total.summary.metrics.spend, dec!(3820));
    assert_eq!(hierarchy.grand_total.summary.metrics.impressions, 6_000);

    for root in hierarchy.roots() {
        assert_conserved(root);
    }
}

#[test]
fn roas_is_revenue_over_spend_or_zero() {
    let mut records = sample_records();
    records.push(record("Free", "Organic", "Zero", dec!(0), dec!(0)));
    records.push(record("Free", "Organic", "Gift", dec!(0), dec!(50)));
    let hierarchy = aggregate(&records, &Rules::default());

    for node in hierarchy.walk() {
        let summary = node.summary();
        if summary.metrics.spend.is_zero() {
            assert_eq!(summary.roas, Decimal::ZERO);
        } else {
            assert_eq!(summary.roas, summary.metrics.revenue / summary.metrics.spend);
        }
    }
}

#[test]
fn verdict_precedence_examples() {
    let rules = Rules::default();
    let records = vec![
        record("Learn", "S", "A", dec!(50), dec!(500)),
        record("Scale", "S", "A", dec!(200), dec!(800)),
        record("Watch", "S", "A", dec!(200), dec!(400)),
        record("Cut", "S", "A", dec!(200), dec!(100)),
        record("Idle", "S", "A", dec!(0), dec!(0)),
    ];

    let hierarchy = aggregate(&records, &rules);
    let verdicts: Vec<(String, Verdict)> = hierarchy
        .campaigns
        .iter()
        .map(|campaign| (campaign.summary.name.clone(), campaign.summary.verdict))
        .collect();

    assert_eq!(
        verdicts,
        vec![
            ("Learn".to_string(), Verdict::Learn),
            ("Scale".to_string(), Verdict::Scale),
            ("Watch".to_string(), Verdict::Watch),
            ("Cut".to_string(), Verdict::Cut),
            ("Idle".to_string(), Verdict::Learn),
        ]
    );
}

#[test]
fn verdicts_are_computed_per_node_not_inherited() {
    let records = vec![
        record("Mixed", "Winners", "Hero", dec!(300), dec!(1200)),
        record("Mixed", "Losers", "Dud", dec!(300), dec!(60)),
        record("Mixed", "Losers", "Tiny", dec!(20), dec!(0)),
    ];

    let hierarchy = aggregate(&records, &Rules::default());
    let campaign = &hierarchy.campaigns[0];
    assert_eq!(campaign.ad_sets[0].summary.verdict, Verdict::Scale);
    assert_eq!(campaign.ad_sets[1].summary.verdict, Verdict::Cut);
    assert_eq!(campaign.ad_sets[1].ads[1].summary.verdict, Verdict::Learn);
    // 1260 / 620 ≈ 2.03
    assert_eq!(campaign.summary.verdict, Verdict::Watch);
}

#[test]
fn grouping_preserves_first_seen_order() {
    let hierarchy = aggregate(&sample_records(), &Rules::default());

    let campaign_names: Vec<&str> = hierarchy
        .campaigns
        .iter()
        .map(|campaign| campaign.summary.name.as_str())
        .collect();
    assert_eq!(campaign_names, vec!["Summer Sale", "Brand", "Retargeting"]);

    let summer = &hierarchy.campaigns[0];
    assert_eq!(summer.ad_set_count, 2);
    assert_eq!(summer.ad_count, 3);
    assert_eq!(summer.ad_sets[0].summary.name, "Lookalike");
    assert_eq!(summer.ad_sets[1].summary.name, "Interest");
    let ad_names: Vec<&str> = summer.ad_sets[0]
        .ads
        .iter()
        .map(|ad| ad.summary.name.as_str())
        .collect();
    assert_eq!(ad_names, vec!["Video", "Carousel"]);
}

#[test]
fn shared_campaign_different_ad_sets_gives_two_children() {
    let records = vec![
        record("C", "S1", "A", dec!(10), dec!(10)),
        record("C", "S2", "A", dec!(10), dec!(10)),
    ];

    let hierarchy = aggregate(&records, &Rules::default());
    assert_eq!(hierarchy.campaigns.len(), 1);
    assert_eq!(hierarchy.campaigns[0].ad_sets.len(), 2);
}

#[test]
fn shared_ad_set_different_ads_gives_two_leaves() {
    let records = vec![
        record("C", "S", "A1", dec!(10), dec!(10)),
        record("C", "S", "A2", dec!(10), dec!(10)),
    ];

    let hierarchy = aggregate(&records, &Rules::default());
    assert_eq!(hierarchy.campaigns[0].ad_sets.len(), 1);
    assert_eq!(hierarchy.campaigns[0].ad_sets[0].ads.len(), 2);
    assert_eq!(hierarchy.campaigns[0].ad_sets[0].ad_count, 2);
}

#[test]
fn same_ad_set_name_in_two_campaigns_stays_distinct() {
    let records = vec![
        record("C1", "Broad", "A", dec!(10), dec!(10)),
        record("C2", "Broad", "A", dec!(30), dec!(10)),
    ];

    let hierarchy = aggregate(&records, &Rules::default());
    assert_eq!(hierarchy.campaigns.len(), 2);
    assert_eq!(hierarchy.campaigns[0].ad_sets[0].summary.metrics.spend, dec!(10));
    assert_eq!(hierarchy.campaigns[1].ad_sets[0].summary.metrics.spend, dec!(30));
}

#[test]
fn duplicate_triples_are_summed_and_reported() {
    let records = vec![
        record("C", "S", "A", dec!(100), dec!(200)),
        record("C", "S", "B", dec!(5), dec!(5)),
        record("C", "S", "A", dec!(150), dec!(100)),
    ];

    let hierarchy = aggregate(&records, &Rules::default());
    let ad_set = &hierarchy.campaigns[0].ad_sets[0];
    assert_eq!(ad_set.ads.len(), 3);
    assert_eq!(ad_set.summary.metrics.spend, dec!(255));

    let duplicates = duplicate_ad_keys(&records);
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].ad_name, "A");
    assert_eq!(duplicates[0].occurrences, 2);
}

#[test]
fn aggregation_is_idempotent() {
    let records = sample_records();
    let rules = Rules::default();

    let first = aggregate(&records, &rules);
    let second = aggregate(&records, &rules);
    assert_eq!(first, second);
}

#[test]
fn empty_input_yields_zero_total_in_learning() {
    let hierarchy = aggregate(&[], &Rules::default());

    assert!(hierarchy.campaigns.is_empty());
    assert!(hierarchy.period.is_none());
    assert_eq!(hierarchy.grand_total.campaign_count, 0);
    assert_eq!(hierarchy.grand_total.summary.metrics, Metrics::default());
    assert_eq!(hierarchy.grand_total.summary.roas, Decimal::ZERO);
    assert_eq!(hierarchy.grand_total.summary.verdict, Verdict::Learn);
    assert_eq!(hierarchy.grand_total.summary.name, GRAND_TOTAL_NAME);
}

#[test]
fn reporting_period_spans_all_records() {
    let mut early = record("C", "S", "A", dec!(1), dec!(1));
    early.period_start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    let mut late = record("C", "S", "B", dec!(1), dec!(1));
    late.period_end = NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid date");

    let hierarchy = aggregate(&[early, late], &Rules::default());
    let period = hierarchy.period.expect("period should be present");
    assert_eq!(period.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(period.end, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
}

#[test]
fn walk_visits_nodes_in_display_order() {
    let records = vec![
        record("C1", "S1", "A1", dec!(1), dec!(1)),
        record("C1", "S1", "A2", dec!(1), dec!(1)),
        record("C2", "S2", "A3", dec!(1), dec!(1)),
    ];

    let hierarchy = aggregate(&records, &Rules::default());
    let visited: Vec<(NodeKind, &str)> = hierarchy
        .walk()
        .into_iter()
        .map(|node| (node.kind(), node.summary().name.as_str()))
        .collect();

    assert_eq!(
        visited,
        vec![
            (NodeKind::Campaign, "C1"),
            (NodeKind::AdSet, "S1"),
            (NodeKind::Ad, "A1"),
            (NodeKind::Ad, "A2"),
            (NodeKind::Campaign, "C2"),
            (NodeKind::AdSet, "S2"),
            (NodeKind::Ad, "A3"),
        ]
    );
}

#[test]
fn serialized_nodes_flatten_metrics() {
    let hierarchy = aggregate(&sample_records(), &Rules::default());
    let json = serde_json::to_value(&hierarchy.campaigns[0]).expect("node should serialize");

    assert_eq!(json["name"], "Summer Sale");
    assert_eq!(json["verdict"], "scale");
    assert!(json.get("spend").is_some());
    assert!(json["ad_sets"][0]["ads"][0].get("period_start").is_some());
}
