use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::AddArgs;
use crate::normalize::{CanonicalField, ColumnVocabulary, Normalizer};
use crate::store::Store;

pub fn run(args: AddArgs) -> Result<()> {
    let vocabulary = ColumnVocabulary::default();
    let normalizer = Normalizer::new(&vocabulary)?;

    let fields = manual_fields(&args);
    let mut warnings = Vec::new();
    let Some(record) = normalizer.normalize_fields(&fields, "manual entry", &mut warnings) else {
        bail!("{}", warnings.join("; "));
    };

    for warning in &warnings {
        warn!(warning = %warning, "field issue");
    }

    let mut store = Store::open(&args.store.resolved_db_path())?;
    store.append_record(&args.store.account, &record)?;

    info!(
        account = %args.store.account,
        campaign = %record.campaign_name,
        ad_set = %record.ad_set_name,
        ad = %record.ad_name,
        period_start = %record.period_start,
        period_end = %record.period_end,
        spend = %record.spend,
        revenue = %record.revenue,
        "added manual record"
    );

    Ok(())
}

fn manual_fields(args: &AddArgs) -> Vec<(CanonicalField, &str)> {
    let mut fields = vec![
        (CanonicalField::CampaignName, args.campaign.as_str()),
        (CanonicalField::AdSetName, args.ad_set.as_str()),
        (CanonicalField::AdName, args.ad.as_str()),
    ];

    let optional = [
        (CanonicalField::PeriodStart, &args.start),
        (CanonicalField::PeriodEnd, &args.end),
        (CanonicalField::Impressions, &args.impressions),
        (CanonicalField::Clicks, &args.clicks),
        (CanonicalField::Spend, &args.spend),
        (CanonicalField::Purchases, &args.purchases),
        (CanonicalField::Revenue, &args.revenue),
    ];
    fields.extend(
        optional
            .into_iter()
            .filter_map(|(field, value)| value.as_deref().map(|value| (field, value))),
    );

    fields
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::cli::StoreArgs;

    fn args() -> AddArgs {
        AddArgs {
            store: StoreArgs {
                data_root: PathBuf::from(".cache/adverdict"),
                db_path: None,
                account: "default".to_string(),
            },
            campaign: "Brand".to_string(),
            ad_set: "Broad".to_string(),
            ad: "Video".to_string(),
            start: Some("3/4/2024".to_string()),
            end: None,
            impressions: Some("12,000".to_string()),
            clicks: None,
            spend: Some("$250.75".to_string()),
            purchases: Some("4".to_string()),
            revenue: Some("oops".to_string()),
        }
    }

    #[test]
    fn manual_entry_uses_csv_cell_rules() {
        let args = args();
        let vocabulary = ColumnVocabulary::default();
        let normalizer = Normalizer::new(&vocabulary).expect("normalizer should build");
        let mut warnings = Vec::new();

        let record = normalizer
            .normalize_fields(&manual_fields(&args), "manual entry", &mut warnings)
            .expect("record should be kept");

        assert_eq!(record.impressions, 12_000);
        assert_eq!(record.spend, dec!(250.75));
        assert_eq!(record.purchases, 4);
        assert_eq!(record.revenue, dec!(0));
        assert_eq!(record.period_start, record.period_end);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("manual entry: unparseable revenue"));
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut args = args();
        args.ad = "   ".to_string();
        let vocabulary = ColumnVocabulary::default();
        let normalizer = Normalizer::new(&vocabulary).expect("normalizer should build");
        let mut warnings = Vec::new();

        let record = normalizer.normalize_fields(&manual_fields(&args), "manual entry", &mut warnings);
        assert!(record.is_none());
        assert!(warnings[0].contains("ad name"));
    }
}
