use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::plan::PlanTier;
use crate::store::{DB_SCHEMA_VERSION, Store};

pub fn run(args: StatusArgs) -> Result<()> {
    let account_id = args.store.account.as_str();
    let db_path = args.store.resolved_db_path();

    info!(
        data_root = %args.store.data_root.display(),
        account = %account_id,
        "status requested"
    );

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database missing; run ingest or add first");
        return Ok(());
    }

    let store = Store::open(&db_path)?;
    match store.opened_schema_version() {
        Some(found) if found != DB_SCHEMA_VERSION => warn!(
            found = %found,
            expected = DB_SCHEMA_VERSION,
            "database schema version mismatch; schema refreshed on open"
        ),
        Some(_) => {}
        None => warn!(path = %db_path.display(), "database had no schema version recorded"),
    }
    let schema_version = store.schema_version()?.unwrap_or_default();

    info!(
        path = %db_path.display(),
        schema_version = %schema_version,
        records = store.count_records(account_id)?,
        "database status"
    );

    match store.latest_upload(account_id)? {
        Some(upload) => info!(
            upload_id = %upload.upload_id,
            source = %upload.source_name,
            sha256 = %upload.sha256,
            rows = upload.row_count,
            warnings = upload.warning_count,
            created_at = %upload.created_at,
            "latest upload"
        ),
        None => warn!(account = %account_id, "no upload recorded"),
    }

    let rules = store.effective_rules(account_id)?;
    info!(
        scale_roas = %rules.scale_roas,
        min_roas = %rules.min_roas,
        learning_spend = %rules.learning_spend,
        "verdict rules"
    );

    let tier = PlanTier::resolve(store.load_subscription(account_id)?.as_ref());
    info!(tier = tier.label(), "effective plan");

    let manifest_dir = args.store.manifest_dir();
    if !manifest_dir.exists() {
        warn!(path = %manifest_dir.display(), "manifest directory missing");
    }

    Ok(())
}
