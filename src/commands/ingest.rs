use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::aggregate::{NodeKind, aggregate};
use crate::cli::IngestArgs;
use crate::commands::sample::META_COLUMNS;
use crate::model::{IngestCounts, IngestPaths, IngestRunManifest};
use crate::normalize::{ColumnVocabulary, normalize};
use crate::store::{DB_SCHEMA_VERSION, Store, UploadEntry};
use crate::util::{
    ensure_directory, now_utc_string, read_upload, utc_compact_string, write_json_pretty,
};

const ACCEPTED_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let account_id = args.store.account.clone();
    let manifest_dir = args.store.manifest_dir();
    ensure_directory(&manifest_dir)?;
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "ingest_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let db_path = args.store.resolved_db_path();

    ensure_accepted_extension(&args.file)?;

    info!(
        account = %account_id,
        file = %args.file.display(),
        run_id = %run_id,
        "starting ingest"
    );

    let vocabulary = match &args.column_map {
        Some(path) => {
            let vocabulary = ColumnVocabulary::with_overrides_from(path)?;
            info!(path = %path.display(), entries = vocabulary.len(), "loaded column map");
            vocabulary
        }
        None => ColumnVocabulary::default(),
    };

    let (text, sha256) = read_upload(&args.file)?;
    let outcome = normalize(&text, &vocabulary)
        .with_context(|| format!("failed to normalize {}", args.file.display()))?;

    for warning in &outcome.warnings {
        warn!(warning = %warning, "row issue");
    }
    for column in &outcome.ignored_columns {
        info!(column = %column, "ignored unmapped column");
    }

    if outcome.records.is_empty() {
        bail!(
            "no valid rows in {} ({} data rows, {} dropped); expected columns like: {}",
            args.file.display(),
            outcome.data_rows,
            outcome.rows_dropped,
            META_COLUMNS.join(", ")
        );
    }

    let upload = UploadEntry {
        upload_id: format!("upload-{}-{}", utc_compact_string(started_ts), &sha256[..12]),
        source_name: args
            .file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string(),
        sha256: sha256.clone(),
        row_count: outcome.records.len(),
        warning_count: outcome.warnings.len(),
        created_at: started_at.clone(),
    };

    let mut store = Store::open(&db_path)?;
    let rules = store.effective_rules(&account_id)?;
    let hierarchy = aggregate(&outcome.records, &rules);
    store.replace_records(&account_id, &upload, &outcome.records)?;

    let ad_sets = hierarchy
        .walk()
        .iter()
        .filter(|node| node.kind() == NodeKind::AdSet)
        .count();

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id,
        upload_id: upload.upload_id.clone(),
        account_id: account_id.clone(),
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        source_sha256: sha256,
        delimiter: outcome.delimiter.as_str().to_string(),
        mapped_columns: outcome.mapped_columns,
        ignored_columns: outcome.ignored_columns,
        paths: IngestPaths {
            data_root: args.store.data_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            source_path: args.file.display().to_string(),
            db_path: db_path.display().to_string(),
        },
        counts: IngestCounts {
            data_rows: outcome.data_rows,
            records_kept: outcome.records.len(),
            rows_dropped: outcome.rows_dropped,
            warning_count: outcome.warnings.len(),
            campaigns: hierarchy.grand_total.campaign_count,
            ad_sets,
            ads: outcome.records.len(),
        },
        warnings: outcome.warnings,
    };

    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote ingest run manifest");
    info!(
        account = %account_id,
        upload_id = %upload.upload_id,
        records = manifest.counts.records_kept,
        dropped = manifest.counts.rows_dropped,
        warnings = manifest.counts.warning_count,
        campaigns = manifest.counts.campaigns,
        "ingest completed"
    );

    Ok(())
}

fn ensure_accepted_extension(path: &Path) -> Result<()> {
    let accepted = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
        .unwrap_or(false);

    if !accepted {
        bail!(
            "unsupported upload {}; expected a .csv, .tsv or .txt export",
            path.display()
        );
    }
    Ok(())
}
