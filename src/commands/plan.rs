use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::{PlanAction, PlanArgs, PlanSetArgs};
use crate::plan::PlanTier;
use crate::store::{Store, Subscription};
use crate::util::now_utc_string;

pub fn run(args: PlanArgs) -> Result<()> {
    let account_id = args.store.account.as_str();
    let store = Store::open(&args.store.resolved_db_path())?;

    match &args.action {
        PlanAction::Show => {
            let subscription = store.load_subscription(account_id)?;
            match &subscription {
                Some(subscription) => info!(
                    account = %account_id,
                    plan = %subscription.plan,
                    status = %subscription.status,
                    current_period_end = %subscription.current_period_end.clone().unwrap_or_default(),
                    updated_at = %subscription.updated_at,
                    "stored subscription"
                ),
                None => warn!(account = %account_id, "no subscription stored; free tier applies"),
            }
            log_tier(account_id, PlanTier::resolve(subscription.as_ref()));
        }
        PlanAction::Set(set) => {
            let subscription = build_subscription(set)?;
            store.save_subscription(account_id, &subscription)?;
            let tier = PlanTier::resolve(Some(&subscription));
            if tier != set.tier {
                warn!(
                    account = %account_id,
                    status = %subscription.status,
                    "subscription is not active; free tier applies"
                );
            }
            log_tier(account_id, tier);
        }
    }

    Ok(())
}

fn build_subscription(set: &PlanSetArgs) -> Result<Subscription> {
    let status = set.status.trim().to_ascii_lowercase();
    if status.is_empty() {
        bail!("subscription status must not be empty");
    }
    Ok(Subscription {
        plan: set.tier.as_str().to_string(),
        status,
        current_period_end: set.current_period_end.clone(),
        updated_at: now_utc_string(),
    })
}

fn log_tier(account_id: &str, tier: PlanTier) {
    let limit = tier
        .campaign_limit()
        .map(|limit| limit.to_string())
        .unwrap_or_else(|| "unlimited".to_string());
    info!(
        account = %account_id,
        tier = tier.label(),
        campaign_limit = %limit,
        "effective plan"
    );
}
