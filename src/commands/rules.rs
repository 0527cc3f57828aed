use anyhow::{Context, Result};
use tracing::info;

use crate::cli::{RulesAction, RulesArgs, RulesSetArgs};
use crate::model::Rules;
use crate::store::Store;

pub fn run(args: RulesArgs) -> Result<()> {
    let account_id = args.store.account.as_str();
    let store = Store::open(&args.store.resolved_db_path())?;

    match &args.action {
        RulesAction::Show => {
            let stored = store.load_rules(account_id)?;
            let rules = store.effective_rules(account_id)?;
            log_rules(account_id, &rules, stored.is_some());
        }
        RulesAction::Set(set) => {
            let current = store.load_rules(account_id)?.unwrap_or_default();
            let rules = merge_rules(current, set);
            rules
                .validate()
                .with_context(|| format!("refusing to save rules for account {account_id}"))?;
            store.save_rules(account_id, &rules)?;
            log_rules(account_id, &rules, true);
        }
        RulesAction::Reset => {
            let removed = store.delete_rules(account_id)?;
            info!(account = %account_id, removed, "rules reset to defaults");
            log_rules(account_id, &Rules::default(), false);
        }
    }

    Ok(())
}

fn merge_rules(current: Rules, set: &RulesSetArgs) -> Rules {
    Rules {
        scale_roas: set.scale_roas.unwrap_or(current.scale_roas),
        min_roas: set.min_roas.unwrap_or(current.min_roas),
        learning_spend: set.learning_spend.unwrap_or(current.learning_spend),
    }
}

fn log_rules(account_id: &str, rules: &Rules, stored: bool) {
    info!(
        account = %account_id,
        scale_roas = %rules.scale_roas,
        min_roas = %rules.min_roas,
        learning_spend = %rules.learning_spend,
        source = if stored { "stored" } else { "defaults" },
        "verdict rules"
    );
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn merge_keeps_unspecified_thresholds() {
        let set = RulesSetArgs {
            scale_roas: Some(dec!(4)),
            min_roas: None,
            learning_spend: None,
        };
        let merged = merge_rules(Rules::default(), &set);
        assert_eq!(merged.scale_roas, dec!(4));
        assert_eq!(merged.min_roas, dec!(1.5));
        assert_eq!(merged.learning_spend, dec!(100));
    }

    #[test]
    fn merged_rules_still_validate() {
        let set = RulesSetArgs {
            scale_roas: Some(dec!(1)),
            min_roas: None,
            learning_spend: None,
        };
        let merged = merge_rules(Rules::default(), &set);
        assert!(merged.validate().is_err());
    }
}
