use rust_decimal::{Decimal, RoundingStrategy};

pub fn format_currency(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${}", group_thousands(&rounded.abs().trunc().to_string()))
}

pub fn format_count(value: u64) -> String {
    if value >= 1_000_000 {
        return format!("{}M", one_decimal(Decimal::from(value) / Decimal::from(1_000_000)));
    }
    if value >= 1_000 {
        return format!("{}K", one_decimal(Decimal::from(value) / Decimal::ONE_THOUSAND));
    }
    group_thousands(&value.to_string())
}

pub fn format_roas(value: Decimal) -> String {
    format!("{}x", one_decimal(value))
}

pub fn format_percent(ratio: Decimal) -> String {
    let percent = (ratio * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{percent:.2}%")
}

fn one_decimal(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.1}")
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
