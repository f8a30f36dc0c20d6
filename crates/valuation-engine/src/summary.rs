use crate::policy::ThresholdPolicy;
use portfolio_core::numeric::{percent_of, round0, round2, sum};
use portfolio_core::{EquityCategory, Holding, InvestmentSummary, KronRebalance, TotalValue};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Portfolio grand total, rounded up to whole currency units.
pub fn portfolio_total(values: &[TotalValue]) -> Decimal {
    sum(values.iter().map(|v| v.market_value)).ceil()
}

fn summary_row(
    label: String,
    market_value: Decimal,
    current_share: Decimal,
    wanted_share: Decimal,
    total: Decimal,
    policy: ThresholdPolicy,
) -> InvestmentSummary {
    let difference = round2(wanted_share - current_share);
    InvestmentSummary {
        equity_type: label,
        market_value,
        current_share,
        wanted_share,
        difference,
        max_diff_to_rebalance: policy.max_diff(wanted_share),
        rebalance: policy.should_rebalance(difference, wanted_share),
        to_trade: round2(difference * total / Decimal::ONE_HUNDRED),
    }
}

/// Group valuations by asset class in first-seen order and compare each
/// group's share of the portfolio against its target. A group's share is
/// the sum of its members' rounded shares.
///
/// Every category present must have a target in `targets`; callers check
/// this beforehand.
pub fn summarize_by_equity_type(
    values: &[TotalValue],
    targets: &HashMap<EquityCategory, Decimal>,
    policy: ThresholdPolicy,
) -> Vec<InvestmentSummary> {
    let total = portfolio_total(values);

    let mut order: Vec<EquityCategory> = Vec::new();
    let mut groups: HashMap<EquityCategory, (Decimal, Decimal)> = HashMap::new();
    for value in values {
        let share = round2(percent_of(value.market_value, total));
        let entry = groups.entry(value.equity_type).or_insert_with(|| {
            order.push(value.equity_type);
            (Decimal::ZERO, Decimal::ZERO)
        });
        entry.0 += value.market_value;
        entry.1 += share;
    }

    order
        .into_iter()
        .map(|category| {
            let (market_value, current_share) = groups[&category];
            let wanted_share = targets.get(&category).copied().unwrap_or_default();
            summary_row(
                category.as_str().to_string(),
                market_value,
                current_share,
                wanted_share,
                total,
                policy,
            )
        })
        .collect()
}

/// One row per holding of a single account, measured against the holding's
/// goal percentage. `total` is the account's value.
pub fn summarize_holdings(
    holdings: &[Holding],
    policy: ThresholdPolicy,
) -> (Decimal, Vec<InvestmentSummary>) {
    let total = sum(holdings.iter().map(|h| h.value));
    let rows = holdings
        .iter()
        .map(|h| {
            let current_share = h
                .current_percentage
                .unwrap_or_else(|| round2(percent_of(h.value, total)));
            summary_row(
                h.name.clone(),
                round2(h.value),
                current_share,
                h.goal_percentage.unwrap_or_default(),
                total,
                policy,
            )
        })
        .collect();
    (total, rows)
}

/// Suggested purchases that move each holding toward its goal once
/// `new_money` is added to the account. Negative amounts mean the holding
/// is above its goal even after the deposit.
pub fn holding_rebalance(holdings: &[Holding], new_money: Decimal) -> Vec<KronRebalance> {
    let total = sum(holdings.iter().map(|h| h.value)) + new_money;
    holdings
        .iter()
        .map(|h| {
            let goal = h.goal_percentage.unwrap_or_default();
            let current = percent_of(h.value, total);
            KronRebalance {
                name: h.name.clone(),
                goal_allocation: goal,
                value: h.value,
                current_allocation: round2(current),
                diff_to_goal: round2(goal - current),
                to_buy: round0(total * goal / Decimal::ONE_HUNDRED - h.value),
            }
        })
        .collect()
}
