use rust_decimal::Decimal;

/// A ladder of limit buy orders placed below the current ask. Each rung is
/// `step_percent` below the previous one, rounded up to whole NOK.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitLadder {
    pub count: usize,
    /// NOK per order.
    pub amount: Decimal,
    pub step_percent: Decimal,
}

impl Default for LimitLadder {
    fn default() -> Self {
        Self {
            count: 4,
            amount: Decimal::from(25),
            step_percent: Decimal::from(7),
        }
    }
}

impl LimitLadder {
    pub fn prices(&self, ask: Decimal) -> Vec<Decimal> {
        let factor = Decimal::ONE - self.step_percent / Decimal::ONE_HUNDRED;
        let mut limit = ask;
        (0..self.count)
            .map(|_| {
                limit = (limit * factor).ceil();
                limit
            })
            .collect()
    }
}
