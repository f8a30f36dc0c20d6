use crate::db::{to_decimal, to_f64, PortfolioDb};
use async_trait::async_trait;
use portfolio_core::{
    AccountId, EquityCategory, EquityType, EquityTypeStore, GoalStore, HoldingGoal, StoreResult,
    ValuationError,
};
use rust_decimal::Decimal;
use serde::Serialize;

/// Outcome of setting a target allocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AllocationUpdate {
    Created,
    Updated { previous: Decimal },
    Unchanged,
}

/// Known categories are stored under their canonical name so lookups by
/// `EquityCategory` always hit; anything else is kept upper-cased.
pub fn normalize_equity_name(name: &str) -> String {
    let category = EquityCategory::parse(name);
    if category.is_known() {
        category.as_str().to_string()
    } else {
        name.trim().to_ascii_uppercase()
    }
}

fn check_percentage(value: Decimal, what: &str) -> StoreResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(ValuationError::InvalidAllocation(format!(
            "{} must be between 0 and 100, got {}",
            what, value
        )));
    }
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct EquityTypeRow {
    id: i64,
    name: String,
    wanted_allocation: f64,
}

impl From<EquityTypeRow> for EquityType {
    fn from(row: EquityTypeRow) -> Self {
        EquityType {
            id: Some(row.id),
            name: row.name,
            wanted_allocation: to_decimal(row.wanted_allocation),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GoalRow {
    account_id: i64,
    holding_name: String,
    goal_percentage: f64,
}

impl From<GoalRow> for HoldingGoal {
    fn from(row: GoalRow) -> Self {
        HoldingGoal {
            account_id: row.account_id,
            holding_name: row.holding_name,
            goal_percentage: to_decimal(row.goal_percentage),
        }
    }
}

impl PortfolioDb {
    pub async fn list_equity_types(&self) -> StoreResult<Vec<EquityType>> {
        let rows = sqlx::query_as::<_, EquityTypeRow>(
            "SELECT id, name, wanted_allocation FROM equity_types ORDER BY id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(ValuationError::store)?;

        Ok(rows.into_iter().map(EquityType::from).collect())
    }

    pub async fn get_equity_type(&self, name: &str) -> StoreResult<Option<EquityType>> {
        let row = sqlx::query_as::<_, EquityTypeRow>(
            "SELECT id, name, wanted_allocation FROM equity_types WHERE name = ?",
        )
        .bind(normalize_equity_name(name))
        .fetch_optional(self.pool())
        .await
        .map_err(ValuationError::store)?;

        Ok(row.map(EquityType::from))
    }

    /// Set the target allocation for an equity type. Allocations must stay
    /// within 0..=100 and the sum across all types must not exceed 100.
    pub async fn set_wanted_allocation(
        &self,
        name: &str,
        allocation: Decimal,
    ) -> StoreResult<AllocationUpdate> {
        check_percentage(allocation, "Allocation")?;
        let name = normalize_equity_name(name);
        if name.is_empty() {
            return Err(ValuationError::InvalidAllocation(
                "Equity type name is required".to_string(),
            ));
        }

        let existing = self.get_equity_type(&name).await?;
        if let Some(existing) = &existing {
            if existing.wanted_allocation == allocation {
                return Ok(AllocationUpdate::Unchanged);
            }
        }

        let others: Decimal = self
            .list_equity_types()
            .await?
            .into_iter()
            .filter(|t| t.name != name)
            .map(|t| t.wanted_allocation)
            .sum();
        if others + allocation > Decimal::ONE_HUNDRED {
            return Err(ValuationError::InvalidAllocation(format!(
                "Total allocation would be {}, which exceeds 100",
                others + allocation
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO equity_types (name, wanted_allocation) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET wanted_allocation = excluded.wanted_allocation
            "#,
        )
        .bind(&name)
        .bind(to_f64(allocation))
        .execute(self.pool())
        .await
        .map_err(ValuationError::store)?;

        tracing::info!("Wanted allocation for {} set to {}", name, allocation);
        Ok(match existing {
            Some(existing) => AllocationUpdate::Updated {
                previous: existing.wanted_allocation,
            },
            None => AllocationUpdate::Created,
        })
    }

    pub async fn list_goals(&self, account_id: AccountId) -> StoreResult<Vec<HoldingGoal>> {
        let rows = sqlx::query_as::<_, GoalRow>(
            r#"
            SELECT account_id, holding_name, goal_percentage
            FROM holding_goal WHERE account_id = ? ORDER BY holding_name
            "#,
        )
        .bind(account_id)
        .fetch_all(self.pool())
        .await
        .map_err(ValuationError::store)?;

        Ok(rows.into_iter().map(HoldingGoal::from).collect())
    }

    pub async fn get_goal_percentage(
        &self,
        account_id: AccountId,
        holding_name: &str,
    ) -> StoreResult<Option<Decimal>> {
        let row: Option<(f64,)> = sqlx::query_as(
            "SELECT goal_percentage FROM holding_goal WHERE account_id = ? AND holding_name = ?",
        )
        .bind(account_id)
        .bind(holding_name)
        .fetch_optional(self.pool())
        .await
        .map_err(ValuationError::store)?;

        Ok(row.map(|(goal,)| to_decimal(goal)))
    }

    /// Upsert goal percentages for an account's holdings. The whole batch is
    /// rejected when any goal is out of range or the account total would
    /// exceed 100.
    pub async fn set_goals(
        &self,
        account_id: AccountId,
        goals: &[(String, Decimal)],
    ) -> StoreResult<Vec<HoldingGoal>> {
        for (name, goal) in goals {
            check_percentage(*goal, &format!("Goal for {}", name))?;
        }

        let mut tx = self.pool().begin().await.map_err(ValuationError::store)?;
        for (name, goal) in goals {
            sqlx::query(
                r#"
                INSERT INTO holding_goal (account_id, holding_name, goal_percentage)
                VALUES (?, ?, ?)
                ON CONFLICT(account_id, holding_name)
                DO UPDATE SET goal_percentage = excluded.goal_percentage
                "#,
            )
            .bind(account_id)
            .bind(name)
            .bind(to_f64(*goal))
            .execute(&mut *tx)
            .await
            .map_err(ValuationError::store)?;
        }

        let (total,): (f64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(goal_percentage), 0.0) FROM holding_goal WHERE account_id = ?",
        )
        .bind(account_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(ValuationError::store)?;

        let total = to_decimal(total);
        if total > Decimal::ONE_HUNDRED {
            return Err(ValuationError::InvalidAllocation(format!(
                "Goals for account {} would total {}, which exceeds 100",
                account_id, total
            )));
        }

        tx.commit().await.map_err(ValuationError::store)?;
        self.list_goals(account_id).await
    }
}

#[async_trait]
impl EquityTypeStore for PortfolioDb {
    async fn get_equity_type(&self, name: &str) -> StoreResult<Option<EquityType>> {
        PortfolioDb::get_equity_type(self, name).await
    }

    async fn list_equity_types(&self) -> StoreResult<Vec<EquityType>> {
        PortfolioDb::list_equity_types(self).await
    }
}

#[async_trait]
impl GoalStore for PortfolioDb {
    async fn get_goal_percentage(
        &self,
        account_id: AccountId,
        holding_name: &str,
    ) -> StoreResult<Option<Decimal>> {
        PortfolioDb::get_goal_percentage(self, account_id, holding_name).await
    }

    async fn list_goals(&self, account_id: AccountId) -> StoreResult<Vec<HoldingGoal>> {
        PortfolioDb::list_goals(self, account_id).await
    }
}
