//! Finance record kinds.
//!
//! Amounts are integer cents. Dates are ISO `YYYY-MM-DD` strings as sent by
//! the backend.

use crate::entity::{deserialize_remote_id, SyncEntity};
use serde::{Deserialize, Serialize};

/// Whether a category books income or spending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Money in.
    Income,
    /// Money out.
    #[default]
    Expense,
}

/// A spending or income category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Server-issued identifier.
    #[serde(
        rename = "id",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_remote_id"
    )]
    pub remote_id: Option<u64>,
    /// Local identifier.
    #[serde(default)]
    pub local_id: u64,
    /// Display name.
    pub name: String,
    /// Income or expense.
    #[serde(default)]
    pub kind: CategoryKind,
}

impl Category {
    /// Creates an unsynced category.
    pub fn new(local_id: u64, name: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            remote_id: None,
            local_id,
            name: name.into(),
            kind,
        }
    }

    /// Creates an unsynced expense category.
    pub fn expense(local_id: u64, name: impl Into<String>) -> Self {
        Self::new(local_id, name, CategoryKind::Expense)
    }

    /// Creates an unsynced income category.
    pub fn income(local_id: u64, name: impl Into<String>) -> Self {
        Self::new(local_id, name, CategoryKind::Income)
    }
}

impl SyncEntity for Category {
    const TABLE: &'static str = "categories";
    const RESOURCE: &'static str = "category";

    fn local_id(&self) -> u64 {
        self.local_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn remote_id(&self) -> Option<u64> {
        self.remote_id.filter(|id| *id != 0)
    }

    fn remote_id_mut(&mut self) -> &mut Option<u64> {
        &mut self.remote_id
    }
}

/// A single booked transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Server-issued identifier.
    #[serde(
        rename = "id",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_remote_id"
    )]
    pub remote_id: Option<u64>,
    /// Local identifier.
    #[serde(default)]
    pub local_id: u64,
    /// Description shown in lists.
    pub name: String,
    /// Signed amount in cents; negative for spending.
    pub amount_cents: i64,
    /// Category, if categorized. Stored as the local id; the engine sends
    /// the category's remote id instead.
    #[serde(default)]
    pub category_id: Option<u64>,
    /// Booking date.
    pub date: String,
}

impl Transaction {
    /// Creates an unsynced transaction.
    pub fn new(
        local_id: u64,
        name: impl Into<String>,
        amount_cents: i64,
        date: impl Into<String>,
    ) -> Self {
        Self {
            remote_id: None,
            local_id,
            name: name.into(),
            amount_cents,
            category_id: None,
            date: date.into(),
        }
    }

    /// Sets the category.
    pub fn in_category(mut self, category_id: u64) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

impl SyncEntity for Transaction {
    const TABLE: &'static str = "transactions";
    const RESOURCE: &'static str = "transaction";

    fn local_id(&self) -> u64 {
        self.local_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn remote_id(&self) -> Option<u64> {
        self.remote_id.filter(|id| *id != 0)
    }

    fn remote_id_mut(&mut self) -> &mut Option<u64> {
        &mut self.remote_id
    }

    fn category_ref(&self) -> Option<u64> {
        self.category_id
    }

    fn with_category_ref(&self, category_id: Option<u64>) -> Self {
        Self {
            category_id,
            ..self.clone()
        }
    }
}

/// Budget accounting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    /// Seven days.
    Weekly,
    /// Calendar month.
    #[default]
    Monthly,
    /// Calendar year.
    Yearly,
}

/// A spending limit for one category over a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// Server-issued identifier.
    #[serde(
        rename = "id",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_remote_id"
    )]
    pub remote_id: Option<u64>,
    /// Local identifier.
    #[serde(default)]
    pub local_id: u64,
    /// Display name.
    pub name: String,
    /// Limited category. Stored as the local id; the engine sends the
    /// category's remote id instead.
    #[serde(default)]
    pub category_id: Option<u64>,
    /// Limit in cents.
    pub limit_cents: i64,
    /// Accounting period.
    #[serde(default)]
    pub period: BudgetPeriod,
}

impl Budget {
    /// Creates an unsynced monthly budget.
    pub fn monthly(local_id: u64, name: impl Into<String>, limit_cents: i64) -> Self {
        Self {
            remote_id: None,
            local_id,
            name: name.into(),
            category_id: None,
            limit_cents,
            period: BudgetPeriod::Monthly,
        }
    }

    /// Sets the limited category.
    pub fn for_category(mut self, category_id: u64) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

impl SyncEntity for Budget {
    const TABLE: &'static str = "budgets";
    const RESOURCE: &'static str = "budget";

    fn local_id(&self) -> u64 {
        self.local_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn remote_id(&self) -> Option<u64> {
        self.remote_id.filter(|id| *id != 0)
    }

    fn remote_id_mut(&mut self) -> &mut Option<u64> {
        &mut self.remote_id
    }

    fn category_ref(&self) -> Option<u64> {
        self.category_id
    }

    fn with_category_ref(&self, category_id: Option<u64>) -> Self {
        Self {
            category_id,
            ..self.clone()
        }
    }
}

/// A savings target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsGoal {
    /// Server-issued identifier.
    #[serde(
        rename = "id",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_remote_id"
    )]
    pub remote_id: Option<u64>,
    /// Local identifier.
    #[serde(default)]
    pub local_id: u64,
    /// Display name.
    pub name: String,
    /// Target in cents.
    pub target_cents: i64,
    /// Saved so far in cents.
    #[serde(default)]
    pub saved_cents: i64,
    /// Optional deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
}

impl SavingsGoal {
    /// Creates an unsynced goal with nothing saved yet.
    pub fn new(local_id: u64, name: impl Into<String>, target_cents: i64) -> Self {
        Self {
            remote_id: None,
            local_id,
            name: name.into(),
            target_cents,
            saved_cents: 0,
            deadline: None,
        }
    }

    /// Fraction of the target reached, clamped to `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.target_cents <= 0 {
            return 1.0;
        }
        (self.saved_cents as f64 / self.target_cents as f64).clamp(0.0, 1.0)
    }
}

impl SyncEntity for SavingsGoal {
    const TABLE: &'static str = "savings_goals";
    const RESOURCE: &'static str = "goal";

    fn local_id(&self) -> u64 {
        self.local_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn remote_id(&self) -> Option<u64> {
        self.remote_id.filter(|id| *id != 0)
    }

    fn remote_id_mut(&mut self) -> &mut Option<u64> {
        &mut self.remote_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_wire_shape() {
        let mut category = Category::income(5, "Salary");
        let json = serde_json::to_value(&category).unwrap();
        assert_eq!(json["localId"], 5);
        assert_eq!(json["name"], "Salary");
        assert_eq!(json["kind"], "income");
        assert!(json.get("id").is_none());

        category.remote_id = Some(99);
        let json = serde_json::to_value(&category).unwrap();
        assert_eq!(json["id"], 99);
    }

    #[test]
    fn zero_remote_id_decodes_as_unassigned() {
        let category: Category =
            serde_json::from_str(r#"{"id":0,"localId":2,"name":"Fuel"}"#).unwrap();
        assert_eq!(category.remote_id(), None);
        assert_eq!(category.kind, CategoryKind::Expense);

        let category: Category = serde_json::from_str(r#"{"id":null,"name":"Fuel"}"#).unwrap();
        assert_eq!(category.remote_id(), None);
        assert_eq!(category.local_id, 0);
    }

    #[test]
    fn tables_are_distinct() {
        let tables = [
            Category::TABLE,
            Transaction::TABLE,
            Budget::TABLE,
            SavingsGoal::TABLE,
        ];
        for (i, a) in tables.iter().enumerate() {
            for b in &tables[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn transaction_decodes_from_server() {
        let json = r#"{"id":12,"name":"Coffee","amountCents":-450,"categoryId":3,"date":"2024-03-01"}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.remote_id(), Some(12));
        assert_eq!(tx.amount_cents, -450);
        assert_eq!(tx.category_id, Some(3));
    }

    #[test]
    fn category_reference_is_swapped_on_a_copy() {
        let tx = Transaction::new(4, "Lunch", -1_250, "2024-03-01").in_category(3);
        assert_eq!(tx.category_ref(), Some(3));

        let outgoing = tx.with_category_ref(Some(30));
        assert_eq!(serde_json::to_value(&outgoing).unwrap()["categoryId"], 30);
        assert_eq!(outgoing.local_id, 4);
        assert_eq!(tx.category_id, Some(3));

        let budget = Budget::monthly(1, "Food", 40_000).for_category(3);
        assert_eq!(budget.with_category_ref(None).category_ref(), None);
        assert_eq!(Category::expense(1, "Food").category_ref(), None);
        assert_eq!(SavingsGoal::new(1, "Bike", 1).category_ref(), None);
    }

    #[test]
    fn savings_progress() {
        let mut goal = SavingsGoal::new(1, "Bike", 50_000);
        assert_eq!(goal.progress(), 0.0);
        goal.saved_cents = 25_000;
        assert!((goal.progress() - 0.5).abs() < f64::EPSILON);
        goal.saved_cents = 80_000;
        assert_eq!(goal.progress(), 1.0);
    }

    #[test]
    fn budget_defaults_to_monthly() {
        let budget: Budget =
            serde_json::from_str(r#"{"name":"Food","limitCents":40000}"#).unwrap();
        assert_eq!(budget.period, BudgetPeriod::Monthly);
        assert_eq!(Budget::monthly(1, "Food", 40_000).period, BudgetPeriod::Monthly);
    }
}
