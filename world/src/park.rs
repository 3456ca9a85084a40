//! Park finances and the news feed.

use std::collections::BTreeMap;

use parkscript_core::{ExpenditureType, ParkMessageType};

/// Message posted to the park news feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParkMessage {
    /// Category of the message.
    pub kind: ParkMessageType,
    /// Message text.
    pub text: String,
    /// Optional subject, such as a ride or thing identifier.
    pub subject: Option<u32>,
}

/// Park-wide state observed and mutated by actions.
#[derive(Clone, Debug)]
pub struct Park {
    cash: i64,
    rating: i32,
    bank_loan: i64,
    max_bank_loan: i64,
    messages: Vec<ParkMessage>,
    spending: BTreeMap<ExpenditureType, i64>,
}

impl Park {
    /// Creates the park with its opening balance sheet.
    #[must_use]
    pub fn new(cash: i64, bank_loan: i64, max_bank_loan: i64) -> Self {
        Self {
            cash,
            rating: 0,
            bank_loan,
            max_bank_loan,
            messages: Vec::new(),
            spending: BTreeMap::new(),
        }
    }

    /// Cash on hand.
    #[must_use]
    pub const fn cash(&self) -> i64 {
        self.cash
    }

    /// Overrides the cash balance.
    pub fn set_cash(&mut self, cash: i64) {
        self.cash = cash;
    }

    /// Park rating, 0 to 999.
    #[must_use]
    pub const fn rating(&self) -> i32 {
        self.rating
    }

    /// Overrides the park rating, clamped to 0..=999.
    pub fn set_rating(&mut self, rating: i32) {
        self.rating = rating.clamp(0, 999);
    }

    /// Outstanding bank loan.
    #[must_use]
    pub const fn bank_loan(&self) -> i64 {
        self.bank_loan
    }

    /// Largest loan the bank grants.
    #[must_use]
    pub const fn max_bank_loan(&self) -> i64 {
        self.max_bank_loan
    }

    /// Changes the loan, crediting or debiting the difference in cash.
    ///
    /// Cash saturates at the bounds of `i64`.
    pub fn set_bank_loan(&mut self, bank_loan: i64) {
        self.cash = self
            .cash
            .saturating_add(bank_loan.saturating_sub(self.bank_loan));
        self.bank_loan = bank_loan;
    }

    /// Reports whether the park can pay `cost`. Income is always affordable.
    #[must_use]
    pub const fn can_afford(&self, cost: i64) -> bool {
        cost <= 0 || cost <= self.cash
    }

    /// Pays `cost` and books it against `category`.
    ///
    /// Cash and the category total saturate at the bounds of `i64`.
    pub fn spend(&mut self, cost: i64, category: ExpenditureType) {
        self.cash = self.cash.saturating_sub(cost);
        let booked = self.spending.entry(category).or_insert(0);
        *booked = booked.saturating_add(cost);
    }

    /// Total booked against `category` since the park opened.
    #[must_use]
    pub fn spending(&self, category: ExpenditureType) -> i64 {
        self.spending.get(&category).copied().unwrap_or(0)
    }

    /// Posts a message to the news feed.
    pub fn post_message(&mut self, message: ParkMessage) {
        self.messages.push(message);
    }

    /// Messages posted so far, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[ParkMessage] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loan_changes_move_cash() {
        let mut park = Park::new(1_000, 500, 5_000);
        park.set_bank_loan(2_000);
        assert_eq!(park.cash(), 2_500);
        park.set_bank_loan(0);
        assert_eq!(park.cash(), 500);
    }

    #[test]
    fn spending_is_booked_per_category() {
        let mut park = Park::new(100, 0, 0);
        assert!(park.can_afford(100));
        assert!(!park.can_afford(101));
        assert!(park.can_afford(-50));
        park.spend(40, ExpenditureType::Landscaping);
        park.spend(-10, ExpenditureType::Landscaping);
        assert_eq!(park.cash(), 70);
        assert_eq!(park.spending(ExpenditureType::Landscaping), 30);
        assert_eq!(park.spending(ExpenditureType::Wages), 0);
    }

    #[test]
    fn extreme_amounts_saturate() {
        let mut park = Park::new(100, 0, 0);
        assert!(park.can_afford(i64::MIN));
        park.spend(i64::MIN, ExpenditureType::Marketing);
        assert_eq!(park.cash(), i64::MAX);
        park.spend(i64::MIN, ExpenditureType::Marketing);
        assert_eq!(park.spending(ExpenditureType::Marketing), i64::MIN);

        let mut park = Park::new(i64::MAX - 10, 0, 0);
        park.set_bank_loan(100);
        assert_eq!(park.cash(), i64::MAX);
        park.set_bank_loan(i64::MIN);
        assert_eq!(park.bank_loan(), i64::MIN);
        assert_eq!(park.cash(), -1);
    }
}
