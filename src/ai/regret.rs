//! Finding past purchases by product keyword.

use std::sync::Arc;
use uuid::Uuid;

use crate::ledger::{Category, LedgerStore, StoreResult, Transaction, TransactionQuery};

/// Case-insensitive substring test. An empty keyword matches nothing.
pub fn description_matches(description: &str, keyword: &str) -> bool {
    let keyword = keyword.trim();
    !keyword.is_empty() && description.to_lowercase().contains(&keyword.to_lowercase())
}

#[derive(Clone)]
pub struct RegretMatcher {
    store: Arc<dyn LedgerStore>,
}

impl RegretMatcher {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Most recent transaction in `category` already flagged as regretted
    /// whose description mentions `keyword`.
    pub async fn find_regretted(
        &self,
        user_id: Uuid,
        category: Category,
        keyword: &str,
    ) -> StoreResult<Option<Transaction>> {
        let query = TransactionQuery::for_user(user_id)
            .category(category)
            .regretted(true);
        self.most_recent_match(&query, keyword).await
    }

    /// Most recent transaction in `category` mentioning `keyword`, flagged
    /// or not. Used when recording new regret feedback.
    pub async fn find_latest(
        &self,
        user_id: Uuid,
        category: Category,
        keyword: &str,
    ) -> StoreResult<Option<Transaction>> {
        let query = TransactionQuery::for_user(user_id).category(category);
        self.most_recent_match(&query, keyword).await
    }

    async fn most_recent_match(
        &self,
        query: &TransactionQuery,
        keyword: &str,
    ) -> StoreResult<Option<Transaction>> {
        if keyword.trim().is_empty() {
            return Ok(None);
        }
        // Listings come back newest first.
        let candidates = self.store.find_transactions(query).await?;
        Ok(candidates
            .into_iter()
            .find(|tx| description_matches(&tx.description, keyword)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{InMemoryLedgerStore, PaymentMethod, TransactionType};
    use chrono::{Duration, Utc};

    async fn seed(
        store: &InMemoryLedgerStore,
        user: Uuid,
        category: Category,
        description: &str,
        regretted: bool,
        days_ago: i64,
    ) -> Transaction {
        let mut tx = Transaction::new(
            user,
            100.0,
            TransactionType::Expense,
            category,
            description,
            PaymentMethod::Cash,
        );
        tx.regret_feedback = regretted;
        tx.date = Utc::now() - Duration::days(days_ago);
        store.insert_transaction(tx).await.unwrap()
    }

    #[test]
    fn substring_match_ignores_case() {
        assert!(description_matches("Bought a FITBIT charge", "fitbit"));
        assert!(!description_matches("Bought a watch", "fitbit"));
        assert!(!description_matches("anything", "   "));
    }

    #[tokio::test]
    async fn finds_most_recent_regretted_in_same_category() {
        let store = InMemoryLedgerStore::new();
        let user = Uuid::new_v4();
        seed(&store, user, Category::Shopping, "old fitbit", true, 30).await;
        let recent = seed(&store, user, Category::Shopping, "Fitbit Versa", true, 2).await;
        seed(&store, user, Category::Shopping, "fitbit strap", false, 1).await;
        seed(&store, user, Category::Entertainment, "fitbit game", true, 1).await;

        let matcher = RegretMatcher::new(Arc::new(store));
        let found = matcher
            .find_regretted(user, Category::Shopping, "Fitbit")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, recent.id);
    }

    #[tokio::test]
    async fn other_users_and_empty_keywords_never_match() {
        let store = InMemoryLedgerStore::new();
        let owner = Uuid::new_v4();
        seed(&store, owner, Category::Shopping, "Fitbit", true, 1).await;
        let matcher = RegretMatcher::new(Arc::new(store));

        assert!(matcher
            .find_regretted(Uuid::new_v4(), Category::Shopping, "Fitbit")
            .await
            .unwrap()
            .is_none());
        assert!(matcher
            .find_regretted(owner, Category::Shopping, "")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn latest_match_ignores_regret_flag() {
        let store = InMemoryLedgerStore::new();
        let user = Uuid::new_v4();
        let unflagged = seed(&store, user, Category::Shopping, "bought a Fitbit", false, 1).await;
        let matcher = RegretMatcher::new(Arc::new(store));
        let found = matcher
            .find_latest(user, Category::Shopping, "fitbit")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, unflagged.id);
    }
}
