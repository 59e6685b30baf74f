//! Cache-then-revalidate reads and cache invalidation on writes.

use std::{future::Future, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use tokio::task::JoinHandle;

use crate::{
    BudgetId, BudgetPeriod, BudgetSummary, CurrencyCode, NewBudget, NewTransaction, Transaction,
    TransactionId, UserID, UserProfile,
    client::{
        BudgetApi, ClientError, LocalCache,
        cache::{budgets_prefix, transactions_prefix},
        budgets_key, transactions_key,
    },
};

/// Where the data returned by a read came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The local cache. It may be out of date.
    Cache,
    /// The server.
    Network,
}

/// The result of a read through [CachedClient].
#[derive(Debug)]
pub struct Fetched<T> {
    /// The data.
    pub data: T,
    /// Where `data` came from.
    pub source: Source,
    /// The background refresh started for a cache hit.
    ///
    /// The refresh writes the fresh data to the cache when it finishes. Awaiting the handle is
    /// optional.
    pub refresh: Option<JoinHandle<()>>,
}

/// Wraps a [BudgetApi] with a [LocalCache].
///
/// Lists of transactions and budgets are cached per user and month. Reads
/// answer from the cache when they can and refresh it in the background.
/// Writes go to the server first and then drop the cached months they
/// affect, for both transactions and budgets since a budget's `spent` total
/// follows its transactions.
#[derive(Debug)]
pub struct CachedClient<A: BudgetApi> {
    api: Arc<A>,
    cache: LocalCache,
    user: Option<UserProfile>,
}

impl<A: BudgetApi> CachedClient<A> {
    /// Create a client that is not logged in yet.
    pub fn new(api: A, cache: LocalCache) -> Self {
        Self {
            api: Arc::new(api),
            cache,
            user: None,
        }
    }

    /// The wrapped API, for requests that are not cached.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// The logged in user, if any.
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    fn user_id(&self) -> Result<UserID, ClientError> {
        self.user
            .as_ref()
            .map(|user| user.id)
            .ok_or(ClientError::NotLoggedIn)
    }

    /// Create an account and log in as the new user.
    ///
    /// The server picks USD when `currency` is `None`.
    pub async fn register(
        &mut self,
        email: &str,
        password: &str,
        name: &str,
        currency: Option<&CurrencyCode>,
    ) -> Result<&UserProfile, ClientError> {
        let user = self.api.register(email, password, name, currency).await?;

        Ok(self.user.insert(user))
    }

    /// Log in.
    pub async fn log_in(&mut self, email: &str, password: &str) -> Result<&UserProfile, ClientError> {
        let user = self.api.log_in(email, password).await?;

        Ok(self.user.insert(user))
    }

    /// Log out and drop everything cached for the user.
    ///
    /// The cache is cleared even if the server could not be reached.
    pub async fn log_out(&mut self) -> Result<(), ClientError> {
        let result = self.api.log_out().await;

        if let Some(user) = self.user.take() {
            self.cache.clear_user(user.id)?;
        }

        result
    }

    /// The user's transactions in `period`.
    pub async fn transactions(
        &self,
        period: BudgetPeriod,
    ) -> Result<Fetched<Vec<Transaction>>, ClientError> {
        let key = transactions_key(self.user_id()?, period);

        self.read_through(key, move |api| async move {
            api.list_transactions(period).await
        })
        .await
    }

    /// The user's budgets in `period`.
    pub async fn budgets(
        &self,
        period: BudgetPeriod,
    ) -> Result<Fetched<Vec<BudgetSummary>>, ClientError> {
        let key = budgets_key(self.user_id()?, period);

        self.read_through(key, move |api| async move { api.list_budgets(period).await })
            .await
    }

    /// Answer from the cache and refresh it in the background, or fetch and
    /// store on a miss.
    ///
    /// Fetched data is only stored if no write invalidated the cache while the
    /// request was in flight.
    async fn read_through<T, F, Fut>(&self, key: String, fetch: F) -> Result<Fetched<T>, ClientError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(Arc<A>) -> Fut,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let generation = self.cache.generation()?;
        let cached = match self.cache.get::<T>(&key) {
            Ok(cached) => cached,
            Err(error) => {
                tracing::warn!("Ignoring unreadable cache entry {key}: {error}");
                None
            }
        };

        match cached {
            Some(entry) => {
                tracing::debug!("Cache hit for {key}, last updated {}", entry.updated_at);
                let request = fetch(self.api.clone());
                let cache = self.cache.clone();

                let refresh = tokio::spawn(async move {
                    match request.await {
                        Ok(fresh) => match cache.put_if_unchanged(&key, &fresh, generation) {
                            Ok(true) => {}
                            Ok(false) => {
                                tracing::debug!("Dropped refresh of {key}, the cache changed")
                            }
                            Err(error) => {
                                tracing::error!("Could not update cache entry {key}: {error}")
                            }
                        },
                        Err(error) => {
                            tracing::warn!("Could not refresh {key}, keeping cached copy: {error}")
                        }
                    }
                });

                Ok(Fetched {
                    data: entry.value,
                    source: Source::Cache,
                    refresh: Some(refresh),
                })
            }
            None => {
                tracing::debug!("Cache miss for {key}");
                let data = fetch(self.api.clone()).await?;
                if !self.cache.put_if_unchanged(&key, &data, generation)? {
                    tracing::debug!("Not caching {key}, the cache changed during the request");
                }

                Ok(Fetched {
                    data,
                    source: Source::Network,
                    refresh: None,
                })
            }
        }
    }

    /// Drop the cached transactions and budgets of each of `periods`.
    fn invalidate(&self, periods: &[BudgetPeriod]) -> Result<(), ClientError> {
        let user_id = self.user_id()?;

        for &period in periods {
            self.cache.remove(&transactions_key(user_id, period))?;
            self.cache.remove(&budgets_key(user_id, period))?;
        }

        Ok(())
    }

    /// The months whose cached data changes when `transactions` are written.
    ///
    /// This is the month of each transaction's date, plus the month of the
    /// budget it is linked to, which can differ when the budget was chosen
    /// explicitly. If a linked budget cannot be looked up, every cached budget
    /// list of the user is dropped instead.
    async fn affected_periods(
        &self,
        transactions: &[&Transaction],
    ) -> Result<Vec<BudgetPeriod>, ClientError> {
        let mut periods = Vec::new();

        for transaction in transactions {
            periods.push(BudgetPeriod::containing(transaction.date));

            let Some(budget_id) = transaction.budget_id else {
                continue;
            };

            match self.api.get_budget(budget_id).await {
                Ok(budget) => periods.push(budget.budget.period()),
                Err(error) => {
                    tracing::warn!("Could not look up budget {budget_id}: {error}");
                    self.cache.remove_prefix(&budgets_prefix(self.user_id()?))?;
                }
            }
        }

        periods.sort_unstable();
        periods.dedup();

        Ok(periods)
    }

    /// Record a transaction.
    pub async fn create_transaction(
        &self,
        new_transaction: &NewTransaction,
    ) -> Result<Transaction, ClientError> {
        self.user_id()?;
        let created = self.api.create_transaction(new_transaction).await?;

        let periods = self.affected_periods(&[&created]).await?;
        self.invalidate(&periods)?;

        Ok(created)
    }

    /// Replace the fields of a transaction.
    ///
    /// When the new date is in a different month, both months are dropped from the cache.
    pub async fn update_transaction(
        &self,
        id: TransactionId,
        new_transaction: &NewTransaction,
    ) -> Result<Transaction, ClientError> {
        self.user_id()?;
        let old = self.api.get_transaction(id).await?;
        let updated = self.api.update_transaction(id, new_transaction).await?;

        let periods = self.affected_periods(&[&old, &updated]).await?;
        self.invalidate(&periods)?;

        Ok(updated)
    }

    /// Delete a transaction.
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<(), ClientError> {
        self.user_id()?;
        let old = self.api.get_transaction(id).await?;
        let periods = self.affected_periods(&[&old]).await?;

        self.api.delete_transaction(id).await?;

        self.invalidate(&periods)
    }

    /// Create a budget.
    pub async fn create_budget(&self, new_budget: &NewBudget) -> Result<BudgetSummary, ClientError> {
        self.user_id()?;
        let created = self.api.create_budget(new_budget).await?;

        self.invalidate(&[created.budget.period()])?;

        Ok(created)
    }

    /// Replace the fields of a budget.
    ///
    /// Both the old and new months are dropped from the cache, along with every
    /// cached transaction list of the user since the server may relink
    /// transactions from any month.
    pub async fn update_budget(
        &self,
        id: BudgetId,
        new_budget: &NewBudget,
    ) -> Result<BudgetSummary, ClientError> {
        self.user_id()?;
        let old = self.api.get_budget(id).await?;
        let updated = self.api.update_budget(id, new_budget).await?;

        self.invalidate(&[old.budget.period(), updated.budget.period()])?;
        self.cache.remove_prefix(&transactions_prefix(self.user_id()?))?;

        Ok(updated)
    }

    /// Delete a budget.
    ///
    /// Every cached transaction list of the user is dropped since the
    /// transactions linked to the budget may be in any month.
    pub async fn delete_budget(&self, id: BudgetId) -> Result<(), ClientError> {
        let user_id = self.user_id()?;
        let old = self.api.get_budget(id).await?;
        self.api.delete_budget(id).await?;

        self.invalidate(&[old.budget.period()])?;
        self.cache.remove_prefix(&transactions_prefix(user_id))?;

        Ok(())
    }

    /// Recompute a budget's `spent` total from its transactions.
    pub async fn recalculate_budget(&self, id: BudgetId) -> Result<BudgetSummary, ClientError> {
        self.user_id()?;
        let budget = self.api.recalculate_budget(id).await?;

        self.invalidate(&[budget.budget.period()])?;

        Ok(budget)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Mutex,
            atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use reqwest::StatusCode;
    use time::macros::date;

    use crate::{
        Budget, BudgetId, BudgetPeriod, BudgetSummary, CurrencyCode, NewBudget, NewTransaction,
        Transaction, TransactionId, UserID, UserProfile,
        client::{
            BudgetApi, CachedClient, ClientError, LocalCache, Source, budgets_key,
            transactions_key,
        },
    };

    /// An in-memory stand-in for the server that can be switched off.
    #[derive(Default)]
    struct FakeApi {
        transactions: Mutex<Vec<Transaction>>,
        budgets: Mutex<Vec<Budget>>,
        list_calls: AtomicUsize,
        offline: AtomicBool,
        /// How long list requests take to answer after reading the data.
        list_delay_ms: AtomicU64,
    }

    impl FakeApi {
        fn check_online(&self) -> Result<(), ClientError> {
            if self.offline.load(Ordering::SeqCst) {
                Err(ClientError::Api {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    message: "offline".to_owned(),
                })
            } else {
                Ok(())
            }
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }

        fn set_list_delay(&self, delay: Duration) {
            self.list_delay_ms
                .store(delay.as_millis() as u64, Ordering::SeqCst);
        }

        /// Answer a list request the way a slow server would, with data read before the wait.
        async fn respond_slowly<T>(&self, data: T) -> T {
            let delay = self.list_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            data
        }

        fn profile(email: &str) -> UserProfile {
            UserProfile {
                id: UserID::new(1),
                email: email.to_owned(),
                name: "Alice".to_owned(),
                currency: CurrencyCode::default(),
            }
        }

        fn not_found() -> ClientError {
            ClientError::Api {
                status: StatusCode::NOT_FOUND,
                message: "the requested resource could not be found".to_owned(),
            }
        }

        fn to_transaction(id: TransactionId, new_transaction: &NewTransaction) -> Transaction {
            Transaction {
                id,
                user_id: UserID::new(1),
                amount: new_transaction.amount,
                transaction_type: new_transaction.transaction_type,
                category: new_transaction.category.clone(),
                description: new_transaction.description.clone(),
                date: new_transaction.date,
                budget_id: new_transaction.budget_id,
            }
        }

        fn to_budget(id: BudgetId, new_budget: &NewBudget) -> Budget {
            Budget {
                id,
                user_id: UserID::new(1),
                category: new_budget.category.clone(),
                amount: new_budget.amount,
                spent: 0.0,
                year: new_budget.year,
                month: new_budget.month,
            }
        }
    }

    #[async_trait]
    impl BudgetApi for FakeApi {
        async fn register(
            &self,
            email: &str,
            _password: &str,
            _name: &str,
            currency: Option<&CurrencyCode>,
        ) -> Result<UserProfile, ClientError> {
            self.check_online()?;
            Ok(UserProfile {
                currency: currency.cloned().unwrap_or_default(),
                ..Self::profile(email)
            })
        }

        async fn log_in(&self, email: &str, _password: &str) -> Result<UserProfile, ClientError> {
            self.check_online()?;
            Ok(Self::profile(email))
        }

        async fn log_out(&self) -> Result<(), ClientError> {
            self.check_online()
        }

        async fn list_transactions(
            &self,
            period: BudgetPeriod,
        ) -> Result<Vec<Transaction>, ClientError> {
            self.check_online()?;
            self.list_calls.fetch_add(1, Ordering::SeqCst);

            let transactions: Vec<Transaction> = self
                .transactions
                .lock()
                .unwrap()
                .iter()
                .filter(|transaction| period.contains(transaction.date))
                .cloned()
                .collect();

            Ok(self.respond_slowly(transactions).await)
        }

        async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, ClientError> {
            self.check_online()?;

            self.transactions
                .lock()
                .unwrap()
                .iter()
                .find(|transaction| transaction.id == id)
                .cloned()
                .ok_or_else(Self::not_found)
        }

        async fn create_transaction(
            &self,
            new_transaction: &NewTransaction,
        ) -> Result<Transaction, ClientError> {
            self.check_online()?;
            let mut transactions = self.transactions.lock().unwrap();
            let transaction = Self::to_transaction(transactions.len() as i64 + 1, new_transaction);
            transactions.push(transaction.clone());

            Ok(transaction)
        }

        async fn update_transaction(
            &self,
            id: TransactionId,
            new_transaction: &NewTransaction,
        ) -> Result<Transaction, ClientError> {
            self.check_online()?;
            let mut transactions = self.transactions.lock().unwrap();
            let existing = transactions
                .iter_mut()
                .find(|transaction| transaction.id == id)
                .ok_or_else(Self::not_found)?;
            *existing = Self::to_transaction(id, new_transaction);

            Ok(existing.clone())
        }

        async fn delete_transaction(&self, id: TransactionId) -> Result<(), ClientError> {
            self.check_online()?;
            self.transactions
                .lock()
                .unwrap()
                .retain(|transaction| transaction.id != id);

            Ok(())
        }

        async fn list_budgets(
            &self,
            period: BudgetPeriod,
        ) -> Result<Vec<BudgetSummary>, ClientError> {
            self.check_online()?;
            self.list_calls.fetch_add(1, Ordering::SeqCst);

            let budgets: Vec<BudgetSummary> = self
                .budgets
                .lock()
                .unwrap()
                .iter()
                .filter(|budget| budget.period() == period)
                .cloned()
                .map(BudgetSummary::from)
                .collect();

            Ok(self.respond_slowly(budgets).await)
        }

        async fn get_budget(&self, id: BudgetId) -> Result<BudgetSummary, ClientError> {
            self.check_online()?;

            self.budgets
                .lock()
                .unwrap()
                .iter()
                .find(|budget| budget.id == id)
                .cloned()
                .map(BudgetSummary::from)
                .ok_or_else(Self::not_found)
        }

        async fn create_budget(&self, new_budget: &NewBudget) -> Result<BudgetSummary, ClientError> {
            self.check_online()?;
            let mut budgets = self.budgets.lock().unwrap();
            let budget = Self::to_budget(budgets.len() as i64 + 1, new_budget);
            budgets.push(budget.clone());

            Ok(budget.into())
        }

        async fn update_budget(
            &self,
            id: BudgetId,
            new_budget: &NewBudget,
        ) -> Result<BudgetSummary, ClientError> {
            self.check_online()?;
            let mut budgets = self.budgets.lock().unwrap();
            let existing = budgets
                .iter_mut()
                .find(|budget| budget.id == id)
                .ok_or_else(Self::not_found)?;
            *existing = Self::to_budget(id, new_budget);

            Ok(existing.clone().into())
        }

        async fn delete_budget(&self, id: BudgetId) -> Result<(), ClientError> {
            self.check_online()?;
            self.budgets.lock().unwrap().retain(|budget| budget.id != id);

            Ok(())
        }

        async fn recalculate_budget(&self, id: BudgetId) -> Result<BudgetSummary, ClientError> {
            self.get_budget(id).await
        }
    }

    fn march() -> BudgetPeriod {
        BudgetPeriod::new(2025, 3).unwrap()
    }

    fn april() -> BudgetPeriod {
        BudgetPeriod::new(2025, 4).unwrap()
    }

    fn may() -> BudgetPeriod {
        BudgetPeriod::new(2025, 5).unwrap()
    }

    async fn logged_in_client() -> (CachedClient<FakeApi>, LocalCache) {
        let cache = LocalCache::in_memory().unwrap();
        let mut client = CachedClient::new(FakeApi::default(), cache.clone());
        client.log_in("alice@example.com", "hunter2").await.unwrap();

        (client, cache)
    }

    fn coffee_in_march() -> NewTransaction {
        NewTransaction::expense(4.5, "Coffee", date!(2025 - 03 - 10))
    }

    #[tokio::test]
    async fn first_read_comes_from_network_and_is_cached() {
        let (client, cache) = logged_in_client().await;
        let created = client.api().create_transaction(&coffee_in_march()).await.unwrap();

        let fetched = client.transactions(march()).await.unwrap();

        assert_eq!(fetched.source, Source::Network);
        assert!(fetched.refresh.is_none());
        assert_eq!(fetched.data, vec![created.clone()]);
        assert_eq!(client.api().list_calls(), 1);
        let cached = cache
            .get::<Vec<Transaction>>(&transactions_key(UserID::new(1), march()))
            .unwrap()
            .unwrap();
        assert_eq!(cached.value, vec![created]);
    }

    #[tokio::test]
    async fn cache_hit_returns_cached_data_then_refreshes() {
        let (client, _) = logged_in_client().await;
        client.transactions(march()).await.unwrap();
        // Changes made behind the cache's back only show up after a refresh.
        let created = client.api().create_transaction(&coffee_in_march()).await.unwrap();

        let stale = client.transactions(march()).await.unwrap();
        assert_eq!(stale.source, Source::Cache);
        assert!(stale.data.is_empty());
        stale.refresh.unwrap().await.unwrap();

        let fresh = client.transactions(march()).await.unwrap();
        assert_eq!(fresh.source, Source::Cache);
        assert_eq!(fresh.data, vec![created]);
    }

    #[tokio::test]
    async fn refresh_started_before_a_write_does_not_restore_stale_data() {
        let (client, _) = logged_in_client().await;
        client.transactions(march()).await.unwrap();
        client.api().set_list_delay(Duration::from_millis(50));

        let stale = client.transactions(march()).await.unwrap();
        assert_eq!(stale.source, Source::Cache);
        // Let the refresh read the server's data before the write lands.
        tokio::task::yield_now().await;
        let created = client.create_transaction(&coffee_in_march()).await.unwrap();
        stale.refresh.unwrap().await.unwrap();

        let after_write = client.transactions(march()).await.unwrap();
        assert_eq!(after_write.source, Source::Network);
        assert_eq!(after_write.data, vec![created]);
    }

    #[tokio::test]
    async fn miss_fetched_before_a_write_is_not_cached() {
        let (client, cache) = logged_in_client().await;
        client.api().set_list_delay(Duration::from_millis(50));

        let (fetched, created) = tokio::join!(client.budgets(march()), async {
            tokio::task::yield_now().await;
            client
                .create_budget(&NewBudget::new("Rent", 1500.0, march()))
                .await
                .unwrap()
        });

        assert!(fetched.unwrap().data.is_empty());
        assert_eq!(
            cache
                .get::<Vec<BudgetSummary>>(&budgets_key(UserID::new(1), march()))
                .unwrap(),
            None
        );
        client.api().set_list_delay(Duration::ZERO);
        assert_eq!(client.budgets(march()).await.unwrap().data, vec![created]);
    }

    #[tokio::test]
    async fn register_passes_on_preferred_currency() {
        let mut client = CachedClient::new(FakeApi::default(), LocalCache::in_memory().unwrap());
        let nzd = CurrencyCode::new("NZD").unwrap();

        let user = client
            .register("alice@example.com", "hunter2", "Alice", Some(&nzd))
            .await
            .unwrap();

        assert_eq!(user.currency, nzd);
        assert_eq!(client.user().unwrap().currency, nzd);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_cached_data() {
        let (client, _) = logged_in_client().await;
        let created = client.api().create_transaction(&coffee_in_march()).await.unwrap();
        client.transactions(march()).await.unwrap();
        client.api().set_offline(true);

        let first = client.transactions(march()).await.unwrap();
        first.refresh.unwrap().await.unwrap();
        let second = client.transactions(march()).await.unwrap();

        assert_eq!(first.source, Source::Cache);
        assert_eq!(second.source, Source::Cache);
        assert_eq!(second.data, vec![created]);
    }

    #[tokio::test]
    async fn cache_miss_while_offline_is_an_error() {
        let (client, _) = logged_in_client().await;
        client.api().set_offline(true);

        let error = client.budgets(march()).await.unwrap_err();

        assert_eq!(error.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn reads_need_a_session() {
        let client = CachedClient::new(FakeApi::default(), LocalCache::in_memory().unwrap());

        let result = client.transactions(march()).await;

        assert!(matches!(result, Err(ClientError::NotLoggedIn)));
    }

    #[tokio::test]
    async fn creating_a_transaction_invalidates_its_month_only() {
        let (client, _) = logged_in_client().await;
        for period in [march(), april()] {
            client.transactions(period).await.unwrap();
            client.budgets(period).await.unwrap();
        }

        client.create_transaction(&coffee_in_march()).await.unwrap();

        let march_transactions = client.transactions(march()).await.unwrap();
        let march_budgets = client.budgets(march()).await.unwrap();
        let april_transactions = client.transactions(april()).await.unwrap();
        assert_eq!(march_transactions.source, Source::Network);
        assert_eq!(march_transactions.data.len(), 1);
        assert_eq!(march_budgets.source, Source::Network);
        assert_eq!(april_transactions.source, Source::Cache);
    }

    #[tokio::test]
    async fn moving_a_transaction_invalidates_both_months() {
        let (client, _) = logged_in_client().await;
        let created = client.api().create_transaction(&coffee_in_march()).await.unwrap();
        for period in [march(), april(), may()] {
            client.transactions(period).await.unwrap();
        }

        let moved = NewTransaction::expense(4.5, "Coffee", date!(2025 - 04 - 02));
        client.update_transaction(created.id, &moved).await.unwrap();

        let march_transactions = client.transactions(march()).await.unwrap();
        let april_transactions = client.transactions(april()).await.unwrap();
        let may_transactions = client.transactions(may()).await.unwrap();
        assert_eq!(march_transactions.source, Source::Network);
        assert!(march_transactions.data.is_empty());
        assert_eq!(april_transactions.source, Source::Network);
        assert_eq!(april_transactions.data.len(), 1);
        assert_eq!(may_transactions.source, Source::Cache);
    }

    #[tokio::test]
    async fn linked_budget_month_is_invalidated() {
        let (client, _) = logged_in_client().await;
        let budget = client
            .api()
            .create_budget(&NewBudget::new("Coffee", 50.0, april()))
            .await
            .unwrap();
        client.budgets(april()).await.unwrap();

        let linked = coffee_in_march().budget_id(Some(budget.budget.id));
        client.create_transaction(&linked).await.unwrap();

        assert_eq!(
            client.budgets(april()).await.unwrap().source,
            Source::Network
        );
    }

    #[tokio::test]
    async fn deleting_a_transaction_invalidates_its_month() {
        let (client, _) = logged_in_client().await;
        let created = client.api().create_transaction(&coffee_in_march()).await.unwrap();
        client.transactions(march()).await.unwrap();

        client.delete_transaction(created.id).await.unwrap();

        let fetched = client.transactions(march()).await.unwrap();
        assert_eq!(fetched.source, Source::Network);
        assert!(fetched.data.is_empty());
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_alone() {
        let (client, _) = logged_in_client().await;
        client.transactions(march()).await.unwrap();
        client.api().set_offline(true);

        let result = client.create_transaction(&coffee_in_march()).await;

        assert!(result.is_err());
        client.api().set_offline(false);
        assert_eq!(
            client.transactions(march()).await.unwrap().source,
            Source::Cache
        );
    }

    #[tokio::test]
    async fn budget_writes_invalidate_their_months() {
        let (client, _) = logged_in_client().await;
        for period in [march(), april()] {
            client.budgets(period).await.unwrap();
        }

        let created = client
            .create_budget(&NewBudget::new("Rent", 1500.0, march()))
            .await
            .unwrap();
        let after_create = client.budgets(march()).await.unwrap();
        assert_eq!(after_create.source, Source::Network);
        assert_eq!(after_create.data, vec![created.clone()]);

        client
            .update_budget(created.budget.id, &NewBudget::new("Rent", 1500.0, april()))
            .await
            .unwrap();
        let march_budgets = client.budgets(march()).await.unwrap();
        let april_budgets = client.budgets(april()).await.unwrap();
        assert_eq!(march_budgets.source, Source::Network);
        assert!(march_budgets.data.is_empty());
        assert_eq!(april_budgets.source, Source::Network);
        assert_eq!(april_budgets.data.len(), 1);

        client.delete_budget(created.budget.id).await.unwrap();
        let april_budgets = client.budgets(april()).await.unwrap();
        assert_eq!(april_budgets.source, Source::Network);
        assert!(april_budgets.data.is_empty());
    }

    #[tokio::test]
    async fn log_out_clears_the_users_cache() {
        let (mut client, cache) = logged_in_client().await;
        client.transactions(march()).await.unwrap();
        client.budgets(march()).await.unwrap();
        cache.put(&budgets_key(UserID::new(2), march()), &Vec::<BudgetSummary>::new()).unwrap();

        client.log_out().await.unwrap();

        assert!(client.user().is_none());
        assert_eq!(
            cache
                .get::<Vec<Transaction>>(&transactions_key(UserID::new(1), march()))
                .unwrap(),
            None
        );
        assert!(
            cache
                .get::<Vec<BudgetSummary>>(&budgets_key(UserID::new(2), march()))
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn log_out_clears_cache_even_when_offline() {
        let (mut client, cache) = logged_in_client().await;
        client.transactions(march()).await.unwrap();
        client.api().set_offline(true);

        let result = client.log_out().await;

        assert!(result.is_err());
        assert_eq!(
            cache
                .get::<Vec<Transaction>>(&transactions_key(UserID::new(1), march()))
                .unwrap(),
            None
        );
    }
}
