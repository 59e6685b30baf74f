//! The HTTP client for the REST API.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;

use crate::{
    BudgetId, BudgetPeriod, BudgetSummary, Conversion, CurrencyCode, ExchangeRates,
    MonthlySummary, NewBudget, NewTransaction, Transaction, TransactionId, UserProfile,
    client::ClientError,
    endpoints::{self, format_endpoint},
};

/// The requests that [crate::client::CachedClient] needs from the server.
///
/// [ApiClient] is the real implementation.
#[async_trait]
pub trait BudgetApi: Send + Sync + 'static {
    /// Create an account. The server starts a session for the new user.
    ///
    /// The server picks USD when `currency` is `None`.
    async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        currency: Option<&CurrencyCode>,
    ) -> Result<UserProfile, ClientError>;

    /// Start a session.
    async fn log_in(&self, email: &str, password: &str) -> Result<UserProfile, ClientError>;

    /// End the session.
    async fn log_out(&self) -> Result<(), ClientError>;

    /// The user's transactions in `period`, newest first.
    async fn list_transactions(&self, period: BudgetPeriod)
    -> Result<Vec<Transaction>, ClientError>;

    /// A single transaction.
    async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, ClientError>;

    /// Record a transaction.
    async fn create_transaction(
        &self,
        new_transaction: &NewTransaction,
    ) -> Result<Transaction, ClientError>;

    /// Replace the fields of a transaction.
    async fn update_transaction(
        &self,
        id: TransactionId,
        new_transaction: &NewTransaction,
    ) -> Result<Transaction, ClientError>;

    /// Delete a transaction.
    async fn delete_transaction(&self, id: TransactionId) -> Result<(), ClientError>;

    /// The user's budgets in `period`, sorted by category.
    async fn list_budgets(&self, period: BudgetPeriod) -> Result<Vec<BudgetSummary>, ClientError>;

    /// A single budget.
    async fn get_budget(&self, id: BudgetId) -> Result<BudgetSummary, ClientError>;

    /// Create a budget.
    async fn create_budget(&self, new_budget: &NewBudget) -> Result<BudgetSummary, ClientError>;

    /// Replace the fields of a budget.
    async fn update_budget(
        &self,
        id: BudgetId,
        new_budget: &NewBudget,
    ) -> Result<BudgetSummary, ClientError>;

    /// Delete a budget.
    async fn delete_budget(&self, id: BudgetId) -> Result<(), ClientError>;

    /// Recompute a budget's `spent` total from its transactions.
    async fn recalculate_budget(&self, id: BudgetId) -> Result<BudgetSummary, ClientError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// A client for the REST API.
///
/// The auth cookie set by the server is kept in the client's cookie store,
/// so after [BudgetApi::log_in] or [BudgetApi::register] every request is
/// made as that user. Cloning the client shares the session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the server at `base_url`, e.g. "http://localhost:3000".
    ///
    /// # Errors
    /// Returns [ClientError::Http] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().cookie_store(true).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The profile of the logged in user.
    pub async fn me(&self) -> Result<UserProfile, ClientError> {
        send_json(self.client.get(self.url(endpoints::ME))).await
    }

    /// Change the logged in user's name and preferred currency.
    pub async fn update_me(
        &self,
        name: &str,
        currency: &CurrencyCode,
    ) -> Result<UserProfile, ClientError> {
        let request = self
            .client
            .put(self.url(endpoints::ME))
            .json(&json!({ "name": name, "currency": currency }));

        send_json(request).await
    }

    /// Change the logged in user's password.
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ClientError> {
        let request = self.client.put(self.url(endpoints::ME_PASSWORD)).json(&json!({
            "current_password": current_password,
            "new_password": new_password,
        }));

        send_empty(request).await
    }

    /// Delete the logged in user along with all of their data.
    pub async fn delete_me(&self) -> Result<(), ClientError> {
        send_empty(self.client.delete(self.url(endpoints::ME))).await
    }

    /// Income, expenses and budgets for `period`.
    pub async fn summary(&self, period: BudgetPeriod) -> Result<MonthlySummary, ClientError> {
        let request = self
            .client
            .get(self.url(endpoints::SUMMARY))
            .query(&period_query(period));

        send_json(request).await
    }

    /// The latest exchange rates relative to `base`, or the user's currency if `None`.
    pub async fn rates(&self, base: Option<&CurrencyCode>) -> Result<ExchangeRates, ClientError> {
        let mut request = self.client.get(self.url(endpoints::CURRENCY_RATES));
        if let Some(base) = base {
            request = request.query(&[("base", base.as_str())]);
        }

        send_json(request).await
    }

    /// Convert `amount` from `from`, or the user's currency if `None`, to `to`.
    pub async fn convert(
        &self,
        amount: f64,
        from: Option<&CurrencyCode>,
        to: &CurrencyCode,
    ) -> Result<Conversion, ClientError> {
        let mut query = vec![("amount", amount.to_string()), ("to", to.to_string())];
        if let Some(from) = from {
            query.push(("from", from.to_string()));
        }

        let request = self
            .client
            .get(self.url(endpoints::CURRENCY_CONVERT))
            .query(&query);

        send_json(request).await
    }
}

#[async_trait]
impl BudgetApi for ApiClient {
    async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        currency: Option<&CurrencyCode>,
    ) -> Result<UserProfile, ClientError> {
        let request = self.client.post(self.url(endpoints::USERS)).json(&json!({
            "email": email,
            "password": password,
            "name": name,
            "currency": currency,
        }));

        send_json(request).await
    }

    async fn log_in(&self, email: &str, password: &str) -> Result<UserProfile, ClientError> {
        let request = self
            .client
            .post(self.url(endpoints::LOG_IN))
            .json(&json!({ "email": email, "password": password }));

        send_json(request).await
    }

    async fn log_out(&self) -> Result<(), ClientError> {
        send_empty(self.client.post(self.url(endpoints::LOG_OUT))).await
    }

    async fn list_transactions(
        &self,
        period: BudgetPeriod,
    ) -> Result<Vec<Transaction>, ClientError> {
        let request = self
            .client
            .get(self.url(endpoints::TRANSACTIONS))
            .query(&period_query(period));

        send_json(request).await
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, ClientError> {
        let url = self.url(&format_endpoint(endpoints::TRANSACTION, id));

        send_json(self.client.get(url)).await
    }

    async fn create_transaction(
        &self,
        new_transaction: &NewTransaction,
    ) -> Result<Transaction, ClientError> {
        let request = self
            .client
            .post(self.url(endpoints::TRANSACTIONS))
            .json(new_transaction);

        send_json(request).await
    }

    async fn update_transaction(
        &self,
        id: TransactionId,
        new_transaction: &NewTransaction,
    ) -> Result<Transaction, ClientError> {
        let url = self.url(&format_endpoint(endpoints::TRANSACTION, id));

        send_json(self.client.put(url).json(new_transaction)).await
    }

    async fn delete_transaction(&self, id: TransactionId) -> Result<(), ClientError> {
        let url = self.url(&format_endpoint(endpoints::TRANSACTION, id));

        send_empty(self.client.delete(url)).await
    }

    async fn list_budgets(&self, period: BudgetPeriod) -> Result<Vec<BudgetSummary>, ClientError> {
        let request = self
            .client
            .get(self.url(endpoints::BUDGETS))
            .query(&period_query(period));

        send_json(request).await
    }

    async fn get_budget(&self, id: BudgetId) -> Result<BudgetSummary, ClientError> {
        let url = self.url(&format_endpoint(endpoints::BUDGET, id));

        send_json(self.client.get(url)).await
    }

    async fn create_budget(&self, new_budget: &NewBudget) -> Result<BudgetSummary, ClientError> {
        let request = self.client.post(self.url(endpoints::BUDGETS)).json(new_budget);

        send_json(request).await
    }

    async fn update_budget(
        &self,
        id: BudgetId,
        new_budget: &NewBudget,
    ) -> Result<BudgetSummary, ClientError> {
        let url = self.url(&format_endpoint(endpoints::BUDGET, id));

        send_json(self.client.put(url).json(new_budget)).await
    }

    async fn delete_budget(&self, id: BudgetId) -> Result<(), ClientError> {
        let url = self.url(&format_endpoint(endpoints::BUDGET, id));

        send_empty(self.client.delete(url)).await
    }

    async fn recalculate_budget(&self, id: BudgetId) -> Result<BudgetSummary, ClientError> {
        let url = self.url(&format_endpoint(endpoints::RECALCULATE_BUDGET, id));

        send_json(self.client.post(url)).await
    }
}

fn period_query(period: BudgetPeriod) -> [(&'static str, String); 2] {
    [
        ("year", period.year.to_string()),
        ("month", period.month.to_string()),
    ]
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
    let response = check_status(request.send().await?).await?;

    Ok(response.json().await?)
}

async fn send_empty(request: RequestBuilder) -> Result<(), ClientError> {
    check_status(request.send().await?).await?;

    Ok(())
}

/// Turn non-success responses into [ClientError::Api], using the `error` field of the body as
/// the message when there is one.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("unknown error").to_owned(),
    };
    tracing::debug!("Request failed with {status}: {message}");

    Err(ClientError::Api { status, message })
}
