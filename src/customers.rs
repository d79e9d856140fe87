use crate::errors::{LedgerError, LedgerResult};
use crate::models::Customer;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Lookup of account owners, provided by the customer-management side.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn resolve_customer(&self, customer_id: u64) -> LedgerResult<Customer>;
}

/// Directory backed by a map, used by the batch CLI and tests.
pub struct InMemoryCustomers {
    customers: Arc<RwLock<HashMap<u64, Customer>>>,
}

impl InMemoryCustomers {
    pub fn new() -> Self {
        Self {
            customers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, id: u64, full_name: impl Into<String>) -> Customer {
        let customer = Customer {
            id,
            full_name: full_name.into(),
        };
        self.customers.write().await.insert(id, customer.clone());
        customer
    }
}

impl Default for InMemoryCustomers {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomers {
    async fn resolve_customer(&self, customer_id: u64) -> LedgerResult<Customer> {
        self.customers
            .read()
            .await
            .get(&customer_id)
            .cloned()
            .ok_or(LedgerError::CustomerNotFound(customer_id))
    }
}
