// src/service.rs
use crate::db::{Collection, DocumentStore};
use crate::error::{ServiceError, StoreError};
use crate::models::{Allocation, Document, Holding, Performance, Summary, Transaction};
use crate::seed::PortfolioSeed;
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Read operations over the portfolio collections plus the transaction
/// ledger. Holds the store handle it was constructed with.
#[derive(Clone)]
pub struct PortfolioService {
    store: Arc<dyn DocumentStore>,
}

impl PortfolioService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        PortfolioService { store }
    }

    pub async fn holdings(&self) -> Result<Vec<Document<Holding>>, ServiceError> {
        let holdings = self.find_all(Collection::Holdings).await?;
        if holdings.is_empty() {
            return Err(ServiceError::NotFound("No holdings found.".to_string()));
        }
        Ok(holdings)
    }

    pub async fn allocation(&self) -> Result<Document<Allocation>, ServiceError> {
        self.find_one(Collection::Allocations)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Allocation data not found.".to_string()))
    }

    pub async fn performance(&self) -> Result<Document<Performance>, ServiceError> {
        self.find_one(Collection::Performances)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Performance data not found.".to_string()))
    }

    pub async fn summary(&self) -> Result<Document<Summary>, ServiceError> {
        self.find_one(Collection::Summaries)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Summary data not found.".to_string()))
    }

    pub async fn transactions(&self) -> Result<Vec<Document<Transaction>>, ServiceError> {
        Ok(self.find_all(Collection::Transactions).await?)
    }

    pub async fn create_transaction(&self, body: &Value) -> Result<Document<Transaction>, ServiceError> {
        let transaction = parse_transaction(body)?;
        let doc = Document::new(transaction);
        self.insert(Collection::Transactions, std::slice::from_ref(&doc)).await?;
        info!("Recorded transaction {} ({}).", doc.id, doc.body.title);
        Ok(doc)
    }

    /// Replaces the four portfolio collections with `seed`.
    pub async fn seed_portfolio(&self, seed: PortfolioSeed) -> Result<(), ServiceError> {
        if let Some(symbol) = duplicate_symbol(&seed.holdings) {
            return Err(ServiceError::BadRequest(format!(
                "Duplicate holding symbol {}.",
                symbol
            )));
        }

        self.destroy_portfolio().await?;

        let holdings: Vec<Document<Holding>> = seed.holdings.into_iter().map(Document::new).collect();
        self.insert(Collection::Holdings, &holdings).await?;
        self.insert(Collection::Allocations, &[Document::new(seed.allocation)]).await?;
        self.insert(Collection::Performances, &[Document::new(seed.performance)]).await?;
        self.insert(Collection::Summaries, &[Document::new(seed.summary)]).await?;

        info!("Imported {} holdings and portfolio aggregates.", holdings.len());
        Ok(())
    }

    pub async fn destroy_portfolio(&self) -> Result<(), ServiceError> {
        for collection in Collection::PORTFOLIO {
            self.store.delete_all(collection).await?;
        }
        Ok(())
    }

    async fn find_all<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, StoreError> {
        self.store
            .find_all(collection)
            .await?
            .into_iter()
            .map(|doc| decode(collection, doc))
            .collect()
    }

    async fn find_one<T: DeserializeOwned>(&self, collection: Collection) -> Result<Option<T>, StoreError> {
        self.store
            .find_one(collection)
            .await?
            .map(|doc| decode(collection, doc))
            .transpose()
    }

    async fn insert<T: Serialize>(&self, collection: Collection, docs: &[T]) -> Result<(), StoreError> {
        let values = docs
            .iter()
            .map(|doc| {
                serde_json::to_value(doc).map_err(|e| StoreError::Corrupt {
                    collection: collection.as_str(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.store.insert_many(collection, values).await
    }
}

fn duplicate_symbol(holdings: &[Holding]) -> Option<String> {
    let mut seen = HashSet::new();
    holdings
        .iter()
        .find(|h| !seen.insert(h.symbol.as_str()))
        .map(|h| h.symbol.clone())
}

fn decode<T: DeserializeOwned>(collection: Collection, doc: Value) -> Result<T, StoreError> {
    serde_json::from_value(doc).map_err(|e| StoreError::Corrupt {
        collection: collection.as_str(),
        message: e.to_string(),
    })
}

/// Validates a transaction body: `title` must be a non-empty string and
/// `amount` a finite number, or a string holding one.
pub fn parse_transaction(body: &Value) -> Result<Transaction, ServiceError> {
    let object = body
        .as_object()
        .ok_or_else(|| ServiceError::BadRequest("Request body must be a JSON object.".to_string()))?;

    let title = match object.get("title") {
        Some(Value::String(title)) if !title.is_empty() => title.clone(),
        _ => return Err(ServiceError::BadRequest("Path `title` is required.".to_string())),
    };

    let amount = match object.get("amount") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Null) | None => {
            return Err(ServiceError::BadRequest("Path `amount` is required.".to_string()))
        }
        _ => None,
    };

    match amount {
        Some(amount) if amount.is_finite() => Ok(Transaction { title, amount }),
        _ => Err(ServiceError::BadRequest("Path `amount` must be a number.".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::seed::sample_portfolio;
    use serde_json::json;

    fn service() -> PortfolioService {
        PortfolioService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn empty_store_reports_not_found() {
        let service = service();
        assert!(matches!(service.holdings().await, Err(ServiceError::NotFound(m)) if m == "No holdings found."));
        assert!(matches!(service.allocation().await, Err(ServiceError::NotFound(_))));
        assert!(matches!(service.performance().await, Err(ServiceError::NotFound(_))));
        assert!(matches!(service.summary().await, Err(ServiceError::NotFound(_))));
        assert!(service.transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn seeded_data_reads_back_unchanged() {
        let service = service();
        let seed = sample_portfolio();
        service.seed_portfolio(seed.clone()).await.unwrap();

        let holdings: Vec<Holding> = service
            .holdings()
            .await
            .unwrap()
            .into_iter()
            .map(Document::into_body)
            .collect();
        assert_eq!(holdings, seed.holdings);
        assert_eq!(service.allocation().await.unwrap().body, seed.allocation);
        assert_eq!(service.performance().await.unwrap().body, seed.performance);
        assert_eq!(service.summary().await.unwrap().body, seed.summary);
    }

    #[tokio::test]
    async fn reseeding_replaces_previous_data() {
        let service = service();
        service.seed_portfolio(sample_portfolio()).await.unwrap();
        service.seed_portfolio(sample_portfolio()).await.unwrap();
        assert_eq!(service.holdings().await.unwrap().len(), 15);

        service.destroy_portfolio().await.unwrap();
        assert!(matches!(service.summary().await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_symbols_are_rejected_before_writing() {
        let service = service();
        service.seed_portfolio(sample_portfolio()).await.unwrap();

        let mut seed = sample_portfolio();
        let first = seed.holdings[0].clone();
        seed.holdings.push(first);
        assert!(matches!(service.seed_portfolio(seed).await, Err(ServiceError::BadRequest(_))));
        assert_eq!(service.holdings().await.unwrap().len(), 15);
    }

    #[tokio::test]
    async fn created_transaction_is_listed() {
        let service = service();
        let created = service
            .create_transaction(&json!({"title": "Buy", "amount": 100}))
            .await
            .unwrap();
        assert_eq!(created.body.title, "Buy");
        assert_eq!(created.body.amount, 100.0);

        let listed = service.transactions().await.unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[test]
    fn transaction_validation() {
        assert!(parse_transaction(&json!({"amount": 5})).is_err());
        assert!(parse_transaction(&json!({"title": "", "amount": 5})).is_err());
        assert!(parse_transaction(&json!({"title": 7, "amount": 5})).is_err());
        assert!(parse_transaction(&json!({"title": "Buy"})).is_err());
        assert!(parse_transaction(&json!({"title": "Buy", "amount": null})).is_err());
        assert!(parse_transaction(&json!({"title": "Buy", "amount": "abc"})).is_err());
        assert!(parse_transaction(&json!({"title": "Buy", "amount": [1]})).is_err());
        assert!(parse_transaction(&json!(["Buy", 5])).is_err());

        let cast = parse_transaction(&json!({"title": "Sell", "amount": " 42.5 "})).unwrap();
        assert_eq!(cast, Transaction { title: "Sell".to_string(), amount: 42.5 });
        let negative = parse_transaction(&json!({"title": "Fee", "amount": -3})).unwrap();
        assert_eq!(negative.amount, -3.0);
    }
}
