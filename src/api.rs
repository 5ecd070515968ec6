// src/api.rs
use crate::error::ApiError;
use crate::service::PortfolioService;
use log::{error, info};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Full application filter: the portfolio and transaction routes, JSON error
/// bodies for every rejection, then CORS and access logging over both.
pub fn routes(
    service: Arc<PortfolioService>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST"])
        .allow_header("content-type");

    let root = warp::path::end()
        .and(warp::get())
        .map(|| "WealthManager API is running");

    root.or(portfolio_routes(service.clone()))
        .or(transaction_routes(service))
        .recover(handle_rejection)
        .with(cors)
        .with(warp::log("wealth_manager::http"))
}

pub fn portfolio_routes(
    service: Arc<PortfolioService>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let holdings = warp::path!("api" / "portfolio" / "holdings")
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(get_holdings_handler);

    let allocation = warp::path!("api" / "portfolio" / "allocation")
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(get_allocation_handler);

    let performance = warp::path!("api" / "portfolio" / "performance")
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(get_performance_handler);

    let summary = warp::path!("api" / "portfolio" / "summary")
        .and(warp::get())
        .and(with_service(service))
        .and_then(get_summary_handler);

    holdings.or(allocation).or(performance).or(summary)
}

pub fn transaction_routes(
    service: Arc<PortfolioService>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let list = warp::path!("api" / "transactions")
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(list_transactions_handler);

    let create = warp::path!("api" / "transactions")
        .and(warp::post())
        .and(with_service(service))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and_then(create_transaction_handler);

    list.or(create)
}

fn with_service(
    service: Arc<PortfolioService>,
) -> impl Filter<Extract = (Arc<PortfolioService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

async fn get_holdings_handler(service: Arc<PortfolioService>) -> Result<impl Reply, Rejection> {
    match service.holdings().await {
        Ok(holdings) => {
            info!("Holdings retrieved successfully ({} records).", holdings.len());
            Ok(warp::reply::json(&holdings))
        }
        Err(e) => {
            error!("Failed to retrieve holdings: {}", e);
            Err(warp::reject::custom(ApiError::from_service(
                e,
                "Server error fetching holdings.",
            )))
        }
    }
}

async fn get_allocation_handler(service: Arc<PortfolioService>) -> Result<impl Reply, Rejection> {
    match service.allocation().await {
        Ok(allocation) => {
            info!("Allocation retrieved successfully.");
            Ok(warp::reply::json(&allocation))
        }
        Err(e) => {
            error!("Failed to retrieve allocation: {}", e);
            Err(warp::reject::custom(ApiError::from_service(
                e,
                "Server error fetching allocation data.",
            )))
        }
    }
}

async fn get_performance_handler(service: Arc<PortfolioService>) -> Result<impl Reply, Rejection> {
    match service.performance().await {
        Ok(performance) => {
            info!("Performance retrieved successfully.");
            Ok(warp::reply::json(&performance))
        }
        Err(e) => {
            error!("Failed to retrieve performance: {}", e);
            Err(warp::reject::custom(ApiError::from_service(
                e,
                "Server error fetching performance data.",
            )))
        }
    }
}

async fn get_summary_handler(service: Arc<PortfolioService>) -> Result<impl Reply, Rejection> {
    match service.summary().await {
        Ok(summary) => {
            info!("Summary retrieved successfully.");
            Ok(warp::reply::json(&summary))
        }
        Err(e) => {
            error!("Failed to retrieve summary: {}", e);
            Err(warp::reject::custom(ApiError::from_service(
                e,
                "Server error fetching summary data.",
            )))
        }
    }
}

async fn list_transactions_handler(service: Arc<PortfolioService>) -> Result<impl Reply, Rejection> {
    match service.transactions().await {
        Ok(transactions) => Ok(warp::reply::json(&transactions)),
        Err(e) => {
            error!("Failed to list transactions: {}", e);
            Err(warp::reject::custom(ApiError::from_service(
                e,
                "Server error fetching transactions.",
            )))
        }
    }
}

async fn create_transaction_handler(
    service: Arc<PortfolioService>,
    body: Value,
) -> Result<impl Reply, Rejection> {
    match service.create_transaction(&body).await {
        Ok(transaction) => {
            info!("Transaction added successfully.");
            Ok(warp::reply::with_status(
                warp::reply::json(&transaction),
                StatusCode::CREATED,
            ))
        }
        Err(e) => {
            error!("Failed to add transaction: {}", e);
            Err(warp::reject::custom(ApiError::from_service(
                e,
                "Server error saving transaction.",
            )))
        }
    }
}

/// Renders every rejection as `{"message": ...}` with a matching status.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(api) = err.find::<ApiError>() {
        (api.status, api.message.clone())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Route not found.".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large.".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected an application/json body.".to_string(),
        )
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required.".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.".to_string())
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "message": message })),
        status,
    ))
}
