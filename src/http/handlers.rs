use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::domain::{Account, AccountId, Error, NewAccount, Payment};

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Error> {
    body.map(|Json(value)| value)
        .map_err(|e| Error::InvalidInput(format!("Cannot parse JSON: {}", e.body_text())))
}

pub async fn create_account(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewAccount>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>), Error> {
    let account = state.accounts.create(parse_body(body)?).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Account>>, Error> {
    Ok(Json(state.accounts.list().await?))
}

pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Account>, Error> {
    let id: AccountId = id.parse()?;
    Ok(Json(state.accounts.get(&id).await?))
}

pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, Error> {
    let id: AccountId = id.parse()?;
    state.accounts.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_all_accounts(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, Error> {
    let deleted = state.accounts.delete_all().await?;
    Ok(Json(json!({ "deleted_count": deleted })))
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    #[serde(rename = "SenderID")]
    sender_id: String,
    #[serde(rename = "ReceiverID")]
    receiver_id: String,
    #[serde(rename = "Amount")]
    amount: Decimal,
}

impl TryFrom<PaymentRequest> for Payment {
    type Error = Error;

    fn try_from(req: PaymentRequest) -> Result<Self, Self::Error> {
        let sender_id = req
            .sender_id
            .parse()
            .map_err(|_| Error::InvalidInput("Invalid SenderID format".to_string()))?;
        let receiver_id = req
            .receiver_id
            .parse()
            .map_err(|_| Error::InvalidInput("Invalid ReceiverID format".to_string()))?;

        Ok(Payment::new(sender_id, receiver_id, req.amount))
    }
}

pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<&'static str, Error> {
    let payment = Payment::try_from(parse_body(body)?)?;
    state.transfers.transfer(&payment).await?;
    Ok("Payment processed successfully")
}
