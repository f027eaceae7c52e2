use actix_web::{HttpResponse, Responder, get, post, web};
use log::{debug, info, warn};
use std::time::Instant;

use super::models::{AppState, MempoolResponse, NewTxRequest, NewTxResponse, SignTxRequest};
use crate::error::ChainError;
use crate::transaction::Transaction;
use crate::wallet::Keypair;

fn build_transaction(body: NewTxRequest) -> Result<Transaction, ChainError> {
    match body {
        NewTxRequest::Prebuilt(tx) => Ok(tx),
        NewTxRequest::Draft {
            sender,
            receiver,
            amount,
            fee,
        } => Transaction::new(sender.trim(), receiver.trim(), amount, fee, None),
    }
}

/// Submit a new transaction into the pending queue (balance checked) and gossip it.
#[post("/transactions/new/")]
pub async fn post_transaction(
    state: web::Data<AppState>,
    body: web::Json<NewTxRequest>,
) -> Result<HttpResponse, ChainError> {
    let t0 = Instant::now();
    let tx = build_transaction(body.into_inner())?;
    if tx.sender.is_empty() || tx.receiver.is_empty() {
        warn!("POST /transactions/new/ - rejected: empty address");
        return Err(ChainError::InvalidInput("sender and receiver are required".into()));
    }
    debug!("POST /transactions/new/ - built id={}", tx.id);

    let id = tx.id.clone();
    let index = state.node.submit_transaction(tx).await?;

    info!(
        "POST /transactions/new/ - id={} OK ({} ms)",
        id,
        t0.elapsed().as_millis()
    );
    Ok(HttpResponse::Created().json(NewTxResponse {
        message: format!("Transaction will be added to Block {index}"),
        index,
        id,
    }))
}

/// Transaction gossiped by a peer: same admission rules, no relay.
#[post("/transactions/peer/")]
pub async fn receive_transaction(
    state: web::Data<AppState>,
    body: web::Json<Transaction>,
) -> Result<HttpResponse, ChainError> {
    let tx = body.into_inner();
    let id = tx.id.clone();
    let index = state.node.receive_transaction(tx)?;
    Ok(HttpResponse::Created().json(NewTxResponse {
        message: format!("Transaction will be added to Block {index}"),
        index,
        id,
    }))
}

/// DEV helper: build and sign a transaction with the given private key.
/// Nothing is queued; post the result to `/transactions/new/`.
#[post("/transactions/sign/")]
pub async fn sign_transaction(body: web::Json<SignTxRequest>) -> Result<HttpResponse, ChainError> {
    let keypair = Keypair::from_secret_hex(body.private_key.trim())
        .map_err(|e| ChainError::InvalidSignature(e.into()))?;
    let tx = Transaction::new(
        keypair.address(),
        body.receiver.trim(),
        body.amount,
        body.fee,
        Some(&keypair),
    )?;
    Ok(HttpResponse::Ok().json(tx))
}

/// List the pending queue (just ids to keep it compact).
#[get("/mempool/")]
pub async fn get_mempool(state: web::Data<AppState>) -> impl Responder {
    let bc = state.node.blockchain();
    let ids = bc.pending().iter().map(|t| t.id.clone()).collect::<Vec<_>>();
    HttpResponse::Ok().json(MempoolResponse {
        size: ids.len(),
        transactions: ids,
    })
}
