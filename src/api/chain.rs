use actix_web::{HttpResponse, Responder, get, post, web};
use log::{debug, info};

use super::models::{
    AppState, ForgeResponse, MineRequest, MineResponse, PeerBlockResponse, ValidateResponse,
};
use crate::blockchain::Block;
use crate::error::ChainError;

/// Get the full blockchain and its length.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.node.chain_snapshot())
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    let bc = state.node.blockchain();
    HttpResponse::Ok().json(ValidateResponse {
        valid: bc.is_valid(),
        length: bc.len(),
        difficulty: bc.difficulty().leading_zeros(),
    })
}

/// Mine the pending queue with Proof-of-Work:
/// - search a nonce for the current tip off the request thread
/// - re-check every pending tx against the ledger and commit the survivors
/// - credit fees + reward to `miner_address` (node id by default)
/// - gossip the block to peers
#[post("/mine/")]
pub async fn mine_block(
    state: web::Data<AppState>,
    req: Option<web::Json<MineRequest>>,
) -> Result<HttpResponse, ChainError> {
    let miner = req
        .and_then(|r| r.into_inner().miner_address)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| state.node.id().to_string());

    let block = state.node.mine(&miner).await?;
    Ok(HttpResponse::Ok().json(MineResponse {
        message: format!("New block #{} forged by {}", block.index, miner),
        block,
    }))
}

/// Produce a Proof-of-Stake block with a stake-weighted validator.
#[post("/forge/")]
pub async fn forge_block(state: web::Data<AppState>) -> Result<HttpResponse, ChainError> {
    let (block, rewards) = state.node.forge().await?;
    info!("FORGE - block #{} by {}", block.index, rewards.validator);
    Ok(HttpResponse::Ok().json(ForgeResponse {
        message: format!("New block #{} forged by {}", block.index, rewards.validator),
        block,
        rewards,
    }))
}

/// Block pushed by a peer: appended when it extends our tip, ignored otherwise.
#[post("/blocks/new/")]
pub async fn receive_block(state: web::Data<AppState>, body: web::Json<Block>) -> impl Responder {
    let block = body.into_inner();
    debug!("POST /blocks/new/ - block #{} ({})", block.index, block.hash);
    let accepted = state.node.receive_block(block);
    HttpResponse::Ok().json(PeerBlockResponse { accepted })
}
