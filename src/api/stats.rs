use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, StatsResponse};

#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    let node = &state.node;
    let peers = node.peers().len();
    let resolving = node.is_resolving();

    let bc = node.blockchain();
    HttpResponse::Ok().json(StatsResponse {
        node_id: node.id().to_string(),
        height: bc.len(),
        difficulty: bc.difficulty().leading_zeros(),
        pending: bc.pending().len(),
        peers,
        accounts: bc.ledger().len(),
        validators: bc.stakes().len(),
        total_stake: bc.stakes().total_stake(),
        resolving,
    })
}
