use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, BalanceResponse};

/// Spendable balance; unseen addresses report the configured initial balance.
#[get("/balance/{address}/")]
pub async fn get_balance(state: web::Data<AppState>, path: web::Path<(String,)>) -> impl Responder {
    let address = path.into_inner().0;
    let balance = state.node.balance_of(&address);
    HttpResponse::Ok().json(BalanceResponse { address, balance })
}
