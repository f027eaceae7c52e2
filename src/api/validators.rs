use actix_web::{HttpResponse, Responder, get, post, web};

use super::models::{
    AppState, DelegateRequest, RegisterValidatorRequest, RegisterValidatorResponse,
    ValidatorEntry, ValidatorsResponse,
};
use crate::error::ChainError;
use crate::transaction::checked_amount;

/// Lock part of an address' balance as validator stake.
/// `success` is false when the balance cannot cover it.
#[post("/validators/")]
pub async fn register_validator(
    state: web::Data<AppState>,
    body: web::Json<RegisterValidatorRequest>,
) -> Result<HttpResponse, ChainError> {
    let stake = checked_amount("stake", body.stake)?;
    let address = body.address.trim();
    let success = state.node.register_validator(address, stake);

    let bc = state.node.blockchain();
    Ok(HttpResponse::Ok().json(RegisterValidatorResponse {
        success,
        stake: bc.stakes().stake_of(address),
        balance: bc.balance_of(address),
    }))
}

#[post("/validators/delegate/")]
pub async fn delegate(
    state: web::Data<AppState>,
    body: web::Json<DelegateRequest>,
) -> Result<HttpResponse, ChainError> {
    let amount = checked_amount("amount", body.amount)?;
    state
        .node
        .delegate_stake(body.delegator.trim(), body.validator.trim(), amount)?;

    let bc = state.node.blockchain();
    Ok(HttpResponse::Ok().json(RegisterValidatorResponse {
        success: true,
        stake: bc.stakes().stake_of(body.validator.trim()),
        balance: bc.balance_of(body.delegator.trim()),
    }))
}

#[get("/validators/")]
pub async fn list_validators(state: web::Data<AppState>) -> impl Responder {
    let bc = state.node.blockchain();
    let stakes = bc.stakes();
    let validators = stakes
        .iter()
        .map(|(address, stake)| ValidatorEntry {
            address: address.clone(),
            stake: *stake,
            delegators: stakes
                .delegators_of(address)
                .map(|d| d.iter().map(|(k, v)| (k.clone(), *v)).collect())
                .unwrap_or_default(),
        })
        .collect();
    HttpResponse::Ok().json(ValidatorsResponse {
        total_stake: stakes.total_stake(),
        validators,
    })
}
