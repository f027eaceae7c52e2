mod balance;
mod chain;
mod error;
mod health;
pub mod models;
mod nodes;
mod stats;
mod tx;
mod validators;
mod wallet;

use actix_web::web::{self, ServiceConfig};

pub use models::AppState;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_chain)
            .service(chain::validate_chain)
            .service(chain::mine_block)
            .service(chain::forge_block)
            .service(chain::receive_block)
            .service(tx::post_transaction)
            .service(tx::receive_transaction)
            .service(tx::sign_transaction)
            .service(tx::get_mempool)
            .service(balance::get_balance)
            .service(nodes::register_nodes)
            .service(nodes::resolve_nodes)
            .service(validators::register_validator)
            .service(validators::delegate)
            .service(validators::list_validators)
            .service(stats::get_stats)
            .service(wallet::create_wallet),
    );
}
