use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::info;
use std::sync::Arc;

use ledger_chain::api::{self, AppState};
use ledger_chain::config::Config;
use ledger_chain::node::{HttpPeerClient, Node};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let cfg = Config::from_env();
    let client = HttpPeerClient::new(cfg.peer_timeout).map_err(std::io::Error::other)?;

    let node = Arc::new(Node::new(cfg.node_id.clone(), cfg.chain.clone(), Arc::new(client)));
    for peer in &cfg.peers {
        node.register_peer(peer);
    }

    info!(
        "⛓️ Starting node {} at http://{}:{} (difficulty {}, {} peers)",
        node.id(),
        cfg.host,
        cfg.port,
        cfg.chain.difficulty.leading_zeros(),
        node.peers().len()
    );

    let state = web::Data::new(AppState::new(node));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((cfg.host.as_str(), cfg.port))?
    .run()
    .await
}
