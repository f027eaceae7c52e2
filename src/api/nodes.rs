use actix_web::{HttpResponse, get, post, web};
use log::info;

use super::models::{AppState, RegisterNodesRequest, RegisterNodesResponse, ResolveResponse};
use crate::error::ChainError;
use crate::node::Resolution;

/// Add peers (`host:port`, scheme optional). Registering twice is a no-op.
#[post("/nodes/register/")]
pub async fn register_nodes(
    state: web::Data<AppState>,
    body: web::Json<RegisterNodesRequest>,
) -> Result<HttpResponse, ChainError> {
    let body = body.into_inner();
    if body.nodes.is_empty() {
        return Err(ChainError::InvalidInput("supply a non-empty list of nodes".into()));
    }
    let mut nodes = state.node.peers();
    for address in &body.nodes {
        nodes = state.node.register_peer(address);
    }
    info!("POST /nodes/register/ - {} peers known", nodes.len());
    Ok(HttpResponse::Created().json(RegisterNodesResponse {
        message: "New nodes have been added".into(),
        nodes,
    }))
}

/// Run longest-valid-chain resolution against every peer.
#[get("/nodes/resolve/")]
pub async fn resolve_nodes(state: web::Data<AppState>) -> HttpResponse {
    let resolution = state.node.resolve_conflicts().await;
    let message = match resolution {
        Resolution::Replaced => "Chain replaced",
        Resolution::Authoritative => "Chain is authoritative",
    };
    HttpResponse::Ok().json(ResolveResponse {
        message: message.into(),
        resolution,
        length: state.node.blockchain().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::init_routes;
    use crate::api::test_support::app_state;
    use actix_web::{App, test};
    use serde_json::json;

    #[actix_web::test]
    async fn register_is_idempotent() {
        let app = test::init_service(App::new().app_data(app_state()).configure(init_routes)).await;
        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/api/v1/nodes/register/")
                .set_json(json!({ "nodes": ["http://127.0.0.1:5001", "127.0.0.1:5001/"] }))
                .to_request();
            let body: RegisterNodesResponse = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body.nodes, vec!["127.0.0.1:5001".to_string()]);
        }
    }

    #[actix_web::test]
    async fn empty_node_list_is_bad_request() {
        let app = test::init_service(App::new().app_data(app_state()).configure(init_routes)).await;
        let req = test::TestRequest::post()
            .uri("/api/v1/nodes/register/")
            .set_json(json!({ "nodes": [] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid input: supply a non-empty list of nodes");
    }

    #[actix_web::test]
    async fn unreachable_peers_leave_chain_authoritative() {
        let state = app_state();
        state.node.register_peer("offline:9");
        let app = test::init_service(App::new().app_data(state).configure(init_routes)).await;
        let req = test::TestRequest::get().uri("/api/v1/nodes/resolve/").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["message"], "Chain is authoritative");
        assert_eq!(body["resolution"], "authoritative");
        assert_eq!(body["length"], 1);
    }
}
