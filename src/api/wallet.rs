use actix_web::{HttpResponse, Responder, post};
use serde::Serialize;

use crate::wallet::{Keypair, Signer};

#[derive(Serialize)]
struct NewWalletResponse {
    private_key: String,
    public_key: String,
    address: String,
}

/// DEV helper: fresh secp256k1 key pair. The private key leaves the node in clear.
#[post("/wallet/new/")]
pub async fn create_wallet() -> impl Responder {
    let keypair = Keypair::generate();
    HttpResponse::Ok().json(NewWalletResponse {
        private_key: keypair.secret_hex(),
        public_key: keypair.public_key_hex(),
        address: keypair.address(),
    })
}
