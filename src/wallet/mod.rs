use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};

/// Signing capability handed to `Transaction::new`.
pub trait Signer {
    /// Hex of the compressed public key; doubles as the signer's address.
    fn public_key_hex(&self) -> String;

    /// Hex DER ECDSA signature over a 32-byte message hash.
    fn sign(&self, msg32: [u8; 32]) -> String;
}

/// secp256k1 key pair. The address is the hex of the compressed public key.
pub struct Keypair {
    secret: SecretKey,
    public: PublicKey,
}

impl Keypair {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut OsRng);
        Self { secret, public }
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, &'static str> {
        let bytes = hex::decode(secret_hex).map_err(|_| "invalid private key hex")?;
        let secret = SecretKey::from_slice(&bytes).map_err(|_| "invalid private key bytes")?;
        let public = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret);
        Ok(Self { secret, public })
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret.secret_bytes())
    }

    pub fn address(&self) -> String {
        self.public_key_hex()
    }
}

impl Signer for Keypair {
    fn public_key_hex(&self) -> String {
        hex::encode(self.public.serialize())
    }

    fn sign(&self, msg32: [u8; 32]) -> String {
        let secp = Secp256k1::signing_only();
        let msg = Message::from_digest(msg32);
        let der = secp.sign_ecdsa(&msg, &self.secret).serialize_der();
        hex::encode(&der[..])
    }
}

/// Derive address (hex of compressed pubkey) from a given hex pubkey.
/// Returns normalized hex (lowercase) if valid.
pub fn pubkey_to_address_hex(pubkey_hex: &str) -> Result<String, &'static str> {
    let bytes = hex::decode(pubkey_hex).map_err(|_| "invalid pubkey hex")?;
    let pk = PublicKey::from_slice(&bytes).map_err(|_| "invalid pubkey bytes")?;
    Ok(hex::encode(pk.serialize()))
}

/// Verify a signature (hex DER) against the given pubkey (hex, compressed) and message hash (32 bytes).
pub fn verify_signature_hex(
    pubkey_hex: &str,
    sig_hex: &str,
    msg32: [u8; 32],
) -> Result<bool, &'static str> {
    let secp = Secp256k1::verification_only();

    let sig_bytes = hex::decode(sig_hex).map_err(|_| "invalid signature hex")?;
    let sig = Signature::from_der(&sig_bytes).map_err(|_| "invalid DER signature")?;

    let pk_bytes = hex::decode(pubkey_hex).map_err(|_| "invalid pubkey hex")?;
    let pk = PublicKey::from_slice(&pk_bytes).map_err(|_| "invalid pubkey bytes")?;

    let msg = Message::from_digest(msg32);
    Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}
