use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ChainError, Result};
use crate::hashing::{canonical_bytes, digest, sha256};
use crate::wallet::{Signer, pubkey_to_address_hex, verify_signature_hex};

/// Balances, amounts, fees and stakes are whole units.
pub type Amount = u64;

/// A signed (or, in permissive mode, unsigned) value transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Digest of the signing payload, computed once at creation.
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub amount: Amount,
    pub fee: Amount,
    /// Random seed so two otherwise identical transfers get distinct ids.
    pub seed: String,
    /// Creation time in milliseconds (UTC).
    pub timestamp: i64,
    /// Hex compressed secp256k1 key of the sender, present when signed.
    #[serde(default)]
    pub public_key: Option<String>,
    /// Hex DER ECDSA signature over `sighash()`.
    #[serde(default)]
    pub signature: Option<String>,
}

/// Fields covered by both the id and the signature.
#[derive(Serialize)]
struct SigningPayload<'a> {
    sender: &'a str,
    receiver: &'a str,
    amount: Amount,
    fee: Amount,
    seed: &'a str,
    timestamp: i64,
}

impl Transaction {
    /// Build a transfer, rejecting negative values, and sign it when a signer is given.
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: i64,
        fee: i64,
        signer: Option<&dyn Signer>,
    ) -> Result<Self> {
        let amount = checked_amount("amount", amount)?;
        let fee = checked_amount("fee", fee)?;

        let mut tx = Self {
            id: String::new(),
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            fee,
            seed: Uuid::new_v4().simple().to_string(),
            timestamp: Utc::now().timestamp_millis(),
            public_key: None,
            signature: None,
        };
        tx.id = tx.compute_id();

        if let Some(signer) = signer {
            tx.public_key = Some(signer.public_key_hex());
            tx.signature = Some(signer.sign(tx.sighash()));
        }
        Ok(tx)
    }

    fn payload(&self) -> SigningPayload<'_> {
        SigningPayload {
            sender: &self.sender,
            receiver: &self.receiver,
            amount: self.amount,
            fee: self.fee,
            seed: &self.seed,
            timestamp: self.timestamp,
        }
    }

    /// Canonical signing payload; excludes id, key and signature.
    pub fn signing_payload(&self) -> Vec<u8> {
        canonical_bytes(&self.payload())
    }

    /// SHA-256 of the signing payload.
    pub fn sighash(&self) -> [u8; 32] {
        sha256(&self.signing_payload())
    }

    pub fn compute_id(&self) -> String {
        digest(&self.payload())
    }

    /// Amount plus fee, i.e. what the sender is debited.
    pub fn total_debit(&self) -> Amount {
        self.amount.saturating_add(self.fee)
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Check the id and, when present, the signature and key ownership.
    ///
    /// Unsigned transactions pass; whether they are acceptable at all is
    /// the chain's signature policy.
    pub fn verify(&self) -> Result<()> {
        if self.id != self.compute_id() {
            return Err(ChainError::InvalidSignature(
                "transaction id does not match its content".into(),
            ));
        }

        let Some(signature) = &self.signature else {
            return Ok(());
        };
        let public_key = self
            .public_key
            .as_deref()
            .ok_or_else(|| ChainError::InvalidSignature("signature without public key".into()))?;

        let address =
            pubkey_to_address_hex(public_key).map_err(|e| ChainError::InvalidSignature(e.into()))?;
        if address != self.sender {
            return Err(ChainError::InvalidSignature(
                "public key does not own the sender address".into(),
            ));
        }

        let ok = verify_signature_hex(public_key, signature, self.sighash())
            .map_err(|e| ChainError::InvalidSignature(e.into()))?;
        if !ok {
            return Err(ChainError::InvalidSignature("signature check failed".into()));
        }
        Ok(())
    }
}

/// Convert a signed input value, rejecting negatives with `InvalidAmount`.
pub fn checked_amount(field: &str, value: i64) -> Result<Amount> {
    Amount::try_from(value)
        .map_err(|_| ChainError::InvalidAmount(format!("{field} must be non-negative, got {value}")))
}
