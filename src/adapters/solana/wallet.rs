//! Follower key directory
//!
//! Loads follower keypairs from a JSON file mapping public keys to
//! base58-encoded secret keys and signs unsigned venue transactions
//! with them. Implements [`TransactionSigner`].

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::VersionedTransaction;

use crate::ports::signer::{SignerError, TransactionSigner};

/// In-memory directory of follower keypairs, keyed by public key
pub struct KeyDirectory {
    keys: HashMap<String, Keypair>,
}

impl KeyDirectory {
    /// Load from a JSON file of `{ "<pubkey>": "<base58 secret>" }`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SignerError> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| SignerError::Signing(format!("Failed to read key file: {}", e)))?;

        let raw: HashMap<String, String> = serde_json::from_str(&contents)
            .map_err(|e| SignerError::Signing(format!("Invalid key file format: {}", e)))?;

        let mut keys = HashMap::new();
        for (pubkey, secret) in raw {
            let bytes = bs58::decode(&secret)
                .into_vec()
                .map_err(|e| SignerError::Signing(format!("Invalid secret for {}: {}", pubkey, e)))?;
            let keypair = Keypair::try_from(bytes.as_slice())
                .map_err(|e| SignerError::Signing(format!("Invalid keypair for {}: {}", pubkey, e)))?;

            if keypair.pubkey().to_string() != pubkey {
                return Err(SignerError::Signing(format!(
                    "Secret does not match public key {}",
                    pubkey
                )));
            }
            keys.insert(pubkey, keypair);
        }

        Ok(Self { keys })
    }

    /// Build from already-loaded keypairs (tests)
    pub fn from_keypairs(keypairs: Vec<Keypair>) -> Self {
        let keys = keypairs
            .into_iter()
            .map(|kp| (kp.pubkey().to_string(), kp))
            .collect();
        Self { keys }
    }

    pub fn wallet_count(&self) -> usize {
        self.keys.len()
    }

    /// Public keys of every loaded follower wallet
    pub fn wallets(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }
}

#[async_trait]
impl TransactionSigner for KeyDirectory {
    fn has_key(&self, wallet: &str) -> bool {
        self.keys.contains_key(wallet)
    }

    async fn sign(&self, wallet: &str, unsigned_tx: &[u8]) -> Result<Vec<u8>, SignerError> {
        let keypair = self
            .keys
            .get(wallet)
            .ok_or_else(|| SignerError::UnknownWallet(wallet.to_string()))?;

        let mut tx: VersionedTransaction = bincode::deserialize(unsigned_tx)
            .map_err(|e| SignerError::MalformedTransaction(e.to_string()))?;

        let message_bytes = tx.message.serialize();
        tx.signatures = vec![keypair.sign_message(&message_bytes)];

        bincode::serialize(&tx).map_err(|e| SignerError::Signing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::hash::Hash;
    use solana_sdk::message::{v0, VersionedMessage};

    fn unsigned_transfer_tx(payer: &Keypair) -> Vec<u8> {
        let instruction = solana_sdk::system_instruction::transfer(
            &payer.pubkey(),
            &Keypair::new().pubkey(),
            1,
        );
        let message = v0::Message::try_compile(
            &payer.pubkey(),
            &[instruction],
            &[],
            Hash::default(),
        )
        .unwrap();
        let tx = VersionedTransaction {
            signatures: vec![solana_sdk::signature::Signature::default()],
            message: VersionedMessage::V0(message),
        };
        bincode::serialize(&tx).unwrap()
    }

    #[tokio::test]
    async fn test_sign_replaces_signature() {
        let payer = Keypair::new();
        let wallet = payer.pubkey().to_string();
        let unsigned = unsigned_transfer_tx(&payer);

        let directory = KeyDirectory::from_keypairs(vec![payer]);
        assert!(directory.has_key(&wallet));

        let signed = directory.sign(&wallet, &unsigned).await.unwrap();
        let tx: VersionedTransaction = bincode::deserialize(&signed).unwrap();
        assert_ne!(tx.signatures[0], solana_sdk::signature::Signature::default());
    }

    #[tokio::test]
    async fn test_unknown_wallet() {
        let directory = KeyDirectory::from_keypairs(vec![]);
        let result = directory.sign("unknown", b"payload").await;
        assert!(matches!(result, Err(SignerError::UnknownWallet(_))));
    }
}
