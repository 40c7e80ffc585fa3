use anyhow::anyhow;
use ed25519_dalek::{Signature as Ed25519Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use laminar_types::{Commit, Header, Signature};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Ed25519 key the aggregator signs block headers with.
#[derive(Clone)]
pub struct ProposerKey {
    signing_key: SigningKey,
}

impl ProposerKey {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Proposer address: first 20 bytes of the SHA-256 of the public key.
    pub fn address(&self) -> Vec<u8> {
        proposer_address(&self.verifying_key())
    }

    /// Hex rendering of the public key, as carried in node configs.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key().as_bytes())
    }

    pub fn sign_header(&self, header: &Header) -> Signature {
        self.signing_key.sign(&header.hash()).to_bytes().to_vec()
    }
}

/// Address derived from a proposer public key: first 20 bytes of its
/// SHA-256.
pub fn proposer_address(key: &VerifyingKey) -> Vec<u8> {
    Sha256::digest(key.as_bytes())[..20].to_vec()
}

/// Parses a hex-encoded 32-byte ed25519 proposer public key.
pub fn parse_proposer_pubkey(hex_key: &str) -> anyhow::Result<VerifyingKey> {
    let bytes = hex::decode(hex_key)?;
    let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        anyhow!(
            "proposer public key must be 32 bytes of hex, got {}",
            bytes.len()
        )
    })?;
    VerifyingKey::from_bytes(&arr).map_err(|e| anyhow!("invalid proposer public key: {e}"))
}

/// Checks every signature in the commit against the proposer key over the
/// header hash.
pub fn verify_commit(
    commit: &Commit,
    header: &Header,
    proposer: &VerifyingKey,
) -> anyhow::Result<()> {
    let message = header.hash();
    for raw in &commit.signatures {
        let bytes: &[u8; 64] = raw
            .as_slice()
            .try_into()
            .map_err(|_| anyhow!("malformed signature: expected 64 bytes, got {}", raw.len()))?;
        let signature = Ed25519Signature::from_bytes(bytes);
        proposer
            .verify(&message, &signature)
            .map_err(|e| anyhow!("invalid commit signature at height {}: {e}", commit.height))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use laminar_types::test_utils::random_block;

    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let key = ProposerKey::generate();
        let block = random_block(5, 2);
        let commit = Commit {
            height: 5,
            header_hash: block.header.hash(),
            signatures: vec![key.sign_header(&block.header)],
        };

        verify_commit(&commit, &block.header, &key.verifying_key()).unwrap();
    }

    #[test]
    fn tampered_header_fails_verification() {
        let key = ProposerKey::generate();
        let block = random_block(5, 2);
        let commit = Commit {
            height: 5,
            header_hash: block.header.hash(),
            signatures: vec![key.sign_header(&block.header)],
        };

        let mut tampered = block.header.clone();
        tampered.app_hash[0] ^= 1;
        assert!(verify_commit(&commit, &tampered, &key.verifying_key()).is_err());
    }

    #[test]
    fn foreign_key_fails_verification() {
        let key = ProposerKey::generate();
        let other = ProposerKey::generate();
        let block = random_block(1, 0);
        let commit = Commit {
            height: 1,
            header_hash: block.header.hash(),
            signatures: vec![key.sign_header(&block.header)],
        };

        assert!(verify_commit(&commit, &block.header, &other.verifying_key()).is_err());
    }

    #[test]
    fn address_is_20_bytes() {
        assert_eq!(ProposerKey::generate().address().len(), 20);
    }

    #[test]
    fn public_key_hex_round_trip() {
        let key = ProposerKey::generate();
        let parsed = parse_proposer_pubkey(&key.public_key_hex()).unwrap();
        assert_eq!(parsed, key.verifying_key());
        assert_eq!(proposer_address(&parsed), key.address());
    }

    #[test]
    fn rejects_malformed_pubkeys() {
        assert!(parse_proposer_pubkey("00ff").is_err());
        assert!(parse_proposer_pubkey("not hex").is_err());
    }
}
