use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy::{
    hex,
    primitives::{Address, Bytes},
    signers::local::PrivateKeySigner,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ProtocolError,
    signer::TransactionSigner,
    transaction::{SignedTransaction, Transaction},
};

const KEYS_DIRECTORY: &str = ".config/spotter";
const KEYS_FILENAME: &str = "keys.json";

/// The worker's on-chain identity. Created once and never mutated.
#[derive(Debug, Clone)]
pub struct Identity {
    address: Address,
    signer: PrivateKeySigner,
}

impl Identity {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self {
            address: alloy::signers::Signer::address(&signer),
            signer,
        }
    }

    pub fn random() -> Self {
        Self::new(PrivateKeySigner::random())
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn private_key(&self) -> Bytes {
        Bytes::copy_from_slice(self.signer.to_bytes().as_slice())
    }
}

impl FromStr for Identity {
    type Err = ProtocolError;

    fn from_str(private_key: &str) -> Result<Self, Self::Err> {
        PrivateKeySigner::from_str(private_key.trim())
            .map(Self::new)
            .map_err(|e| ProtocolError::Config {
                message: format!("Invalid private key: {e}"),
            })
    }
}

impl TransactionSigner for Identity {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<SignedTransaction, ProtocolError> {
        self.signer.sign_transaction(transaction)
    }
}

/// On-disk format of the persisted identity
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeysFile {
    address: String,
    private_key: String,
}

/// Loads the worker identity from disk, generating and persisting one on first run
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HOME/.config/spotter/keys.json`
    pub fn default_path() -> Result<PathBuf, ProtocolError> {
        dirs::home_dir()
            .map(|home| home.join(KEYS_DIRECTORY).join(KEYS_FILENAME))
            .ok_or_else(|| ProtocolError::storage(KEYS_DIRECTORY, "home directory is unknown"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_or_create(&self) -> Result<Identity, ProtocolError> {
        if self.path.exists() {
            let identity = self.load()?;
            tracing::debug!(address = %identity.address(), "Loaded worker key from file");
            return Ok(identity);
        }

        let identity = Identity::random();
        self.persist(&identity)?;
        tracing::info!(
            address = %identity.address(),
            path = %self.path.display(),
            "Generated and saved new worker key"
        );
        Ok(identity)
    }

    fn load(&self) -> Result<Identity, ProtocolError> {
        let contents =
            fs::read_to_string(&self.path).map_err(|e| ProtocolError::storage(&self.path, e))?;
        let keys: KeysFile =
            serde_json::from_str(&contents).map_err(|e| ProtocolError::storage(&self.path, e))?;

        let identity = Identity::from_str(&keys.private_key)
            .map_err(|e| ProtocolError::storage(&self.path, e))?;

        let stored_address = Address::from_str(&keys.address)
            .map_err(|e| ProtocolError::storage(&self.path, format!("invalid address: {e}")))?;
        if stored_address != identity.address() {
            return Err(ProtocolError::storage(
                &self.path,
                format!(
                    "stored address {stored_address} does not match key address {}",
                    identity.address()
                ),
            ));
        }

        Ok(identity)
    }

    fn persist(&self, identity: &Identity) -> Result<(), ProtocolError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ProtocolError::storage(parent, e))?;
        }

        let keys = KeysFile {
            address: identity.address().to_checksum(None),
            private_key: hex::encode_prefixed(identity.private_key()),
        };
        let contents =
            serde_json::to_string_pretty(&keys).map_err(|e| ProtocolError::storage(&self.path, e))?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        // owner-only from the moment the file exists
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(&self.path)
            .map_err(|e| ProtocolError::storage(&self.path, e))?;
        file.write_all(contents.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| ProtocolError::storage(&self.path, e))
    }
}

/// Accepts 40 hex characters with an optional `0x` prefix. Mixed-case input must carry a
/// valid EIP-55 checksum; single-case input is accepted as is.
pub fn validate_address(address: &str) -> bool {
    let digits = address.strip_prefix("0x").unwrap_or(address);
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Address::parse_checksummed(format!("0x{digits}"), None).is_ok();
    }

    true
}
