use anyhow::{Context, Result, anyhow, bail};
use blake2::{Blake2b, Digest, digest::consts::U32};
use ed25519_dalek::{
    Signature as DalekSignature, Signer as _, SigningKey, Verifier as _, VerifyingKey,
};
use k256::ecdsa::{
    Signature as Secp256k1Signature, SigningKey as Secp256k1SigningKey,
    VerifyingKey as Secp256k1VerifyingKey,
};
use std::{env, fmt, str::FromStr};

use crate::{
    basic_elements::args::{Args, Serializable},
    constants::{
        ACCOUNT_HASH_PREFIX, ENTITY_ACCOUNT_PREFIX, ENTITY_CONTRACT_PREFIX, ENTITY_SYSTEM_PREFIX,
        LEGACY_CONTRACT_PREFIX, PACKAGE_PREFIX,
    },
    crypto::{
        base16::{Base16Serializer, decode_hash},
        traits::serializer::Serializer,
    },
};

pub const ED25519_PUBLIC_KEY_LENGTH: usize = 32;
pub const SECP256K1_PUBLIC_KEY_LENGTH: usize = 33;
pub const SECRET_KEY_LENGTH: usize = 32;

// Key tags in the `bytesrepr` encoding of `Key`.
const KEY_TAG_ACCOUNT: u8 = 0;
const KEY_TAG_HASH: u8 = 1;
const KEY_TAG_PACKAGE: u8 = 16;
const KEY_TAG_ADDRESSABLE_ENTITY: u8 = 17;

const ENTITY_TAG_SYSTEM: u8 = 0;
const ENTITY_TAG_ACCOUNT: u8 = 1;
const ENTITY_TAG_SMART_CONTRACT: u8 = 2;

// --- Hashing ---
pub trait Hasher: Send + Sync {
    fn hash(&self, data: &[u8]) -> [u8; 32];
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Blake2bHasher;

impl Hasher for Blake2bHasher {
    fn hash(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(data);
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        digest
    }
}

/// 32-byte blake2b digest, the hash used for account hashes, dictionary keys and deploys.
pub fn blake2b256(data: &[u8]) -> [u8; 32] {
    Blake2bHasher.hash(data)
}

// --- Algorithms ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Algorithm {
    Ed25519 = 1,
    Secp256k1 = 2,
}

impl Algorithm {
    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(Algorithm::Ed25519),
            2 => Ok(Algorithm::Secp256k1),
            _ => bail!("Unsupported key algorithm tag: {}", tag),
        }
    }

    pub fn tag(&self) -> u8 {
        *self as u8
    }

    /// Lowercase name mixed into the account-hash preimage.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Ed25519 => "ed25519",
            Algorithm::Secp256k1 => "secp256k1",
        }
    }

    fn public_key_length(&self) -> usize {
        match self {
            Algorithm::Ed25519 => ED25519_PUBLIC_KEY_LENGTH,
            Algorithm::Secp256k1 => SECP256K1_PUBLIC_KEY_LENGTH,
        }
    }

    fn signer(&self) -> &'static dyn Signer {
        match self {
            Algorithm::Ed25519 => &Ed25519Signer,
            Algorithm::Secp256k1 => &Secp256k1Signer,
        }
    }
}

pub trait Signer: Send + Sync {
    fn get_public_key(&self, secret_key_bytes: &[u8]) -> Result<Vec<u8>>;
    fn sign(&self, secret_key_bytes: &[u8], message: &[u8]) -> Result<Vec<u8>>;
    fn verify(&self, public_key_bytes: &[u8], message: &[u8], signature_bytes: &[u8])
    -> Result<bool>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Signer;

impl Ed25519Signer {
    fn signing_key(secret_key_bytes: &[u8]) -> Result<SigningKey> {
        let secret: &[u8; SECRET_KEY_LENGTH] = secret_key_bytes
            .try_into()
            .context("Invalid secret key length for Ed25519")?;
        Ok(SigningKey::from_bytes(secret))
    }
}

impl Signer for Ed25519Signer {
    fn get_public_key(&self, secret_key_bytes: &[u8]) -> Result<Vec<u8>> {
        let signing_key = Self::signing_key(secret_key_bytes)?;
        Ok(signing_key.verifying_key().to_bytes().to_vec())
    }

    fn sign(&self, secret_key_bytes: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        let signing_key = Self::signing_key(secret_key_bytes)?;
        Ok(signing_key.sign(message).to_bytes().to_vec())
    }

    fn verify(
        &self,
        public_key_bytes: &[u8],
        message: &[u8],
        signature_bytes: &[u8],
    ) -> Result<bool> {
        let verifying_key = VerifyingKey::from_bytes(
            public_key_bytes
                .try_into()
                .context("Invalid public key length for Ed25519")?,
        )?;
        let signature = DalekSignature::from_slice(signature_bytes)
            .context("Invalid signature length for Ed25519")?;
        Ok(verifying_key.verify(message, &signature).is_ok())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Signer;

impl Signer for Secp256k1Signer {
    fn get_public_key(&self, secret_key_bytes: &[u8]) -> Result<Vec<u8>> {
        let signing_key = Secp256k1SigningKey::from_slice(secret_key_bytes)
            .context("Invalid secret key for Secp256k1")?;
        Ok(signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec())
    }

    fn sign(&self, secret_key_bytes: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        use k256::ecdsa::signature::Signer as _;

        let signing_key = Secp256k1SigningKey::from_slice(secret_key_bytes)
            .context("Invalid secret key for Secp256k1")?;
        let signature: Secp256k1Signature = signing_key.sign(message);
        Ok(signature.to_bytes().to_vec())
    }

    fn verify(
        &self,
        public_key_bytes: &[u8],
        message: &[u8],
        signature_bytes: &[u8],
    ) -> Result<bool> {
        use k256::ecdsa::signature::Verifier as _;

        let verifying_key = Secp256k1VerifyingKey::from_sec1_bytes(public_key_bytes)
            .context("Invalid public key for Secp256k1")?;
        let signature = Secp256k1Signature::from_slice(signature_bytes)
            .context("Invalid signature for Secp256k1")?;
        Ok(verifying_key.verify(message, &signature).is_ok())
    }
}

// --- Account hash ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountHash([u8; 32]);

impl AccountHash {
    pub fn new(value: [u8; 32]) -> Self {
        Self(value)
    }

    pub fn value(&self) -> [u8; 32] {
        self.0
    }

    /// `blake2b256(algorithm name || 0x00 || raw public key)`.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let name = public_key.algorithm.name().as_bytes();
        let mut preimage = Vec::with_capacity(name.len() + 1 + public_key.raw.len());
        preimage.extend_from_slice(name);
        preimage.push(0);
        preimage.extend_from_slice(&public_key.raw);
        Self(blake2b256(&preimage))
    }
}

impl fmt::Display for AccountHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ACCOUNT_HASH_PREFIX, hex::encode(self.0))
    }
}

// --- Keys ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityAddr {
    System([u8; 32]),
    Account([u8; 32]),
    SmartContract([u8; 32]),
}

impl EntityAddr {
    fn tag(&self) -> u8 {
        match self {
            EntityAddr::System(_) => ENTITY_TAG_SYSTEM,
            EntityAddr::Account(_) => ENTITY_TAG_ACCOUNT,
            EntityAddr::SmartContract(_) => ENTITY_TAG_SMART_CONTRACT,
        }
    }

    pub fn value(&self) -> [u8; 32] {
        match self {
            EntityAddr::System(value)
            | EntityAddr::Account(value)
            | EntityAddr::SmartContract(value) => *value,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            EntityAddr::System(_) => ENTITY_SYSTEM_PREFIX,
            EntityAddr::Account(_) => ENTITY_ACCOUNT_PREFIX,
            EntityAddr::SmartContract(_) => ENTITY_CONTRACT_PREFIX,
        }
    }
}

/// Subset of the global-state `Key` that token parties and contracts can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Account(AccountHash),
    Hash([u8; 32]),
    Package([u8; 32]),
    AddressableEntity(EntityAddr),
}

impl Key {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(34);
        match self {
            Key::Account(account_hash) => {
                bytes.push(KEY_TAG_ACCOUNT);
                bytes.extend_from_slice(&account_hash.value());
            }
            Key::Hash(hash) => {
                bytes.push(KEY_TAG_HASH);
                bytes.extend_from_slice(hash);
            }
            Key::Package(hash) => {
                bytes.push(KEY_TAG_PACKAGE);
                bytes.extend_from_slice(hash);
            }
            Key::AddressableEntity(entity_addr) => {
                bytes.push(KEY_TAG_ADDRESSABLE_ENTITY);
                bytes.push(entity_addr.tag());
                bytes.extend_from_slice(&entity_addr.value());
            }
        }
        bytes
    }

    /// Parses the node's formatted-string form (`account-hash-…`, `hash-…`,
    /// `package-…`, `entity-account-…`, `entity-contract-…`, `entity-system-…`).
    pub fn from_formatted_str(s: &str) -> Result<Self> {
        let parsers: [(&str, fn([u8; 32]) -> Key); 6] = [
            (ACCOUNT_HASH_PREFIX, |h| Key::Account(AccountHash(h))),
            (ENTITY_ACCOUNT_PREFIX, |h| {
                Key::AddressableEntity(EntityAddr::Account(h))
            }),
            (ENTITY_CONTRACT_PREFIX, |h| {
                Key::AddressableEntity(EntityAddr::SmartContract(h))
            }),
            (ENTITY_SYSTEM_PREFIX, |h| {
                Key::AddressableEntity(EntityAddr::System(h))
            }),
            (PACKAGE_PREFIX, Key::Package),
            (LEGACY_CONTRACT_PREFIX, Key::Hash),
        ];

        for (prefix, build) in parsers {
            if let Some(hex_part) = s.strip_prefix(prefix) {
                return Ok(build(decode_hash(hex_part)?));
            }
        }
        bail!("Unsupported key format: {}", s)
    }

    pub fn to_formatted_string(&self) -> String {
        match self {
            Key::Account(account_hash) => account_hash.to_string(),
            Key::Hash(hash) => format!("{}{}", LEGACY_CONTRACT_PREFIX, hex::encode(hash)),
            Key::Package(hash) => format!("{}{}", PACKAGE_PREFIX, hex::encode(hash)),
            Key::AddressableEntity(entity_addr) => {
                format!("{}{}", entity_addr.prefix(), hex::encode(entity_addr.value()))
            }
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_formatted_string())
    }
}

impl FromStr for Key {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_formatted_str(s)
    }
}

impl Serializable for Key {
    fn serialize(&self) -> Vec<u8> {
        self.to_bytes()
    }

    fn deserialize(data: &[u8], offset: usize) -> Result<(Self, usize)> {
        let mut reader = Args::from_bytes(data.get(offset..).unwrap_or_default().to_vec());
        let key = match reader.next_u8().context("Failed to read key tag")? {
            KEY_TAG_ACCOUNT => Key::Account(AccountHash(reader.next_fixed::<32>()?)),
            KEY_TAG_HASH => Key::Hash(reader.next_fixed::<32>()?),
            KEY_TAG_PACKAGE => Key::Package(reader.next_fixed::<32>()?),
            KEY_TAG_ADDRESSABLE_ENTITY => {
                let entity_tag = reader.next_u8().context("Failed to read entity tag")?;
                let value = reader.next_fixed::<32>()?;
                Key::AddressableEntity(match entity_tag {
                    ENTITY_TAG_SYSTEM => EntityAddr::System(value),
                    ENTITY_TAG_ACCOUNT => EntityAddr::Account(value),
                    ENTITY_TAG_SMART_CONTRACT => EntityAddr::SmartContract(value),
                    other => bail!("Unsupported entity address tag: {}", other),
                })
            }
            other => bail!("Unsupported key tag: {}", other),
        };
        Ok((key, offset + reader.get_offset()))
    }
}

// --- Signature ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    algorithm: Algorithm,
    raw: Vec<u8>,
}

impl Signature {
    /// Tag-prefixed bytes, as carried in deploy approvals.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.raw.len());
        bytes.push(self.algorithm.tag());
        bytes.extend_from_slice(&self.raw);
        bytes
    }

    pub fn to_hex(&self) -> String {
        Base16Serializer.serialize(&self.to_bytes())
    }
}

// --- PublicKey ---
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    algorithm: Algorithm,
    raw: Vec<u8>,
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl PublicKey {
    pub fn new(algorithm: Algorithm, raw: Vec<u8>) -> Result<Self> {
        if raw.len() != algorithm.public_key_length() {
            bail!(
                "Invalid {} public key length: expected {}, got {}",
                algorithm.name(),
                algorithm.public_key_length(),
                raw.len()
            );
        }
        Ok(Self { algorithm, raw })
    }

    /// Parses tag-prefixed bytes (`0x01` Ed25519, `0x02` Secp256k1).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (tag, raw) = bytes
            .split_first()
            .ok_or_else(|| anyhow!("Cannot read a public key from empty bytes"))?;
        Self::new(Algorithm::from_tag(*tag)?, raw.to_vec())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = Base16Serializer
            .deserialize(s)
            .context("Failed to deserialize public key hex")?;
        Self::from_bytes(&bytes)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.raw.len());
        bytes.push(self.algorithm.tag());
        bytes.extend_from_slice(&self.raw);
        bytes
    }

    pub fn to_hex(&self) -> String {
        Base16Serializer.serialize(&self.to_bytes())
    }

    pub fn account_hash(&self) -> AccountHash {
        AccountHash::from_public_key(self)
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<bool> {
        if signature.algorithm != self.algorithm {
            bail!(
                "Public key algorithm {:?} does not match signature algorithm {:?}",
                self.algorithm,
                signature.algorithm
            );
        }
        self.algorithm
            .signer()
            .verify(&self.raw, message, &signature.raw)
    }
}

impl FromStr for PublicKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serializable for PublicKey {
    fn serialize(&self) -> Vec<u8> {
        self.to_bytes()
    }

    fn deserialize(data: &[u8], offset: usize) -> Result<(Self, usize)> {
        let tag = *data
            .get(offset)
            .ok_or_else(|| anyhow!("Missing public key tag at offset {}", offset))?;
        let algorithm = Algorithm::from_tag(tag)?;
        let end = offset + 1 + algorithm.public_key_length();
        let raw = data
            .get(offset + 1..end)
            .ok_or_else(|| anyhow!("Not enough bytes for a {} public key", algorithm.name()))?;
        Ok((Self::new(algorithm, raw.to_vec())?, end))
    }
}

// --- SecretKey ---
#[derive(Clone)]
pub struct SecretKey {
    algorithm: Algorithm,
    raw: [u8; SECRET_KEY_LENGTH],
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SecretKey {
    pub fn new(algorithm: Algorithm, raw: [u8; SECRET_KEY_LENGTH]) -> Result<Self> {
        // Rejects scalars that are not valid for the curve.
        algorithm.signer().get_public_key(&raw)?;
        Ok(Self { algorithm, raw })
    }

    pub fn ed25519_from_bytes(raw: [u8; SECRET_KEY_LENGTH]) -> Result<Self> {
        Self::new(Algorithm::Ed25519, raw)
    }

    pub fn secp256k1_from_bytes(raw: [u8; SECRET_KEY_LENGTH]) -> Result<Self> {
        Self::new(Algorithm::Secp256k1, raw)
    }

    /// Parses a raw 32-byte hex secret for the given algorithm.
    pub fn from_hex(algorithm: Algorithm, s: &str) -> Result<Self> {
        let bytes = Base16Serializer
            .deserialize(s.trim())
            .context("Failed to deserialize secret key hex")?;
        let raw: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .context("Secret key must be 32 bytes")?;
        Self::new(algorithm, raw)
    }

    /// Reads an Ed25519 hex secret from an environment variable.
    pub fn from_env(var_name: &str) -> Result<Self> {
        let key_str = env::var(var_name)
            .with_context(|| format!("Missing environment variable '{}'", var_name))?;
        Self::from_hex(Algorithm::Ed25519, &key_str).with_context(|| {
            format!(
                "Failed to parse secret key from environment variable '{}'",
                var_name
            )
        })
    }

    pub fn generate(algorithm: Algorithm) -> Result<Self> {
        for _ in 0..8 {
            let candidate = rand::random::<[u8; SECRET_KEY_LENGTH]>();
            if let Ok(key) = Self::new(algorithm, candidate) {
                return Ok(key);
            }
        }
        bail!("Failed to generate a valid {} secret key", algorithm.name())
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        let raw = self.algorithm.signer().get_public_key(&self.raw)?;
        PublicKey::new(self.algorithm, raw)
    }

    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        let raw = self.algorithm.signer().sign(&self.raw, message)?;
        Ok(Signature {
            algorithm: self.algorithm,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known secp256k1 secret used by the contract's test fixtures.
    const FIXTURE_SECRET: [u8; 32] = [221u8; 32];

    #[test]
    fn test_blake2b_empty_digest() {
        assert_eq!(
            hex::encode(blake2b256(b"")),
            "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
    }

    #[test]
    fn test_public_key_hex_round_trip() -> Result<()> {
        let secret = SecretKey::ed25519_from_bytes([7u8; 32])?;
        let public_key = secret.public_key()?;

        let hex = public_key.to_hex();
        assert!(hex.starts_with("01"));
        assert_eq!(hex.len(), 2 + 64);
        assert_eq!(PublicKey::from_hex(&hex)?, public_key);

        Ok(())
    }

    #[test]
    fn test_account_hash_preimage() -> Result<()> {
        let public_key = SecretKey::ed25519_from_bytes([7u8; 32])?.public_key()?;

        let mut preimage = b"ed25519".to_vec();
        preimage.push(0);
        preimage.extend_from_slice(public_key.raw_bytes());

        assert_eq!(public_key.account_hash().value(), blake2b256(&preimage));
        assert!(
            public_key
                .account_hash()
                .to_string()
                .starts_with("account-hash-")
        );

        Ok(())
    }

    #[test]
    fn test_sign_and_verify() -> Result<()> {
        for algorithm in [Algorithm::Ed25519, Algorithm::Secp256k1] {
            let secret = SecretKey::generate(algorithm)?;
            let public_key = secret.public_key()?;
            let message = b"deploy hash bytes";

            let signature = secret.sign(message)?;
            assert_eq!(signature.to_bytes()[0], algorithm.tag());
            assert_eq!(signature.to_bytes().len(), 1 + 64);
            assert!(public_key.verify(message, &signature)?);
            assert!(!public_key.verify(b"another message", &signature)?);
        }

        Ok(())
    }

    #[test]
    fn test_secp256k1_public_key_is_compressed() -> Result<()> {
        let public_key = SecretKey::secp256k1_from_bytes(FIXTURE_SECRET)?.public_key()?;
        assert_eq!(public_key.raw_bytes().len(), SECP256K1_PUBLIC_KEY_LENGTH);
        assert_eq!(public_key.to_bytes()[0], 2);

        Ok(())
    }

    #[test]
    fn test_key_bytes_and_strings() -> Result<()> {
        let account = Key::Account(AccountHash::new([42; 32]));
        assert_eq!(account.to_bytes()[0], 0);
        assert_eq!(account.to_bytes().len(), 33);

        let entity = Key::AddressableEntity(EntityAddr::Account([42; 32]));
        assert_eq!(&entity.to_bytes()[..2], &[17, 1]);
        assert_eq!(entity.to_bytes().len(), 34);

        for key in [
            account,
            entity,
            Key::Hash([1; 32]),
            Key::Package([2; 32]),
            Key::AddressableEntity(EntityAddr::SmartContract([3; 32])),
        ] {
            let formatted = key.to_formatted_string();
            assert_eq!(Key::from_formatted_str(&formatted)?, key);

            let (decoded, offset) = Key::deserialize(&key.to_bytes(), 0)?;
            assert_eq!(decoded, key);
            assert_eq!(offset, key.to_bytes().len());
        }

        assert!(Key::from_formatted_str("uref-00").is_err());

        Ok(())
    }

    #[test]
    fn test_invalid_public_key_bytes() {
        assert!(PublicKey::from_bytes(&[]).is_err());
        assert!(PublicKey::from_bytes(&[3, 1, 2]).is_err());
        assert!(PublicKey::from_bytes(&[1, 1, 2]).is_err());
    }
}
