use std::sync::Arc;

use alloy_primitives::U256;
use tracing::warn;

use crate::{
    basic_elements::{
        args::Args,
        cl_value::CLValue,
        keys::{PublicKey, blake2b256},
        next_arg::NextArg,
    },
    client::rpc_client::NodeClient,
    constants::{
        ALLOWANCES, BALANCES, DECIMALS, ENABLE_MINT_BURN, EVENTS_MODE, NAME, SYMBOL, TOTAL_SUPPLY,
    },
    crypto::{base16::Base16Serializer, base64::Base64Serializer, traits::serializer::Serializer},
    error::Cep18Error,
    types::{ContractAddress, DictionaryQuery, EventsMode, Lookup},
};

/// Read-only queries against one bound token contract.
#[derive(Clone)]
pub struct StateReader {
    node: Arc<dyn NodeClient>,
    contract: ContractAddress,
}

impl StateReader {
    pub fn new(node: Arc<dyn NodeClient>, contract: ContractAddress) -> Self {
        Self { node, contract }
    }

    pub fn contract(&self) -> &ContractAddress {
        &self.contract
    }

    /// `balances` item key: base64 of the account key bytes.
    pub fn balance_item_key(&self, account: &PublicKey) -> String {
        Base64Serializer.serialize(&self.contract.account_key(account).to_bytes())
    }

    /// `allowances` item key: hex of blake2b256(owner key bytes || spender key bytes).
    pub fn allowance_item_key(&self, owner: &PublicKey, spender: &PublicKey) -> String {
        let mut preimage = self.contract.account_key(owner).to_bytes();
        preimage.extend_from_slice(&self.contract.account_key(spender).to_bytes());
        Base16Serializer.serialize(&blake2b256(&preimage))
    }

    pub async fn try_balance_of(&self, account: &PublicKey) -> Result<Lookup<U256>, Cep18Error> {
        let query = DictionaryQuery {
            contract: self.contract,
            dictionary_name: BALANCES.to_string(),
            item_key: self.balance_item_key(account),
        };
        typed(self.node.query_dictionary(&query).await?)
    }

    /// Balance of `account`, zero when it never held tokens.
    pub async fn balance_of(&self, account: &PublicKey) -> Result<U256, Cep18Error> {
        match self.try_balance_of(account).await? {
            Lookup::Found(balance) => Ok(balance),
            Lookup::NotFound => {
                warn!(account = %account.to_hex(), "Not found balance, using zero");
                Ok(U256::ZERO)
            }
        }
    }

    pub async fn try_allowances(
        &self,
        owner: &PublicKey,
        spender: &PublicKey,
    ) -> Result<Lookup<U256>, Cep18Error> {
        let query = DictionaryQuery {
            contract: self.contract,
            dictionary_name: ALLOWANCES.to_string(),
            item_key: self.allowance_item_key(owner, spender),
        };
        typed(self.node.query_dictionary(&query).await?)
    }

    /// Amount `spender` may move on behalf of `owner`, zero when never approved.
    pub async fn allowances(
        &self,
        owner: &PublicKey,
        spender: &PublicKey,
    ) -> Result<U256, Cep18Error> {
        match self.try_allowances(owner, spender).await? {
            Lookup::Found(allowance) => Ok(allowance),
            Lookup::NotFound => {
                warn!(
                    owner = %owner.to_hex(),
                    spender = %spender.to_hex(),
                    "Not found allowances, using zero"
                );
                Ok(U256::ZERO)
            }
        }
    }

    async fn named_value<T>(&self, name: &str) -> Result<T, Cep18Error>
    where
        Args: NextArg<T>,
    {
        match typed(self.node.query_point_value(&self.contract, name).await?)? {
            Lookup::Found(value) => Ok(value),
            Lookup::NotFound => Err(Cep18Error::NotFound(format!(
                "named key '{}' of {}",
                name, self.contract
            ))),
        }
    }

    pub async fn name(&self) -> Result<String, Cep18Error> {
        self.named_value(NAME).await
    }

    pub async fn symbol(&self) -> Result<String, Cep18Error> {
        self.named_value(SYMBOL).await
    }

    pub async fn decimals(&self) -> Result<u8, Cep18Error> {
        self.named_value(DECIMALS).await
    }

    pub async fn total_supply(&self) -> Result<U256, Cep18Error> {
        self.named_value(TOTAL_SUPPLY).await
    }

    pub async fn events_mode(&self) -> Result<EventsMode, Cep18Error> {
        let raw: u8 = self.named_value(EVENTS_MODE).await?;
        Ok(EventsMode::from_u8(raw)?)
    }

    pub async fn is_mint_and_burn_enabled(&self) -> Result<bool, Cep18Error> {
        let raw: u8 = self.named_value(ENABLE_MINT_BURN).await?;
        Ok(raw != 0)
    }
}

fn typed<T>(lookup: Lookup<CLValue>) -> Result<Lookup<T>, Cep18Error>
where
    Args: NextArg<T>,
{
    Ok(match lookup {
        Lookup::Found(value) => Lookup::Found(value.to_typed()?),
        Lookup::NotFound => Lookup::NotFound,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        basic_elements::keys::SecretKey,
        client::testing::InMemoryNode,
    };

    fn public_key(seed: u8) -> PublicKey {
        SecretKey::ed25519_from_bytes([seed; 32])
            .unwrap()
            .public_key()
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_balance_and_allowance_are_zero() {
        let contract = ContractAddress::EntityAddress([7; 32]);
        let reader = StateReader::new(Arc::new(InMemoryNode::new()), contract);

        assert_eq!(reader.balance_of(&public_key(1)).await.unwrap(), U256::ZERO);
        assert_eq!(
            reader
                .allowances(&public_key(1), &public_key(2))
                .await
                .unwrap(),
            U256::ZERO
        );
        assert_eq!(
            reader.try_balance_of(&public_key(1)).await.unwrap(),
            Lookup::NotFound
        );
    }

    #[tokio::test]
    async fn test_reads_stored_values() {
        let contract = ContractAddress::LegacyHash([3; 32]);
        let node = Arc::new(InMemoryNode::new());
        let reader = StateReader::new(node.clone(), contract);
        let owner = public_key(1);
        let spender = public_key(2);

        node.put_dictionary(
            BALANCES,
            &reader.balance_item_key(&owner),
            CLValue::from_u256(U256::from(500u64)),
        );
        node.put_dictionary(
            ALLOWANCES,
            &reader.allowance_item_key(&owner, &spender),
            CLValue::from_u256(U256::from(20u64)),
        );
        node.put_named_value(NAME, CLValue::from_string("Test Token"));
        node.put_named_value(DECIMALS, CLValue::from_u8(9));
        node.put_named_value(EVENTS_MODE, CLValue::from_u8(2));
        node.put_named_value(ENABLE_MINT_BURN, CLValue::from_u8(1));

        assert_eq!(reader.balance_of(&owner).await.unwrap(), U256::from(500u64));
        assert_eq!(
            reader.allowances(&owner, &spender).await.unwrap(),
            U256::from(20u64)
        );
        // Allowance keys are ordered.
        assert_eq!(
            reader.allowances(&spender, &owner).await.unwrap(),
            U256::ZERO
        );
        assert_eq!(reader.name().await.unwrap(), "Test Token");
        assert_eq!(reader.decimals().await.unwrap(), 9);
        assert_eq!(reader.events_mode().await.unwrap(), EventsMode::Native);
        assert!(reader.is_mint_and_burn_enabled().await.unwrap());
        assert!(matches!(
            reader.symbol().await,
            Err(Cep18Error::NotFound(_))
        ));
    }

    #[test]
    fn test_item_keys_follow_contract_generation() {
        let owner = public_key(1);
        let legacy = StateReader::new(
            Arc::new(InMemoryNode::new()),
            ContractAddress::LegacyHash([0; 32]),
        );
        let modern = StateReader::new(
            Arc::new(InMemoryNode::new()),
            ContractAddress::EntityAddress([0; 32]),
        );

        let mut legacy_bytes = vec![0u8];
        legacy_bytes.extend_from_slice(&owner.account_hash().value());
        assert_eq!(
            legacy.balance_item_key(&owner),
            Base64Serializer.serialize(&legacy_bytes)
        );

        let mut modern_bytes = vec![17u8, 1];
        modern_bytes.extend_from_slice(&owner.account_hash().value());
        assert_eq!(
            modern.balance_item_key(&owner),
            Base64Serializer.serialize(&modern_bytes)
        );
        assert_eq!(modern.allowance_item_key(&owner, &public_key(2)).len(), 64);
    }

    #[tokio::test]
    async fn test_node_errors_propagate() {
        let node = Arc::new(InMemoryNode::new());
        node.fail_with("connection refused");
        let reader = StateReader::new(node, ContractAddress::EntityAddress([0; 32]));

        assert!(matches!(
            reader.balance_of(&public_key(1)).await,
            Err(Cep18Error::Infra(_))
        ));
    }
}
