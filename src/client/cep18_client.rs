use std::{str::FromStr, sync::Arc, time::Duration};

use alloy_primitives::{U256, U512};
use tracing::{debug, info};

use crate::{
    basic_elements::{
        cl_value::{CLValue, RuntimeArgs},
        deploy::{Call, ExecutableItem},
        keys::{Key, PublicKey, SecretKey},
    },
    client::{
        event_stream::{EventFeed, SseEventStream},
        listeners::{ListenerHandle, ListenerRegistry},
        rpc_client::{JsonRpcClient, NodeClient},
        state_reader::StateReader,
        subscriber::EventSubscriber,
    },
    config::ClientConfig,
    constants::{
        ALLOWANCE_ENTRY_POINT_NAME, APPROVE_ENTRY_POINT_NAME, ARG_ADMIN_LIST, ARG_AMOUNT,
        ARG_BURNER_LIST, ARG_DECIMALS, ARG_ENABLE_MINT_BURN, ARG_EVENTS_MODE,
        ARG_MINT_AND_BURN_LIST, ARG_MINTER_LIST, ARG_NAME, ARG_NONE_LIST, ARG_OWNER,
        ARG_RECIPIENT, ARG_SPENDER, ARG_SYMBOL, ARG_TOTAL_SUPPLY, BURN_ENTRY_POINT_NAME,
        CHANGE_SECURITY_ENTRY_POINT_NAME, CONTRACT_HASH_NAME_PREFIX, DEFAULT_DEPLOY_TIMEOUT_MS,
        DECREASE_ALLOWANCE_ENTRY_POINT_NAME, INCREASE_ALLOWANCE_ENTRY_POINT_NAME,
        LEGACY_CONTRACT_PREFIX, MINT_ENTRY_POINT_NAME, PACKAGE_PREFIX,
        TRANSFER_ENTRY_POINT_NAME, TRANSFER_FROM_ENTRY_POINT_NAME,
    },
    error::Cep18Error,
    types::{
        ContractAddress, EventsMode, Lookup,
        event::{Cep18EventWithTransactionInfo, EventName},
        execution::{ExecutionResult, TransactionOutcome, WaitOutcome},
        token::{
            ApproveArgs, BurnArgs, ChangeSecurityArgs, InstallArgs, MintArgs, TransferArgs,
            TransferFromArgs,
        },
    },
};

/// Client for one CEP-18 token contract: builds calls, reads state and dispatches the
/// contract's events to listeners.
pub struct Cep18Client {
    pub node: Arc<dyn NodeClient>,
    pub network_name: String,
    contract: Option<ContractAddress>,
    contract_package_hash: Option<String>,
    contract_name: Option<String>,
    deploy_timeout: Duration,
    signing_key: Option<SecretKey>,
    listeners: Arc<ListenerRegistry>,
    subscriber: Option<EventSubscriber>,
}

impl Cep18Client {
    pub fn new(node: Arc<dyn NodeClient>, network_name: impl Into<String>) -> Self {
        Self {
            node,
            network_name: network_name.into(),
            contract: None,
            contract_package_hash: None,
            contract_name: None,
            deploy_timeout: Duration::from_millis(DEFAULT_DEPLOY_TIMEOUT_MS),
            signing_key: None,
            listeners: Arc::new(ListenerRegistry::new()),
            subscriber: None,
        }
    }

    /// Client over JSON-RPC, with the configured deploy timeout and signing key.
    pub fn from_config(config: &ClientConfig) -> Result<Self, Cep18Error> {
        let node = JsonRpcClient::new(config.node_url.clone())?;
        let mut client = Self::new(Arc::new(node), config.network_name.clone())
            .with_deploy_timeout(config.deploy_timeout);
        client.signing_key = config.private_key.clone();
        Ok(client)
    }

    pub fn with_deploy_timeout(mut self, deploy_timeout: Duration) -> Self {
        self.deploy_timeout = deploy_timeout;
        self
    }

    pub fn with_signing_key(mut self, signing_key: SecretKey) -> Self {
        self.signing_key = Some(signing_key);
        self
    }

    pub fn deploy_timeout(&self) -> Duration {
        self.deploy_timeout
    }

    pub fn signing_key(&self) -> Option<&SecretKey> {
        self.signing_key.as_ref()
    }

    pub fn new_from_env() -> Result<Self, Cep18Error> {
        Self::from_config(&ClientConfig::from_env()?)
    }

    /// Binds the client to an installed contract. The contract generation can't change
    /// once bound, and the package hash must use the matching prefix.
    pub fn set_contract_address(
        &mut self,
        contract_hash: &str,
        contract_package_hash: Option<&str>,
    ) -> Result<(), Cep18Error> {
        let contract = ContractAddress::from_str(contract_hash)
            .map_err(|error| Cep18Error::Validation(error.to_string()))?;

        if let Some(package_hash) = contract_package_hash {
            let expected_prefix = if contract.is_legacy() {
                LEGACY_CONTRACT_PREFIX
            } else {
                PACKAGE_PREFIX
            };
            if !package_hash.starts_with(expected_prefix) {
                return Err(Cep18Error::Validation(format!(
                    "Invalid contract package hash: {}",
                    package_hash
                )));
            }
        }

        if let Some(bound) = &self.contract {
            if !bound.same_generation(&contract) {
                return Err(Cep18Error::Validation(format!(
                    "{} does not match the bound contract generation of {}",
                    contract, bound
                )));
            }
        }

        info!(%contract, "Contract address set");
        self.contract = Some(contract);
        self.contract_package_hash = contract_package_hash.map(str::to_string);
        Ok(())
    }

    pub fn contract_address(&self) -> Option<&ContractAddress> {
        self.contract.as_ref()
    }

    pub fn contract_package_hash(&self) -> Option<&str> {
        self.contract_package_hash.as_deref()
    }

    pub fn is_legacy(&self) -> Option<bool> {
        self.contract.as_ref().map(ContractAddress::is_legacy)
    }

    /// Records the name the contract was installed under.
    pub fn set_contract_name(&mut self, name: &str) {
        self.contract_name = Some(name.to_string());
    }

    /// Account named key under which the installer stores the contract hash.
    pub fn contract_hash_key_name(&self) -> Option<String> {
        self.contract_name
            .as_ref()
            .map(|name| format!("{}{}", CONTRACT_HASH_NAME_PREFIX, name))
    }

    fn bound_contract(&self) -> Result<ContractAddress, Cep18Error> {
        self.contract.ok_or_else(|| {
            Cep18Error::Validation("Contract address is not set".to_string())
        })
    }

    fn party_key(&self, public_key: &PublicKey) -> Result<Key, Cep18Error> {
        Ok(self.bound_contract()?.account_key(public_key))
    }

    fn party_list(&self, public_keys: &[PublicKey]) -> Result<CLValue, Cep18Error> {
        let keys = public_keys
            .iter()
            .map(|public_key| self.party_key(public_key))
            .collect::<Result<Vec<Key>, Cep18Error>>()?;
        Ok(CLValue::from_key_list(&keys))
    }

    fn finish_call(
        &self,
        session: ExecutableItem,
        payment_amount: U512,
        sender: &PublicKey,
        network_name: Option<&str>,
        signing_keys: &[SecretKey],
    ) -> Result<Call, Cep18Error> {
        let chain_name = network_name.unwrap_or(&self.network_name);
        let mut call = Call::new(sender.clone(), chain_name, session, payment_amount);
        for secret_key in signing_keys {
            call.sign(secret_key)?;
        }
        debug!(
            hash = %call.hash_hex(),
            entry_point = call.entry_point().unwrap_or("install"),
            signed = call.is_signed(),
            "Call built"
        );
        Ok(call)
    }

    fn call_entry_point(
        &self,
        entry_point: &str,
        args: RuntimeArgs,
        payment_amount: U512,
        sender: &PublicKey,
        network_name: Option<&str>,
        signing_keys: &[SecretKey],
    ) -> Result<Call, Cep18Error> {
        let session = ExecutableItem::StoredContractByHash {
            hash: *self.bound_contract()?.hash_bytes(),
            entry_point: entry_point.to_string(),
            args,
        };
        self.finish_call(session, payment_amount, sender, network_name, signing_keys)
    }

    fn party_amount_args(
        &self,
        party_arg: &str,
        party: &PublicKey,
        amount: U256,
    ) -> Result<RuntimeArgs, Cep18Error> {
        let mut args = RuntimeArgs::new();
        args.insert(party_arg, CLValue::from_key(&self.party_key(party)?))
            .insert(ARG_AMOUNT, CLValue::from_u256(amount));
        Ok(args)
    }

    /// Installs the token contract. Optional settings are only passed when set, leaving
    /// the contract defaults otherwise.
    pub fn install(
        &self,
        wasm: &[u8],
        install_args: &InstallArgs,
        payment_amount: U512,
        sender: &PublicKey,
        network_name: Option<&str>,
        signing_keys: &[SecretKey],
    ) -> Result<Call, Cep18Error> {
        let mut args = RuntimeArgs::new();
        args.insert(ARG_NAME, CLValue::from_string(&install_args.name))
            .insert(ARG_SYMBOL, CLValue::from_string(&install_args.symbol))
            .insert(ARG_DECIMALS, CLValue::from_u8(install_args.decimals))
            .insert(ARG_TOTAL_SUPPLY, CLValue::from_u256(install_args.total_supply));
        if let Some(events_mode) = install_args.events_mode {
            args.insert(ARG_EVENTS_MODE, CLValue::from_u8(events_mode.to_u8()));
        }
        if let Some(enable) = install_args.enable_mint_and_burn {
            args.insert(ARG_ENABLE_MINT_BURN, CLValue::from_u8(u8::from(enable)));
        }

        let session = ExecutableItem::ModuleBytes {
            module_bytes: wasm.to_vec(),
            args,
        };
        self.finish_call(session, payment_amount, sender, network_name, signing_keys)
    }

    pub fn transfer(
        &self,
        transfer_args: &TransferArgs,
        payment_amount: U512,
        sender: &PublicKey,
        network_name: Option<&str>,
        signing_keys: &[SecretKey],
    ) -> Result<Call, Cep18Error> {
        let args =
            self.party_amount_args(ARG_RECIPIENT, &transfer_args.recipient, transfer_args.amount)?;
        self.call_entry_point(
            TRANSFER_ENTRY_POINT_NAME,
            args,
            payment_amount,
            sender,
            network_name,
            signing_keys,
        )
    }

    pub fn transfer_from(
        &self,
        transfer_args: &TransferFromArgs,
        payment_amount: U512,
        sender: &PublicKey,
        network_name: Option<&str>,
        signing_keys: &[SecretKey],
    ) -> Result<Call, Cep18Error> {
        let mut args = RuntimeArgs::new();
        args.insert(ARG_OWNER, CLValue::from_key(&self.party_key(&transfer_args.owner)?))
            .insert(
                ARG_RECIPIENT,
                CLValue::from_key(&self.party_key(&transfer_args.recipient)?),
            )
            .insert(ARG_AMOUNT, CLValue::from_u256(transfer_args.amount));
        self.call_entry_point(
            TRANSFER_FROM_ENTRY_POINT_NAME,
            args,
            payment_amount,
            sender,
            network_name,
            signing_keys,
        )
    }

    pub fn approve(
        &self,
        approve_args: &ApproveArgs,
        payment_amount: U512,
        sender: &PublicKey,
        network_name: Option<&str>,
        signing_keys: &[SecretKey],
    ) -> Result<Call, Cep18Error> {
        let args = self.party_amount_args(ARG_SPENDER, &approve_args.spender, approve_args.amount)?;
        self.call_entry_point(
            APPROVE_ENTRY_POINT_NAME,
            args,
            payment_amount,
            sender,
            network_name,
            signing_keys,
        )
    }

    /// On-chain `allowance` read. `owner` is passed as given, the spender is encoded for
    /// the bound contract generation.
    pub fn allowance(
        &self,
        spender: &PublicKey,
        owner: &Key,
        payment_amount: U512,
        sender: &PublicKey,
        network_name: Option<&str>,
        signing_keys: &[SecretKey],
    ) -> Result<Call, Cep18Error> {
        let mut args = RuntimeArgs::new();
        args.insert(ARG_SPENDER, CLValue::from_key(&self.party_key(spender)?))
            .insert(ARG_OWNER, CLValue::from_key(owner));
        self.call_entry_point(
            ALLOWANCE_ENTRY_POINT_NAME,
            args,
            payment_amount,
            sender,
            network_name,
            signing_keys,
        )
    }

    pub fn increase_allowance(
        &self,
        approve_args: &ApproveArgs,
        payment_amount: U512,
        sender: &PublicKey,
        network_name: Option<&str>,
        signing_keys: &[SecretKey],
    ) -> Result<Call, Cep18Error> {
        let args = self.party_amount_args(ARG_SPENDER, &approve_args.spender, approve_args.amount)?;
        self.call_entry_point(
            INCREASE_ALLOWANCE_ENTRY_POINT_NAME,
            args,
            payment_amount,
            sender,
            network_name,
            signing_keys,
        )
    }

    pub fn decrease_allowance(
        &self,
        approve_args: &ApproveArgs,
        payment_amount: U512,
        sender: &PublicKey,
        network_name: Option<&str>,
        signing_keys: &[SecretKey],
    ) -> Result<Call, Cep18Error> {
        let args = self.party_amount_args(ARG_SPENDER, &approve_args.spender, approve_args.amount)?;
        self.call_entry_point(
            DECREASE_ALLOWANCE_ENTRY_POINT_NAME,
            args,
            payment_amount,
            sender,
            network_name,
            signing_keys,
        )
    }

    pub fn mint(
        &self,
        mint_args: &MintArgs,
        payment_amount: U512,
        sender: &PublicKey,
        network_name: Option<&str>,
        signing_keys: &[SecretKey],
    ) -> Result<Call, Cep18Error> {
        let args = self.party_amount_args(ARG_OWNER, &mint_args.owner, mint_args.amount)?;
        self.call_entry_point(
            MINT_ENTRY_POINT_NAME,
            args,
            payment_amount,
            sender,
            network_name,
            signing_keys,
        )
    }

    pub fn burn(
        &self,
        burn_args: &BurnArgs,
        payment_amount: U512,
        sender: &PublicKey,
        network_name: Option<&str>,
        signing_keys: &[SecretKey],
    ) -> Result<Call, Cep18Error> {
        let args = self.party_amount_args(ARG_OWNER, &burn_args.owner, burn_args.amount)?;
        self.call_entry_point(
            BURN_ENTRY_POINT_NAME,
            args,
            payment_amount,
            sender,
            network_name,
            signing_keys,
        )
    }

    /// Changes security roles. Every supplied list becomes an argument; at least one
    /// list must be non-empty.
    pub fn change_security(
        &self,
        security_args: &ChangeSecurityArgs,
        payment_amount: U512,
        sender: &PublicKey,
        network_name: Option<&str>,
        signing_keys: &[SecretKey],
    ) -> Result<Call, Cep18Error> {
        let lists = [
            (ARG_ADMIN_LIST, &security_args.admin_list),
            (ARG_MINTER_LIST, &security_args.minter_list),
            (ARG_BURNER_LIST, &security_args.burner_list),
            (ARG_MINT_AND_BURN_LIST, &security_args.mint_and_burn_list),
            (ARG_NONE_LIST, &security_args.none_list),
        ];
        if lists.iter().all(|(_, list)| match list {
            Some(public_keys) => public_keys.is_empty(),
            None => true,
        }) {
            return Err(Cep18Error::Validation(
                "Should provide at least one arg".to_string(),
            ));
        }

        let mut args = RuntimeArgs::new();
        for (name, list) in lists {
            if let Some(public_keys) = list {
                args.insert(name, self.party_list(public_keys)?);
            }
        }
        self.call_entry_point(
            CHANGE_SECURITY_ENTRY_POINT_NAME,
            args,
            payment_amount,
            sender,
            network_name,
            signing_keys,
        )
    }

    /// Adds the configured signing key's approval to `call`.
    pub fn sign_call(&self, call: &mut Call) -> Result<(), Cep18Error> {
        let Some(signing_key) = &self.signing_key else {
            return Err(Cep18Error::Usage("No signing key configured".to_string()));
        };
        call.sign(signing_key)?;
        Ok(())
    }

    pub async fn put_call(&self, call: &Call) -> Result<String, Cep18Error> {
        let hash = self.node.put_call(call).await?;
        info!(%hash, "Call submitted");
        Ok(hash)
    }

    fn state_reader(&self) -> Result<StateReader, Cep18Error> {
        Ok(StateReader::new(self.node.clone(), self.bound_contract()?))
    }

    pub async fn balance_of(&self, account: &PublicKey) -> Result<U256, Cep18Error> {
        self.state_reader()?.balance_of(account).await
    }

    pub async fn try_balance_of(&self, account: &PublicKey) -> Result<Lookup<U256>, Cep18Error> {
        self.state_reader()?.try_balance_of(account).await
    }

    pub async fn allowances(
        &self,
        owner: &PublicKey,
        spender: &PublicKey,
    ) -> Result<U256, Cep18Error> {
        self.state_reader()?.allowances(owner, spender).await
    }

    pub async fn try_allowances(
        &self,
        owner: &PublicKey,
        spender: &PublicKey,
    ) -> Result<Lookup<U256>, Cep18Error> {
        self.state_reader()?.try_allowances(owner, spender).await
    }

    pub async fn name(&self) -> Result<String, Cep18Error> {
        self.state_reader()?.name().await
    }

    pub async fn symbol(&self) -> Result<String, Cep18Error> {
        self.state_reader()?.symbol().await
    }

    pub async fn decimals(&self) -> Result<u8, Cep18Error> {
        self.state_reader()?.decimals().await
    }

    pub async fn total_supply(&self) -> Result<U256, Cep18Error> {
        self.state_reader()?.total_supply().await
    }

    pub async fn events_mode(&self) -> Result<EventsMode, Cep18Error> {
        self.state_reader()?.events_mode().await
    }

    pub async fn is_mint_and_burn_enabled(&self) -> Result<bool, Cep18Error> {
        self.state_reader()?.is_mint_and_burn_enabled().await
    }

    /// Classified outcome of a completed transaction. A transaction the node has not
    /// executed yet is `NotFound`; a failed one is the matching error.
    pub async fn parse_outcome(
        &self,
        transaction_hash: &str,
    ) -> Result<TransactionOutcome, Cep18Error> {
        let raw = self
            .node
            .get_transaction_outcome(transaction_hash)
            .await?
            .ok_or_else(|| {
                Cep18Error::NotFound(format!("execution result of {}", transaction_hash))
            })?;
        ExecutionResult::from_json(&raw)?.classify().into_result()
    }

    /// Polls until the transaction completes or `timeout` elapses. Failed executions are
    /// returned as `Completed` with the outcome, not as errors.
    pub async fn wait_for_outcome(
        &self,
        transaction_hash: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<WaitOutcome, Cep18Error> {
        let poll = async {
            loop {
                if let Some(raw) = self.node.get_transaction_outcome(transaction_hash).await? {
                    let outcome = ExecutionResult::from_json(&raw)?.classify();
                    return Ok::<_, Cep18Error>(outcome);
                }
                tokio::time::sleep(poll_interval).await;
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(outcome) => Ok(WaitOutcome::Completed(outcome?)),
            Err(_) => {
                info!(%transaction_hash, ?timeout, "Timed out waiting for transaction");
                Ok(WaitOutcome::TimedOut)
            }
        }
    }

    /// `wait_for_outcome` bounded by the client's deploy timeout.
    pub async fn wait_for_call(
        &self,
        transaction_hash: &str,
        poll_interval: Duration,
    ) -> Result<WaitOutcome, Cep18Error> {
        self.wait_for_outcome(transaction_hash, self.deploy_timeout, poll_interval)
            .await
    }

    pub fn on<F>(&self, name: EventName, listener: F) -> ListenerHandle
    where
        F: Fn(&Cep18EventWithTransactionInfo) + Send + Sync + 'static,
    {
        self.listeners.on(name, listener)
    }

    pub fn add_event_listener<F>(&self, name: EventName, listener: F) -> ListenerHandle
    where
        F: Fn(&Cep18EventWithTransactionInfo) + Send + Sync + 'static,
    {
        self.on(name, listener)
    }

    pub fn off(&self, name: EventName, handle: ListenerHandle) -> Result<(), Cep18Error> {
        self.listeners.off(name, handle)
    }

    pub fn remove_event_listener(
        &self,
        name: EventName,
        handle: ListenerHandle,
    ) -> Result<(), Cep18Error> {
        self.off(name, handle)
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Attaches to `feed` and starts dispatching the bound contract's events. A running
    /// subscription is stopped first.
    pub async fn setup_event_stream(&mut self, feed: Arc<dyn EventFeed>) -> Result<(), Cep18Error> {
        let reader = self.state_reader()?;
        self.stop_event_stream().await;

        let subscriber = EventSubscriber::attach(feed, reader, self.listeners.clone()).await?;
        self.subscriber = Some(subscriber);
        Ok(())
    }

    /// `setup_event_stream` over the node's SSE endpoint.
    pub async fn setup_sse_event_stream(&mut self, address: &str) -> Result<(), Cep18Error> {
        self.setup_event_stream(Arc::new(SseEventStream::new(address)))
            .await
    }

    /// Stops event dispatch. Registered listeners are kept.
    pub async fn stop_event_stream(&mut self) {
        if let Some(subscriber) = self.subscriber.take() {
            subscriber.stop().await;
        }
    }

    pub fn is_event_stream_running(&self) -> bool {
        self.subscriber
            .as_ref()
            .is_some_and(EventSubscriber::is_running)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{Value, json};

    use super::*;
    use crate::{
        basic_elements::keys::{AccountHash, EntityAddr},
        client::testing::{InMemoryFeed, InMemoryNode},
        constants::EVENTS_MODE,
    };

    fn secret_key(seed: u8) -> SecretKey {
        SecretKey::ed25519_from_bytes([seed; 32]).unwrap()
    }

    fn public_key(seed: u8) -> PublicKey {
        secret_key(seed).public_key().unwrap()
    }

    fn modern_hash() -> String {
        format!("entity-contract-{}", "ab".repeat(32))
    }

    fn legacy_hash() -> String {
        format!("hash-{}", "cd".repeat(32))
    }

    fn bound_client(contract_hash: &str) -> (Cep18Client, Arc<InMemoryNode>) {
        let node = Arc::new(InMemoryNode::new());
        let mut client = Cep18Client::new(node.clone(), "casper-net-1");
        client.set_contract_address(contract_hash, None).unwrap();
        (client, node)
    }

    fn payment() -> U512 {
        U512::from(3_000_000_000u64)
    }

    #[test]
    fn test_change_security_requires_a_list() {
        let (client, _) = bound_client(&modern_hash());
        let sender = public_key(1);

        let empty = ChangeSecurityArgs::default();
        assert!(matches!(
            client.change_security(&empty, payment(), &sender, None, &[]),
            Err(Cep18Error::Validation(_))
        ));

        let only_empty_lists = ChangeSecurityArgs {
            admin_list: Some(Vec::new()),
            none_list: Some(Vec::new()),
            ..Default::default()
        };
        assert!(matches!(
            client.change_security(&only_empty_lists, payment(), &sender, None, &[]),
            Err(Cep18Error::Validation(_))
        ));

        let minters = ChangeSecurityArgs {
            minter_list: Some(vec![public_key(2), public_key(3)]),
            ..Default::default()
        };
        let call = client
            .change_security(&minters, payment(), &sender, None, &[])
            .unwrap();
        assert_eq!(call.entry_point(), Some(CHANGE_SECURITY_ENTRY_POINT_NAME));
        assert_eq!(
            call.session_args().names().collect::<Vec<_>>(),
            vec![ARG_MINTER_LIST]
        );
        let minter_keys: Vec<Key> = call
            .session_args()
            .get(ARG_MINTER_LIST)
            .unwrap()
            .to_typed()
            .unwrap();
        assert_eq!(minter_keys.len(), 2);
    }

    #[test]
    fn test_party_arguments_follow_contract_generation() {
        let recipient = public_key(2);
        let transfer = TransferArgs {
            recipient: recipient.clone(),
            amount: U256::from(10u64),
        };

        let (legacy, _) = bound_client(&legacy_hash());
        let call = legacy
            .transfer(&transfer, payment(), &public_key(1), None, &[])
            .unwrap();
        let key: Key = call.session_args().get(ARG_RECIPIENT).unwrap().to_typed().unwrap();
        assert_eq!(key, Key::Account(recipient.account_hash()));

        let (modern, _) = bound_client(&modern_hash());
        let call = modern
            .transfer(&transfer, payment(), &public_key(1), None, &[])
            .unwrap();
        let key: Key = call.session_args().get(ARG_RECIPIENT).unwrap().to_typed().unwrap();
        assert_eq!(
            key,
            Key::AddressableEntity(EntityAddr::Account(recipient.account_hash().value()))
        );
        match call.session() {
            ExecutableItem::StoredContractByHash { hash, .. } => assert_eq!(*hash, [0xab; 32]),
            other => panic!("expected stored contract call, got {:?}", other),
        }
    }

    #[test]
    fn test_builders_require_bound_contract() {
        let client = Cep18Client::new(Arc::new(InMemoryNode::new()), "casper-net-1");
        let mint = MintArgs {
            owner: public_key(1),
            amount: U256::from(1u64),
        };
        assert!(matches!(
            client.mint(&mint, payment(), &public_key(1), None, &[]),
            Err(Cep18Error::Validation(_))
        ));
    }

    #[test]
    fn test_install_optional_arguments() {
        let client = Cep18Client::new(Arc::new(InMemoryNode::new()), "casper-net-1");
        let mut install_args = InstallArgs {
            name: "Test Token".to_string(),
            symbol: "TST".to_string(),
            decimals: 9,
            total_supply: U256::from(1_000u64),
            events_mode: None,
            enable_mint_and_burn: None,
        };

        let call = client
            .install(b"\0asm", &install_args, payment(), &public_key(1), None, &[])
            .unwrap();
        assert_eq!(
            call.session_args().names().collect::<Vec<_>>(),
            vec![ARG_NAME, ARG_SYMBOL, ARG_DECIMALS, ARG_TOTAL_SUPPLY]
        );
        assert_eq!(call.header().chain_name, "casper-net-1");

        install_args.events_mode = Some(EventsMode::Native);
        install_args.enable_mint_and_burn = Some(true);
        let call = client
            .install(
                b"\0asm",
                &install_args,
                payment(),
                &public_key(1),
                Some("casper-test"),
                &[secret_key(1)],
            )
            .unwrap();
        let args = call.session_args();
        assert_eq!(args.get(ARG_EVENTS_MODE).unwrap().to_typed::<u8>().unwrap(), 2);
        assert_eq!(args.get(ARG_ENABLE_MINT_BURN).unwrap().to_typed::<u8>().unwrap(), 1);
        assert_eq!(call.header().chain_name, "casper-test");
        assert!(call.is_signed());
        call.verify().unwrap();
    }

    #[test]
    fn test_allowance_passes_owner_key_as_given() {
        let (client, _) = bound_client(&modern_hash());
        let owner = Key::Account(AccountHash::new([9; 32]));

        let call = client
            .allowance(&public_key(2), &owner, payment(), &public_key(1), None, &[])
            .unwrap();
        let passed: Key = call.session_args().get(ARG_OWNER).unwrap().to_typed().unwrap();
        assert_eq!(passed, owner);
    }

    #[test]
    fn test_set_contract_address_validation() {
        let mut client = Cep18Client::new(Arc::new(InMemoryNode::new()), "casper-net-1");

        assert!(matches!(
            client.set_contract_address("contract-abc", None),
            Err(Cep18Error::Validation(_))
        ));
        assert!(matches!(
            client.set_contract_address(&modern_hash(), Some(&format!("hash-{}", "00".repeat(32)))),
            Err(Cep18Error::Validation(_))
        ));
        assert!(matches!(
            client.set_contract_address(&legacy_hash(), Some(&format!("package-{}", "00".repeat(32)))),
            Err(Cep18Error::Validation(_))
        ));

        let package = format!("package-{}", "00".repeat(32));
        client
            .set_contract_address(&modern_hash(), Some(&package))
            .unwrap();
        assert_eq!(client.contract_package_hash(), Some(package.as_str()));
        assert_eq!(client.is_legacy(), Some(false));

        // The generation is fixed once bound.
        assert!(matches!(
            client.set_contract_address(&legacy_hash(), None),
            Err(Cep18Error::Validation(_))
        ));
        assert_eq!(client.contract_address().unwrap().to_string(), modern_hash());
    }

    #[test]
    fn test_contract_hash_key_name() {
        let mut client = Cep18Client::new(Arc::new(InMemoryNode::new()), "casper-net-1");
        assert_eq!(client.contract_hash_key_name(), None);
        client.set_contract_name("TST");
        assert_eq!(
            client.contract_hash_key_name().as_deref(),
            Some("cep18_contract_hash_TST")
        );
    }

    #[tokio::test]
    async fn test_parse_outcome() {
        let (client, node) = bound_client(&modern_hash());

        node.put_outcome("a", json!({ "Version2": { "error_message": "User error: 5" } }));
        node.put_outcome("b", json!({ "Version2": { "error_message": null } }));
        node.put_outcome("c", json!({ "Version1": { "Success": { "cost": "1" } } }));
        node.put_outcome(
            "d",
            json!({ "Version1": { "Failure": { "error_message": "User error: 60001" } } }),
        );
        node.put_outcome("e", json!({ "Version3": {} }));

        match client.parse_outcome("a").await {
            Err(Cep18Error::Contract { code }) => assert_eq!(code, 5),
            other => panic!("expected contract error, got {:?}", other),
        }
        assert!(client.parse_outcome("b").await.unwrap().success);
        assert!(client.parse_outcome("c").await.unwrap().success);

        let error = client.parse_outcome("d").await.unwrap_err();
        assert_eq!(
            error.contract_error_code().map(|code| code.code()),
            Some(60001)
        );
        assert!(matches!(
            client.parse_outcome("e").await,
            Err(Cep18Error::Schema(_))
        ));
        assert!(matches!(
            client.parse_outcome("pending").await,
            Err(Cep18Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_wait_for_outcome() {
        let (client, node) = bound_client(&modern_hash());
        node.put_outcome("done", json!({ "Version2": { "error_message": "Out of gas" } }));

        let completed = client
            .wait_for_outcome("done", Duration::from_secs(1), Duration::from_millis(10))
            .await
            .unwrap();
        match completed {
            WaitOutcome::Completed(outcome) => {
                assert!(!outcome.success);
                assert_eq!(outcome.raw_message.as_deref(), Some("Out of gas"));
            }
            WaitOutcome::TimedOut => panic!("expected a completed outcome"),
        }

        let pending = client
            .wait_for_outcome("pending", Duration::from_millis(50), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(pending, WaitOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_wait_for_call_uses_deploy_timeout() {
        let (client, _node) = bound_client(&modern_hash());
        assert_eq!(client.deploy_timeout(), Duration::from_secs(1200));

        let client = client.with_deploy_timeout(Duration::from_millis(50));
        let pending = client
            .wait_for_call("pending", Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(pending, WaitOutcome::TimedOut);
    }

    #[test]
    fn test_from_config_signs_with_private_key() {
        let config = ClientConfig {
            deploy_timeout: Duration::from_secs(5),
            private_key: Some(secret_key(9)),
            ..ClientConfig::default()
        };
        let mut client = Cep18Client::from_config(&config).unwrap();
        assert_eq!(client.deploy_timeout(), Duration::from_secs(5));
        client.set_contract_address(&modern_hash(), None).unwrap();

        let mut call = client
            .burn(
                &BurnArgs {
                    owner: public_key(9),
                    amount: U256::from(1u64),
                },
                payment(),
                &public_key(9),
                None,
                &[],
            )
            .unwrap();
        assert!(!call.is_signed());
        client.sign_call(&mut call).unwrap();
        assert_eq!(call.approvals()[0].signer, public_key(9));

        let unsigned = Cep18Client::new(Arc::new(InMemoryNode::new()), "casper-net-1");
        assert!(matches!(
            unsigned.sign_call(&mut call),
            Err(Cep18Error::Usage(_))
        ));
    }

    #[tokio::test]
    async fn test_mint_then_balance() {
        let (client, _node) = bound_client(&modern_hash());
        let owner = public_key(4);
        assert_eq!(client.balance_of(&owner).await.unwrap(), U256::ZERO);

        let call = client
            .mint(
                &MintArgs {
                    owner: owner.clone(),
                    amount: U256::from(100u64),
                },
                payment(),
                &public_key(1),
                None,
                &[secret_key(1)],
            )
            .unwrap();
        let hash = client.put_call(&call).await.unwrap();

        assert!(client.parse_outcome(&hash).await.unwrap().success);
        assert_eq!(client.balance_of(&owner).await.unwrap(), U256::from(100u64));
    }

    fn processed_frame(hash: &str, payloads: &[String]) -> Value {
        let messages: Vec<Value> = payloads
            .iter()
            .map(|payload| {
                json!({
                    "entity_addr": modern_hash(),
                    "message": { "String": payload },
                    "topic_name": "events",
                    "topic_name_hash": "00",
                    "topic_index": 0,
                    "block_index": 0
                })
            })
            .collect();
        json!({
            "TransactionProcessed": {
                "transaction_hash": { "Version1": hash },
                "timestamp": "2024-11-05T10:00:00.000Z",
                "execution_result": { "Version2": { "error_message": null } },
                "messages": messages
            }
        })
    }

    #[tokio::test]
    async fn test_event_stream_dispatch_and_stop() {
        let (mut client, node) = bound_client(&modern_hash());
        node.put_named_value(EVENTS_MODE, CLValue::from_u8(2));
        let feed = Arc::new(InMemoryFeed::new());
        let received = Arc::new(Mutex::new(Vec::new()));

        let owner = format!("Key::Account({})", "01".repeat(32));
        for name in [EventName::Mint, EventName::Transfer, EventName::Burn] {
            let received = received.clone();
            client.on(name, move |event| {
                received.lock().unwrap().push((
                    event.name,
                    event.contract_address.clone(),
                    event.transaction_info.clone(),
                ));
            });
        }
        client.setup_event_stream(feed.clone()).await.unwrap();
        assert!(client.is_event_stream_running());

        let hash = "12".repeat(32);
        feed.push(processed_frame(
            &hash,
            &[
                format!("Mint(Mint {{ recipient: {owner}, amount: 100 }})"),
                format!("Transfer(Transfer {{ sender: {owner}, recipient: {owner}, amount: 1 }})"),
                format!("Burn(Burn {{ owner: {owner}, amount: 2 }})"),
            ],
        ))
        .await;

        tokio::time::timeout(Duration::from_secs(5), async {
            while received.lock().unwrap().len() < 3 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        {
            let received = received.lock().unwrap();
            let names: Vec<EventName> = received.iter().map(|(name, _, _)| *name).collect();
            assert_eq!(names, vec![EventName::Mint, EventName::Transfer, EventName::Burn]);
            for (_, contract_address, info) in received.iter() {
                assert_eq!(contract_address, &modern_hash());
                assert_eq!(info.transaction_hash, hash);
                assert_eq!(info.timestamp, "2024-11-05T10:00:00.000Z");
            }
        }

        client.stop_event_stream().await;
        client.stop_event_stream().await;
        assert!(!client.is_event_stream_running());
        feed.push(processed_frame(
            &"34".repeat(32),
            &[format!("Mint(Mint {{ recipient: {owner}, amount: 1 }})")],
        ))
        .await;
        assert_eq!(received.lock().unwrap().len(), 3);
        assert_eq!(client.listeners().listener_count(EventName::Mint), 1);
    }

    #[test]
    fn test_remove_listener_without_bucket() {
        let client = Cep18Client::new(Arc::new(InMemoryNode::new()), "casper-net-1");
        let handle = client.add_event_listener(EventName::Transfer, |_| {});

        assert!(matches!(
            client.remove_event_listener(EventName::Mint, handle),
            Err(Cep18Error::Usage(_))
        ));
        client.remove_event_listener(EventName::Transfer, handle).unwrap();
        assert_eq!(client.listeners().listener_count(EventName::Transfer), 0);
    }
}
