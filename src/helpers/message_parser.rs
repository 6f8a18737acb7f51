use std::collections::BTreeMap;

use alloy_primitives::U256;
use anyhow::{Context, Result, anyhow, bail, ensure};
use tracing::{debug, warn};

use crate::{
    basic_elements::{
        args::Args,
        keys::{AccountHash, EntityAddr, Key},
    },
    constants::{
        ACCOUNT_HASH_PREFIX, CES_EVENT_PREFIX, EVENTS_TOPIC, LEGACY_CONTRACT_PREFIX,
        LEGACY_PACKAGE_PREFIX, PACKAGE_PREFIX,
    },
    crypto::base16::decode_hash,
    helpers::events::{Message, MessagePayload},
    types::{
        ContractAddress, SecurityBadge,
        event::{
            Burn, Cep18Event, Cep18EventWithTransactionInfo, ChangeEventsMode, ChangeSecurity,
            DecreaseAllowance, EventName, IncreaseAllowance, Mint, SetAllowance, TransactionInfo,
            Transfer, TransferFrom,
        },
    },
};

/// Turns the `events` messages of one contract into typed events.
#[derive(Debug, Clone)]
pub struct MessageDecoder {
    contract: ContractAddress,
}

impl MessageDecoder {
    pub fn new(contract: ContractAddress) -> Self {
        Self { contract }
    }

    pub fn contract(&self) -> &ContractAddress {
        &self.contract
    }

    /// Decodes messages in emission order. Messages from other contracts or topics are
    /// ignored; a message that fails to decode is logged and skipped.
    pub fn decode(
        &self,
        messages: &[Message],
        transaction_info: &TransactionInfo,
    ) -> Vec<Cep18EventWithTransactionInfo> {
        messages
            .iter()
            .filter(|message| {
                message.topic_name == EVENTS_TOPIC && self.contract.matches(&message.entity_addr)
            })
            .filter_map(|message| match decode_message(&message.message) {
                Ok(data) => Some(Cep18EventWithTransactionInfo {
                    name: data.name(),
                    contract_address: self.contract.to_string(),
                    data,
                    transaction_info: transaction_info.clone(),
                }),
                Err(error) => {
                    warn!(
                        transaction_hash = %transaction_info.transaction_hash,
                        topic_index = message.topic_index,
                        "Skipping undecodable contract message: {:#}",
                        error
                    );
                    None
                }
            })
            .collect()
    }
}

pub fn decode_message(payload: &MessagePayload) -> Result<Cep18Event> {
    match payload {
        MessagePayload::String(text) => parse_event_text(text),
        MessagePayload::Bytes(hex_bytes) => {
            let bytes = hex::decode(hex_bytes).context("Message bytes are not hex")?;
            match parse_ces_bytes(&bytes) {
                Ok(event) => Ok(event),
                Err(ces_error) => match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        debug!("Bytes message is not CES encoded, parsing it as text");
                        parse_event_text(text)
                    }
                    Err(_) => Err(ces_error),
                },
            }
        }
    }
}

// --- Text form: `Transfer(Transfer { sender: Key::Account(..), recipient: .., amount: 1 })` ---

pub fn parse_event_text(text: &str) -> Result<Cep18Event> {
    let text = text.trim();
    let open = text
        .find('(')
        .with_context(|| format!("Missing event wrapper in '{}'", text))?;
    let name: EventName = text[..open].trim().parse()?;
    let inner = text[open + 1..]
        .strip_suffix(')')
        .with_context(|| format!("Unterminated event wrapper in '{}'", text))?
        .trim();

    let brace = inner
        .find('{')
        .with_context(|| format!("Missing struct body in '{}'", text))?;
    ensure!(
        inner[..brace].trim() == name.as_str(),
        "Event wrapper {} does not match struct {}",
        name,
        inner[..brace].trim()
    );
    let body = inner[brace + 1..]
        .trim_end()
        .strip_suffix('}')
        .with_context(|| format!("Unterminated struct body in '{}'", text))?;

    let fields = TextFields::parse(body)?;
    Ok(match name {
        EventName::Mint => Cep18Event::Mint(Mint {
            recipient: fields.key("recipient")?,
            amount: fields.u256("amount")?,
        }),
        EventName::Burn => Cep18Event::Burn(Burn {
            owner: fields.key("owner")?,
            amount: fields.u256("amount")?,
        }),
        EventName::SetAllowance => Cep18Event::SetAllowance(SetAllowance {
            owner: fields.key("owner")?,
            spender: fields.key("spender")?,
            allowance: fields.u256("allowance")?,
        }),
        EventName::IncreaseAllowance => Cep18Event::IncreaseAllowance(IncreaseAllowance {
            owner: fields.key("owner")?,
            spender: fields.key("spender")?,
            allowance: fields.u256("allowance")?,
            inc_by: fields.u256("inc_by")?,
        }),
        EventName::DecreaseAllowance => Cep18Event::DecreaseAllowance(DecreaseAllowance {
            owner: fields.key("owner")?,
            spender: fields.key("spender")?,
            allowance: fields.u256("allowance")?,
            decr_by: fields.u256("decr_by")?,
        }),
        EventName::Transfer => Cep18Event::Transfer(Transfer {
            sender: fields.key("sender")?,
            recipient: fields.key("recipient")?,
            amount: fields.u256("amount")?,
        }),
        EventName::TransferFrom => Cep18Event::TransferFrom(TransferFrom {
            spender: fields.key("spender")?,
            owner: fields.key("owner")?,
            recipient: fields.key("recipient")?,
            amount: fields.u256("amount")?,
        }),
        EventName::ChangeSecurity => Cep18Event::ChangeSecurity(ChangeSecurity {
            admin: fields.key("admin")?,
            sec_change_map: parse_badge_map(fields.raw("sec_change_map")?)?,
        }),
        EventName::ChangeEventsMode => Cep18Event::ChangeEventsMode(ChangeEventsMode {
            events_mode: fields
                .raw("events_mode")?
                .parse()
                .context("Invalid events_mode")?,
        }),
    })
}

struct TextFields<'a> {
    fields: Vec<(&'a str, &'a str)>,
}

impl<'a> TextFields<'a> {
    fn parse(body: &'a str) -> Result<Self> {
        let mut fields = Vec::new();
        for part in split_top_level(body) {
            let (name, value) = part
                .split_once(':')
                .with_context(|| format!("Malformed field '{}'", part))?;
            fields.push((name.trim(), value.trim()));
        }
        Ok(Self { fields })
    }

    fn raw(&self, name: &str) -> Result<&'a str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
            .ok_or_else(|| anyhow!("Missing field '{}'", name))
    }

    fn key(&self, name: &str) -> Result<Key> {
        parse_key_text(self.raw(name)?).with_context(|| format!("Invalid key in '{}'", name))
    }

    fn u256(&self, name: &str) -> Result<U256> {
        self.raw(name)?
            .parse::<U256>()
            .with_context(|| format!("Invalid amount in '{}'", name))
    }
}

/// Splits on commas that are not nested in brackets, dropping empty parts.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, ch) in s.char_indices() {
        match ch {
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

/// `{Key::Account(ab..): Admin, Key::Hash(cd..): None}`
fn parse_badge_map(s: &str) -> Result<BTreeMap<Key, SecurityBadge>> {
    let body = s
        .trim()
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .with_context(|| format!("Malformed security map '{}'", s))?;

    let mut map = BTreeMap::new();
    for entry in split_top_level(body) {
        let (key, badge) = entry
            .rsplit_once(':')
            .with_context(|| format!("Malformed security map entry '{}'", entry))?;
        map.insert(parse_key_text(key)?, badge.trim().parse()?);
    }
    Ok(map)
}

/// Parses a key in the contract's debug form (`Key::Account(<hex>)`,
/// `Key::AddressableEntity(entity-account-<hex>)`, ...) or the formatted-string form.
pub fn parse_key_text(s: &str) -> Result<Key> {
    let s = s.trim();
    let Some(rest) = s.strip_prefix("Key::") else {
        return Key::from_formatted_str(s);
    };

    let open = rest
        .find('(')
        .with_context(|| format!("Malformed key '{}'", s))?;
    let inner = rest[open + 1..]
        .strip_suffix(')')
        .with_context(|| format!("Malformed key '{}'", s))?
        .trim();

    Ok(match &rest[..open] {
        "Account" => Key::Account(AccountHash::new(decode_hash(strip_any(
            inner,
            &[ACCOUNT_HASH_PREFIX],
        ))?)),
        "Hash" => Key::Hash(decode_hash(strip_any(inner, &[LEGACY_CONTRACT_PREFIX]))?),
        "Package" | "SmartContract" => Key::Package(decode_hash(strip_any(
            inner,
            &[LEGACY_PACKAGE_PREFIX, PACKAGE_PREFIX],
        ))?),
        "AddressableEntity" => Key::AddressableEntity(parse_entity_addr(inner)?),
        other => bail!("Unsupported key variant '{}'", other),
    })
}

fn parse_entity_addr(s: &str) -> Result<EntityAddr> {
    if let Some(rest) = s.strip_prefix("EntityAddr::") {
        let open = rest
            .find('(')
            .with_context(|| format!("Malformed entity address '{}'", s))?;
        let hash = decode_hash(
            rest[open + 1..]
                .strip_suffix(')')
                .with_context(|| format!("Malformed entity address '{}'", s))?
                .trim(),
        )?;
        return Ok(match &rest[..open] {
            "System" => EntityAddr::System(hash),
            "Account" => EntityAddr::Account(hash),
            "SmartContract" => EntityAddr::SmartContract(hash),
            other => bail!("Unsupported entity address variant '{}'", other),
        });
    }

    match Key::from_formatted_str(s)? {
        Key::AddressableEntity(entity_addr) => Ok(entity_addr),
        other => bail!("Expected an entity address, got {}", other),
    }
}

fn strip_any<'a>(s: &'a str, prefixes: &[&str]) -> &'a str {
    prefixes
        .iter()
        .find_map(|prefix| s.strip_prefix(prefix))
        .unwrap_or(s)
}

// --- CES byte form: `event_<Name>` followed by the fields in declaration order ---

pub fn parse_ces_bytes(bytes: &[u8]) -> Result<Cep18Event> {
    let mut args = Args::from_bytes(bytes.to_vec());
    let tagged_name = args.next_string().context("Failed to read CES event name")?;
    let name: EventName = tagged_name
        .strip_prefix(CES_EVENT_PREFIX)
        .with_context(|| format!("Not a CES event name: '{}'", tagged_name))?
        .parse()?;

    let event = match name {
        EventName::Mint => Cep18Event::Mint(Mint {
            recipient: args.next_key()?,
            amount: args.next_u256()?,
        }),
        EventName::Burn => Cep18Event::Burn(Burn {
            owner: args.next_key()?,
            amount: args.next_u256()?,
        }),
        EventName::SetAllowance => Cep18Event::SetAllowance(SetAllowance {
            owner: args.next_key()?,
            spender: args.next_key()?,
            allowance: args.next_u256()?,
        }),
        EventName::IncreaseAllowance => Cep18Event::IncreaseAllowance(IncreaseAllowance {
            owner: args.next_key()?,
            spender: args.next_key()?,
            allowance: args.next_u256()?,
            inc_by: args.next_u256()?,
        }),
        EventName::DecreaseAllowance => Cep18Event::DecreaseAllowance(DecreaseAllowance {
            owner: args.next_key()?,
            spender: args.next_key()?,
            allowance: args.next_u256()?,
            decr_by: args.next_u256()?,
        }),
        EventName::Transfer => Cep18Event::Transfer(Transfer {
            sender: args.next_key()?,
            recipient: args.next_key()?,
            amount: args.next_u256()?,
        }),
        EventName::TransferFrom => Cep18Event::TransferFrom(TransferFrom {
            spender: args.next_key()?,
            owner: args.next_key()?,
            recipient: args.next_key()?,
            amount: args.next_u256()?,
        }),
        EventName::ChangeSecurity => {
            let admin = args.next_key()?;
            let len = args.next_u32()?;
            let mut sec_change_map = BTreeMap::new();
            for _ in 0..len {
                let key = args.next_key()?;
                let badge = SecurityBadge::from_u8(args.next_u8()?)?;
                sec_change_map.insert(key, badge);
            }
            Cep18Event::ChangeSecurity(ChangeSecurity {
                admin,
                sec_change_map,
            })
        }
        EventName::ChangeEventsMode => Cep18Event::ChangeEventsMode(ChangeEventsMode {
            events_mode: args.next_u8()?,
        }),
    };

    ensure!(
        args.remaining() == 0,
        "{} trailing bytes after {} event",
        args.remaining(),
        name
    );
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex32(byte: &str) -> String {
        byte.repeat(32)
    }

    #[test]
    fn test_parse_transfer_text() -> Result<()> {
        let text = format!(
            "Transfer(Transfer {{ sender: Key::Account({}), recipient: Key::AddressableEntity(entity-account-{}), amount: 100 }})",
            hex32("01"),
            hex32("02")
        );

        let event = parse_event_text(&text)?;
        assert_eq!(
            event,
            Cep18Event::Transfer(Transfer {
                sender: Key::Account(AccountHash::new([1; 32])),
                recipient: Key::AddressableEntity(EntityAddr::Account([2; 32])),
                amount: U256::from(100u64),
            })
        );

        Ok(())
    }

    #[test]
    fn test_parse_change_security_text() -> Result<()> {
        let text = format!(
            "ChangeSecurity(ChangeSecurity {{ admin: Key::Account({a}), sec_change_map: {{Key::Account({b}): Minter, Key::Hash({c}): None}} }})",
            a = hex32("0a"),
            b = hex32("0b"),
            c = hex32("0c"),
        );

        let Cep18Event::ChangeSecurity(event) = parse_event_text(&text)? else {
            panic!("expected ChangeSecurity");
        };
        assert_eq!(event.admin, Key::Account(AccountHash::new([10; 32])));
        assert_eq!(event.sec_change_map.len(), 2);
        assert_eq!(
            event.sec_change_map[&Key::Account(AccountHash::new([11; 32]))],
            SecurityBadge::Minter
        );
        assert_eq!(event.sec_change_map[&Key::Hash([12; 32])], SecurityBadge::None);

        Ok(())
    }

    #[test]
    fn test_parse_key_text_forms() -> Result<()> {
        let hex = hex32("2a");
        assert_eq!(
            parse_key_text(&format!("Key::AddressableEntity(EntityAddr::Account({hex}))"))?,
            Key::AddressableEntity(EntityAddr::Account([42; 32]))
        );
        assert_eq!(
            parse_key_text(&format!("Key::Package({hex})"))?,
            Key::Package([42; 32])
        );
        assert_eq!(
            parse_key_text(&format!("account-hash-{hex}"))?,
            Key::Account(AccountHash::new([42; 32]))
        );
        assert!(parse_key_text(&format!("Key::URef({hex})")).is_err());

        Ok(())
    }

    #[test]
    fn test_text_rejects_mismatched_wrapper() {
        assert!(parse_event_text("Mint(Burn { owner: Key::Hash(00), amount: 1 })").is_err());
        assert!(parse_event_text("Unknown(Unknown { })").is_err());
    }

    #[test]
    fn test_parse_ces_bytes() -> Result<()> {
        let owner = Key::AddressableEntity(EntityAddr::Account([5; 32]));
        let mut args = Args::new();
        args.add_string("event_Burn")
            .add_key(&owner)
            .add_u256(U256::from(7u64));

        assert_eq!(
            parse_ces_bytes(&args.serialize())?,
            Cep18Event::Burn(Burn {
                owner,
                amount: U256::from(7u64),
            })
        );

        args.add_u8(0);
        assert!(parse_ces_bytes(&args.serialize()).is_err());

        Ok(())
    }

    #[test]
    fn test_bytes_payload_falls_back_to_text() -> Result<()> {
        let text = "ChangeEventsMode(ChangeEventsMode { events_mode: 2 })";
        let payload = MessagePayload::Bytes(hex::encode(text.as_bytes()));
        assert_eq!(
            decode_message(&payload)?,
            Cep18Event::ChangeEventsMode(ChangeEventsMode { events_mode: 2 })
        );

        Ok(())
    }

    #[test]
    fn test_decoder_filters_and_keeps_order() {
        let contract = ContractAddress::EntityAddress([9; 32]);
        let decoder = MessageDecoder::new(contract);
        let entity_addr = contract.to_string();
        let mint = |amount: u64| Message {
            entity_addr: entity_addr.clone(),
            message: MessagePayload::String(format!(
                "Mint(Mint {{ recipient: Key::Account({}), amount: {} }})",
                hex32("01"),
                amount
            )),
            topic_name: EVENTS_TOPIC.to_string(),
            topic_name_hash: None,
            topic_index: 0,
            block_index: 0,
        };

        let mut foreign = mint(99);
        foreign.entity_addr = format!("entity-contract-{}", hex32("08"));
        let mut other_topic = mint(98);
        other_topic.topic_name = "audit".to_string();
        let mut broken = mint(97);
        broken.message = MessagePayload::String("garbage".to_string());

        let info = TransactionInfo {
            transaction_hash: hex32("ff"),
            timestamp: "2024-11-05T10:00:00.000Z".to_string(),
        };
        let events = decoder.decode(
            &[mint(1), foreign, broken, other_topic, mint(2), mint(3)],
            &info,
        );

        let amounts: Vec<_> = events
            .iter()
            .map(|event| match &event.data {
                Cep18Event::Mint(mint) => mint.amount,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(
            amounts,
            vec![U256::from(1u64), U256::from(2u64), U256::from(3u64)]
        );
        assert!(events.iter().all(|event| event.transaction_info == info));
        assert!(events
            .iter()
            .all(|event| event.contract_address == entity_addr));
    }
}
