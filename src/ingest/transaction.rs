/// Resolution of create transactions into launch details

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

use crate::core::LaunchDetails;

/// Account positions inside the pump.fun create instruction
pub mod create_accounts {
    pub const MINT: usize = 0;
    pub const MINT_AUTHORITY: usize = 1;
    pub const BONDING_CURVE: usize = 2;
    pub const ASSOCIATED_BONDING_CURVE: usize = 3;
    pub const GLOBAL: usize = 4;
    pub const METADATA: usize = 6;
    pub const CREATOR: usize = 7;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Transaction has no message")]
    MissingMessage,

    #[error("Transaction message has no account keys")]
    EmptyAccountKeys,

    #[error("No instruction for program {0}")]
    InstructionNotFound(String),

    #[error("Instruction account position {0} could not be resolved")]
    MissingAccount(usize),
}

/// `getTransaction` result
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionEnvelope {
    pub transaction: Option<EncodedTransaction>,
    pub meta: Option<TransactionMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncodedTransaction {
    pub message: Option<TransactionMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    pub loaded_addresses: Option<LoadedAddresses>,
}

/// Addresses the node loaded from lookup tables, in runtime order
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoadedAddresses {
    #[serde(default)]
    pub writable: Vec<String>,
    #[serde(default)]
    pub readonly: Vec<String>,
}

/// Account key in either raw (`"..."`) or parsed (`{"pubkey": "..."}`) form
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AccountKey {
    Plain(String),
    Parsed { pubkey: String },
}

impl AccountKey {
    pub fn as_str(&self) -> &str {
        match self {
            AccountKey::Plain(key) => key,
            AccountKey::Parsed { pubkey } => pubkey,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressTableLookup {
    pub account_key: String,
    #[serde(default)]
    pub writable_indexes: Vec<u8>,
    #[serde(default)]
    pub readonly_indexes: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledInstruction {
    pub program_id_index: usize,
    #[serde(default)]
    pub accounts: Vec<usize>,
}

/// Transaction message in legacy or versioned layout
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMessage {
    /// Static keys as the node returns them for legacy and v0 messages
    pub account_keys: Option<Vec<AccountKey>>,
    /// Static keys in the versioned-message layout
    pub static_account_keys: Option<Vec<String>>,
    #[serde(default)]
    pub address_table_lookups: Vec<AddressTableLookup>,
    #[serde(default)]
    pub instructions: Vec<CompiledInstruction>,
}

/// Build the full account key list an instruction's indexes refer to:
/// static keys first, then lookup-table keys (writable, then readonly)
pub fn resolve_account_keys(message: &TransactionMessage, loaded: Option<&LoadedAddresses>) -> Vec<String> {
    let mut keys: Vec<String> = match (&message.account_keys, &message.static_account_keys) {
        (Some(keys), _) => keys.iter().map(|k| k.as_str().to_string()).collect(),
        (None, Some(keys)) => keys.clone(),
        (None, None) => return Vec::new(),
    };

    match loaded {
        Some(loaded) if !loaded.writable.is_empty() || !loaded.readonly.is_empty() => {
            keys.extend(loaded.writable.iter().cloned());
            keys.extend(loaded.readonly.iter().cloned());
        }
        _ => {
            // Table contents unknown: each lookup stands in with its table key
            for lookup in &message.address_table_lookups {
                keys.extend(lookup.writable_indexes.iter().map(|_| lookup.account_key.clone()));
            }
            for lookup in &message.address_table_lookups {
                keys.extend(lookup.readonly_indexes.iter().map(|_| lookup.account_key.clone()));
            }
        }
    }

    keys
}

/// Locate the program's create instruction and pull its identifying accounts
pub fn extract_launch(
    envelope: &TransactionEnvelope,
    program_id: &str,
    signature: &str,
) -> Result<LaunchDetails, ResolveError> {
    let message = envelope
        .transaction
        .as_ref()
        .and_then(|tx| tx.message.as_ref())
        .ok_or(ResolveError::MissingMessage)?;

    let loaded = envelope.meta.as_ref().and_then(|m| m.loaded_addresses.as_ref());
    let keys = resolve_account_keys(message, loaded);
    if keys.is_empty() {
        return Err(ResolveError::EmptyAccountKeys);
    }

    let instruction = message
        .instructions
        .iter()
        .find(|ix| keys.get(ix.program_id_index).map(String::as_str) == Some(program_id))
        .ok_or_else(|| ResolveError::InstructionNotFound(program_id.to_string()))?;

    let key_at = |position: usize| -> Option<String> {
        instruction
            .accounts
            .get(position)
            .and_then(|&index| keys.get(index))
            .cloned()
    };

    let mint = key_at(create_accounts::MINT).ok_or(ResolveError::MissingAccount(create_accounts::MINT))?;
    let bonding_curve = key_at(create_accounts::BONDING_CURVE)
        .ok_or(ResolveError::MissingAccount(create_accounts::BONDING_CURVE))?;

    Ok(LaunchDetails {
        mint,
        mint_authority: key_at(create_accounts::MINT_AUTHORITY),
        bonding_curve,
        associated_bonding_curve: key_at(create_accounts::ASSOCIATED_BONDING_CURVE),
        global: key_at(create_accounts::GLOBAL),
        metadata: key_at(create_accounts::METADATA),
        creator: key_at(create_accounts::CREATOR),
        signature: signature.to_string(),
        timestamp: Utc::now(),
    })
}
