//! Observed Transaction Model
//!
//! Converts raw node transaction payloads into the engine's transaction type
//! and extracts the candidate addresses used for subscriber matching.
//! Calldata inspection is limited to counterparty attribution: ERC-20
//! `transfer(address,uint256)` recipients.

use alloy::primitives::{Address, TxHash, U256};
use alloy::rpc::types::Transaction as RpcTransaction;

/// 4-byte selector of ERC-20 `transfer(address,uint256)`
pub const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Minimum calldata length of an ERC-20 transfer: selector + two 32-byte words
const ERC20_TRANSFER_CALLDATA_LEN: usize = 4 + 32 + 32;

/// Metadata describing a token contract, resolved by a token data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    /// Token contract address
    pub address: Address,
    /// Token name (e.g., "Tether USD")
    pub name: String,
    /// Token symbol (e.g., "USDT")
    pub symbol: String,
    /// Decimal places of the token's base unit
    pub decimals: u8,
}

/// A transaction observed on the chain, as seen by the notification pipeline
///
/// Immutable once constructed. Built by the chain subscriber from stream
/// payloads; the chain name is stamped from the engine configuration before
/// dispatch so hooks can render it.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Transaction hash
    pub hash: TxHash,
    /// Sender address
    pub from: Address,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Transaction value in wei
    pub value: U256,
    /// Name of the chain this transaction was observed on
    pub chain_name: String,
    /// Recipient of an ERC-20 transfer carried in the calldata, if any
    pub token_recipient: Option<Address>,
    /// Metadata of the token contract at `to`, when known
    pub token: Option<TokenMetadata>,
    /// True when observed from the pending (mempool) stream
    pub pending: bool,
}

impl Transaction {
    /// Build a transaction from a raw node payload
    ///
    /// # Arguments
    /// * `tx` - The transaction as delivered by the node
    /// * `chain_name` - Chain name stamped onto the observation
    /// * `pending` - Whether this came from the pending-transaction stream
    pub fn from_rpc(tx: &RpcTransaction, chain_name: &str, pending: bool) -> Self {
        Self {
            hash: tx.hash,
            from: tx.from,
            to: tx.to,
            value: tx.value,
            chain_name: chain_name.to_string(),
            token_recipient: transfer_recipient(&tx.input),
            token: None,
            pending,
        }
    }

    /// Candidate addresses a subscriber could be matched against:
    /// sender, recipient, and the attributed ERC-20 transfer recipient
    pub fn candidate_addresses(&self) -> Vec<Address> {
        let mut candidates = vec![self.from];
        for addr in [self.to, self.token_recipient].into_iter().flatten() {
            if !candidates.contains(&addr) {
                candidates.push(addr);
            }
        }
        candidates
    }

    /// Transaction hash as a 0x-prefixed hex string (the cache key component)
    pub fn hash_hex(&self) -> String {
        format!("{:#x}", self.hash)
    }
}

/// Extract the 4-byte function selector from calldata
///
/// Returns `None` if the input has fewer than 4 bytes.
pub fn extract_selector(input: &[u8]) -> Option<[u8; 4]> {
    if input.len() < 4 {
        return None;
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&input[..4]);
    Some(selector)
}

/// Extract the recipient of an ERC-20 `transfer(address,uint256)` call
///
/// Returns `None` unless the calldata carries the transfer selector and a
/// full first argument word. The address occupies the low 20 bytes of the
/// 32-byte word following the selector.
pub fn transfer_recipient(input: &[u8]) -> Option<Address> {
    if input.len() < ERC20_TRANSFER_CALLDATA_LEN {
        return None;
    }
    if extract_selector(input) != Some(ERC20_TRANSFER_SELECTOR) {
        return None;
    }
    Some(Address::from_slice(&input[16..36]))
}
