//! Transactions handed to the wallet for signing

use link_protocol::{ProtocolError, ProtocolResult};

/// SPL Memo program
pub const MEMO_PROGRAM_ID: &str = "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr";

/// Memo instruction: UTF-8 data, no account keys
///
/// Memos are recorded on chain in the clear and are not covered by the
/// encrypted channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoInstruction {
    text: String,
}

impl MemoInstruction {
    pub fn new(text: impl Into<String>) -> ProtocolResult<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(ProtocolError::invalid("memo", "empty memo"));
        }
        Ok(Self { text })
    }

    pub fn program_id(&self) -> &'static str {
        MEMO_PROGRAM_ID
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn data(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

/// A transaction the chain layer prepares for the wallet
///
/// The session sets the fee payer to the connected wallet and optionally
/// appends a memo before serializing.
pub trait SignableTransaction: Send {
    fn set_fee_payer(&mut self, wallet_public_key: &str) -> ProtocolResult<()>;

    fn attach_memo(&mut self, memo: MemoInstruction) -> ProtocolResult<()>;

    /// Wire bytes, without requiring any signatures
    fn serialize_unsigned(&self) -> ProtocolResult<Vec<u8>>;
}

/// Transaction bytes that were serialized elsewhere
///
/// The fee payer is already fixed and instructions can no longer be added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedTransaction(pub Vec<u8>);

impl SignableTransaction for SerializedTransaction {
    fn set_fee_payer(&mut self, _wallet_public_key: &str) -> ProtocolResult<()> {
        Ok(())
    }

    fn attach_memo(&mut self, _memo: MemoInstruction) -> ProtocolResult<()> {
        Err(ProtocolError::invalid(
            "memo",
            "pre-serialized transaction cannot take a memo instruction",
        ))
    }

    fn serialize_unsigned(&self) -> ProtocolResult<Vec<u8>> {
        if self.0.is_empty() {
            return Err(ProtocolError::invalid("transaction", "empty transaction"));
        }
        Ok(self.0.clone())
    }
}
