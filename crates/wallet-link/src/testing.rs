//! Simulated wallet for tests

use std::collections::HashMap;

use crypto_session::{
    derive_shared_secret, encrypt, EncryptionPublicKey, Envelope, KeyPair, SharedSecret,
};
use link_protocol::{params, ConnectResponse, ProtocolResult, SignAndSendPayload, SignResponse};
use url::Url;

use crate::{MemoInstruction, SignableTransaction};

pub(crate) fn query(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

pub(crate) fn dapp_key_of(url: &Url) -> EncryptionPublicKey {
    let key = &query(url)[params::DAPP_ENCRYPTION_PUBLIC_KEY];
    EncryptionPublicKey::from_base58("dapp", key).unwrap()
}

/// Wallet side of the protocol, as the real app implements it
pub(crate) struct TestWallet {
    pub keypair: KeyPair,
}

impl TestWallet {
    pub fn new() -> Self {
        Self {
            keypair: KeyPair::generate().unwrap(),
        }
    }

    pub fn secret_with(&self, dapp: &EncryptionPublicKey) -> SharedSecret {
        derive_shared_secret(&self.keypair, dapp).unwrap()
    }

    fn redirect(callback: &str, pairs: &[(&str, String)]) -> String {
        let mut url = Url::parse(&format!("walletlink://{}", callback)).unwrap();
        for (key, value) in pairs {
            url.query_pairs_mut().append_pair(key, value);
        }
        url.to_string()
    }

    /// Success redirect for the connect link `link`
    pub fn approve_connect(&self, link: &Url, public_key: &str, session: &str) -> String {
        let secret = self.secret_with(&dapp_key_of(link));
        let body = ConnectResponse {
            public_key: public_key.to_string(),
            session: session.to_string(),
        };
        let envelope = encrypt(&body, &secret).unwrap();

        Self::redirect(
            "onConnect",
            &[
                (params::WALLET_ENCRYPTION_PUBLIC_KEY, self.keypair.public_key().to_base58()),
                (params::NONCE, envelope.nonce_base58()),
                (params::DATA, envelope.ciphertext_base58()),
            ],
        )
    }

    /// Decrypt the payload of a sign-and-send link
    pub fn open_sign_link(&self, link: &Url) -> SignAndSendPayload {
        let query_params = query(link);
        let envelope =
            Envelope::from_base58(&query_params[params::NONCE], &query_params[params::PAYLOAD])
                .unwrap();
        crypto_session::decrypt(&envelope, &self.secret_with(&dapp_key_of(link))).unwrap()
    }

    /// Success redirect for the sign-and-send link `link`
    pub fn approve_sign(&self, link: &Url, signature: &str) -> String {
        let secret = self.secret_with(&dapp_key_of(link));
        let envelope = encrypt(
            &SignResponse {
                signature: signature.to_string(),
            },
            &secret,
        )
        .unwrap();

        Self::redirect(
            "onSignAndSendTransaction",
            &[
                (params::NONCE, envelope.nonce_base58()),
                (params::DATA, envelope.ciphertext_base58()),
            ],
        )
    }

    pub fn reject(callback: &str, code: &str, message: &str) -> String {
        Self::redirect(
            callback,
            &[
                (params::ERROR_CODE, code.to_string()),
                (params::ERROR_MESSAGE, message.to_string()),
            ],
        )
    }
}

/// Transaction that records what the session did to it
#[derive(Debug, Default, Clone)]
pub(crate) struct MockTransaction {
    pub fee_payer: Option<String>,
    pub memos: Vec<MemoInstruction>,
}

impl SignableTransaction for MockTransaction {
    fn set_fee_payer(&mut self, wallet_public_key: &str) -> ProtocolResult<()> {
        self.fee_payer = Some(wallet_public_key.to_string());
        Ok(())
    }

    fn attach_memo(&mut self, memo: MemoInstruction) -> ProtocolResult<()> {
        self.memos.push(memo);
        Ok(())
    }

    fn serialize_unsigned(&self) -> ProtocolResult<Vec<u8>> {
        let mut bytes = self.fee_payer.clone().unwrap_or_default().into_bytes();
        for memo in &self.memos {
            bytes.push(0);
            bytes.extend_from_slice(memo.data());
        }
        Ok(bytes)
    }
}
