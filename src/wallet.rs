use std::path::Path;

use ethers::{
    core::rand::thread_rng,
    signers::{
        LocalWallet, MnemonicBuilder, Signer,
        coins_bip39::{English, Mnemonic},
    },
    types::Address,
};

use crate::error::{AppError, AppResult};

const MNEMONIC_WORD_COUNT: usize = 12;

/// A signing wallet plus the phrase it was derived from.
#[derive(Debug, Clone)]
pub struct WalletHandle {
    signer: LocalWallet,
    mnemonic: String,
}

impl WalletHandle {
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &LocalWallet {
        &self.signer
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }
}

/// Builds wallet handles bound to the provider's chain id.
#[derive(Debug, Clone, Copy)]
pub struct WalletManager {
    chain_id: u64,
}

impl WalletManager {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Fresh 12-word English phrase, first account on the default Ethereum path.
    pub fn create_random(&self) -> AppResult<WalletHandle> {
        let mut rng = thread_rng();
        let mnemonic = Mnemonic::<English>::new_with_count(&mut rng, MNEMONIC_WORD_COUNT)
            .map_err(|err| AppError::Wallet(format!("failed to generate mnemonic: {err}")))?;
        let phrase = mnemonic.to_phrase();
        self.derive(&phrase)
            .map_err(|err| AppError::Wallet(format!("failed to derive generated wallet: {err}")))
    }

    /// Derive the wallet for a user-supplied phrase. Whitespace is normalised
    /// first; the original input is echoed back on failure.
    ///
    /// Only a valid English BIP-39 phrase is accepted. Input naming an existing
    /// path is refused, since `MnemonicBuilder` would read the phrase from disk.
    pub fn from_mnemonic(&self, phrase: &str) -> AppResult<WalletHandle> {
        let normalised = normalise_phrase(phrase);
        if normalised.is_empty() || Path::new(&normalised).exists() {
            return Err(AppError::InvalidMnemonic(phrase.to_string()));
        }
        Mnemonic::<English>::new_from_phrase(&normalised)
            .map_err(|_| AppError::InvalidMnemonic(phrase.to_string()))?;
        self.derive(&normalised)
            .map_err(|_| AppError::InvalidMnemonic(phrase.to_string()))
    }

    fn derive(&self, phrase: &str) -> Result<WalletHandle, ethers::signers::WalletError> {
        let signer = MnemonicBuilder::<English>::default()
            .phrase(phrase)
            .build()?
            .with_chain_id(self.chain_id);
        Ok(WalletHandle {
            signer,
            mnemonic: phrase.to_string(),
        })
    }
}

fn normalise_phrase(phrase: &str) -> String {
    phrase.split_whitespace().collect::<Vec<_>>().join(" ")
}
