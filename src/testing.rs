//! In-memory doubles for the contract and the user port.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use ethers::{
    signers::{LocalWallet, Signer},
    types::{Address, H256, U256},
};

use crate::{
    error::{AppError, AppResult},
    implementations::billing::{BillingContract, ServiceId},
    layers::panel::UserPort,
};

pub const TEST_PHRASE: &str = "test test test test test test test test test test test junk";
pub const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    BalanceOf(Address),
    PayService {
        from: Address,
        service: ServiceId,
        amount: U256,
    },
    MintForUser {
        from: Address,
        user: Address,
        amount: U256,
    },
    RegisterAuthorisedAccount {
        from: Address,
        account: Address,
    },
    Unauthorise {
        from: Address,
        account: Address,
    },
    RegisterService {
        from: Address,
        service_address: Address,
        service: ServiceId,
    },
}

/// Records every call and keeps a toy ledger so balances move like the real contract's.
#[derive(Debug, Default)]
pub struct RecordingContract {
    calls: Mutex<Vec<Call>>,
    balances: Mutex<HashMap<Address, U256>>,
    reject_writes: bool,
    hang_writes: bool,
}

impl RecordingContract {
    pub fn with_balance(owner: Address, balance: u64) -> Self {
        let contract = Self::default();
        contract
            .balances
            .lock()
            .unwrap()
            .insert(owner, U256::from(balance));
        contract
    }

    pub fn rejecting(owner: Address, balance: u64) -> Self {
        Self {
            reject_writes: true,
            ..Self::with_balance(owner, balance)
        }
    }

    /// Writes are recorded but never settle.
    pub fn hanging() -> Self {
        Self {
            hang_writes: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, call: Call) -> AppResult<H256> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.len()
        };
        if self.hang_writes {
            std::future::pending::<()>().await;
        }
        if self.reject_writes {
            return Err(AppError::Contract("execution reverted".into()));
        }
        Ok(H256::from_low_u64_be(count as u64))
    }

    fn adjust(&self, owner: Address, f: impl FnOnce(U256) -> U256) {
        let mut balances = self.balances.lock().unwrap();
        let entry = balances.entry(owner).or_default();
        *entry = f(*entry);
    }
}

impl BillingContract for RecordingContract {
    async fn balance_of(&self, owner: Address) -> AppResult<U256> {
        self.calls.lock().unwrap().push(Call::BalanceOf(owner));
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&owner)
            .copied()
            .unwrap_or_default())
    }

    async fn pay_service(
        &self,
        signer: &LocalWallet,
        service: ServiceId,
        amount: U256,
    ) -> AppResult<H256> {
        let from = signer.address();
        let hash = self
            .record(Call::PayService {
                from,
                service,
                amount,
            })
            .await?;
        self.adjust(from, |balance| balance.saturating_sub(amount));
        Ok(hash)
    }

    async fn mint_for_user(
        &self,
        signer: &LocalWallet,
        user: Address,
        amount: U256,
    ) -> AppResult<H256> {
        let hash = self
            .record(Call::MintForUser {
                from: signer.address(),
                user,
                amount,
            })
            .await?;
        self.adjust(user, |balance| balance.saturating_add(amount));
        Ok(hash)
    }

    async fn register_authorised_account(
        &self,
        signer: &LocalWallet,
        account: Address,
    ) -> AppResult<H256> {
        self.record(Call::RegisterAuthorisedAccount {
            from: signer.address(),
            account,
        })
        .await
    }

    async fn unauthorise(&self, signer: &LocalWallet, account: Address) -> AppResult<H256> {
        self.record(Call::Unauthorise {
            from: signer.address(),
            account,
        })
        .await
    }

    async fn register_service(
        &self,
        signer: &LocalWallet,
        service_address: Address,
        service: ServiceId,
    ) -> AppResult<H256> {
        self.record(Call::RegisterService {
            from: signer.address(),
            service_address,
            service,
        })
        .await
    }
}

/// Answers prompts from a queue; an exhausted queue behaves like a dismissed prompt.
#[derive(Debug, Default)]
pub struct ScriptedPort {
    answers: VecDeque<Option<String>>,
    pub prompts: Vec<(String, Option<String>)>,
    pub notes: Vec<String>,
}

impl ScriptedPort {
    pub fn with_answers(answers: &[Option<&str>]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|answer| answer.map(str::to_string))
                .collect(),
            ..Self::default()
        }
    }
}

impl UserPort for ScriptedPort {
    async fn request_input(
        &mut self,
        message: &str,
        default: Option<&str>,
    ) -> AppResult<Option<String>> {
        self.prompts
            .push((message.to_string(), default.map(str::to_string)));
        Ok(self.answers.pop_front().flatten())
    }

    async fn notify(&mut self, message: &str) -> AppResult<()> {
        self.notes.push(message.to_string());
        Ok(())
    }
}
