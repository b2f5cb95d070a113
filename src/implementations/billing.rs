use std::sync::Arc;

use ethers::{
    abi::Detokenize,
    contract::builders::ContractCall,
    middleware::SignerMiddleware,
    providers::Middleware,
    signers::LocalWallet,
    types::{Address, H256, U64, U256},
    utils::format_bytes32_string,
};
use ethers_contract::abigen;
use tracing::debug;

use crate::error::{AppError, AppResult};

abigen!(
    BillPayment,
    r#"[
        function payService(bytes32 name, uint256 amount)
        function balanceOf(address owner) view returns (uint256)
        function mintForUser(address user, uint256 amount)
        function registerAuthorisedAccount(address account)
        function unauthorise(address account)
        function registerService(address service, bytes32 name)
    ]"#
);

/// Fixed-width identifier the contract keys services by.
pub type ServiceId = [u8; 32];

/// Longest name that still leaves room for the null terminator.
pub const MAX_SERVICE_NAME_BYTES: usize = 31;

/// Encode a bill/service name as a right-padded `bytes32` string.
/// Names longer than 31 bytes do not fit and are rejected.
pub fn encode_service_name(name: &str) -> AppResult<ServiceId> {
    if name.len() > MAX_SERVICE_NAME_BYTES {
        return Err(AppError::InvalidInput(format!(
            "service name {name:?} is too long: {} bytes, at most {MAX_SERVICE_NAME_BYTES} fit",
            name.len()
        )));
    }
    format_bytes32_string(name)
        .map_err(|err| AppError::InvalidInput(format!("service name {name:?} is too long: {err}")))
}

/// Calls the panel makes against the billing contract. Writes take the signer
/// they should be sent from; the connected handle is built per call.
#[allow(async_fn_in_trait)]
pub trait BillingContract {
    async fn balance_of(&self, owner: Address) -> AppResult<U256>;

    async fn pay_service(
        &self,
        signer: &LocalWallet,
        service: ServiceId,
        amount: U256,
    ) -> AppResult<H256>;

    async fn mint_for_user(
        &self,
        signer: &LocalWallet,
        user: Address,
        amount: U256,
    ) -> AppResult<H256>;

    async fn register_authorised_account(
        &self,
        signer: &LocalWallet,
        account: Address,
    ) -> AppResult<H256>;

    async fn unauthorise(&self, signer: &LocalWallet, account: Address) -> AppResult<H256>;

    async fn register_service(
        &self,
        signer: &LocalWallet,
        service_address: Address,
        service: ServiceId,
    ) -> AppResult<H256>;
}

type SignedClient<M> = SignerMiddleware<M, LocalWallet>;

/// Billing contract reached over an ethers middleware.
#[derive(Debug, Clone)]
pub struct EthBillingContract<M: Middleware> {
    provider: M,
    address: Address,
    reader: BillPayment<M>,
    confirmations: usize,
}

impl<M> EthBillingContract<M>
where
    M: Middleware + Clone + 'static,
{
    pub fn new(provider: M, address: Address, confirmations: usize) -> Self {
        let reader = BillPayment::new(address, Arc::new(provider.clone()));
        Self {
            provider,
            address,
            reader,
            confirmations,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn connect(&self, signer: &LocalWallet) -> BillPayment<SignedClient<M>> {
        let client = SignerMiddleware::new(self.provider.clone(), signer.clone());
        BillPayment::new(self.address, Arc::new(client))
    }

    /// Send the call and wait until it is mined. A reverted or dropped
    /// transaction is an error, not a settled call.
    async fn submit<D>(&self, call: ContractCall<SignedClient<M>, D>, action: &str) -> AppResult<H256>
    where
        D: Detokenize,
    {
        let pending = call
            .send()
            .await
            .map_err(|err| AppError::Contract(format!("{action} submission failed: {err}")))?;
        let tx_hash = *pending;
        debug!("{action} submitted as {tx_hash:#x}");

        let receipt = pending
            .confirmations(self.confirmations)
            .await
            .map_err(|err| AppError::Rpc(format!("{action} {tx_hash:#x} not confirmed: {err}")))?;

        match receipt {
            Some(receipt) if receipt.status == Some(U64::zero()) => Err(AppError::Contract(
                format!("{action} {tx_hash:#x} reverted"),
            )),
            Some(receipt) => Ok(receipt.transaction_hash),
            None => Err(AppError::Contract(format!(
                "{action} {tx_hash:#x} was dropped from the mempool"
            ))),
        }
    }
}

impl<M> BillingContract for EthBillingContract<M>
where
    M: Middleware + Clone + 'static,
{
    async fn balance_of(&self, owner: Address) -> AppResult<U256> {
        self.reader
            .balance_of(owner)
            .call()
            .await
            .map_err(|err| AppError::Rpc(format!("failed to fetch balance: {err}")))
    }

    async fn pay_service(
        &self,
        signer: &LocalWallet,
        service: ServiceId,
        amount: U256,
    ) -> AppResult<H256> {
        debug!("paying service 0x{}", hex::encode(service));
        let contract = self.connect(signer);
        self.submit(contract.pay_service(service, amount), "payService")
            .await
    }

    async fn mint_for_user(
        &self,
        signer: &LocalWallet,
        user: Address,
        amount: U256,
    ) -> AppResult<H256> {
        let contract = self.connect(signer);
        self.submit(contract.mint_for_user(user, amount), "mintForUser")
            .await
    }

    async fn register_authorised_account(
        &self,
        signer: &LocalWallet,
        account: Address,
    ) -> AppResult<H256> {
        let contract = self.connect(signer);
        self.submit(
            contract.register_authorised_account(account),
            "registerAuthorisedAccount",
        )
        .await
    }

    async fn unauthorise(&self, signer: &LocalWallet, account: Address) -> AppResult<H256> {
        let contract = self.connect(signer);
        self.submit(contract.unauthorise(account), "unauthorise")
            .await
    }

    async fn register_service(
        &self,
        signer: &LocalWallet,
        service_address: Address,
        service: ServiceId,
    ) -> AppResult<H256> {
        let contract = self.connect(signer);
        self.submit(
            contract.register_service(service_address, service),
            "registerService",
        )
        .await
    }
}
