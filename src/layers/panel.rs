use ethers::types::{Address, U256};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::{AppError, AppResult},
    implementations::{
        amount,
        billing::{BillingContract, encode_service_name},
    },
    types::{Command, Role, Session},
    wallet::{WalletHandle, WalletManager},
};

/// How the panel talks to the person using it: ask for a value, or tell them something.
#[allow(async_fn_in_trait)]
pub trait UserPort {
    /// `Ok(None)` means the prompt was dismissed without an answer.
    async fn request_input(
        &mut self,
        message: &str,
        default: Option<&str>,
    ) -> AppResult<Option<String>>;

    async fn notify(&mut self, message: &str) -> AppResult<()>;
}

/// Session owner. Turns user actions into contract calls and keeps the cached
/// balance in step with the chain.
pub struct WalletPanel<C, U> {
    contract: C,
    wallets: WalletManager,
    ui: U,
    session: Session,
    wallet: Option<WalletHandle>,
    topup_default: u64,
}

impl<C, U> WalletPanel<C, U>
where
    C: BillingContract,
    U: UserPort,
{
    pub fn new(
        contract: C,
        wallets: WalletManager,
        ui: U,
        bills: Vec<String>,
        topup_default: u64,
    ) -> Self {
        Self {
            contract,
            wallets,
            ui,
            session: Session::new(bills),
            wallet: None,
            topup_default,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn contract(&self) -> &C {
        &self.contract
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }

    /// Run one action to completion. Failures end here: they are logged and
    /// reported to the user, so no call is left unobserved. Only a broken
    /// user port is returned to the caller.
    pub async fn perform(&mut self, command: Command) -> AppResult<()> {
        let outcome = match command {
            Command::ChangeRole(role) => {
                self.change_role(role);
                Ok(())
            }
            Command::CreateWallet => self.create_wallet().await,
            Command::OpenWallet(phrase) => {
                if let Some(phrase) = phrase {
                    self.set_mnemonic_input(phrase);
                }
                self.open_wallet().await
            }
            Command::PayBill(name) => self.pay_bill(&name).await,
            Command::TopupWallet => self.topup_wallet().await,
            Command::Refresh => self.refresh_balance(self.session.wallet_address).await,
            Command::Authorise => self.admin_authorise_address().await,
            Command::Unauthorise => self.admin_revoke_address().await,
            Command::RegisterService(name) => self.auth_register_service(&name).await,
            // Front-end concerns, nothing to do on the panel.
            Command::Status | Command::Help | Command::Quit => Ok(()),
        };

        if let Err(err) = outcome {
            match &err {
                AppError::InvalidInput(_) | AppError::InvalidMnemonic(_) => {
                    warn!("action rejected: {err}")
                }
                _ => error!("action failed: {err}"),
            }
            self.ui.notify(&err.user_message()).await?;
        }
        Ok(())
    }

    pub fn change_role(&mut self, role: Role) {
        debug!("switching view to {role:?}");
        self.session.role = role;
    }

    pub fn set_mnemonic_input(&mut self, phrase: impl Into<String>) {
        self.session.mnemonic_input = phrase.into();
    }

    /// Generate a fresh wallet. Does nothing while a wallet is loaded.
    #[instrument(skip(self))]
    pub async fn create_wallet(&mut self) -> AppResult<()> {
        if self.wallet.is_some() {
            debug!("wallet already loaded, not creating another");
            return Ok(());
        }

        let handle = self.wallets.create_random()?;
        let address = handle.address();
        self.session.mnemonic_input = handle.mnemonic().to_string();
        self.install_wallet(handle);
        info!("created wallet {address:#x}");

        self.ui
            .notify(&format!(
                "Created wallet {address:#x}. Write down its mnemonic: {}",
                self.session.mnemonic_input
            ))
            .await?;
        self.refresh_balance(Some(address)).await
    }

    /// Derive the wallet for the current mnemonic input. On a bad phrase the
    /// loaded wallet and balance stay as they were.
    #[instrument(skip(self))]
    pub async fn open_wallet(&mut self) -> AppResult<()> {
        let handle = self.wallets.from_mnemonic(&self.session.mnemonic_input)?;
        let address = handle.address();
        self.install_wallet(handle);
        info!("opened wallet {address:#x}");

        self.ui
            .notify(&format!("Opened wallet {address:#x}"))
            .await?;
        self.refresh_balance(Some(address)).await
    }

    #[instrument(skip(self))]
    pub async fn pay_bill(&mut self, name: &str) -> AppResult<()> {
        let name = self.known_bill(name)?;
        let signer = self.require_wallet()?.clone();

        let answer = self
            .ui
            .request_input(
                &format!("Pay the {name} bill; how much would you like to pay?"),
                None,
            )
            .await?;
        let amount = amount::bill_amount(answer.as_deref()).ok_or_else(|| {
            AppError::InvalidInput(format!("Invalid amount entered, not paying bill {name}"))
        })?;

        // The confirmation echoes what was typed; the contract gets whole units.
        let entered = answer.as_deref().map(str::trim).unwrap_or_default();

        let service = encode_service_name(&name)?;
        let tx_hash = self
            .contract
            .pay_service(signer.signer(), service, amount)
            .await?;
        info!("paid {amount} towards {name} in {tx_hash:#x}");

        self.ui
            .notify(&format!(
                "Payment accepted and processed {name} - total amount {entered}"
            ))
            .await?;
        self.refresh_balance(Some(signer.address())).await
    }

    /// Overwrite the cached balance with the contract's view. No wallet, no call.
    #[instrument(skip(self))]
    pub async fn refresh_balance(&mut self, wallet: Option<Address>) -> AppResult<()> {
        let Some(owner) = wallet else {
            debug!("no wallet loaded, skipping balance refresh");
            return Ok(());
        };

        let balance = self.contract.balance_of(owner).await?;
        debug!("balance for {owner:#x} is {balance}");
        self.session.cached_balance = balance;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn request_topup(&mut self, amount: U256) -> AppResult<()> {
        let signer = self.require_wallet()?.clone();
        let user = signer.address();

        let tx_hash = self
            .contract
            .mint_for_user(signer.signer(), user, amount)
            .await?;
        info!("minted {amount} for {user:#x} in {tx_hash:#x}");

        self.ui
            .notify(&format!("Top-up of {amount} processed"))
            .await?;
        self.refresh_balance(Some(user)).await
    }

    #[instrument(skip(self))]
    pub async fn topup_wallet(&mut self) -> AppResult<()> {
        self.require_wallet()?;

        let default = self.topup_default.to_string();
        let answer = self
            .ui
            .request_input("Please enter amount to top-up", Some(&default))
            .await?;
        let amount = amount::topup_amount(answer.as_deref())
            .ok_or_else(|| AppError::InvalidInput("invalid total".into()))?;

        self.request_topup(amount).await
    }

    #[instrument(skip(self))]
    pub async fn admin_authorise_address(&mut self) -> AppResult<()> {
        let signer = self.require_wallet()?.clone();
        let account = self
            .prompt_address("Please enter an address to authorise for management services")
            .await?;

        let tx_hash = self
            .contract
            .register_authorised_account(signer.signer(), account)
            .await?;
        info!("authorised {account:#x} in {tx_hash:#x}");

        self.ui
            .notify(&format!(
                "Registration Successful,{account:#x} is now an authorised address for management services"
            ))
            .await
    }

    #[instrument(skip(self))]
    pub async fn admin_revoke_address(&mut self) -> AppResult<()> {
        let signer = self.require_wallet()?.clone();
        let account = self
            .prompt_address(
                "Please enter an address to remove authorisation for management services",
            )
            .await?;

        let tx_hash = self.contract.unauthorise(signer.signer(), account).await?;
        info!("unauthorised {account:#x} in {tx_hash:#x}");

        self.ui
            .notify(&format!(
                "Execution Successful,{account:#x} is now an unauthorised address for management services"
            ))
            .await
    }

    /// Map a bill name to a payment service address. Without a loaded wallet
    /// this is a no-op: no prompt, no call.
    #[instrument(skip(self))]
    pub async fn auth_register_service(&mut self, name: &str) -> AppResult<()> {
        let Some(signer) = self.wallet.clone() else {
            debug!("no wallet loaded, ignoring service registration");
            return Ok(());
        };
        let name = self.known_bill(name)?;

        let service_address = self
            .prompt_address(&format!(
                "Please enter an address to register as the {name} payment service"
            ))
            .await?;
        let service = encode_service_name(&name)?;

        let tx_hash = self
            .contract
            .register_service(signer.signer(), service_address, service)
            .await?;
        info!("registered {service_address:#x} for {name} in {tx_hash:#x}");

        self.ui
            .notify(&format!(
                "Registration Successful,{service_address:#x} is now mapped to {name} payment service"
            ))
            .await
    }

    fn install_wallet(&mut self, handle: WalletHandle) {
        self.session.wallet_address = Some(handle.address());
        self.wallet = Some(handle);
    }

    fn require_wallet(&self) -> AppResult<&WalletHandle> {
        self.wallet
            .as_ref()
            .ok_or_else(|| AppError::Wallet("open or create a wallet first".into()))
    }

    fn known_bill(&self, name: &str) -> AppResult<String> {
        self.session
            .resolve_bill(name)
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInput(format!("unknown bill: {name}")))
    }

    async fn prompt_address(&mut self, message: &str) -> AppResult<Address> {
        let answer = self.ui.request_input(message, None).await?;
        let raw = answer.as_deref().map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(AppError::InvalidInput("no address entered".into()));
        }
        raw.parse::<Address>()
            .map_err(|_| AppError::InvalidInput(format!("{raw} is not a valid address")))
    }
}
