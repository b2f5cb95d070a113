use billpanel::{
    config::AppConfig,
    error::{AppError, AppResult},
    implementations::billing::EthBillingContract,
    layers::{
        console::{Console, ConsolePort},
        panel::WalletPanel,
    },
    wallet::WalletManager,
};
use ethers::providers::{Http, Middleware, Provider};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const FALLBACK_CHAIN_ID: u64 = 1;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!("fatal error: {err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    init_tracing();

    info!("loading configuration");
    let config = AppConfig::load()?;

    info!("connecting to provider at {}", config.rpc_url);
    let provider = build_provider(&config.rpc_url)?;
    let chain_id = resolve_chain_id(&provider, config.chain_id).await;

    let contract_address = config.contract_address()?;
    info!("binding billing contract at {contract_address:#x} on chain {chain_id}");
    let contract = EthBillingContract::new(provider, contract_address, config.confirmations);

    let panel = WalletPanel::new(
        contract,
        WalletManager::new(chain_id),
        ConsolePort::stdio(),
        config.bills.clone(),
        config.topup_default,
    );

    Console::new(panel).run().await
}

// Logs go to stderr; stdout belongs to the console.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .init();
}

fn build_provider(url: &str) -> AppResult<Provider<Http>> {
    Provider::<Http>::try_from(url)
        .map_err(|err| AppError::Config(format!("failed to create provider: {err}")))
}

async fn resolve_chain_id(provider: &Provider<Http>, configured: Option<u64>) -> u64 {
    if let Some(chain_id) = configured {
        return chain_id;
    }
    match provider.get_chainid().await {
        Ok(chain_id) => chain_id.as_u64(),
        Err(err) => {
            warn!("could not fetch chain id ({err}), assuming {FALLBACK_CHAIN_ID}");
            FALLBACK_CHAIN_ID
        }
    }
}
