use std::{sync::Arc, time::Instant};

use anyhow::{Context, Result};

use crate::{
    config::Config,
    infrastructure::{db, jwt::JwtKeys, password::DEFAULT_COST, shutdown::ShutdownSignal},
    repository::{InMemoryTransactionStore, PgTransactionStore, TransactionStore},
    service::{
        auth_provider::{AuthProvider, HttpAuthProvider, InMemoryAuthProvider},
        connection_manager::ConnectionManager,
        ethers_client::EthersEvmClient,
        evm_client::{EvmClient, SimulatedEvmClient},
        market_data::MarketData,
        quote_engine::QuoteEngine,
        sim_runtime::{Simulation, SimulationRuntime, SystemRuntime},
        transaction_simulator::TransactionSimulator,
    },
};

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sim: Simulation,
    pub connections: Arc<ConnectionManager>,
    pub quotes: Arc<QuoteEngine>,
    pub simulator: Arc<TransactionSimulator>,
    pub market: Arc<MarketData>,
    /// 链桥接：默认模拟，配置 RPC 后走 ethers
    pub evm: Arc<dyn EvmClient>,
    pub auth: Arc<dyn AuthProvider>,
    pub store: Arc<dyn TransactionStore>,
    pub jwt: Arc<JwtKeys>,
    pub shutdown: ShutdownSignal,
    pub started_at: Instant,
}

impl AppState {
    /// 只使用进程内协作方（模拟链、内存账户、内存交易记录）
    pub fn new(
        config: Arc<Config>,
        runtime: Arc<dyn SimulationRuntime>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let sim = Simulation::new(runtime, shutdown.clone());
        let sim_config = Arc::new(config.simulation.clone());

        let simulator = Arc::new(TransactionSimulator::new(sim.clone(), sim_config.clone()));
        let evm: Arc<dyn EvmClient> =
            Arc::new(SimulatedEvmClient::new(simulator.clone(), sim.clone()));

        Self {
            connections: Arc::new(ConnectionManager::new(sim.clone(), sim_config.clone())),
            quotes: Arc::new(QuoteEngine::new(sim.clone(), sim_config)),
            market: Arc::new(MarketData::new(sim.clone())),
            simulator,
            evm,
            auth: Arc::new(InMemoryAuthProvider::new(DEFAULT_COST)),
            store: Arc::new(InMemoryTransactionStore::new()),
            jwt: Arc::new(JwtKeys::from_config(&config.jwt)),
            config,
            sim,
            shutdown,
            started_at: Instant::now(),
        }
    }

    /// 按配置接入外部协作方：RPC → ethers，auth_provider.url → HTTP 认证，database.url → Postgres
    pub async fn from_config(config: Arc<Config>, shutdown: ShutdownSignal) -> Result<Self> {
        let runtime = Arc::new(SystemRuntime::new(config.simulation.seed));
        let mut state = Self::new(config.clone(), runtime, shutdown);

        if config.blockchain.rpc_url.is_some() {
            let client = EthersEvmClient::connect(&config.blockchain)
                .await
                .context("Failed to configure ethers bridge client")?;
            state.evm = Arc::new(client);
        }

        if config.auth_provider.url.is_some() {
            let provider = HttpAuthProvider::new(&config.auth_provider)
                .context("Failed to configure auth provider")?;
            state.auth = Arc::new(provider);
        }

        if let Some(url) = config.database.url.as_deref() {
            let pool = db::init_pool(url, &config.database)
                .await
                .context("Failed to connect to database")?;
            state.store = Arc::new(PgTransactionStore::new(pool).await?);
        }

        tracing::info!(
            evm = state.evm.name(),
            auth = state.auth.name(),
            store = state.store.name(),
            "✅ Application state initialized"
        );
        Ok(state)
    }

    pub fn with_evm_client(mut self, evm: Arc<dyn EvmClient>) -> Self {
        self.evm = evm;
        self
    }

    pub fn with_auth_provider(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn TransactionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
