pub mod auth_provider;
pub mod connection_manager;
pub mod ethers_client;
pub mod evm_client;
pub mod market_data;
pub mod quote_engine;
pub mod sim_runtime;
pub mod transaction_retry;
pub mod transaction_simulator;
