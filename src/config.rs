//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub blockchain: BlockchainConfig,
    #[serde(default)]
    pub auth_provider: AuthProviderConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// 静态资源目录，非 API 路径回落到这里
    pub static_root: Option<String>,
    /// 端口被占用时依次尝试后续端口的次数
    pub port_retry_attempts: u16,
    /// 为空表示允许任意来源
    pub cors_allow_origins: Vec<String>,
}

/// JWT配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub secret: String,
    pub token_expiry_secs: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

/// 模拟层配置：所有延迟与失败概率均可注入
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// 固定随机种子（测试与演示复现用）
    pub seed: Option<u64>,

    pub connect_timeout_ms: u64,
    pub connect_failure_rate: f64,
    pub disconnect_delay_ms: u64,
    pub switch_network_delay_ms: u64,
    pub switch_network_failure_rate: f64,
    pub sign_delay_ms: u64,
    pub sign_failure_rate: f64,

    pub quote_delay_ms: u64,
    pub quote_failure_rate: f64,
    pub quote_ttl_secs: u64,
    /// 报价使用的固定滑点（0.005 = 0.5%）
    pub quote_slippage: f64,
    pub swap_fee_rate: f64,
    /// 执行时用户可选滑点范围（百分比）
    pub min_slippage_percent: f64,
    pub max_slippage_percent: f64,

    pub swap_delay_ms: u64,
    pub swap_failure_rate: f64,
    pub transfer_delay_ms: u64,
    pub transfer_failure_rate: f64,
    pub status_delay_ms: u64,
    /// 累计阈值：roll < completed → completed，< pending → pending，其余 failed
    pub status_completed_threshold: f64,
    pub status_pending_threshold: f64,
    /// true 时每次轮询都重新抽样
    pub resample_status: bool,

    /// 同时保留的钱包会话上限
    pub max_sessions: usize,
    /// 仅通过状态轮询出现的未知哈希最多跟踪的数量，超出时淘汰最旧的
    pub max_tracked_unknown: usize,
}

/// 报价有效期上限（秒）
pub const MAX_QUOTE_TTL_SECS: u64 = 24 * 60 * 60;

/// 真实链桥接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// 未配置时使用模拟客户端
    pub rpc_url: Option<String>,
    pub bridge_private_key: Option<String>,
    pub chain_id: u64,
    pub router_address: Option<String>,
    pub rpc_timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub gas_buffer_percent: u64,
}

/// 外部认证服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthProviderConfig {
    /// 未配置时使用内存认证
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 未配置时交易记录保存在内存中
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8088".into()),
            static_root: std::env::var("STATIC_ROOT").ok(),
            port_retry_attempts: env_parse("PORT_RETRY_ATTEMPTS").unwrap_or(3),
            cors_allow_origins: std::env::var("CORS_ALLOW_ORIGINS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| {
                // 警告在 main.rs 中根据实际使用的密钥输出
                "default-jwt-secret-please-change-in-production-min-32-chars".to_string()
            }),
            token_expiry_secs: env_parse("TOKEN_EXPIRY").unwrap_or(3600), // 1小时
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: env_parse("SIM_SEED"),

            connect_timeout_ms: env_parse("SIM_CONNECT_TIMEOUT_MS").unwrap_or(2000),
            connect_failure_rate: env_parse("SIM_CONNECT_FAILURE_RATE").unwrap_or(0.2),
            disconnect_delay_ms: env_parse("SIM_DISCONNECT_DELAY_MS").unwrap_or(500),
            switch_network_delay_ms: env_parse("SIM_SWITCH_NETWORK_DELAY_MS").unwrap_or(1000),
            switch_network_failure_rate: env_parse("SIM_SWITCH_NETWORK_FAILURE_RATE")
                .unwrap_or(0.1),
            sign_delay_ms: env_parse("SIM_SIGN_DELAY_MS").unwrap_or(1500),
            sign_failure_rate: env_parse("SIM_SIGN_FAILURE_RATE").unwrap_or(0.15),

            quote_delay_ms: env_parse("SIM_QUOTE_DELAY_MS").unwrap_or(1500),
            quote_failure_rate: env_parse("SIM_QUOTE_FAILURE_RATE").unwrap_or(0.1),
            quote_ttl_secs: env_parse("SIM_QUOTE_TTL_SECS").unwrap_or(30),
            quote_slippage: 0.005,
            swap_fee_rate: 0.003,
            min_slippage_percent: 0.1,
            max_slippage_percent: 5.0,

            swap_delay_ms: env_parse("SIM_SWAP_DELAY_MS").unwrap_or(3000),
            swap_failure_rate: env_parse("SIM_SWAP_FAILURE_RATE").unwrap_or(0.15),
            transfer_delay_ms: env_parse("SIM_TRANSFER_DELAY_MS").unwrap_or(2000),
            transfer_failure_rate: env_parse("SIM_TRANSFER_FAILURE_RATE").unwrap_or(0.25),
            status_delay_ms: env_parse("SIM_STATUS_DELAY_MS").unwrap_or(1000),
            status_completed_threshold: 0.7,
            status_pending_threshold: 0.9,
            resample_status: env_flag("SIM_RESAMPLE_STATUS").unwrap_or(false),

            max_sessions: env_parse("SIM_MAX_SESSIONS").unwrap_or(10_000),
            max_tracked_unknown: env_parse("SIM_MAX_TRACKED_UNKNOWN").unwrap_or(1024),
        }
    }
}

impl SimulationConfig {
    /// 所有延迟为 0、失败概率为 0 的配置
    pub fn instant() -> Self {
        Self {
            seed: Some(42),
            connect_timeout_ms: 0,
            connect_failure_rate: 0.0,
            disconnect_delay_ms: 0,
            switch_network_delay_ms: 0,
            switch_network_failure_rate: 0.0,
            sign_delay_ms: 0,
            sign_failure_rate: 0.0,
            quote_delay_ms: 0,
            quote_failure_rate: 0.0,
            swap_delay_ms: 0,
            swap_failure_rate: 0.0,
            transfer_delay_ms: 0,
            transfer_failure_rate: 0.0,
            status_delay_ms: 0,
            ..Self::default()
        }
    }
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: std::env::var("RPC_URL").ok().filter(|s| !s.is_empty()),
            bridge_private_key: std::env::var("BRIDGE_PRIVATE_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            chain_id: env_parse("CHAIN_ID").unwrap_or(11155111), // Sepolia
            router_address: std::env::var("SWAP_ROUTER_ADDRESS").ok(),
            rpc_timeout_secs: env_parse("RPC_TIMEOUT_SECS").unwrap_or(30),
            max_retries: env_parse("RPC_MAX_RETRIES").unwrap_or(3),
            initial_backoff_ms: env_parse("RPC_INITIAL_BACKOFF_MS").unwrap_or(500),
            gas_buffer_percent: 20,
        }
    }
}

impl Default for AuthProviderConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("AUTH_PROVIDER_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            api_key: std::env::var("AUTH_PROVIDER_KEY").ok(),
            timeout_secs: env_parse("AUTH_PROVIDER_TIMEOUT_SECS").unwrap_or(10),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            max_connections: env_parse("DB_MAX_CONNS").unwrap_or(8),
            acquire_timeout_secs: env_parse("DB_ACQ_TIMEOUT_SECS").unwrap_or(5),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: ServerConfig::default(),
            jwt: JwtConfig::default(),
            logging: LoggingConfig::default(),
            simulation: SimulationConfig::default(),
            blockchain: BlockchainConfig::default(),
            auth_provider: AuthProviderConfig::default(),
            database: DatabaseConfig::default(),
        })
    }

    /// 从配置文件加载配置，缺失的段和字段使用默认值
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                // 文件中未出现的字段由 Default 回落到环境变量
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        // 验证JWT secret长度
        if self.jwt.secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters");
        }

        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        let sim = &self.simulation;
        let rates = [
            ("connect_failure_rate", sim.connect_failure_rate),
            ("switch_network_failure_rate", sim.switch_network_failure_rate),
            ("sign_failure_rate", sim.sign_failure_rate),
            ("quote_failure_rate", sim.quote_failure_rate),
            ("swap_failure_rate", sim.swap_failure_rate),
            ("transfer_failure_rate", sim.transfer_failure_rate),
            ("quote_slippage", sim.quote_slippage),
            ("swap_fee_rate", sim.swap_fee_rate),
        ];
        for (name, value) in rates {
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                anyhow::bail!("simulation.{} must be within [0, 1], got {}", name, value);
            }
        }

        if !(0.0 < sim.status_completed_threshold
            && sim.status_completed_threshold <= sim.status_pending_threshold
            && sim.status_pending_threshold <= 1.0)
        {
            anyhow::bail!("simulation status thresholds must satisfy 0 < completed <= pending <= 1");
        }

        if !(sim.min_slippage_percent > 0.0 && sim.min_slippage_percent <= sim.max_slippage_percent)
        {
            anyhow::bail!("simulation slippage bounds must satisfy 0 < min <= max");
        }

        if sim.quote_ttl_secs == 0 || sim.quote_ttl_secs > MAX_QUOTE_TTL_SECS {
            anyhow::bail!(
                "SIM_QUOTE_TTL_SECS must be within 1..={}, got {}",
                MAX_QUOTE_TTL_SECS,
                sim.quote_ttl_secs
            );
        }

        if sim.max_sessions == 0 || sim.max_tracked_unknown == 0 {
            anyhow::bail!("simulation.max_sessions and max_tracked_unknown must be positive");
        }

        if self.server.port_retry_attempts > 100 {
            anyhow::bail!("PORT_RETRY_ATTEMPTS must be at most 100");
        }

        if let Some(url) = &self.database.url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                anyhow::bail!("DATABASE_URL must start with postgres:// or postgresql://");
            }
        }

        if self.blockchain.rpc_url.is_some() && self.blockchain.bridge_private_key.is_none() {
            anyhow::bail!("BRIDGE_PRIVATE_KEY is required when RPC_URL is set");
        }

        Ok(())
    }
}
