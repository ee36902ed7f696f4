//! 模拟运行时：时钟与随机源
//!
//! 所有模拟组件都通过 `SimulationRuntime` 获取延迟、随机数和当前时间，
//! 测试中替换为 `DeterministicRuntime` 即可得到可复现的结果

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

use crate::infrastructure::shutdown::ShutdownSignal;

/// 时钟与随机源
#[async_trait]
pub trait SimulationRuntime: Send + Sync {
    /// 非阻塞等待
    async fn sleep(&self, duration: Duration);

    /// [0, 1) 均匀分布
    fn next_f64(&self) -> f64;

    fn fill_bytes(&self, dest: &mut [u8]);

    fn now(&self) -> DateTime<Utc>;
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // 持锁期间不会 panic，中毒时直接取回数据
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 生产运行时：tokio 定时器 + StdRng
pub struct SystemRuntime {
    rng: Mutex<StdRng>,
}

impl SystemRuntime {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }
}

#[async_trait]
impl SimulationRuntime for SystemRuntime {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    fn next_f64(&self) -> f64 {
        lock(&self.rng).gen::<f64>()
    }

    fn fill_bytes(&self, dest: &mut [u8]) {
        lock(&self.rng).fill_bytes(dest);
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 确定性运行时：固定种子、瞬时 sleep、可编排的随机数、手动时钟
pub struct DeterministicRuntime {
    rng: Mutex<StdRng>,
    scripted_rolls: Mutex<VecDeque<f64>>,
    clock: Mutex<DateTime<Utc>>,
    slept: Mutex<Duration>,
}

impl DeterministicRuntime {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            scripted_rolls: Mutex::new(VecDeque::new()),
            clock: Mutex::new(Utc::now()),
            slept: Mutex::new(Duration::ZERO),
        }
    }

    /// 预设接下来的 next_f64 返回值，用完后回落到种子随机数
    pub fn push_rolls(&self, rolls: &[f64]) {
        lock(&self.scripted_rolls).extend(rolls.iter().copied());
    }

    /// 手动推进时钟
    pub fn advance(&self, duration: Duration) {
        let mut clock = lock(&self.clock);
        *clock += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
    }

    /// 累计的模拟等待时长
    pub fn total_slept(&self) -> Duration {
        *lock(&self.slept)
    }
}

#[async_trait]
impl SimulationRuntime for DeterministicRuntime {
    async fn sleep(&self, duration: Duration) {
        *lock(&self.slept) += duration;
        self.advance(duration);
        tokio::task::yield_now().await;
    }

    fn next_f64(&self) -> f64 {
        if let Some(roll) = lock(&self.scripted_rolls).pop_front() {
            return roll;
        }
        lock(&self.rng).gen::<f64>()
    }

    fn fill_bytes(&self, dest: &mut [u8]) {
        lock(&self.rng).fill_bytes(dest);
    }

    fn now(&self) -> DateTime<Utc> {
        *lock(&self.clock)
    }
}

/// 模拟等待被关闭信号打断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// 模拟组件共用的运行时句柄
#[derive(Clone)]
pub struct Simulation {
    runtime: Arc<dyn SimulationRuntime>,
    shutdown: ShutdownSignal,
}

impl Simulation {
    pub fn new(runtime: Arc<dyn SimulationRuntime>, shutdown: ShutdownSignal) -> Self {
        Self { runtime, shutdown }
    }

    /// 模拟延迟；关闭信号触发时提前返回 Cancelled
    pub async fn delay(&self, millis: u64) -> Result<(), Cancelled> {
        if self.shutdown.is_triggered() {
            return Err(Cancelled);
        }
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = self.runtime.sleep(Duration::from_millis(millis)) => Ok(()),
            _ = shutdown.wait() => Err(Cancelled),
        }
    }

    /// 以给定概率注入失败
    pub fn fails(&self, probability: f64) -> bool {
        self.runtime.next_f64() < probability
    }

    pub fn roll(&self) -> f64 {
        self.runtime.next_f64()
    }

    /// [0, upper) 均匀分布
    pub fn uniform(&self, upper: f64) -> f64 {
        self.runtime.next_f64() * upper
    }

    /// `0x` + 2 * len 位小写 hex
    pub fn random_hex(&self, len: usize) -> String {
        let mut bytes = vec![0u8; len];
        self.runtime.fill_bytes(&mut bytes);
        format!("0x{}", hex::encode(bytes))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.runtime.now()
    }
}
