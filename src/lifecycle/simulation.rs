//! Progress sources for the simulated upload.

use uuid::Uuid;

/// 模拟上传的进度来源
pub trait ProgressSource: Send + 'static {
    /// 下一次进度增量，取值 (0, max]
    fn next_increment(&mut self) -> f64;

    /// 本次进度更新是否失败
    fn should_fail(&mut self) -> bool {
        false
    }
}

/// Uniform sample in `[0, 1)`.
///
/// The low 53 bits of a v4 uuid come straight from the OS rng, the
/// version and variant bits all live above them.
fn unit_sample() -> f64 {
    let (_, low) = Uuid::new_v4().as_u64_pair();
    (low & ((1u64 << 53) - 1)) as f64 / (1u64 << 53) as f64
}

/// 单次进度增量的上限（百分点）
pub const MAX_INCREMENT: f64 = 15.0;

/// 随机增量，默认的模拟方式
#[derive(Debug, Clone)]
pub struct RandomIncrements {
    max_increment: f64,
    failure_rate: f64,
}

impl RandomIncrements {
    /// `max_increment` is clamped into `(0, MAX_INCREMENT]`.
    pub fn new(max_increment: f64, failure_rate: f64) -> Self {
        let max_increment = if max_increment.is_nan() { MAX_INCREMENT } else { max_increment };
        Self {
            max_increment: max_increment.clamp(f64::MIN_POSITIVE, MAX_INCREMENT),
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

impl ProgressSource for RandomIncrements {
    fn next_increment(&mut self) -> f64 {
        self.max_increment * (1.0 - unit_sample())
    }

    fn should_fail(&mut self) -> bool {
        self.failure_rate > 0.0 && unit_sample() < self.failure_rate
    }
}

/// 固定增量，可在指定的第 n 次更新时失败
#[derive(Debug, Clone)]
pub struct FixedIncrements {
    step: f64,
    fail_on_tick: Option<u32>,
    ticks: u32,
}

impl FixedIncrements {
    pub fn new(step: f64) -> Self {
        Self {
            step,
            fail_on_tick: None,
            ticks: 0,
        }
    }

    /// Fail on the `tick`-th increment (1-based), once.
    pub fn failing_on(mut self, tick: u32) -> Self {
        self.fail_on_tick = Some(tick);
        self
    }
}

impl ProgressSource for FixedIncrements {
    fn next_increment(&mut self) -> f64 {
        self.step
    }

    fn should_fail(&mut self) -> bool {
        self.ticks += 1;
        if self.fail_on_tick == Some(self.ticks) {
            self.fail_on_tick = None;
            return true;
        }
        false
    }
}
