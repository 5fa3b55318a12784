use std::future::Future;
use std::num::NonZeroU32;

/// 客户端调用的重试策略。
///
/// # 教案式说明
/// - **意图 (Why)**：客户端通常跨越网络，偶发失败应在同一客户端上就地重试，
///   用尽次数后再交给下一个候选客户端；
/// - **契约 (What)**：`max_attempts` 为总尝试次数（首次 + 重试），缺省为 3；
/// - **执行逻辑 (How)**：[`RetryPolicy::run`] 依次驱动操作，每次失败都交给回调观察，
///   重试之间不等待，核心因此不依赖任何计时器或运行时。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: NonZeroU32,
}

impl RetryPolicy {
    pub const DEFAULT_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(3) {
        Some(attempts) => attempts,
        None => NonZeroU32::MIN,
    };

    pub const fn new(max_attempts: NonZeroU32) -> Self {
        Self { max_attempts }
    }

    /// 只尝试一次、不重试的策略。
    pub const fn once() -> Self {
        Self::new(NonZeroU32::MIN)
    }

    pub const fn max_attempts(&self) -> NonZeroU32 {
        self.max_attempts
    }

    /// 驱动 `operation` 直到成功或次数用尽。
    ///
    /// - `operation` 收到从 1 开始的尝试序号；
    /// - 每次失败都会先调用 `on_failure(attempt, &error)`，再决定是否继续；
    /// - 次数用尽时返回最后一次的错误。
    pub async fn run<T, E, Op, Fut, Obs>(&self, mut operation: Op, mut on_failure: Obs) -> Result<T, E>
    where
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Obs: FnMut(u32, &E),
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    on_failure(attempt, &error);
                    if attempt >= self.max_attempts.get() {
                        return Err(error);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS)
    }
}
