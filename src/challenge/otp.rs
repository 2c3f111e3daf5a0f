//! OTP 质询实现
//!
//! 提供一次性验证码质询的创建、投递与校验。
//!
//! ## 工作流程
//!
//! 1. 编排器决定发起 OTP 质询
//! 2. [`OtpChallengeProvider`] 生成随机数字验证码并落库（同一主体只保留最新一条）
//! 3. 通过 [`Notifier`](crate::notify::Notifier) 把验证码发给用户；
//!    发送失败不回滚已落库的质询，用户可请求重发
//! 4. 用户提交验证码，[`OtpVerifier`] 校验并返回类型化结果
//! 5. 校验通过后质询记录立即删除（一次性使用）
//!
//! ## 并发约定
//!
//! 同一主体的两次校验可能并发执行。失配时的尝试计数必须由存储层
//! 原子地加一（[`OtpChallengeStore::increment_attempts`]），
//! 而不是在应用代码里读-改-写，否则并发失配会互相覆盖计数。

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::clock::{Clock, SystemClock};
use crate::directory::IdentityDirectory;
use crate::error::Result;
use crate::notify::Notifier;
use crate::random::{constant_time_compare_str, generate_numeric_code};

// ============================================================================
// 配置
// ============================================================================

/// OTP 质询配置
#[derive(Debug, Clone)]
pub struct OtpConfig {
    /// 验证码长度（数字位数）
    pub code_length: usize,

    /// 验证码有效期
    pub ttl: std::time::Duration,

    /// 最大尝试次数（达到后拒绝校验，需重新生成）
    pub max_attempts: u32,

    /// 发件地址（必填）
    pub source_address: String,

    /// 邮件主题
    pub subject_line: String,
}

impl OtpConfig {
    /// 创建新配置
    ///
    /// # Arguments
    ///
    /// * `source_address` - 发件地址，不能为空
    pub fn new(source_address: impl Into<String>) -> Self {
        Self {
            code_length: 6,
            ttl: std::time::Duration::from_secs(5 * 60),
            max_attempts: 3,
            source_address: source_address.into(),
            subject_line: "Your login code".to_string(),
        }
    }

    /// 设置验证码长度
    pub fn with_code_length(mut self, length: usize) -> Self {
        self.code_length = length;
        self
    }

    /// 设置有效期
    pub fn with_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// 设置最大尝试次数
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// 设置邮件主题
    pub fn with_subject_line(mut self, subject: impl Into<String>) -> Self {
        self.subject_line = subject.into();
        self
    }

    /// 校验配置
    ///
    /// # Errors
    ///
    /// - 发件地址为空
    /// - 验证码长度不在 4..=10 之间
    /// - 最大尝试次数为 0
    /// - 有效期为 0
    pub fn validate(&self) -> Result<()> {
        if self.source_address.trim().is_empty() {
            return Err(crate::error::Error::missing_config("source_address"));
        }
        if !(4..=10).contains(&self.code_length) {
            return Err(crate::error::Error::invalid_config(
                "code_length",
                "must be between 4 and 10",
            ));
        }
        if self.max_attempts == 0 {
            return Err(crate::error::Error::invalid_config(
                "max_attempts",
                "must be at least 1",
            ));
        }
        if self.ttl.is_zero() {
            return Err(crate::error::Error::invalid_config(
                "ttl",
                "must be non-zero",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// 数据结构
// ============================================================================

/// 一条 OTP 质询记录
///
/// 以主体标识为键持久化；同一主体同时只有一条在途质询，
/// 新建会整体替换旧记录。`expires_at` 同时作为存储层的 TTL 属性，
/// 即使记录从未被显式删除，最终也会被过期清理。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpChallenge {
    /// 主体标识（邮箱）
    pub subject: String,

    /// 验证码
    pub code: String,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 过期时间
    pub expires_at: DateTime<Utc>,

    /// 已失败的尝试次数
    pub attempts: u32,

    /// 最大尝试次数
    pub max_attempts: u32,
}

impl OtpChallenge {
    /// 在指定时刻是否已过期
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// 剩余尝试次数
    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }
}

/// 质询创建结果
///
/// 质询记录加上投递状态：`delivered == false` 表示发送失败，
/// 但质询本身已生效，可通过重发补救。
#[derive(Debug, Clone)]
pub struct CreatedChallenge {
    /// 已落库的质询
    pub challenge: OtpChallenge,

    /// 验证码是否成功投递
    pub delivered: bool,
}

/// 原子加一的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    /// 已加一，携带新的尝试次数
    Incremented(u32),
    /// 已达上限（或记录不存在），拒绝加一
    Refused,
}

/// OTP 校验结果
///
/// 所有可恢复的结果都在这里，调用方据此决定面向用户的提示；
/// 只有存储/依赖故障才会以 `Err` 返回。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// 验证码正确，质询已删除
    Correct,
    /// 验证码错误，还可再试 `remaining_attempts` 次
    Mismatch {
        /// 剩余尝试次数（至少为 1；降到 0 时直接返回 `AttemptsExceeded`）
        remaining_attempts: u32,
    },
    /// 质询已过期
    Expired,
    /// 尝试次数已达上限
    AttemptsExceeded,
    /// 没有在途质询
    NotFound,
}

impl VerifyOutcome {
    /// 是否校验成功
    pub fn is_correct(&self) -> bool {
        matches!(self, VerifyOutcome::Correct)
    }
}

// ============================================================================
// 存储接口
// ============================================================================

/// OTP 质询存储接口
///
/// 实现此 trait 以提供自定义的存储后端（如 Redis、DynamoDB 等）。
/// 持久化的记录必须携带 TTL 属性（取 `expires_at`），保证过期记录最终被清除。
#[async_trait]
pub trait OtpChallengeStore: Send + Sync {
    /// 保存质询，整体替换该主体已有的记录
    async fn put(&self, challenge: &OtpChallenge) -> Result<()>;

    /// 获取主体的在途质询
    async fn get(&self, subject: &str) -> Result<Option<OtpChallenge>>;

    /// 删除主体的在途质询
    async fn delete(&self, subject: &str) -> Result<()>;

    /// 原子地把尝试次数加一
    ///
    /// 必须在存储层以条件更新实现：当前值已达 `max_attempts`（或记录不存在）
    /// 时拒绝。并发调用时每次失配恰好计数一次，不会互相覆盖。
    async fn increment_attempts(&self, subject: &str, max_attempts: u32)
    -> Result<IncrementOutcome>;

    /// 清理过期的质询，返回清理数量
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

// ============================================================================
// 内存存储实现
// ============================================================================

/// 内存存储实现
///
/// 适用于单实例部署或测试环境；克隆共享同一份底层数据。
/// 生产环境建议使用带条件更新能力的分布式存储。
#[derive(Debug, Clone, Default)]
pub struct InMemoryChallengeStore {
    /// subject -> 质询记录
    records: Arc<RwLock<HashMap<String, OtpChallenge>>>,
}

impl InMemoryChallengeStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前存储的质询数量
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// 存储是否为空
    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }
}

#[async_trait]
impl OtpChallengeStore for InMemoryChallengeStore {
    async fn put(&self, challenge: &OtpChallenge) -> Result<()> {
        let mut records = self.records.write().unwrap();
        records.insert(challenge.subject.clone(), challenge.clone());
        Ok(())
    }

    async fn get(&self, subject: &str) -> Result<Option<OtpChallenge>> {
        let records = self.records.read().unwrap();
        Ok(records.get(subject).cloned())
    }

    async fn delete(&self, subject: &str) -> Result<()> {
        let mut records = self.records.write().unwrap();
        records.remove(subject);
        Ok(())
    }

    async fn increment_attempts(
        &self,
        subject: &str,
        max_attempts: u32,
    ) -> Result<IncrementOutcome> {
        // 写锁内检查并加一，等价于存储层的条件更新
        let mut records = self.records.write().unwrap();
        match records.get_mut(subject) {
            Some(record) if record.attempts < max_attempts => {
                record.attempts += 1;
                Ok(IncrementOutcome::Incremented(record.attempts))
            }
            _ => Ok(IncrementOutcome::Refused),
        }
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|_, record| record.expires_at > now);
        Ok(before - records.len())
    }
}

// ============================================================================
// 质询提供者
// ============================================================================

/// OTP 质询提供者
///
/// 负责生成验证码、落库并请求投递。
///
/// # Example
///
/// ```rust
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use std::sync::Arc;
/// use passless::challenge::{InMemoryChallengeStore, OtpChallengeProvider, OtpConfig};
/// use passless::notify::InMemoryNotifier;
///
/// let store = InMemoryChallengeStore::new();
/// let notifier = Arc::new(InMemoryNotifier::new());
/// let provider =
///     OtpChallengeProvider::new(store, notifier, OtpConfig::new("no-reply@example.com"))
///         .unwrap();
///
/// let created = provider.create("user@example.com").await.unwrap();
/// assert_eq!(created.challenge.code.len(), 6);
/// assert!(created.delivered);
/// # });
/// ```
pub struct OtpChallengeProvider<S: OtpChallengeStore = InMemoryChallengeStore> {
    store: S,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: OtpConfig,
}

impl<S: OtpChallengeStore> OtpChallengeProvider<S> {
    /// 创建质询提供者
    ///
    /// # Errors
    ///
    /// 配置非法时返回 [`Error::Config`](crate::error::Error::Config)。
    pub fn new(store: S, notifier: Arc<dyn Notifier>, config: OtpConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            notifier,
            clock: Arc::new(SystemClock),
            config,
        })
    }

    /// 替换时间源（用于测试）
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 为主体创建并投递一条新质询
    ///
    /// 替换该主体已有的在途质询（幂等替换），因此可以安全地反复调用。
    /// 投递失败不回滚落库，返回值中 `delivered == false`。
    ///
    /// # Errors
    ///
    /// 随机数生成失败或存储失败时返回错误；此时没有质询生效。
    pub async fn create(&self, subject: &str) -> Result<CreatedChallenge> {
        let code = generate_numeric_code(self.config.code_length)?;
        let created_at = self.clock.now();
        let expires_at = created_at + Duration::seconds(self.config.ttl.as_secs() as i64);

        let challenge = OtpChallenge {
            subject: subject.to_string(),
            code,
            created_at,
            expires_at,
            attempts: 0,
            max_attempts: self.config.max_attempts,
        };

        self.store.put(&challenge).await?;

        let body = self.format_message(&challenge.code);
        let delivered = match self
            .notifier
            .send(subject, &self.config.subject_line, &body)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    subject = %subject,
                    error = %err,
                    "failed to deliver challenge code; challenge remains valid"
                );
                false
            }
        };

        Ok(CreatedChallenge {
            challenge,
            delivered,
        })
    }

    /// 重新生成并投递验证码
    ///
    /// 等价于 [`create`](Self::create)：旧验证码立即失效，新验证码生效，
    /// 用户无需重新走注册/发起流程。
    pub async fn resend(&self, subject: &str) -> Result<CreatedChallenge> {
        self.create(subject).await
    }

    /// 获取配置
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    fn format_message(&self, code: &str) -> String {
        let minutes = (self.config.ttl.as_secs() / 60).max(1);
        format!(
            "Your one-time password (OTP) is: {}\n\n\
             Valid for {} minutes.\n\n\
             Do not share this code with anyone.",
            code, minutes
        )
    }
}

// ============================================================================
// 质询校验器
// ============================================================================

/// OTP 质询校验器
///
/// 按顺序执行：存在性 → 过期 → 尝试上限 → 常量时间比较。
/// 上限检查先于比较，保证锁定是绝对的：达到上限后即使提交正确
/// 验证码也会被拒绝。
///
/// # Example
///
/// ```rust
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use std::sync::Arc;
/// use passless::challenge::{
///     InMemoryChallengeStore, OtpChallengeProvider, OtpConfig, OtpVerifier, VerifyOutcome,
/// };
/// use passless::notify::InMemoryNotifier;
///
/// let store = InMemoryChallengeStore::new();
/// let notifier = Arc::new(InMemoryNotifier::new());
/// let provider = OtpChallengeProvider::new(
///     store.clone(),
///     notifier,
///     OtpConfig::new("no-reply@example.com"),
/// )
/// .unwrap();
/// let verifier = OtpVerifier::new(store);
///
/// let created = provider.create("user@example.com").await.unwrap();
/// let outcome = verifier
///     .verify("user@example.com", &created.challenge.code)
///     .await
///     .unwrap();
/// assert_eq!(outcome, VerifyOutcome::Correct);
///
/// // 质询已被消费，再次校验返回 NotFound
/// let again = verifier
///     .verify("user@example.com", &created.challenge.code)
///     .await
///     .unwrap();
/// assert_eq!(again, VerifyOutcome::NotFound);
/// # });
/// ```
pub struct OtpVerifier<S: OtpChallengeStore = InMemoryChallengeStore> {
    store: S,
    directory: Option<Arc<dyn IdentityDirectory>>,
    clock: Arc<dyn Clock>,
}

impl<S: OtpChallengeStore> OtpVerifier<S> {
    /// 创建校验器
    ///
    /// `store` 应与对应提供者共享同一份底层数据（内存存储通过克隆共享）。
    pub fn new(store: S) -> Self {
        Self {
            store,
            directory: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// 配置身份目录：校验成功后尽力标记主体已验证
    pub fn with_directory(mut self, directory: Arc<dyn IdentityDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// 替换时间源（用于测试）
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 校验主体提交的验证码
    ///
    /// 提交值会先去除首尾空白再比较（验证码是纯数字，大小写无关紧要）。
    /// 所有协议层结果都以 [`VerifyOutcome`] 返回；
    /// 只有存储故障才会返回 `Err`，调用方应视为瞬态失败拒绝本次校验。
    pub async fn verify(&self, subject: &str, submitted: &str) -> Result<VerifyOutcome> {
        let Some(challenge) = self.store.get(subject).await? else {
            return Ok(VerifyOutcome::NotFound);
        };

        let now = self.clock.now();
        if challenge.is_expired_at(now) {
            // 过期记录不可再用，提前清掉（存储层 TTL 也会兜底清理）
            self.store.delete(subject).await?;
            return Ok(VerifyOutcome::Expired);
        }

        if challenge.attempts >= challenge.max_attempts {
            return Ok(VerifyOutcome::AttemptsExceeded);
        }

        if constant_time_compare_str(submitted.trim(), &challenge.code) {
            // 一次性使用：先删除，再尽力标记目录属性
            self.store.delete(subject).await?;

            if let Some(directory) = &self.directory {
                if let Err(err) = directory.mark_verified(subject).await {
                    tracing::warn!(
                        subject = %subject,
                        error = %err,
                        "failed to mark subject verified after correct code"
                    );
                }
            }

            return Ok(VerifyOutcome::Correct);
        }

        match self
            .store
            .increment_attempts(subject, challenge.max_attempts)
            .await?
        {
            IncrementOutcome::Incremented(new_attempts)
                if new_attempts >= challenge.max_attempts =>
            {
                Ok(VerifyOutcome::AttemptsExceeded)
            }
            IncrementOutcome::Incremented(new_attempts) => Ok(VerifyOutcome::Mismatch {
                remaining_attempts: challenge.max_attempts - new_attempts,
            }),
            // 并发校验已经用完了预算
            IncrementOutcome::Refused => Ok(VerifyOutcome::AttemptsExceeded),
        }
    }
}
