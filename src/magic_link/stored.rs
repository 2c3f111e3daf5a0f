//! 单次使用魔法链接 token（有状态方案）
//!
//! 与签名方案不同，这里的 token 是一段不透明随机串，以 token 本身为键
//! 存储，查找 O(1)。校验成功即删除，保证**恰好一次**消费：
//! 即使同一 token 被并发重复提交，也只有一个提交者能拿到 `Valid`。
//!
//! 适用于需要严格一次性语义的场景（注册确认、敏感操作授权）；
//! 不需要单独吊销能力的普通邮箱验证可以用
//! [`signed`](crate::magic_link::signed) 方案省掉存储往返。

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::random::generate_opaque_token;

// ============================================================================
// 配置
// ============================================================================

/// 单次使用 token 配置
#[derive(Debug, Clone)]
pub struct SingleUseConfig {
    /// token 长度（字节数，Base64 编码后会更长）
    pub token_length: usize,

    /// token 有效期
    pub ttl: std::time::Duration,
}

impl Default for SingleUseConfig {
    fn default() -> Self {
        Self {
            token_length: 32, // 256 bits
            ttl: std::time::Duration::from_secs(15 * 60),
        }
    }
}

impl SingleUseConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 token 长度
    pub fn with_token_length(mut self, length: usize) -> Self {
        self.token_length = length;
        self
    }

    /// 设置有效期
    pub fn with_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// 校验配置
    ///
    /// # Errors
    ///
    /// token 长度小于 16 字节或有效期为 0。
    pub fn validate(&self) -> Result<()> {
        if self.token_length < 16 {
            return Err(crate::error::Error::invalid_config(
                "token_length",
                "must be at least 16 bytes",
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

/// 一条单次使用 token 记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleUseToken {
    /// 不透明随机 token（同时是存储键）
    pub token: String,

    /// 主体标识（邮箱）
    pub subject: String,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 过期时间（同时作为存储层 TTL 属性）
    pub expires_at: DateTime<Utc>,
}

/// 单次使用 token 的校验结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleUseOutcome {
    /// token 有效，携带其关联的主体；token 已被消费
    Valid {
        /// 主体标识
        subject: String,
    },
    /// token 不存在（从未签发、已消费或已被 TTL 清除）
    NotFound,
    /// token 已过期
    Expired,
}

// ============================================================================
// 存储接口
// ============================================================================

/// 单次使用 token 存储接口
///
/// 以 token 为键。[`take`](SingleUseTokenStore::take) 必须原子地
/// "取出并删除"，这是恰好一次消费语义的基础：并发的重复提交中
/// 只有一个调用能取到记录。
#[async_trait]
pub trait SingleUseTokenStore: Send + Sync {
    /// 保存 token 记录
    async fn save(&self, record: &SingleUseToken) -> Result<()>;

    /// 原子地取出并删除 token 记录
    async fn take(&self, token: &str) -> Result<Option<SingleUseToken>>;

    /// 清理过期的 token，返回清理数量
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

// ============================================================================
// 内存存储实现
// ============================================================================

/// 内存存储实现
///
/// 适用于单实例部署或测试环境；克隆共享同一份底层数据。
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokenStore {
    /// token -> 记录
    tokens: Arc<RwLock<HashMap<String, SingleUseToken>>>,
}

impl InMemoryTokenStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前存储的 token 数量
    pub fn len(&self) -> usize {
        self.tokens.read().unwrap().len()
    }

    /// 存储是否为空
    pub fn is_empty(&self) -> bool {
        self.tokens.read().unwrap().is_empty()
    }
}

#[async_trait]
impl SingleUseTokenStore for InMemoryTokenStore {
    async fn save(&self, record: &SingleUseToken) -> Result<()> {
        let mut tokens = self.tokens.write().unwrap();
        tokens.insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn take(&self, token: &str) -> Result<Option<SingleUseToken>> {
        // 写锁内 remove，取出即删除
        let mut tokens = self.tokens.write().unwrap();
        Ok(tokens.remove(token))
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut tokens = self.tokens.write().unwrap();
        let before = tokens.len();
        tokens.retain(|_, record| record.expires_at > now);
        Ok(before - tokens.len())
    }
}

// ============================================================================
// 管理器
// ============================================================================

/// 单次使用魔法链接管理器
///
/// # Example
///
/// ```rust
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use passless::magic_link::{
///     InMemoryTokenStore, SingleUseConfig, SingleUseLinkManager, SingleUseOutcome,
/// };
///
/// let manager =
///     SingleUseLinkManager::new(InMemoryTokenStore::new(), SingleUseConfig::default()).unwrap();
///
/// let issued = manager.issue("user@example.com").await.unwrap();
/// let outcome = manager.verify(&issued.token).await.unwrap();
/// assert_eq!(
///     outcome,
///     SingleUseOutcome::Valid {
///         subject: "user@example.com".to_string()
///     }
/// );
///
/// // token 已被消费
/// assert_eq!(
///     manager.verify(&issued.token).await.unwrap(),
///     SingleUseOutcome::NotFound
/// );
/// # });
/// ```
pub struct SingleUseLinkManager<S: SingleUseTokenStore = InMemoryTokenStore> {
    store: S,
    config: SingleUseConfig,
    clock: Arc<dyn Clock>,
}

impl<S: SingleUseTokenStore> SingleUseLinkManager<S> {
    /// 创建管理器
    ///
    /// # Errors
    ///
    /// 配置非法时返回 [`Error::Config`](crate::error::Error::Config)。
    pub fn new(store: S, config: SingleUseConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// 替换时间源（用于测试）
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 为主体签发一条单次使用 token
    pub async fn issue(&self, subject: &str) -> Result<SingleUseToken> {
        let token = generate_opaque_token(self.config.token_length)?;
        let created_at = self.clock.now();
        let expires_at = created_at + Duration::seconds(self.config.ttl.as_secs() as i64);

        let record = SingleUseToken {
            token,
            subject: subject.to_string(),
            created_at,
            expires_at,
        };
        self.store.save(&record).await?;
        Ok(record)
    }

    /// 校验并消费一条 token
    ///
    /// 无论结果如何，取出即删除：校验过的 token 不可能再次通过，
    /// 并发重复提交最多只有一个 `Valid`。
    pub async fn verify(&self, token: &str) -> Result<SingleUseOutcome> {
        let Some(record) = self.store.take(token).await? else {
            return Ok(SingleUseOutcome::NotFound);
        };

        if self.clock.now() > record.expires_at {
            return Ok(SingleUseOutcome::Expired);
        }

        Ok(SingleUseOutcome::Valid {
            subject: record.subject,
        })
    }

    /// 清理过期的 token
    pub async fn cleanup(&self) -> Result<usize> {
        self.store.cleanup_expired(self.clock.now()).await
    }

    /// 获取配置
    pub fn config(&self) -> &SingleUseConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn manager_at(timestamp: i64) -> (SingleUseLinkManager, FixedClock) {
        let clock = FixedClock::at_timestamp(timestamp);
        let manager = SingleUseLinkManager::new(InMemoryTokenStore::new(), SingleUseConfig::new())
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        (manager, clock)
    }

    #[test]
    fn test_config_validation() {
        assert!(SingleUseConfig::new().validate().is_ok());
        assert!(
            SingleUseConfig::new()
                .with_token_length(8)
                .validate()
                .is_err()
        );
        assert!(
            SingleUseConfig::new()
                .with_ttl(std::time::Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let (manager, _clock) = manager_at(1000);

        let issued = manager.issue("user@example.com").await.unwrap();
        assert!(!issued.token.is_empty());
        assert_eq!(issued.subject, "user@example.com");

        let outcome = manager.verify(&issued.token).await.unwrap();
        assert_eq!(
            outcome,
            SingleUseOutcome::Valid {
                subject: "user@example.com".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_token_is_single_use() {
        let (manager, _clock) = manager_at(1000);
        let issued = manager.issue("user@example.com").await.unwrap();

        assert!(matches!(
            manager.verify(&issued.token).await.unwrap(),
            SingleUseOutcome::Valid { .. }
        ));
        // 第二次提交：记录已被消费
        assert_eq!(
            manager.verify(&issued.token).await.unwrap(),
            SingleUseOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let (manager, _clock) = manager_at(1000);
        assert_eq!(
            manager.verify("no-such-token").await.unwrap(),
            SingleUseOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_expired_token() {
        let (manager, clock) = manager_at(1000);
        let issued = manager.issue("user@example.com").await.unwrap();

        clock.advance(Duration::seconds(15 * 60 + 1));
        assert_eq!(
            manager.verify(&issued.token).await.unwrap(),
            SingleUseOutcome::Expired
        );
        // 过期提交同样消费掉记录
        assert_eq!(
            manager.verify(&issued.token).await.unwrap(),
            SingleUseOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_submission() {
        let (manager, _clock) = manager_at(1000);
        let issued = manager.issue("user@example.com").await.unwrap();

        let manager = Arc::new(manager);
        let mut handles = Vec::new();
        for _ in 0..10 {
            let manager = Arc::clone(&manager);
            let token = issued.token.clone();
            handles.push(tokio::spawn(
                async move { manager.verify(&token).await.unwrap() },
            ));
        }

        let mut valid = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), SingleUseOutcome::Valid { .. }) {
                valid += 1;
            }
        }
        // 恰好一次消费
        assert_eq!(valid, 1);
    }

    #[tokio::test]
    async fn test_tokens_are_independent_per_issue() {
        let (manager, _clock) = manager_at(1000);

        let first = manager.issue("user@example.com").await.unwrap();
        let second = manager.issue("user@example.com").await.unwrap();
        assert_ne!(first.token, second.token);

        // 同一主体的多条 token 互不影响
        assert!(matches!(
            manager.verify(&first.token).await.unwrap(),
            SingleUseOutcome::Valid { .. }
        ));
        assert!(matches!(
            manager.verify(&second.token).await.unwrap(),
            SingleUseOutcome::Valid { .. }
        ));
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let (manager, clock) = manager_at(0);

        manager.issue("user1@example.com").await.unwrap();
        manager.issue("user2@example.com").await.unwrap();

        clock.advance(Duration::seconds(15 * 60 + 1));
        let cleaned = manager.cleanup().await.unwrap();
        assert_eq!(cleaned, 2);
    }
}
