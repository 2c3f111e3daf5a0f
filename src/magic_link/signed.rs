//! 签名魔法链接（无状态方案）
//!
//! 用 HMAC-SHA256 对 `主体:签发时间` 签名，签名本身就是 token，
//! 不需要任何存储：校验时重算签名并检查链接年龄即可。
//!
//! 无状态 token 省掉了一次存储往返，代价是无法单独吊销，
//! 只能靠较短的最大有效期（默认 24 小时）来约束。需要严格一次性消费的
//! 流程请使用 [`stored`](crate::magic_link::stored) 方案。
//!
//! ## 安全要点
//!
//! - 签名比较必须是常量时间的，防止时序攻击
//! - 签名密钥缺失是配置错误，必须拒绝构建而不是跳过校验

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::directory::IdentityDirectory;
use crate::error::{CryptoError, Error, Result};
use crate::random::{constant_time_compare_str, hex_encode};

type HmacSha256 = Hmac<Sha256>;

/// 一条已签发的魔法链接
///
/// 三个字段都会编码进链接的查询参数；任何一个被篡改都会导致签名校验失败。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLink {
    /// 主体标识（邮箱）
    pub subject: String,

    /// 十六进制 HMAC-SHA256 签名
    pub signature: String,

    /// 签发时间（Unix 时间戳，秒）
    pub issued_at: i64,
}

/// 签名链接的校验结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedLinkOutcome {
    /// 签名有效且未超过最大有效期
    Valid,
    /// 签名不匹配（主体、签名或时间戳被篡改）
    SignatureMismatch,
    /// 链接超过最大有效期
    Expired,
}

impl SignedLinkOutcome {
    /// 是否校验通过
    pub fn is_valid(&self) -> bool {
        matches!(self, SignedLinkOutcome::Valid)
    }
}

/// 魔法链接签名器
///
/// 同时承担签发与校验；两端必须使用同一密钥。
///
/// # Example
///
/// ```rust
/// use passless::magic_link::{MagicLinkSigner, SignedLinkOutcome};
///
/// let signer = MagicLinkSigner::new("a-signing-secret").unwrap();
///
/// let link = signer.issue("user@example.com").unwrap();
/// let outcome = signer
///     .verify("user@example.com", &link.signature, link.issued_at)
///     .unwrap();
/// assert_eq!(outcome, SignedLinkOutcome::Valid);
///
/// // 换一个主体，同一签名立即失效
/// let outcome = signer
///     .verify("other@example.com", &link.signature, link.issued_at)
///     .unwrap();
/// assert_eq!(outcome, SignedLinkOutcome::SignatureMismatch);
/// ```
pub struct MagicLinkSigner {
    secret: Vec<u8>,
    max_age: std::time::Duration,
    clock: Arc<dyn Clock>,
}

impl MagicLinkSigner {
    /// 创建签名器
    ///
    /// 默认最大有效期为 24 小时。
    ///
    /// # Errors
    ///
    /// 密钥为空时返回 [`Error::Config`]：缺失签名密钥必须中止，
    /// 绝不允许退化成"不校验"。
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(Error::missing_config("signing_secret"));
        }
        Ok(Self {
            secret,
            max_age: std::time::Duration::from_secs(24 * 60 * 60),
            clock: Arc::new(SystemClock),
        })
    }

    /// 设置最大有效期
    pub fn with_max_age(mut self, max_age: std::time::Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// 替换时间源（用于测试）
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 为主体签发一条魔法链接
    pub fn issue(&self, subject: &str) -> Result<SignedLink> {
        let issued_at = self.clock.now().timestamp();
        let signature = self.sign(subject, issued_at)?;
        Ok(SignedLink {
            subject: subject.to_string(),
            signature,
            issued_at,
        })
    }

    /// 把链接编码成完整的验证 URL
    ///
    /// 查询参数为 `email`、`token`、`t`。
    ///
    /// # Errors
    ///
    /// `base` 不是合法 URL 时返回配置错误。
    pub fn link_url(&self, base: &str, link: &SignedLink) -> Result<Url> {
        let mut url = Url::parse(base)
            .map_err(|e| Error::invalid_config("verify_base_url", e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("email", &link.subject)
            .append_pair("token", &link.signature)
            .append_pair("t", &link.issued_at.to_string());
        Ok(url)
    }

    /// 校验一条魔法链接
    ///
    /// 先做常量时间的签名比较，再检查年龄；签名不对时不泄露年龄信息。
    pub fn verify(
        &self,
        subject: &str,
        signature: &str,
        issued_at: i64,
    ) -> Result<SignedLinkOutcome> {
        let expected = self.sign(subject, issued_at)?;
        if !constant_time_compare_str(signature, &expected) {
            return Ok(SignedLinkOutcome::SignatureMismatch);
        }

        let age = self.clock.now().timestamp() - issued_at;
        if age > self.max_age.as_secs() as i64 {
            return Ok(SignedLinkOutcome::Expired);
        }

        Ok(SignedLinkOutcome::Valid)
    }

    /// 校验链接并在通过后确认目录中的主体
    ///
    /// 确认失败时退回到只标记邮箱已验证；两步都是尽力而为，
    /// 失败只记录日志，不改变校验结果。重复确认已验证的主体是无操作的成功。
    pub async fn verify_and_confirm<D>(
        &self,
        subject: &str,
        signature: &str,
        issued_at: i64,
        directory: &D,
    ) -> Result<SignedLinkOutcome>
    where
        D: IdentityDirectory + ?Sized,
    {
        let outcome = self.verify(subject, signature, issued_at)?;

        if outcome.is_valid() {
            if let Err(err) = directory.confirm(subject).await {
                tracing::warn!(
                    subject = %subject,
                    error = %err,
                    "confirm failed; falling back to mark_verified"
                );
                if let Err(err) = directory.mark_verified(subject).await {
                    tracing::warn!(
                        subject = %subject,
                        error = %err,
                        "failed to mark subject verified after valid link"
                    );
                }
            }
        }

        Ok(outcome)
    }

    /// 重发闸门：只为存在且尚未验证的主体签发新链接
    ///
    /// 主体不存在与已验证返回同样的 `None`，不向调用方泄露账号是否存在。
    ///
    /// # Errors
    ///
    /// 目录不可用时返回错误（瞬态失败，调用方可重试）。
    pub async fn resend_gate<D>(&self, subject: &str, directory: &D) -> Result<Option<SignedLink>>
    where
        D: IdentityDirectory + ?Sized,
    {
        if !directory.exists(subject).await? {
            return Ok(None);
        }
        if directory.is_verified(subject).await? {
            return Ok(None);
        }
        Ok(Some(self.issue(subject)?))
    }

    fn sign(&self, subject: &str, issued_at: i64) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Crypto(CryptoError::InvalidKey(e.to_string())))?;
        mac.update(format!("{}:{}", subject, issued_at).as_bytes());
        Ok(hex_encode(&mac.finalize().into_bytes()))
    }
}
