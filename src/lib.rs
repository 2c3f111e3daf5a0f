//! # Passless
//!
//! 一个专注无密码身份验证的 Rust 库。
//!
//! ## 功能特性
//!
//! - **OTP 质询**: 生成、投递、校验一次性数字验证码，带尝试次数锁定
//! - **质询编排**: 会话级状态机，决定发放 token、判定失败或继续质询
//! - **签名魔法链接**: 无状态 HMAC-SHA256 token，常量时间校验
//! - **单次使用魔法链接**: 有状态不透明 token，恰好一次消费
//! - **可插拔协作方**: 存储、投递、身份目录、时钟全部是 trait，
//!   自带内存实现用于测试和单实例部署
//!
//! ## 设计原则
//!
//! 本库只负责协议核心：质询状态机与 token 的生成/校验逻辑。
//! HTTP 传输、会话/JWT 发放、网络层限流和 UI 都由外部系统承担；
//! 本库通过少量抽象接口（存储、投递、目录、时钟）与它们协作。
//!
//! 所有可恢复的协议结果（验证码错误、过期、锁定、不存在）都是类型化的
//! 返回值而不是错误；`Err` 只用于配置缺失和依赖故障这类必须中止的情况。
//!
//! ## OTP 质询示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use std::sync::Arc;
//! use passless::challenge::{
//!     ChallengeKind, ChallengeOrchestrator, InMemoryChallengeStore, OtpChallengeProvider,
//!     OtpConfig, OtpVerifier, Session,
//! };
//! use passless::notify::InMemoryNotifier;
//!
//! let store = InMemoryChallengeStore::new();
//! let notifier = Arc::new(InMemoryNotifier::new());
//! let provider = OtpChallengeProvider::new(
//!     store.clone(),
//!     notifier,
//!     OtpConfig::new("no-reply@example.com"),
//! )
//! .unwrap();
//! let verifier = OtpVerifier::new(store);
//! let orchestrator = ChallengeOrchestrator::new();
//!
//! // 编排器决定发起质询
//! let mut session = Session::new();
//! let decision = orchestrator.decide(&session);
//! assert_eq!(decision.next_challenge, Some(ChallengeKind::Otp));
//!
//! // 创建并投递验证码
//! let created = provider.create("user@example.com").await.unwrap();
//!
//! // 用户提交验证码
//! let outcome = verifier
//!     .verify("user@example.com", &created.challenge.code)
//!     .await
//!     .unwrap();
//! session.record(ChallengeKind::Otp, outcome.is_correct());
//!
//! // 编排器重新决策：发放 token
//! assert!(orchestrator.decide(&session).issue_tokens);
//! # });
//! ```
//!
//! ## 魔法链接示例
//!
//! ```rust
//! use passless::magic_link::{MagicLinkSigner, SignedLinkOutcome};
//!
//! let signer = MagicLinkSigner::new("a-signing-secret").unwrap();
//!
//! // 签发链接并编码成 URL
//! let link = signer.issue("user@example.com").unwrap();
//! let url = signer
//!     .link_url("https://example.com/verify-email", &link)
//!     .unwrap();
//! assert!(url.as_str().contains("token="));
//!
//! // 用户点击后校验
//! let outcome = signer
//!     .verify("user@example.com", &link.signature, link.issued_at)
//!     .unwrap();
//! assert_eq!(outcome, SignedLinkOutcome::Valid);
//! ```

pub mod challenge;
pub mod clock;
pub mod directory;
pub mod error;
pub mod magic_link;
pub mod notify;
pub mod random;

pub use error::{Error, Result};

// ============================================================================
// 质询相关导出
// ============================================================================

pub use challenge::{
    ChallengeAttempt, ChallengeKind, ChallengeOrchestrator, CreatedChallenge, Decision,
    InMemoryChallengeStore, OtpChallenge, OtpChallengeProvider, OtpChallengeStore, OtpConfig,
    OtpVerifier, Session, VerifyOutcome,
};

// ============================================================================
// 魔法链接相关导出
// ============================================================================

pub use magic_link::{
    InMemoryTokenStore, MagicLinkSigner, SignedLink, SignedLinkOutcome, SingleUseConfig,
    SingleUseLinkManager, SingleUseOutcome, SingleUseToken, SingleUseTokenStore,
};

// ============================================================================
// 协作方接口导出
// ============================================================================

pub use clock::{Clock, FixedClock, SystemClock};
pub use directory::{IdentityDirectory, InMemoryDirectory};
pub use notify::{InMemoryNotifier, Notifier, SentMessage};
