//! 魔法链接模块
//!
//! 提供通过点击邮件链接证明邮箱控制权的两种 token 方案：
//!
//! - [`signed`]：无状态 HMAC 签名 token。不占存储、不可单独吊销，
//!   由较短的最大有效期约束风险，适合普通的邮箱验证链接。
//! - [`stored`]：有状态单次使用 token。以 token 为键存储、用后即删，
//!   即使并发重复提交也保证恰好一次消费，适合需要严格一次性语义的流程。
//!
//! 两种方案共享同一套错误分类：签名不匹配/过期/不存在都是类型化结果，
//! 签名密钥缺失则是必须中止的配置错误。

pub mod signed;
pub mod stored;

pub use signed::{MagicLinkSigner, SignedLink, SignedLinkOutcome};
pub use stored::{
    InMemoryTokenStore, SingleUseConfig, SingleUseLinkManager, SingleUseOutcome, SingleUseToken,
    SingleUseTokenStore,
};
