//! OTP 质询流程模块
//!
//! 把无密码认证的挑战-应答协议拆成三层：
//!
//! - [`Session`]：一次认证流程的质询历史（共享类型，外部运行时负责传递）
//! - [`ChallengeOrchestrator`]：根据历史决定发 token、判失败还是再质询的纯状态机
//! - [`OtpChallengeProvider`] / [`OtpVerifier`]：验证码的生成投递与校验，
//!   通过存储、投递、目录三个抽象接口与外部世界交互
//!
//! ## 典型流程
//!
//! 1. 客户端请求认证，编排器检查会话历史
//! 2. 尚无成功质询且还有重试预算 → 提供者生成验证码并投递
//! 3. 客户端提交答案，校验器给出类型化结果并把成败追加进会话
//! 4. 编排器重新决策：成功 → 发放 token；预算耗尽 → 认证失败；否则回到第 2 步

pub mod orchestrator;
pub mod otp;
pub mod session;

pub use orchestrator::{ChallengeOrchestrator, Decision};
pub use otp::{
    CreatedChallenge, InMemoryChallengeStore, IncrementOutcome, OtpChallenge,
    OtpChallengeProvider, OtpChallengeStore, OtpConfig, OtpVerifier, VerifyOutcome,
};
pub use session::{ChallengeAttempt, ChallengeKind, Session};
