//! 质询编排器
//!
//! 会话级状态机：根据质询历史决定下一步是发放 token、判定认证失败，
//! 还是发起新一轮 OTP 质询。
//!
//! [`decide`](ChallengeOrchestrator::decide) 是会话历史的纯函数，不做任何 I/O，
//! 因此可以直接单元测试。终止状态有两个：发放 token（成功）和认证失败
//! （重试预算耗尽）；其余情况均为"发起新质询、等待用户作答"。

use crate::challenge::session::{ChallengeKind, Session};
use crate::directory::IdentityDirectory;

/// 编排器的决策结果
///
/// `issue_tokens` 与 `fail_authentication` 互斥，二者均为假时
/// `next_challenge` 给出应发起的质询类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// 认证成功，应当发放 token（由外部身份提供方完成）
    pub issue_tokens: bool,

    /// 认证失败，终止流程
    pub fail_authentication: bool,

    /// 需要发起的下一个质询
    pub next_challenge: Option<ChallengeKind>,
}

impl Decision {
    /// 成功：发放 token
    pub fn succeed() -> Self {
        Self {
            issue_tokens: true,
            fail_authentication: false,
            next_challenge: None,
        }
    }

    /// 失败：终止认证
    pub fn fail() -> Self {
        Self {
            issue_tokens: false,
            fail_authentication: true,
            next_challenge: None,
        }
    }

    /// 继续：发起指定类型的质询
    pub fn challenge(kind: ChallengeKind) -> Self {
        Self {
            issue_tokens: false,
            fail_authentication: false,
            next_challenge: Some(kind),
        }
    }

    /// 是否为终止状态（成功或失败）
    pub fn is_terminal(&self) -> bool {
        self.issue_tokens || self.fail_authentication
    }
}

/// 质询编排器
///
/// # Example
///
/// ```rust
/// use passless::challenge::{ChallengeKind, ChallengeOrchestrator, Session};
///
/// let orchestrator = ChallengeOrchestrator::new();
/// let mut session = Session::new();
///
/// // 新会话：发起 OTP 质询
/// let decision = orchestrator.decide(&session);
/// assert_eq!(decision.next_challenge, Some(ChallengeKind::Otp));
///
/// // 用户答对：发放 token
/// session.record(ChallengeKind::Otp, true);
/// assert!(orchestrator.decide(&session).issue_tokens);
/// ```
#[derive(Debug, Clone)]
pub struct ChallengeOrchestrator {
    /// 允许的 OTP 质询次数上限
    max_attempts: usize,

    /// 是否要求主体邮箱已验证才允许进入质询流程
    require_verified_subject: bool,
}

impl ChallengeOrchestrator {
    /// 创建使用默认策略的编排器（最多 3 次 OTP 质询）
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            require_verified_subject: false,
        }
    }

    /// 设置 OTP 质询次数上限
    pub fn with_max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = max;
        self
    }

    /// 设置是否要求主体已验证邮箱
    pub fn with_require_verified_subject(mut self, require: bool) -> Self {
        self.require_verified_subject = require;
        self
    }

    /// 根据会话历史决定下一步
    ///
    /// - 最近一次尝试是成功的 OTP → 发放 token
    /// - OTP 尝试次数已达上限 → 认证失败
    /// - 否则 → 发起新的 OTP 质询
    pub fn decide(&self, session: &Session) -> Decision {
        if let Some(last) = session.last_attempt() {
            if last.kind == ChallengeKind::Otp && last.succeeded {
                return Decision::succeed();
            }
        }

        if session.count(ChallengeKind::Otp) >= self.max_attempts {
            return Decision::fail();
        }

        Decision::challenge(ChallengeKind::Otp)
    }

    /// 结合身份目录状态做决策
    ///
    /// 当配置了 `require_verified_subject` 时，邮箱未验证的主体直接判定失败；
    /// 目录查询出错也按未验证处理（宁可拒绝，不可放行）。
    /// 之后委托给纯函数 [`decide`](Self::decide)。
    pub async fn decide_for<D>(&self, subject: &str, session: &Session, directory: &D) -> Decision
    where
        D: IdentityDirectory + ?Sized,
    {
        if self.require_verified_subject {
            match directory.is_verified(subject).await {
                Ok(true) => {}
                Ok(false) => return Decision::fail(),
                Err(err) => {
                    tracing::warn!(
                        subject = %subject,
                        error = %err,
                        "directory lookup failed; refusing authentication"
                    );
                    return Decision::fail();
                }
            }
        }

        self.decide(session)
    }
}

impl Default for ChallengeOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;

    #[test]
    fn test_empty_session_issues_challenge() {
        let orchestrator = ChallengeOrchestrator::new();
        let decision = orchestrator.decide(&Session::new());

        assert!(!decision.issue_tokens);
        assert!(!decision.fail_authentication);
        assert_eq!(decision.next_challenge, Some(ChallengeKind::Otp));
        assert!(!decision.is_terminal());
    }

    #[test]
    fn test_last_otp_success_issues_tokens() {
        let orchestrator = ChallengeOrchestrator::new();
        let mut session = Session::new();
        session.record(ChallengeKind::Otp, false);
        session.record(ChallengeKind::Otp, true);

        let decision = orchestrator.decide(&session);
        assert!(decision.issue_tokens);
        assert!(!decision.fail_authentication);
        assert!(decision.next_challenge.is_none());
        assert!(decision.is_terminal());
    }

    #[test]
    fn test_success_must_be_last_attempt() {
        // 早先的成功后又失败了一次：不发放 token，而是继续质询
        let orchestrator = ChallengeOrchestrator::new();
        let mut session = Session::new();
        session.record(ChallengeKind::Otp, true);
        session.record(ChallengeKind::Otp, false);

        let decision = orchestrator.decide(&session);
        assert!(!decision.issue_tokens);
        assert_eq!(decision.next_challenge, Some(ChallengeKind::Otp));
    }

    #[test]
    fn test_exhausted_attempts_fail_authentication() {
        let orchestrator = ChallengeOrchestrator::new();
        let mut session = Session::new();
        session.record(ChallengeKind::Otp, false);
        session.record(ChallengeKind::Otp, false);
        session.record(ChallengeKind::Otp, false);

        let decision = orchestrator.decide(&session);
        assert!(decision.fail_authentication);
        assert!(!decision.issue_tokens);
        assert!(decision.next_challenge.is_none());
    }

    #[test]
    fn test_other_kinds_do_not_consume_otp_budget() {
        let orchestrator = ChallengeOrchestrator::new();
        let mut session = Session::new();
        session.record(ChallengeKind::Password, false);
        session.record(ChallengeKind::Password, false);
        session.record(ChallengeKind::Password, false);

        // 密码尝试不计入 OTP 预算
        let decision = orchestrator.decide(&session);
        assert_eq!(decision.next_challenge, Some(ChallengeKind::Otp));
    }

    #[test]
    fn test_custom_max_attempts() {
        let orchestrator = ChallengeOrchestrator::new().with_max_attempts(1);
        let mut session = Session::new();
        session.record(ChallengeKind::Otp, false);

        assert!(orchestrator.decide(&session).fail_authentication);
    }

    #[tokio::test]
    async fn test_unverified_subject_is_refused() {
        let orchestrator = ChallengeOrchestrator::new().with_require_verified_subject(true);
        let directory = InMemoryDirectory::new();
        directory.insert_subject("alice@example.com");

        let decision = orchestrator
            .decide_for("alice@example.com", &Session::new(), &directory)
            .await;
        assert!(decision.fail_authentication);
    }

    #[tokio::test]
    async fn test_verified_subject_proceeds() {
        let orchestrator = ChallengeOrchestrator::new().with_require_verified_subject(true);
        let directory = InMemoryDirectory::new();
        directory.insert_verified_subject("alice@example.com");

        let decision = orchestrator
            .decide_for("alice@example.com", &Session::new(), &directory)
            .await;
        assert_eq!(decision.next_challenge, Some(ChallengeKind::Otp));
    }

    #[tokio::test]
    async fn test_directory_failure_fails_closed() {
        let orchestrator = ChallengeOrchestrator::new().with_require_verified_subject(true);
        let directory = InMemoryDirectory::new();
        directory.insert_verified_subject("alice@example.com");
        directory.set_failing(true);

        let decision = orchestrator
            .decide_for("alice@example.com", &Session::new(), &directory)
            .await;
        assert!(decision.fail_authentication);
    }

    #[tokio::test]
    async fn test_gate_disabled_ignores_directory() {
        let orchestrator = ChallengeOrchestrator::new();
        let directory = InMemoryDirectory::new();

        // 未注册也未验证的主体，闸门关闭时照常进入质询
        let decision = orchestrator
            .decide_for("nobody@example.com", &Session::new(), &directory)
            .await;
        assert_eq!(decision.next_challenge, Some(ChallengeKind::Otp));
    }
}
