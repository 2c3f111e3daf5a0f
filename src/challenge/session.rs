//! 认证会话历史
//!
//! 一次认证流程中所有质询尝试的有序记录。编排器只依据这份历史做决策，
//! 历史本身由外部认证运行时在每次请求间传递/存储，本库不持久化它。

use serde::{Deserialize, Serialize};

/// 质询类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChallengeKind {
    /// 一次性验证码（邮件/短信）
    Otp,
    /// 魔法链接
    MagicLink,
    /// 密码（由外部流程处理，这里只用于区分历史记录）
    Password,
}

impl std::fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChallengeKind::Otp => write!(f, "otp"),
            ChallengeKind::MagicLink => write!(f, "magic_link"),
            ChallengeKind::Password => write!(f, "password"),
        }
    }
}

/// 一次质询尝试的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeAttempt {
    /// 质询类型
    pub kind: ChallengeKind,

    /// 是否回答正确
    pub succeeded: bool,
}

/// 认证会话：质询尝试的有序历史
///
/// 只允许追加，不允许修改或删除已有记录。
///
/// # Example
///
/// ```rust
/// use passless::challenge::{ChallengeKind, Session};
///
/// let mut session = Session::new();
/// session.record(ChallengeKind::Otp, false);
/// session.record(ChallengeKind::Otp, true);
///
/// assert_eq!(session.count(ChallengeKind::Otp), 2);
/// assert!(session.last_attempt().unwrap().succeeded);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    attempts: Vec<ChallengeAttempt>,
}

impl Session {
    /// 创建空会话
    pub fn new() -> Self {
        Self::default()
    }

    /// 从已有的尝试记录构建会话
    pub fn from_attempts(attempts: Vec<ChallengeAttempt>) -> Self {
        Self { attempts }
    }

    /// 追加一次质询尝试
    pub fn record(&mut self, kind: ChallengeKind, succeeded: bool) {
        self.attempts.push(ChallengeAttempt { kind, succeeded });
    }

    /// 最近一次尝试
    pub fn last_attempt(&self) -> Option<&ChallengeAttempt> {
        self.attempts.last()
    }

    /// 统计指定类型的尝试次数（无论成败）
    pub fn count(&self, kind: ChallengeKind) -> usize {
        self.attempts.iter().filter(|a| a.kind == kind).count()
    }

    /// 所有尝试记录
    pub fn attempts(&self) -> &[ChallengeAttempt] {
        &self.attempts
    }

    /// 尝试总数
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// 会话是否为空
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}
