//! 身份目录模块
//!
//! 定义外部身份目录（用户池）的抽象接口。验证成功后的"标记已验证"、
//! "确认激活"都是**尽力而为**的副作用：失败会被记录，但不改变验证本身的结果。
//!
//! 注意：目录查询结果不应直接透出给未认证的调用方，避免泄露账号是否存在。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{DirectoryError, Error, Result};

/// 身份目录接口
///
/// 实现此 trait 以接入实际的用户目录（如 LDAP、IdP 用户池）。
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// 检查主体是否存在
    async fn exists(&self, subject: &str) -> Result<bool>;

    /// 检查主体的邮箱是否已验证
    async fn is_verified(&self, subject: &str) -> Result<bool>;

    /// 标记主体的邮箱为已验证（幂等：重复标记是无操作的成功）
    async fn mark_verified(&self, subject: &str) -> Result<()>;

    /// 确认并激活主体（幂等）
    async fn confirm(&self, subject: &str) -> Result<()>;
}

/// 目录中一个主体的状态
#[derive(Debug, Clone, Default)]
struct SubjectEntry {
    verified: bool,
    confirmed: bool,
}

/// 内存目录实现
///
/// 适用于测试和本地开发。可通过 [`set_failing`](InMemoryDirectory::set_failing)
/// 模拟目录不可用，验证调用方的降级行为。
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    subjects: Arc<RwLock<HashMap<String, SubjectEntry>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryDirectory {
    /// 创建新的内存目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个主体（初始为未验证、未确认）
    pub fn insert_subject(&self, subject: &str) {
        let mut subjects = self.subjects.write().unwrap();
        subjects.entry(subject.to_string()).or_default();
    }

    /// 注册一个已验证的主体
    pub fn insert_verified_subject(&self, subject: &str) {
        let mut subjects = self.subjects.write().unwrap();
        subjects.insert(
            subject.to_string(),
            SubjectEntry {
                verified: true,
                confirmed: true,
            },
        );
    }

    /// 设置是否模拟目录不可用
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 查询主体是否已确认（测试辅助）
    pub fn confirmed(&self, subject: &str) -> bool {
        self.subjects
            .read()
            .unwrap()
            .get(subject)
            .map(|e| e.confirmed)
            .unwrap_or(false)
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Directory(DirectoryError::Unavailable(
                "simulated directory outage".to_string(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn exists(&self, subject: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.subjects.read().unwrap().contains_key(subject))
    }

    async fn is_verified(&self, subject: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self
            .subjects
            .read()
            .unwrap()
            .get(subject)
            .map(|e| e.verified)
            .unwrap_or(false))
    }

    async fn mark_verified(&self, subject: &str) -> Result<()> {
        self.check_available()?;
        let mut subjects = self.subjects.write().unwrap();
        match subjects.get_mut(subject) {
            Some(entry) => {
                entry.verified = true;
                Ok(())
            }
            None => Err(Error::Directory(DirectoryError::OperationFailed(format!(
                "unknown subject: {}",
                subject
            )))),
        }
    }

    async fn confirm(&self, subject: &str) -> Result<()> {
        self.check_available()?;
        let mut subjects = self.subjects.write().unwrap();
        match subjects.get_mut(subject) {
            Some(entry) => {
                entry.confirmed = true;
                entry.verified = true;
                Ok(())
            }
            None => Err(Error::Directory(DirectoryError::OperationFailed(format!(
                "unknown subject: {}",
                subject
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exists_and_verify() {
        let directory = InMemoryDirectory::new();
        directory.insert_subject("alice@example.com");

        assert!(directory.exists("alice@example.com").await.unwrap());
        assert!(!directory.exists("bob@example.com").await.unwrap());
        assert!(!directory.is_verified("alice@example.com").await.unwrap());

        directory.mark_verified("alice@example.com").await.unwrap();
        assert!(directory.is_verified("alice@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_verified_is_idempotent() {
        let directory = InMemoryDirectory::new();
        directory.insert_subject("alice@example.com");

        directory.mark_verified("alice@example.com").await.unwrap();
        // 重复标记仍然成功
        directory.mark_verified("alice@example.com").await.unwrap();
        assert!(directory.is_verified("alice@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_verified_unknown_subject() {
        let directory = InMemoryDirectory::new();
        let result = directory.mark_verified("nobody@example.com").await;
        assert!(matches!(result, Err(Error::Directory(_))));
    }

    #[tokio::test]
    async fn test_confirm_sets_verified() {
        let directory = InMemoryDirectory::new();
        directory.insert_subject("alice@example.com");

        directory.confirm("alice@example.com").await.unwrap();
        assert!(directory.confirmed("alice@example.com"));
        assert!(directory.is_verified("alice@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_failing_mode() {
        let directory = InMemoryDirectory::new();
        directory.insert_subject("alice@example.com");
        directory.set_failing(true);

        assert!(directory.exists("alice@example.com").await.is_err());
        assert!(directory.is_verified("alice@example.com").await.is_err());
    }
}
