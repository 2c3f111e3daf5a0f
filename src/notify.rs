//! 消息投递模块
//!
//! 定义向用户投递验证码/链接的抽象接口。本库只负责组装消息内容，
//! 实际的发送通道（邮件、短信）由应用层实现此 trait 接入。
//!
//! 投递失败对质询创建是**非致命**的：质询记录已经落库，用户可以请求重发。

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{DeliveryError, Error, Result};

/// 消息投递接口
///
/// 实现此 trait 以接入实际的发送通道（如 SMTP、SES、短信网关）。
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 向目标地址发送一条消息
    ///
    /// # Errors
    ///
    /// 发送失败时返回 [`Error::Delivery`]。调用方应记录该错误，
    /// 但不应因此回滚已创建的质询或 token。
    async fn send(&self, destination: &str, subject: &str, body: &str) -> Result<()>;
}

/// 已发送的消息记录
#[derive(Debug, Clone)]
pub struct SentMessage {
    /// 目标地址
    pub destination: String,

    /// 消息主题
    pub subject: String,

    /// 消息正文
    pub body: String,
}

/// 内存投递实现
///
/// 把消息记录在内存里而不真正发送，适用于测试和本地开发。
/// 可通过 [`set_failing`](InMemoryNotifier::set_failing) 模拟投递故障。
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<SentMessage>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryNotifier {
    /// 创建新的内存投递器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置是否模拟投递失败
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 获取已发送的消息数量
    pub fn len(&self) -> usize {
        self.sent.read().unwrap().len()
    }

    /// 检查是否没有发送过任何消息
    pub fn is_empty(&self) -> bool {
        self.sent.read().unwrap().is_empty()
    }

    /// 获取所有已发送消息的副本
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().unwrap().clone()
    }

    /// 获取最后一条已发送消息
    pub fn last(&self) -> Option<SentMessage> {
        self.sent.read().unwrap().last().cloned()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, destination: &str, subject: &str, body: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Delivery(DeliveryError::SendFailed(
                "simulated delivery failure".to_string(),
            )));
        }

        let mut sent = self.sent.write().unwrap();
        sent.push(SentMessage {
            destination: destination.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_sent_messages() {
        let notifier = InMemoryNotifier::new();
        assert!(notifier.is_empty());

        notifier
            .send("user@example.com", "Your login code", "123456")
            .await
            .unwrap();

        assert_eq!(notifier.len(), 1);
        let message = notifier.last().unwrap();
        assert_eq!(message.destination, "user@example.com");
        assert_eq!(message.subject, "Your login code");
        assert_eq!(message.body, "123456");
    }

    #[tokio::test]
    async fn test_failing_mode() {
        let notifier = InMemoryNotifier::new();
        notifier.set_failing(true);

        let result = notifier.send("user@example.com", "subject", "body").await;
        assert!(matches!(result, Err(Error::Delivery(_))));
        assert!(notifier.is_empty());

        // 恢复后可以正常发送
        notifier.set_failing(false);
        assert!(notifier.send("user@example.com", "s", "b").await.is_ok());
        assert_eq!(notifier.len(), 1);
    }
}
