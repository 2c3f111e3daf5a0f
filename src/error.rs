//! 统一错误类型模块
//!
//! 提供 passless 库中所有操作的错误类型定义。
//!
//! 注意：协议层的可恢复结果（验证码不匹配、已过期、尝试次数超限、记录不存在等）
//! **不是**错误，它们作为各模块的结果枚举（如 `VerifyOutcome`）在 `Ok(..)` 中返回。
//! 这里的 `Error` 只表示应当中止操作的硬性失败：配置缺失、依赖不可用、加密失败等。

use std::fmt;

/// passless 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// passless 库的错误类型
#[derive(Debug)]
pub enum Error {
    /// 配置错误（缺失必需项、非法取值），致命，不允许降级运行
    Config(ConfigError),

    /// 记录存储错误，属于瞬态失败，调用方可重试
    Storage(StorageError),

    /// 身份目录错误，属于瞬态失败，调用方可重试
    Directory(DirectoryError),

    /// 消息投递错误，对创建类操作非致命，由调用方记录
    Delivery(DeliveryError),

    /// 加密/随机数错误
    Crypto(CryptoError),
}

impl Error {
    /// 创建一个"缺少必需配置"错误
    pub fn missing_config(key: impl Into<String>) -> Self {
        Error::Config(ConfigError::MissingRequired(key.into()))
    }

    /// 创建一个"配置取值非法"错误
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config(ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        })
    }

    /// 创建一个存储操作失败错误
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(StorageError::OperationFailed(msg.into()))
    }

    /// 创建一个投递失败错误
    pub fn delivery(msg: impl Into<String>) -> Self {
        Error::Delivery(DeliveryError::SendFailed(msg.into()))
    }
}

/// 配置相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 缺少必需的配置
    MissingRequired(String),
    /// 无效的配置值
    InvalidValue { key: String, message: String },
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 存储不可用（连接失败、超时）
    Unavailable(String),
    /// 操作失败
    OperationFailed(String),
}

/// 身份目录相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// 目录不可用（连接失败、超时）
    Unavailable(String),
    /// 操作失败
    OperationFailed(String),
}

/// 消息投递相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// 发送失败
    SendFailed(String),
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// 随机数生成失败
    RngFailed(String),
    /// 密钥无效
    InvalidKey(String),
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Config error: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
            Error::Directory(e) => write!(f, "Directory error: {}", e),
            Error::Delivery(e) => write!(f, "Delivery error: {}", e),
            Error::Crypto(e) => write!(f, "Crypto error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(key) => {
                write!(f, "missing required configuration: {}", key)
            }
            ConfigError::InvalidValue { key, message } => {
                write!(f, "invalid configuration value for '{}': {}", key, message)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
            StorageError::OperationFailed(msg) => write!(f, "store operation failed: {}", msg),
        }
    }
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryError::Unavailable(msg) => write!(f, "directory unavailable: {}", msg),
            DirectoryError::OperationFailed(msg) => {
                write!(f, "directory operation failed: {}", msg)
            }
        }
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::SendFailed(msg) => write!(f, "message send failed: {}", msg),
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::RngFailed(msg) => write!(f, "random number generation failed: {}", msg),
            CryptoError::InvalidKey(msg) => write!(f, "invalid key: {}", msg),
        }
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
impl std::error::Error for DirectoryError {}
impl std::error::Error for DeliveryError {}
impl std::error::Error for CryptoError {}

// ============================================================================
// From 实现 - 方便错误转换
// ============================================================================

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<DirectoryError> for Error {
    fn from(err: DirectoryError) -> Self {
        Error::Directory(err)
    }
}

impl From<DeliveryError> for Error {
    fn from(err: DeliveryError) -> Self {
        Error::Delivery(err)
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        Error::Crypto(err)
    }
}
