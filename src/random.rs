//! 安全随机数生成模块
//!
//! 提供密码学安全的随机数生成功能，用于生成验证码和一次性 token。
//! 验证码本身就是凭据，因此必须来自操作系统的 CSPRNG，绝不能使用可预测的 PRNG。

use rand::{TryRngCore, rngs::OsRng};

use crate::error::{CryptoError, Error, Result};

/// 生成指定长度的随机字节数组
///
/// 使用操作系统提供的密码学安全随机数生成器 (CSPRNG)
///
/// # Arguments
///
/// * `length` - 要生成的字节数
///
/// # Example
///
/// ```rust
/// use passless::random::generate_random_bytes;
///
/// let bytes = generate_random_bytes(32).unwrap();
/// assert_eq!(bytes.len(), 32);
/// ```
pub fn generate_random_bytes(length: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Crypto(CryptoError::RngFailed(format!("{:?}", e))))?;
    Ok(bytes)
}

/// 生成指定位数的十进制数字验证码
///
/// 每一位数字都从 CSPRNG 独立采样，并用拒绝采样消除取模偏差，
/// 保证 0-9 每个数字等概率出现（允许前导零）。
///
/// # Arguments
///
/// * `length` - 验证码位数
///
/// # Example
///
/// ```rust
/// use passless::random::generate_numeric_code;
///
/// let code = generate_numeric_code(6).unwrap();
/// assert_eq!(code.len(), 6);
/// assert!(code.chars().all(|c| c.is_ascii_digit()));
/// ```
pub fn generate_numeric_code(length: usize) -> Result<String> {
    let mut code = String::with_capacity(length);

    while code.len() < length {
        let bytes = generate_random_bytes(length.max(8))?;
        for byte in bytes {
            // 250..=255 会使 0-5 出现概率偏高，直接丢弃
            if byte >= 250 {
                continue;
            }
            code.push(char::from(b'0' + byte % 10));
            if code.len() == length {
                break;
            }
        }
    }

    Ok(code)
}

/// 生成指定长度的 Base64 URL 安全随机字符串
///
/// 使用 URL 安全的 Base64 编码（不含填充），可直接嵌入链接参数。
///
/// # Arguments
///
/// * `byte_length` - 要生成的字节数
///
/// # Example
///
/// ```rust
/// use passless::random::generate_opaque_token;
///
/// let token = generate_opaque_token(32).unwrap();
/// assert!(!token.contains('+'));
/// assert!(!token.contains('/'));
/// ```
pub fn generate_opaque_token(byte_length: usize) -> Result<String> {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    let bytes = generate_random_bytes(byte_length)?;
    Ok(URL_SAFE_NO_PAD.encode(&bytes))
}

// ============================================================================
// 辅助函数
// ============================================================================

/// 将字节数组编码为十六进制字符串
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// 常量时间比较两个字节切片
///
/// 用于防止时序攻击
///
/// # Example
///
/// ```rust
/// use passless::random::constant_time_compare;
///
/// assert!(constant_time_compare(b"123456", b"123456"));
/// assert!(!constant_time_compare(b"123456", b"654321"));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

/// 常量时间比较两个字符串
pub fn constant_time_compare_str(a: &str, b: &str) -> bool {
    constant_time_compare(a.as_bytes(), b.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_random_bytes() {
        let bytes = generate_random_bytes(32).unwrap();
        assert_eq!(bytes.len(), 32);

        // 确保生成的是随机的（两次生成不应相同）
        let bytes2 = generate_random_bytes(32).unwrap();
        assert_ne!(bytes, bytes2);
    }

    #[test]
    fn test_generate_numeric_code_length() {
        for length in [4, 6, 8, 10] {
            let code = generate_numeric_code(length).unwrap();
            assert_eq!(code.len(), length);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_generate_numeric_code_unique() {
        let codes: HashSet<_> = (0..50)
            .map(|_| generate_numeric_code(8).unwrap())
            .collect();
        // 8 位验证码 50 次生成全部碰撞的概率可以忽略
        assert!(codes.len() > 45);
    }

    #[test]
    fn test_generate_numeric_code_covers_all_digits() {
        let mut seen = HashSet::new();
        for _ in 0..100 {
            for c in generate_numeric_code(10).unwrap().chars() {
                seen.insert(c);
            }
        }
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn test_generate_opaque_token() {
        let token = generate_opaque_token(32).unwrap();

        // URL 安全的 base64 不应包含 + / =
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
        assert!(!token.contains('='));

        let token2 = generate_opaque_token(32).unwrap();
        assert_ne!(token, token2);
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x00, 0xff, 0x10]), "00ff10");
        assert_eq!(hex_encode(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"123456", b"123456"));
        assert!(!constant_time_compare(b"123456", b"123457"));
        assert!(!constant_time_compare(b"123456", b"12345"));
    }

    #[test]
    fn test_constant_time_compare_str() {
        assert!(constant_time_compare_str("847291", "847291"));
        assert!(!constant_time_compare_str("847291", "847292"));
    }
}
