//! 落盘混淆模块
//!
//! # 设计思路
//!
//! 历史记录中被判定为敏感的文本不以明文形式写入磁盘。
//! 这里的“加密”只是一层可逆混淆：对付随手打开 `history.json` 的人足够，
//! 对付拿到磁盘且有意破解的攻击者则不构成任何安全边界。
//!
//! # 实现思路
//!
//! - 密钥 = SHA-256(种子)，种子默认由主机名与用户名拼成，换一台机器或
//!   换一个用户就无法还原。
//! - 混淆：UTF-8 字节与密钥循环异或，再做标准 Base64 编码以便写入 JSON。
//! - 还原：逆序执行；Base64 非法或结果不是 UTF-8 时返回 `DecodeError`，
//!   由调用方将该字段标记为不可用，绝不 panic。

use base64::{Engine as _, engine::general_purpose};
use sha2::{Digest, Sha256};

/// 种子后缀，与主机名、用户名拼接成本机密钥种子
const SEED_SUFFIX: &str = "PasteGuardian";

/// 混淆字段还原失败
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("混淆字段不是合法的 Base64: {0}")]
    Base64(String),

    #[error("混淆字段还原后不是合法的 UTF-8")]
    Utf8,
}

/// 循环异或混淆器
#[derive(Clone)]
pub struct ObfuscationCodec {
    key: [u8; 32],
}

impl std::fmt::Debug for ObfuscationCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObfuscationCodec").finish_non_exhaustive()
    }
}

impl ObfuscationCodec {
    /// 由任意种子派生密钥
    pub fn derive(seed: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(seed.as_bytes()).into();
        Self { key }
    }

    /// 使用本机主机名与当前用户名派生密钥
    pub fn for_this_machine() -> Self {
        Self::derive(&machine_seed())
    }

    /// 混淆明文，空串原样返回空串
    pub fn obfuscate(&self, plain: &str) -> String {
        if plain.is_empty() {
            return String::new();
        }
        let mixed = self.apply_key(plain.as_bytes());
        general_purpose::STANDARD.encode(mixed)
    }

    /// 还原 `obfuscate` 的输出
    pub fn deobfuscate(&self, cipher: &str) -> Result<String, DecodeError> {
        if cipher.is_empty() {
            return Ok(String::new());
        }
        let mixed = general_purpose::STANDARD
            .decode(cipher.trim())
            .map_err(|e| DecodeError::Base64(e.to_string()))?;
        String::from_utf8(self.apply_key(&mixed)).map_err(|_| DecodeError::Utf8)
    }

    fn apply_key(&self, bytes: &[u8]) -> Vec<u8> {
        bytes
            .iter()
            .zip(self.key.iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect()
    }
}

fn machine_seed() -> String {
    let host = gethostname::gethostname().to_string_lossy().to_string();
    let user = whoami::username();
    format!("{}-{}-{}", host, user, SEED_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_string_stays_empty() {
        let codec = ObfuscationCodec::derive("seed");
        assert_eq!(codec.obfuscate(""), "");
        assert_eq!(codec.deobfuscate("").unwrap(), "");
    }

    #[test]
    fn output_is_not_plaintext() {
        let codec = ObfuscationCodec::derive("seed");
        let cipher = codec.obfuscate("hello@example.com");
        assert!(!cipher.contains("hello"));
        assert!(!cipher.contains("example"));
    }

    #[test]
    fn different_seeds_do_not_cross_decode() {
        let a = ObfuscationCodec::derive("host-a-user");
        let b = ObfuscationCodec::derive("host-b-user");
        let cipher = a.obfuscate("4111 1111 1111 1111");
        assert_ne!(b.deobfuscate(&cipher).ok().as_deref(), Some("4111 1111 1111 1111"));
    }

    #[test]
    fn malformed_base64_is_reported() {
        let codec = ObfuscationCodec::derive("seed");
        assert!(matches!(codec.deobfuscate("!!not base64!!"), Err(DecodeError::Base64(_))));
    }

    #[test]
    fn truncated_input_is_reported() {
        let codec = ObfuscationCodec::derive("seed");
        let cipher = codec.obfuscate("a fairly long secret value");
        let truncated = &cipher[..cipher.len() - 3];
        assert!(codec.deobfuscate(truncated).is_err());
    }

    #[test]
    fn machine_codec_round_trips() {
        let codec = ObfuscationCodec::for_this_machine();
        assert_eq!(codec.deobfuscate(&codec.obfuscate("주민번호 900101-1234567")).unwrap(), "주민번호 900101-1234567");
    }

    proptest! {
        #[test]
        fn round_trip_any_string(text in any::<String>(), seed in "[a-z0-9-]{1,24}") {
            let codec = ObfuscationCodec::derive(&seed);
            prop_assert_eq!(codec.deobfuscate(&codec.obfuscate(&text)).unwrap(), text);
        }
    }
}
