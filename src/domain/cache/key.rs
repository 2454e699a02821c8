//! Cache Context - Cache Key
//!
//! 缓存 key 格式: `<md5(normalized_text)>|<voice_id>|<speed>`
//!
//! - 文本先归一化（NFC、去零宽字符、折叠空白），视觉相同的文本得到同一 key
//! - 语速四舍五入到一位小数（1.0 与 1.00000001 是同一个 key）；NaN、无穷和非正数无法生成 key

use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::UnicodeNormalization;

use super::errors::CacheError;

/// key 各段之间的分隔符
pub const KEY_DELIMITER: char = '|';

const TEXT_HASH_LEN: usize = 32;
const MAX_VOICE_ID_LEN: usize = 128;

/// 零宽字符和软连字符，归一化时移除
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
    )
}

/// 文本归一化
///
/// 去除零宽字符 -> NFC 规范化 -> 折叠空白并去掉首尾空白
pub fn normalize_text(text: &str) -> String {
    let composed: String = text.chars().filter(|c| !is_invisible(*c)).nfc().collect();
    composed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 计算归一化文本的哈希
pub fn hash_text(text: &str) -> String {
    let digest = md5::compute(normalize_text(text).as_bytes());
    format!("{:x}", digest)
}

/// 解析后的 key 组成部分
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyParts {
    pub text_hash: String,
    pub voice_id: String,
    /// 语速，以 0.1 为单位
    pub speed_tenths: u32,
}

impl KeyParts {
    pub fn speed(&self) -> f32 {
        self.speed_tenths as f32 / 10.0
    }

    fn speed_label(&self) -> String {
        format!("{}.{}", self.speed_tenths / 10, self.speed_tenths % 10)
    }
}

/// 缓存 key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// 由 (text, voice_id, speed) 生成 key
    pub fn generate(text: &str, voice_id: &str, speed: f32) -> Result<Self, CacheError> {
        validate_voice_id(voice_id)?;
        let speed_tenths = round_speed(speed)?;

        let parts = KeyParts {
            text_hash: hash_text(text),
            voice_id: voice_id.to_string(),
            speed_tenths,
        };
        Ok(Self::from_parts(&parts))
    }

    pub fn from_parts(parts: &KeyParts) -> Self {
        Self(format!(
            "{}{d}{}{d}{}",
            parts.text_hash,
            parts.voice_id,
            parts.speed_label(),
            d = KEY_DELIMITER
        ))
    }

    /// 解析 key，`from_parts` 的严格逆运算
    pub fn parse(key: &str) -> Option<KeyParts> {
        let mut segments = key.split(KEY_DELIMITER);
        let text_hash = segments.next()?;
        let voice_id = segments.next()?;
        let speed = segments.next()?;
        if segments.next().is_some() {
            return None;
        }

        if text_hash.len() != TEXT_HASH_LEN
            || !text_hash
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return None;
        }
        validate_voice_id(voice_id).ok()?;

        Some(KeyParts {
            text_hash: text_hash.to_string(),
            voice_id: voice_id.to_string(),
            speed_tenths: parse_speed_label(speed)?,
        })
    }

    pub fn is_valid(key: &str) -> bool {
        Self::parse(key).is_some()
    }

    pub fn parts(&self) -> Option<KeyParts> {
        Self::parse(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn validate_voice_id(voice_id: &str) -> Result<(), CacheError> {
    if voice_id.is_empty() {
        return Err(CacheError::KeyGenerationFailed(
            "voice id cannot be empty".to_string(),
        ));
    }
    if voice_id.len() > MAX_VOICE_ID_LEN {
        return Err(CacheError::KeyGenerationFailed(format!(
            "voice id longer than {} bytes",
            MAX_VOICE_ID_LEN
        )));
    }
    if voice_id
        .chars()
        .any(|c| c == KEY_DELIMITER || c.is_control())
    {
        return Err(CacheError::KeyGenerationFailed(format!(
            "voice id contains reserved characters: {:?}",
            voice_id
        )));
    }
    Ok(())
}

fn round_speed(speed: f32) -> Result<u32, CacheError> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(CacheError::KeyGenerationFailed(format!(
            "speed out of range: {}",
            speed
        )));
    }
    // 超出 u32 的值饱和到上限
    Ok((f64::from(speed) * 10.0).round() as u32)
}

/// 只接受规范形式 `<int>.<digit>`，整数部分无前导零
fn parse_speed_label(label: &str) -> Option<u32> {
    let (int_part, frac_part) = label.split_once('.')?;
    if int_part.is_empty()
        || frac_part.len() != 1
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
        || (int_part.len() > 1 && int_part.starts_with('0'))
    {
        return None;
    }
    let int_value: u32 = int_part.parse().ok()?;
    let frac_value: u32 = frac_part.parse().ok()?;
    int_value.checked_mul(10)?.checked_add(frac_value)
}
