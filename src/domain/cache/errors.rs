//! Cache Context - Errors
//!
//! 两层错误：
//! - `StorageError`: 存储适配器返回的带标签错误（协调器按变体分派，不做字符串匹配）
//! - `CacheError`: 缓存对外的错误分类

use thiserror::Error;

/// 存储后端错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// 配额/磁盘空间不足
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// 单次事务失败（可重试的瞬时错误）
    #[error("Storage transaction failed: {0}")]
    Transaction(String),

    /// 数据损坏
    #[error("Storage data corrupted: {0}")]
    Corrupted(String),

    /// 存储处于不可用状态（未打开、已关闭等）
    #[error("Storage in invalid state: {0}")]
    InvalidState(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 未知错误
    #[error("Unknown storage error: {0}")]
    Unknown(String),
}

impl StorageError {
    /// 是否为不可恢复的错误（触发 fallback 模式）
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StorageError::InvalidState(_) | StorageError::Corrupted(_) | StorageError::Unknown(_)
        )
    }
}

/// 缓存错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Storage initialization failed: {0}")]
    StorageInitFailed(String),

    #[error("Entry too large: {size} bytes exceeds limit of {limit} bytes")]
    EntryTooLarge { size: u64, limit: u64 },

    #[error("Cache full: need {needed} bytes, budget is {available} bytes")]
    CacheFull { needed: u64, available: u64 },

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl CacheError {
    /// 是否需要切换到 fallback 模式
    pub fn is_critical(&self) -> bool {
        match self {
            CacheError::StorageInitFailed(_) | CacheError::CorruptedData(_) => true,
            CacheError::Storage(e) => e.is_critical(),
            _ => false,
        }
    }

    /// 是否为空间不足类错误（可通过激进淘汰后重试一次）
    pub fn is_out_of_space(&self) -> bool {
        matches!(
            self,
            CacheError::CacheFull { .. } | CacheError::QuotaExceeded(_)
        )
    }
}

impl From<StorageError> for CacheError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::QuotaExceeded(msg) => CacheError::QuotaExceeded(msg),
            StorageError::Transaction(msg) => CacheError::TransactionFailed(msg),
            StorageError::Corrupted(msg) => CacheError::CorruptedData(msg),
            StorageError::Serialization(msg) => CacheError::TransactionFailed(msg),
            other => CacheError::Storage(other),
        }
    }
}
