//! Sled-based Warm Store Implementation
//!
//! 树结构:
//! - `entries`: key -> 音频分片、元数据、时间轴 (bincode)
//! - `summaries`: key -> `EntrySummary` (bincode)
//! - `idx_access`: last_accessed_at(BE) ++ key -> ()，按访问时间有序
//! - `idx_voice`: voice_id ++ 0x00 ++ key -> ()
//! - `meta`: 全局统计记录
//!
//! 同一条目涉及的多棵树在一个 sled 事务中更新

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionalTree,
};
use sled::{Db, Transactional, Tree};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::application::ports::WarmStorePort;
use crate::domain::cache::{
    AudioChunk, CacheEntry, EntrySummary, GlobalStats, PhraseMarker, StorageError,
};

const STATS_KEY: &[u8] = b"__global_stats";
const ENOSPC: i32 = 28;
const EDQUOT: i32 = 122;

/// 条目主体（不含摘要字段）
#[derive(Debug, Serialize, Deserialize)]
struct StoredPayload {
    audio_chunks: Vec<AudioChunk>,
    /// 每个元数据对象的 JSON 文本（bincode 不支持自描述格式）
    metadata: Vec<String>,
    phrase_timeline: Vec<PhraseMarker>,
}

impl StoredPayload {
    fn from_entry(entry: &CacheEntry) -> Result<Self, StorageError> {
        let metadata = entry
            .metadata
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Self {
            audio_chunks: entry.audio_chunks.clone(),
            metadata,
            phrase_timeline: entry.phrase_timeline.clone(),
        })
    }

    fn into_entry(self, summary: EntrySummary) -> Result<CacheEntry, StorageError> {
        let metadata = self
            .metadata
            .iter()
            .map(|m| serde_json::from_str(m))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Corrupted(format!("metadata of {}: {}", summary.key, e)))?;
        Ok(CacheEntry {
            key: summary.key,
            audio_chunks: self.audio_chunks,
            metadata,
            phrase_timeline: self.phrase_timeline,
            total_size_bytes: summary.size_bytes,
            created_at: summary.created_at,
            last_accessed_at: summary.last_accessed_at,
            access_count: summary.access_count,
            voice_id: summary.voice_id,
            speed: summary.speed,
            text_preview: summary.text_preview,
        })
    }
}

struct Trees {
    db: Db,
    entries: Tree,
    summaries: Tree,
    idx_access: Tree,
    idx_voice: Tree,
    meta: Tree,
}

/// Sled warm store
pub struct SledWarmStore {
    path: PathBuf,
    trees: OnceLock<Trees>,
}

impl SledWarmStore {
    /// 创建实例；数据库在 `init` 时打开
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            trees: OnceLock::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn trees(&self) -> Result<&Trees, StorageError> {
        self.trees.get().ok_or_else(|| {
            StorageError::InvalidState(format!(
                "sled store at {} not initialized",
                self.path.display()
            ))
        })
    }

    fn open(&self) -> Result<Trees, StorageError> {
        let db = sled::Config::new()
            .path(&self.path)
            .open()
            .map_err(map_sled_error)?;
        let open_tree = |name: &str| db.open_tree(name).map_err(map_sled_error);
        Ok(Trees {
            entries: open_tree("entries")?,
            summaries: open_tree("summaries")?,
            idx_access: open_tree("idx_access")?,
            idx_voice: open_tree("idx_voice")?,
            meta: open_tree("meta")?,
            db,
        })
    }

    fn decode_summary(bytes: &[u8]) -> Result<EntrySummary, StorageError> {
        bincode::deserialize(bytes).map_err(|e| StorageError::Corrupted(e.to_string()))
    }

    fn all_summaries(trees: &Trees) -> Result<Vec<EntrySummary>, StorageError> {
        trees
            .summaries
            .iter()
            .values()
            .map(|v| Self::decode_summary(&v.map_err(map_sled_error)?))
            .collect()
    }
}

/// 访问索引键：时间戳按无符号大端编码，保证字节序即时间序
fn access_index_key(last_accessed_at: i64, key: &str) -> Vec<u8> {
    let ordered = (last_accessed_at as u64) ^ (1u64 << 63);
    let mut buf = Vec::with_capacity(8 + key.len());
    buf.extend_from_slice(&ordered.to_be_bytes());
    buf.extend_from_slice(key.as_bytes());
    buf
}

fn voice_prefix(voice_id: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(voice_id.len() + 1);
    buf.extend_from_slice(voice_id.as_bytes());
    buf.push(0);
    buf
}

fn voice_index_key(voice_id: &str, key: &str) -> Vec<u8> {
    let mut buf = voice_prefix(voice_id);
    buf.extend_from_slice(key.as_bytes());
    buf
}

fn map_sled_error(err: sled::Error) -> StorageError {
    match err {
        sled::Error::Io(io) => match io.raw_os_error() {
            Some(ENOSPC) | Some(EDQUOT) => StorageError::QuotaExceeded(io.to_string()),
            _ => StorageError::Unknown(format!("I/O error: {}", io)),
        },
        sled::Error::Corruption { at, .. } => {
            StorageError::Corrupted(format!("corruption at {:?}", at))
        }
        other => StorageError::Unknown(other.to_string()),
    }
}

fn map_transaction_error(err: TransactionError<StorageError>) -> StorageError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => match map_sled_error(e) {
            StorageError::Unknown(msg) => StorageError::Transaction(msg),
            other => other,
        },
    }
}

fn abort(err: StorageError) -> ConflictableTransactionError<StorageError> {
    ConflictableTransactionError::Abort(err)
}

/// 事务内删除条目及其索引，返回被删除的摘要
fn remove_in_tx(
    entries: &TransactionalTree,
    summaries: &TransactionalTree,
    idx_access: &TransactionalTree,
    idx_voice: &TransactionalTree,
    key: &str,
) -> Result<Option<EntrySummary>, ConflictableTransactionError<StorageError>> {
    let Some(old) = summaries.remove(key.as_bytes())? else {
        return Ok(None);
    };
    let old = SledWarmStore::decode_summary(&old).map_err(abort)?;
    entries.remove(key.as_bytes())?;
    idx_access.remove(access_index_key(old.last_accessed_at, key))?;
    idx_voice.remove(voice_index_key(&old.voice_id, key))?;
    Ok(Some(old))
}

#[async_trait]
impl WarmStorePort for SledWarmStore {
    async fn init(&self) -> Result<(), StorageError> {
        if self.trees.get().is_some() {
            return Ok(());
        }
        let trees = self.open()?;
        let entry_count = trees.summaries.len();
        // 并发 init 时保留先完成的一个
        let _ = self.trees.set(trees);

        tracing::info!(
            path = %self.path.display(),
            entry_count = entry_count,
            "SledWarmStore initialized"
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        let trees = self.trees()?;
        let Some(summary) = trees.summaries.get(key).map_err(map_sled_error)? else {
            return Ok(None);
        };
        let summary = Self::decode_summary(&summary)?;
        let Some(body) = trees.entries.get(key).map_err(map_sled_error)? else {
            return Err(StorageError::Corrupted(format!(
                "entry body missing for {}",
                key
            )));
        };
        let payload: StoredPayload =
            bincode::deserialize(&body).map_err(|e| StorageError::Corrupted(e.to_string()))?;
        payload.into_entry(summary).map(Some)
    }

    async fn summary(&self, key: &str) -> Result<Option<EntrySummary>, StorageError> {
        let trees = self.trees()?;
        trees
            .summaries
            .get(key)
            .map_err(map_sled_error)?
            .map(|v| Self::decode_summary(&v))
            .transpose()
    }

    async fn contains(&self, key: &str) -> Result<bool, StorageError> {
        self.trees()?
            .summaries
            .contains_key(key)
            .map_err(map_sled_error)
    }

    async fn put(&self, entry: &CacheEntry) -> Result<Option<EntrySummary>, StorageError> {
        let trees = self.trees()?;
        let summary = entry.summary();
        let body = bincode::serialize(&StoredPayload::from_entry(entry)?)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let summary_bytes =
            bincode::serialize(&summary).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let key = entry.key.as_str();

        (
            &trees.entries,
            &trees.summaries,
            &trees.idx_access,
            &trees.idx_voice,
        )
            .transaction(|(entries, summaries, idx_access, idx_voice)| {
                let replaced = remove_in_tx(entries, summaries, idx_access, idx_voice, key)?;
                entries.insert(key.as_bytes(), body.as_slice())?;
                summaries.insert(key.as_bytes(), summary_bytes.as_slice())?;
                idx_access.insert(access_index_key(summary.last_accessed_at, key), Vec::<u8>::new())?;
                idx_voice.insert(voice_index_key(&summary.voice_id, key), Vec::<u8>::new())?;
                Ok(replaced)
            })
            .map_err(map_transaction_error)
    }

    async fn touch(&self, key: &str, accessed_at: i64) -> Result<bool, StorageError> {
        let trees = self.trees()?;
        (&trees.summaries, &trees.idx_access)
            .transaction(|(summaries, idx_access)| {
                let Some(old) = summaries.get(key.as_bytes())? else {
                    return Ok(false);
                };
                let mut summary = Self::decode_summary(&old).map_err(abort)?;
                let previous = summary.last_accessed_at;
                summary.last_accessed_at = previous.max(accessed_at);
                summary.access_count += 1;

                let bytes = bincode::serialize(&summary)
                    .map_err(|e| abort(StorageError::Serialization(e.to_string())))?;
                summaries.insert(key.as_bytes(), bytes)?;
                if summary.last_accessed_at != previous {
                    idx_access.remove(access_index_key(previous, key))?;
                    idx_access.insert(access_index_key(summary.last_accessed_at, key), Vec::<u8>::new())?;
                }
                Ok(true)
            })
            .map_err(map_transaction_error)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<Vec<EntrySummary>, StorageError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let trees = self.trees()?;
        (
            &trees.entries,
            &trees.summaries,
            &trees.idx_access,
            &trees.idx_voice,
        )
            .transaction(|(entries, summaries, idx_access, idx_voice)| {
                let mut removed = Vec::with_capacity(keys.len());
                for key in keys {
                    if let Some(summary) =
                        remove_in_tx(entries, summaries, idx_access, idx_voice, key)?
                    {
                        removed.push(summary);
                    }
                }
                Ok(removed)
            })
            .map_err(map_transaction_error)
    }

    async fn summaries(&self) -> Result<Vec<EntrySummary>, StorageError> {
        Self::all_summaries(self.trees()?)
    }

    async fn summaries_by_last_access(&self) -> Result<Vec<EntrySummary>, StorageError> {
        let trees = self.trees()?;
        let mut result = Vec::with_capacity(trees.summaries.len());
        for item in trees.idx_access.iter().keys() {
            let index_key = item.map_err(map_sled_error)?;
            let Some(key_bytes) = index_key.get(8..) else {
                return Err(StorageError::Corrupted("malformed access index".to_string()));
            };
            // 索引与摘要在同一事务中维护，缺失说明数据不一致，跳过即可
            if let Some(v) = trees.summaries.get(key_bytes).map_err(map_sled_error)? {
                result.push(Self::decode_summary(&v)?);
            }
        }
        Ok(result)
    }

    async fn summaries_for_voice(
        &self,
        voice_id: &str,
    ) -> Result<Vec<EntrySummary>, StorageError> {
        let trees = self.trees()?;
        let prefix = voice_prefix(voice_id);
        let mut result = Vec::new();
        for item in trees.idx_voice.scan_prefix(&prefix).keys() {
            let index_key = item.map_err(map_sled_error)?;
            let key_bytes = &index_key[prefix.len()..];
            if let Some(v) = trees.summaries.get(key_bytes).map_err(map_sled_error)? {
                result.push(Self::decode_summary(&v)?);
            }
        }
        Ok(result)
    }

    async fn get_all(&self) -> Result<Vec<CacheEntry>, StorageError> {
        let summaries = self.summaries().await?;
        let mut entries = Vec::with_capacity(summaries.len());
        for summary in summaries {
            if let Some(entry) = self.get(&summary.key).await? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let trees = self.trees()?;
        for tree in [
            &trees.entries,
            &trees.summaries,
            &trees.idx_access,
            &trees.idx_voice,
        ] {
            tree.clear().map_err(map_sled_error)?;
        }
        tracing::info!(path = %self.path.display(), "SledWarmStore cleared");
        Ok(())
    }

    async fn load_stats(&self) -> Result<Option<GlobalStats>, StorageError> {
        let trees = self.trees()?;
        match trees.meta.get(STATS_KEY).map_err(map_sled_error)? {
            Some(v) => bincode::deserialize(&v)
                .map(Some)
                .map_err(|e| StorageError::Corrupted(format!("global stats: {}", e))),
            None => Ok(None),
        }
    }

    async fn save_stats(&self, stats: &GlobalStats) -> Result<(), StorageError> {
        let trees = self.trees()?;
        let bytes =
            bincode::serialize(stats).map_err(|e| StorageError::Serialization(e.to_string()))?;
        trees
            .meta
            .insert(STATS_KEY, bytes)
            .map_err(map_sled_error)?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let trees = self.trees()?;
        trees.db.flush_async().await.map_err(map_sled_error)?;
        Ok(())
    }
}
