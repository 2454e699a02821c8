//! Cache Context - Eviction Selection
//!
//! 纯选择逻辑：最久未访问优先，相同访问时间保持候选列表中的原有顺序

use super::entry::EntrySummary;

/// 按最后访问时间升序排列（稳定排序）
pub fn sort_oldest_first(entries: &mut [EntrySummary]) {
    entries.sort_by_key(|e| e.last_accessed_at);
}

/// 选择要淘汰的条目，直到累计字节数 >= `target_bytes` 或候选耗尽
pub fn select_for_bytes(entries: &[EntrySummary], target_bytes: u64) -> Vec<EntrySummary> {
    if target_bytes == 0 {
        return Vec::new();
    }

    let mut candidates = entries.to_vec();
    sort_oldest_first(&mut candidates);

    let mut selected = Vec::new();
    let mut freed = 0u64;
    for entry in candidates {
        if freed >= target_bytes {
            break;
        }
        freed += entry.size_bytes;
        selected.push(entry);
    }
    selected
}

/// 选择最旧的 `min(count, len)` 个条目
pub fn select_oldest(entries: &[EntrySummary], count: usize) -> Vec<EntrySummary> {
    let mut candidates = entries.to_vec();
    sort_oldest_first(&mut candidates);
    candidates.truncate(count);
    candidates
}

/// `max(0, current_size - max_size * target_pct)`
pub fn calculate_eviction_amount(current_size: u64, max_size: u64, target_pct: f64) -> u64 {
    let target = (max_size as f64 * target_pct).floor() as u64;
    current_size.saturating_sub(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, size: u64, last_accessed_at: i64) -> EntrySummary {
        EntrySummary {
            key: key.to_string(),
            voice_id: "bf_lily".to_string(),
            speed: 1.0,
            size_bytes: size,
            created_at: 0,
            last_accessed_at,
            access_count: 0,
            text_preview: String::new(),
        }
    }

    #[test]
    fn test_select_for_bytes_batch_accounting() {
        let entries = vec![
            entry("a", 1000, 1),
            entry("b", 1500, 2),
            entry("c", 2000, 3),
        ];
        let selected = select_for_bytes(&entries, 2000);
        let keys: Vec<_> = selected.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(selected.iter().map(|e| e.size_bytes).sum::<u64>(), 2500);
    }

    #[test]
    fn test_select_for_bytes_sorts_by_access_time() {
        let entries = vec![
            entry("newest", 100, 30),
            entry("oldest", 100, 10),
            entry("middle", 100, 20),
        ];
        let selected = select_for_bytes(&entries, 150);
        let keys: Vec<_> = selected.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["oldest", "middle"]);
    }

    #[test]
    fn test_ties_keep_candidate_order() {
        let entries = vec![entry("x", 10, 5), entry("y", 10, 5), entry("z", 10, 5)];
        let selected = select_oldest(&entries, 2);
        let keys: Vec<_> = selected.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["x", "y"]);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(select_for_bytes(&[], 1000).is_empty());
        assert!(select_for_bytes(&[entry("a", 10, 1)], 0).is_empty());
        assert!(select_oldest(&[], 3).is_empty());
    }

    #[test]
    fn test_target_larger_than_everything_selects_all() {
        let entries = vec![entry("a", 10, 1), entry("b", 10, 2)];
        assert_eq!(select_for_bytes(&entries, 1_000_000).len(), 2);
        assert_eq!(select_oldest(&entries, 10).len(), 2);
    }

    #[test]
    fn test_calculate_eviction_amount() {
        assert_eq!(calculate_eviction_amount(900, 1000, 0.8), 100);
        assert_eq!(calculate_eviction_amount(700, 1000, 0.8), 0);
    }
}
