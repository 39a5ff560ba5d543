//! 最新結果ガード
//!
//! 解析リクエストに単調増加のIDを振り、完了時に最新IDの結果だけを採用する。
//! 後から始めた解析より先に古い解析が終わっても、表示中の結果を上書きしない。

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// 解析リクエストID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// リクエストIDの発行元
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: AtomicU64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新しいIDを発行（以前のIDはすべて古くなる）
    pub fn issue(&self) -> RequestId {
        RequestId(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// 最後に発行したID（未発行なら None）
    pub fn latest(&self) -> Option<RequestId> {
        match self.latest.load(Ordering::SeqCst) {
            0 => None,
            n => Some(RequestId(n)),
        }
    }

    pub fn is_latest(&self, id: RequestId) -> bool {
        self.latest() == Some(id)
    }
}

/// 表示中の結果を1つだけ保持するスロット
#[derive(Debug)]
pub struct LatestSlot<T> {
    tracker: RequestTracker,
    current: Mutex<Option<(RequestId, T)>>,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self {
            tracker: RequestTracker::new(),
            current: Mutex::new(None),
        }
    }
}

impl<T: Clone> LatestSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新しい解析を開始する
    pub fn begin(&self) -> RequestId {
        self.tracker.issue()
    }

    /// 完了した結果を反映する
    ///
    /// 最新IDの結果だけを保存し true を返す。古いリクエストの結果は捨てて false。
    pub fn apply(&self, id: RequestId, value: T) -> bool {
        self.apply_with(id, value, |_| {})
    }

    /// `apply` と同じだが、反映する場合はロックを保持したまま `on_applied` を呼ぶ
    ///
    /// 表示をこの中で行えば、古い結果が新しい結果の後に表示されることはない。
    pub fn apply_with<F>(&self, id: RequestId, value: T, on_applied: F) -> bool
    where
        F: FnOnce(&T),
    {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if !self.tracker.is_latest(id) {
            return false;
        }
        if matches!(current.as_ref(), Some((stored, _)) if *stored > id) {
            return false;
        }

        on_applied(&value);
        *current = Some((id, value));
        true
    }

    /// 表示中の結果
    pub fn current(&self) -> Option<(RequestId, T)> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn latest_request(&self) -> Option<RequestId> {
        self.tracker.latest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_issue_is_monotonic() {
        let tracker = RequestTracker::new();
        assert_eq!(tracker.latest(), None);

        let a = tracker.issue();
        let b = tracker.issue();
        assert!(b > a);
        assert!(tracker.is_latest(b));
        assert!(!tracker.is_latest(a));
    }

    #[test]
    fn test_stale_result_is_dropped() {
        let slot = LatestSlot::new();
        let first = slot.begin();
        let second = slot.begin();

        // 新しい方が先に完了
        assert!(slot.apply(second, "second"));
        // 古い方が後から完了しても上書きしない
        assert!(!slot.apply(first, "first"));

        assert_eq!(slot.current(), Some((second, "second")));
    }

    #[test]
    fn test_older_completion_before_newer_is_dropped() {
        let slot = LatestSlot::new();
        let first = slot.begin();
        let second = slot.begin();

        assert!(!slot.apply(first, 1));
        assert_eq!(slot.current(), None);
        assert!(slot.apply(second, 2));
        assert_eq!(slot.current(), Some((second, 2)));
    }

    #[test]
    fn test_apply_with_runs_only_for_latest() {
        let slot = LatestSlot::new();
        let first = slot.begin();
        let second = slot.begin();
        let mut shown = Vec::new();

        assert!(slot.apply_with(second, "second", |v| shown.push(*v)));
        assert!(!slot.apply_with(first, "first", |v| shown.push(*v)));
        assert_eq!(shown, vec!["second"]);
    }

    #[test]
    fn test_apply_with_serializes_presentation() {
        let slot = Arc::new(LatestSlot::new());
        let shown = Arc::new(Mutex::new(Vec::new()));
        let ids: Vec<RequestId> = (0..16).map(|_| slot.begin()).collect();

        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let slot = Arc::clone(&slot);
                let shown = Arc::clone(&shown);
                std::thread::spawn(move || {
                    slot.apply_with(id, id.0, |v| shown.lock().unwrap().push(*v));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // 表示されるのは最新の結果だけ
        assert_eq!(*shown.lock().unwrap(), vec![16]);
        assert_eq!(slot.current().map(|(id, _)| id), Some(RequestId(16)));
    }

    #[test]
    fn test_single_request_applies() {
        let slot = LatestSlot::new();
        let id = slot.begin();
        assert!(slot.apply(id, vec!["track"]));
        assert_eq!(slot.latest_request(), Some(id));
    }

    #[test]
    fn test_concurrent_issue_unique() {
        let tracker = Arc::new(RequestTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || (0..100).map(|_| tracker.issue().0).collect::<Vec<_>>())
            })
            .collect();

        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 800);
        assert_eq!(tracker.latest(), Some(RequestId(800)));
    }
}
