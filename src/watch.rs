//! フォルダ監視モード
//!
//! カメラの保存先フォルダをポーリングし、新しい写真が現れるたびに解析する。
//! 解析は並行に走りうるが、表示するのは最後に開始した解析の結果だけ。

use crate::descriptor::DescriptorService;
use crate::error::Result;
use crate::pipeline::{Recommendation, Recommender};
use crate::presenter;
use crate::scanner::{scan_folder, ImageInfo};
use objectify_common::LatestSlot;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub interval: Duration,
    pub recursive: bool,
    pub verbose: bool,
}

/// 新規ファイルの検出
///
/// 書き込み途中のファイルを拾わないよう、2回連続で同じサイズだったものだけを返す。
#[derive(Debug, Default)]
pub struct FolderWatcher {
    seen: HashSet<PathBuf>,
    pending: HashMap<PathBuf, u64>,
}

impl FolderWatcher {
    /// 監視開始時点で存在するファイルは対象外
    pub fn new(existing: &[ImageInfo]) -> Self {
        Self {
            seen: existing.iter().map(|i| i.path.clone()).collect(),
            pending: HashMap::new(),
        }
    }

    /// スキャン結果から解析可能になった新規ファイルを返す
    pub fn poll(&mut self, scanned: Vec<ImageInfo>) -> Vec<ImageInfo> {
        let present: HashSet<PathBuf> = scanned.iter().map(|i| i.path.clone()).collect();
        let mut ready = Vec::new();

        for image in scanned {
            if self.seen.contains(&image.path) {
                continue;
            }
            match self.pending.get(&image.path) {
                Some(size) if *size == image.size && image.size > 0 => {
                    self.pending.remove(&image.path);
                    self.seen.insert(image.path.clone());
                    ready.push(image);
                }
                _ => {
                    self.pending.insert(image.path.clone(), image.size);
                }
            }
        }

        self.pending.retain(|path, _| present.contains(path));
        ready
    }
}

/// フォルダを監視し、Ctrl-C まで新しい写真を解析し続ける
pub async fn watch_folder<S>(
    recommender: Arc<Recommender<S>>,
    folder: &Path,
    options: WatchOptions,
) -> Result<()>
where
    S: DescriptorService + 'static,
{
    let existing = scan_folder(folder, options.recursive)?;
    let mut watcher = FolderWatcher::new(&existing);
    let slot: Arc<LatestSlot<Recommendation>> = Arc::new(LatestSlot::new());
    let mut tasks = JoinSet::new();
    let mut ticker = tokio::time::interval(options.interval);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    println!(
        "👀 {} を監視中（既存 {}枚は対象外、Ctrl-Cで終了）",
        folder.display(),
        existing.len()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let scanned = match scan_folder(folder, options.recursive) {
                    Ok(scanned) => scanned,
                    Err(e) => {
                        tracing::warn!(error = %e, "フォルダをスキャンできません");
                        continue;
                    }
                };

                let mut ready = watcher.poll(scanned);
                // 同時に複数現れた場合はファイル名順で最後の1枚だけ解析する
                let Some(image) = ready.pop() else {
                    continue;
                };
                for skipped in &ready {
                    tracing::info!(file = %skipped.file_name, latest = %image.file_name, "ファイル名順で後の写真を優先するためスキップ");
                }

                let id = slot.begin();
                tracing::info!(request = %id, file = %image.file_name, "新しい写真を検出");

                let recommender = Arc::clone(&recommender);
                let slot = Arc::clone(&slot);
                let verbose = options.verbose;
                tasks.spawn(async move {
                    match recommender.recommend(&image.path, id).await {
                        Ok(rec) => {
                            let file_name = rec.file_name.clone();
                            let shown = slot.apply_with(id, rec, |rec| {
                                presenter::print_recommendation(rec, verbose);
                                println!();
                            });
                            if !shown {
                                tracing::info!(request = %id, file = %file_name, "新しい解析が始まっているため結果を破棄");
                            }
                        }
                        Err(e) => {
                            tracing::warn!(request = %id, file = %image.file_name, error = %e, "写真を読み込めません");
                        }
                    }
                });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    tracing::warn!(error = %e, "解析タスクが異常終了しました");
                }
            }
            _ = &mut shutdown => {
                println!("\n監視を終了します");
                break;
            }
        }
    }

    tasks.shutdown().await;
    Ok(())
}
