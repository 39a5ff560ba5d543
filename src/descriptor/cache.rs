//! 解析レスポンスキャッシュモジュール
//!
//! 画像のSHA-256とパースモードをキーにして生のレスポンステキストをキャッシュし、
//! 同じ画像の再解析（API呼び出し）をスキップする。照合はキャッシュ後に毎回やり直す。

use crate::error::Result;
use chrono::{DateTime, Local};
use objectify_common::ParseMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

const CACHE_FILE_NAME: &str = ".objectify-cache.json";

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    /// バージョン（互換性チェック用）
    version: u32,
    /// キー → レスポンスのマップ
    entries: HashMap<String, CacheEntry>,
}

/// キャッシュエントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub file_name: String,
    pub mode: ParseMode,
    pub response: String,
    pub cached_at: DateTime<Local>,
}

impl CacheFile {
    const CURRENT_VERSION: u32 = 1;

    pub fn cache_path(dir: &Path) -> PathBuf {
        dir.join(CACHE_FILE_NAME)
    }

    /// キー（モードによってプロンプトが変わるため区別する）
    pub fn key(sha256: &str, mode: ParseMode) -> String {
        format!("{}:{}", sha256, mode)
    }

    /// キャッシュファイルを読み込み（無い・壊れている・版違いは空）
    pub fn load(dir: &Path) -> Self {
        let cache_path = Self::cache_path(dir);
        if !cache_path.exists() {
            return Self::default();
        }

        let file = match File::open(&cache_path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(path = %cache_path.display(), error = %e, "キャッシュを開けません");
                return Self::default();
            }
        };

        match serde_json::from_reader::<_, CacheFile>(BufReader::new(file)) {
            Ok(cache) if cache.version == Self::CURRENT_VERSION => cache,
            Ok(cache) => {
                tracing::info!(found = cache.version, "キャッシュバージョン不一致、再生成します");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "キャッシュが壊れているため再生成します");
                Self::default()
            }
        }
    }

    /// キャッシュファイルを保存
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let file = File::create(Self::cache_path(dir))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// キャッシュファイルを削除（存在しなければ false）
    pub fn clear(dir: &Path) -> Result<bool> {
        let cache_path = Self::cache_path(dir);
        if !cache_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(cache_path)?;
        Ok(true)
    }

    pub fn get(&self, sha256: &str, mode: ParseMode) -> Option<&CacheEntry> {
        self.entries.get(&Self::key(sha256, mode))
    }

    pub fn insert(&mut self, sha256: &str, mode: ParseMode, file_name: String, response: String) {
        self.entries.insert(
            Self::key(sha256, mode),
            CacheEntry {
                file_name,
                mode,
                response,
                cached_at: Local::now(),
            },
        );
    }

    /// エントリを削除（存在した場合 true）
    pub fn remove(&mut self, sha256: &str, mode: ParseMode) -> bool {
        self.entries.remove(&Self::key(sha256, mode)).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_mode_is_part_of_key() {
        let mut cache = CacheFile::default();
        cache.insert("abc", ParseMode::Lenient, "a.jpg".into(), "lines".into());

        assert!(cache.get("abc", ParseMode::Lenient).is_some());
        assert!(cache.get("abc", ParseMode::Strict).is_none());
        assert!(cache.get("abc", ParseMode::Structured).is_none());
    }

    #[test]
    fn test_remove_only_that_mode() {
        let mut cache = CacheFile::default();
        cache.insert("abc", ParseMode::Strict, "a.jpg".into(), "bad".into());
        cache.insert("abc", ParseMode::Lenient, "a.jpg".into(), "lines".into());

        assert!(cache.remove("abc", ParseMode::Strict));
        assert!(!cache.remove("abc", ParseMode::Strict));
        assert!(cache.get("abc", ParseMode::Lenient).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_version_mismatch_resets() {
        let dir = tempdir().unwrap();
        std::fs::write(
            CacheFile::cache_path(dir.path()),
            r#"{"version": 99, "entries": {}}"#,
        )
        .unwrap();

        let cache = CacheFile::load(dir.path());
        assert!(cache.is_empty());
        assert_eq!(cache.version, CacheFile::CURRENT_VERSION);
    }

    #[test]
    fn test_corrupt_file_resets() {
        let dir = tempdir().unwrap();
        std::fs::write(CacheFile::cache_path(dir.path()), "not json").unwrap();
        assert!(CacheFile::load(dir.path()).is_empty());
    }
}
