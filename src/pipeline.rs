//! 解析パイプライン
//!
//! 画像エンコード → キャッシュ参照 → 説明テキスト取得 → パース → カタログ照合。
//! サービス・パースの失敗は固定メッセージ付きの失敗結果として返し、呼び出し側を止めない。

use crate::descriptor::{CacheFile, DescriptorService, EncodedImage};
use crate::error::Result;
use chrono::{DateTime, Local};
use objectify_common::{
    match_catalog, parse_response, Catalog, CatalogEntry, MatchConfig, MatchResult, ParseMode,
    RequestId, TargetFeatureVector, ANALYSIS_FAILED_MESSAGE,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// 解析結果の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Completed,
    Failed,
}

/// 画像1枚分の推薦結果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub request_id: RequestId,
    pub file_name: String,
    pub analyzed_at: DateTime<Local>,
    pub status: AnalysisStatus,
    /// サービスの生テキスト（失敗時は固定メッセージ）
    pub response_text: String,
    #[serde(default)]
    pub target: Option<TargetFeatureVector>,
    #[serde(default)]
    pub tracks: Vec<CatalogEntry>,
    #[serde(default)]
    pub from_cache: bool,
}

impl Recommendation {
    fn completed(
        request_id: RequestId,
        file_name: String,
        response_text: String,
        target: TargetFeatureVector,
        matched: MatchResult,
        from_cache: bool,
    ) -> Self {
        Self {
            request_id,
            file_name,
            analyzed_at: Local::now(),
            status: AnalysisStatus::Completed,
            response_text,
            target: Some(target),
            tracks: matched.tracks,
            from_cache,
        }
    }

    /// 失敗結果（キャッシュには失敗したレスポンスを置かないので常に新規解析）
    fn failed(request_id: RequestId, file_name: String) -> Self {
        Self {
            request_id,
            file_name,
            analyzed_at: Local::now(),
            status: AnalysisStatus::Failed,
            response_text: ANALYSIS_FAILED_MESSAGE.to_string(),
            target: None,
            tracks: Vec::new(),
            from_cache: false,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == AnalysisStatus::Failed
    }
}

/// 説明テキストをパースしてカタログと照合する（API呼び出しなし）
pub fn rematch(
    catalog: &Catalog,
    match_config: &MatchConfig,
    mode: ParseMode,
    text: &str,
) -> Result<(TargetFeatureVector, MatchResult)> {
    let target = parse_response(text, mode)?;
    let matched = match_catalog(catalog, &target, match_config);

    for entry in matched.iter() {
        tracing::debug!(
            track = %entry.track_name,
            distance = match_config.distance(entry, &target),
            "一致"
        );
    }

    Ok((target, matched))
}

/// レスポンスキャッシュ（保存先ディレクトリ付き）
struct ResponseCache {
    dir: PathBuf,
    file: Mutex<CacheFile>,
}

/// 推薦処理の本体
pub struct Recommender<S> {
    service: S,
    catalog: Arc<Catalog>,
    match_config: MatchConfig,
    mode: ParseMode,
    max_image_size: u32,
    cache: Option<ResponseCache>,
}

impl<S: DescriptorService> Recommender<S> {
    pub fn new(service: S, catalog: Arc<Catalog>, match_config: MatchConfig, mode: ParseMode) -> Self {
        Self {
            service,
            catalog,
            match_config,
            mode,
            max_image_size: 0,
            cache: None,
        }
    }

    /// 送信前に長辺をこのサイズまで縮小する（0 で無効）
    pub fn with_max_image_size(mut self, max_image_size: u32) -> Self {
        self.max_image_size = max_image_size;
        self
    }

    /// レスポンスキャッシュを有効にする
    pub fn with_cache(mut self, dir: &Path) -> Self {
        self.cache = Some(ResponseCache {
            dir: dir.to_path_buf(),
            file: Mutex::new(CacheFile::load(dir)),
        });
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn match_config(&self) -> &MatchConfig {
        &self.match_config
    }

    /// 画像1枚を解析して曲を推薦する
    ///
    /// 画像が読めない場合のみエラー。サービス・パースの失敗は `AnalysisStatus::Failed`。
    /// キャッシュに保存するのはパースできたレスポンスだけ。
    pub async fn recommend(&self, image_path: &Path, request_id: RequestId) -> Result<Recommendation> {
        let image = EncodedImage::load(image_path, self.max_image_size)?;
        let file_name = image.file_name.clone();

        if let Some(text) = self.cached_response(&image) {
            match self.rematch(&text) {
                Ok((target, matched)) => {
                    tracing::info!(request = %request_id, file = %file_name, matched = matched.len(), cached = true, "推薦完了");
                    return Ok(Recommendation::completed(request_id, file_name, text, target, matched, true));
                }
                Err(e) => {
                    tracing::warn!(request = %request_id, file = %file_name, error = %e, "キャッシュ済みレスポンスを読めないため破棄して再解析します");
                    self.forget_response(&image);
                }
            }
        }

        let text = match self.service.describe(&image, self.mode).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(request = %request_id, file = %file_name, error = %e, "画像解析に失敗しました");
                return Ok(Recommendation::failed(request_id, file_name));
            }
        };

        match self.rematch(&text) {
            Ok((target, matched)) => {
                self.store_response(&image, &text);
                tracing::info!(request = %request_id, file = %file_name, matched = matched.len(), cached = false, "推薦完了");
                Ok(Recommendation::completed(request_id, file_name, text, target, matched, false))
            }
            Err(e) => {
                tracing::error!(request = %request_id, file = %file_name, mode = %self.mode, error = %e, "解析レスポンスを読めません");
                Ok(Recommendation::failed(request_id, file_name))
            }
        }
    }

    /// 説明テキストだけからパースと照合をやり直す
    pub fn rematch(&self, text: &str) -> Result<(TargetFeatureVector, MatchResult)> {
        rematch(&self.catalog, &self.match_config, self.mode, text)
    }

    fn cached_response(&self, image: &EncodedImage) -> Option<String> {
        let cache = self.cache.as_ref()?;
        let file = cache.file.lock().unwrap_or_else(|e| e.into_inner());
        let entry = file.get(&image.sha256, self.mode)?;
        tracing::debug!(file = %image.file_name, cached_at = %entry.cached_at, "キャッシュヒット");
        Some(entry.response.clone())
    }

    fn forget_response(&self, image: &EncodedImage) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let mut file = cache.file.lock().unwrap_or_else(|e| e.into_inner());
        if file.remove(&image.sha256, self.mode) {
            if let Err(e) = file.save(&cache.dir) {
                tracing::warn!(error = %e, "キャッシュを保存できませんでした");
            }
        }
    }

    fn store_response(&self, image: &EncodedImage, text: &str) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let mut file = cache.file.lock().unwrap_or_else(|e| e.into_inner());
        file.insert(&image.sha256, self.mode, image.file_name.clone(), text.to_string());
        if let Err(e) = file.save(&cache.dir) {
            tracing::warn!(error = %e, "キャッシュを保存できませんでした");
        }
    }
}
