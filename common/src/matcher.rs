//! 曲照合モジュール
//!
//! 目標特徴量との差が許容幅に収まる曲をカタログ順に選ぶ。
//! スコア順の並べ替えはしない（安定フィルタ + 先頭N件）。

use crate::catalog::Catalog;
use crate::types::{CatalogEntry, Feature, MatchResult, TargetFeatureVector};
use serde::{Deserialize, Serialize};

/// 照合で必ず比較する特徴量
pub const ENFORCED_FEATURES: [Feature; 4] = [
    Feature::Danceability,
    Feature::Energy,
    Feature::Valence,
    Feature::Loudness,
];

/// 照合設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// 許容幅（0〜1スケールでの絶対差）
    pub tolerance: f64,
    /// loudness の差をこの値で割ってから比較する（dBの値域幅）
    pub loudness_scale: f64,
    /// 地域ラベルも一致させるか
    pub match_region: bool,
    /// 最大件数
    pub limit: usize,
    /// speechiness の許容幅（None なら比較しない）
    pub speechiness_tolerance: Option<f64>,
    /// acousticness の許容幅（None なら比較しない）
    pub acousticness_tolerance: Option<f64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.15,
            loudness_scale: 60.0,
            match_region: true,
            limit: 5,
            speechiness_tolerance: None,
            acousticness_tolerance: None,
        }
    }
}

impl MatchConfig {
    /// 特徴量ごとの正規化済み差分
    fn difference(&self, entry: &CatalogEntry, target: &TargetFeatureVector, feature: Feature) -> f64 {
        let diff = (entry.feature_or_neutral(feature) - target.features.get(feature)).abs();
        match feature {
            Feature::Loudness if self.loudness_scale > 0.0 => diff / self.loudness_scale,
            _ => diff,
        }
    }

    /// 1曲が条件を満たすか
    pub fn accepts(&self, entry: &CatalogEntry, target: &TargetFeatureVector) -> bool {
        let within_band = ENFORCED_FEATURES
            .iter()
            .all(|f| self.difference(entry, target, *f) <= self.tolerance);
        if !within_band {
            return false;
        }

        let optional = [
            (Feature::Speechiness, self.speechiness_tolerance),
            (Feature::Acousticness, self.acousticness_tolerance),
        ];
        let optional_ok = optional.iter().all(|(feature, tolerance)| match tolerance {
            Some(t) => self.difference(entry, target, *feature) <= *t,
            None => true,
        });
        if !optional_ok {
            return false;
        }

        if !self.match_region {
            return true;
        }
        match target.region_filter() {
            None => true,
            Some(region) => entry.region.as_deref().map(str::trim) == Some(region),
        }
    }

    /// 必須特徴量の差の合計（ログ表示用）
    pub fn distance(&self, entry: &CatalogEntry, target: &TargetFeatureVector) -> f64 {
        ENFORCED_FEATURES
            .iter()
            .map(|f| self.difference(entry, target, *f))
            .sum()
    }
}

/// カタログを照合して先頭 `config.limit` 件を返す
///
/// 結果はカタログの部分列（元の順序を保持）。候補が足りなくても条件は緩めない。
pub fn match_catalog(
    catalog: &Catalog,
    target: &TargetFeatureVector,
    config: &MatchConfig,
) -> MatchResult {
    let tracks: Vec<CatalogEntry> = catalog
        .entries()
        .iter()
        .filter(|entry| config.accepts(entry, target))
        .take(config.limit)
        .cloned()
        .collect();

    tracing::debug!(
        catalog = catalog.len(),
        matched = tracks.len(),
        region = target.region_filter().unwrap_or("*"),
        "カタログ照合完了"
    );

    MatchResult { tracks }
}
