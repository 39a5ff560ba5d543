//! 推薦処理の型定義
//!
//! CLIと将来のフロントエンドで共有される型:
//! - CatalogEntry: 曲カタログの1行
//! - AudioFeatures / TargetFeatureVector: 画像解析から得た目標特徴量
//! - MatchResult: カタログ照合の結果（カタログ順、最大N件）

use serde::{Deserialize, Serialize};

/// 数値のパースに失敗したときに使う中立値
pub const NEUTRAL_FEATURE_VALUE: f64 = 0.5;

/// 曲ページURLのプレフィックス
pub const SPOTIFY_TRACK_URL: &str = "https://open.spotify.com/track/";

/// Spotifyの音響特徴量（解析レスポンスの行順と同じ並び）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Danceability,
    Energy,
    Loudness,
    Speechiness,
    Acousticness,
    Valence,
}

impl Feature {
    /// レスポンス上の並び順
    pub const ALL: [Feature; 6] = [
        Feature::Danceability,
        Feature::Energy,
        Feature::Loudness,
        Feature::Speechiness,
        Feature::Acousticness,
        Feature::Valence,
    ];

    /// CSVヘッダー / JSONキー名
    pub fn name(&self) -> &'static str {
        match self {
            Feature::Danceability => "danceability",
            Feature::Energy => "energy",
            Feature::Loudness => "loudness",
            Feature::Speechiness => "speechiness",
            Feature::Acousticness => "acousticness",
            Feature::Valence => "valence",
        }
    }

    /// Spotifyのドキュメント上の値域 (min, max)
    pub fn range(&self) -> (f64, f64) {
        match self {
            Feature::Danceability => (0.073, 0.985),
            Feature::Energy => (0.005, 0.996),
            Feature::Loudness => (-60.0, 0.0),
            Feature::Speechiness => (0.022, 0.966),
            Feature::Acousticness => (0.0, 0.994),
            Feature::Valence => (0.26, 0.982),
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 曲カタログの1行
///
/// 数値列は欠損・不正値を `None` で保持する（行自体は捨てない）。
/// 照合時に `NEUTRAL_FEATURE_VALUE` で補完される。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub track_id: String,
    pub track_name: String,
    pub artists: String,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub danceability: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub loudness: Option<f64>,
    #[serde(default)]
    pub speechiness: Option<f64>,
    #[serde(default)]
    pub acousticness: Option<f64>,
    #[serde(default)]
    pub valence: Option<f64>,
}

impl CatalogEntry {
    /// 特徴量を取得（欠損は None）
    pub fn feature(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Danceability => self.danceability,
            Feature::Energy => self.energy,
            Feature::Loudness => self.loudness,
            Feature::Speechiness => self.speechiness,
            Feature::Acousticness => self.acousticness,
            Feature::Valence => self.valence,
        }
    }

    /// 特徴量を取得（欠損は中立値 0.5）
    pub fn feature_or_neutral(&self, feature: Feature) -> f64 {
        self.feature(feature).unwrap_or(NEUTRAL_FEATURE_VALUE)
    }

    /// 欠損している特徴量があるか
    pub fn has_missing_features(&self) -> bool {
        Feature::ALL.iter().any(|f| self.feature(*f).is_none())
    }

    /// 曲ページのURL
    pub fn spotify_url(&self) -> String {
        format!("{}{}", SPOTIFY_TRACK_URL, self.track_id)
    }
}

/// 6つの数値特徴量（補完済み）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioFeatures {
    pub danceability: f64,
    pub energy: f64,
    pub loudness: f64,
    pub speechiness: f64,
    pub acousticness: f64,
    pub valence: f64,
}

impl Default for AudioFeatures {
    fn default() -> Self {
        Self {
            danceability: NEUTRAL_FEATURE_VALUE,
            energy: NEUTRAL_FEATURE_VALUE,
            loudness: NEUTRAL_FEATURE_VALUE,
            speechiness: NEUTRAL_FEATURE_VALUE,
            acousticness: NEUTRAL_FEATURE_VALUE,
            valence: NEUTRAL_FEATURE_VALUE,
        }
    }
}

impl AudioFeatures {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Danceability => self.danceability,
            Feature::Energy => self.energy,
            Feature::Loudness => self.loudness,
            Feature::Speechiness => self.speechiness,
            Feature::Acousticness => self.acousticness,
            Feature::Valence => self.valence,
        }
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        match feature {
            Feature::Danceability => self.danceability = value,
            Feature::Energy => self.energy = value,
            Feature::Loudness => self.loudness = value,
            Feature::Speechiness => self.speechiness = value,
            Feature::Acousticness => self.acousticness = value,
            Feature::Valence => self.valence = value,
        }
    }
}

/// 画像1枚の解析から得た照合ターゲット
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetFeatureVector {
    #[serde(flatten)]
    pub features: AudioFeatures,

    /// 地域ラベル。None / 空文字はワイルドカード
    #[serde(default)]
    pub region: Option<String>,
}

impl TargetFeatureVector {
    /// 照合に使う地域ラベル（空白のみはワイルドカード扱い）
    pub fn region_filter(&self) -> Option<&str> {
        self.region
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

/// カタログ照合結果
///
/// カタログの元の順序を保つ（スコア順ではない）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub tracks: Vec<CatalogEntry>,
}

impl MatchResult {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CatalogEntry> {
        self.tracks.iter()
    }
}
