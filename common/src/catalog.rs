//! 曲カタログモジュール
//!
//! Spotify特徴量付きの曲一覧CSVを読み込み、セッション中は読み取り専用で保持する。
//! 1行目をヘッダーとして列名→値で対応付けるため、列の並びや追加列には依存しない。

use crate::error::{Error, Result};
use crate::types::{CatalogEntry, Feature};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

/// 地域列として受け付けるヘッダー名（小文字で比較）
const REGION_COLUMNS: &[&str] = &["region", "continent"];

/// 曲カタログ
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

/// ヘッダーから解決した列位置
struct ColumnMap {
    track_id: usize,
    track_name: usize,
    artists: usize,
    region: Option<usize>,
    features: Vec<(Feature, usize)>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers.iter().position(|h| {
                h.trim_start_matches('\u{feff}').trim().eq_ignore_ascii_case(name)
            })
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| Error::Parse(format!("カタログに {} 列がありません", name)))
        };

        Ok(Self {
            track_id: require("track_id")?,
            track_name: require("track_name")?,
            artists: require("artists")?,
            region: REGION_COLUMNS.iter().find_map(|name| find(name)),
            features: Feature::ALL
                .iter()
                .filter_map(|f| find(f.name()).map(|idx| (*f, idx)))
                .collect(),
        })
    }

    fn entry(&self, record: &csv::StringRecord) -> CatalogEntry {
        let text = |idx: usize| record.get(idx).unwrap_or_default().to_string();

        let mut entry = CatalogEntry {
            track_id: text(self.track_id),
            track_name: text(self.track_name),
            artists: text(self.artists),
            region: self
                .region
                .and_then(|idx| record.get(idx))
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
            ..Default::default()
        };

        for (feature, idx) in &self.features {
            let value = record.get(*idx).and_then(parse_cell);
            match feature {
                Feature::Danceability => entry.danceability = value,
                Feature::Energy => entry.energy = value,
                Feature::Loudness => entry.loudness = value,
                Feature::Speechiness => entry.speechiness = value,
                Feature::Acousticness => entry.acousticness = value,
                Feature::Valence => entry.valence = value,
            }
        }

        entry
    }
}

/// 数値セルをパース（空・非数値・NaN/無限大は None）
fn parse_cell(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// CSVを読み込む
    ///
    /// 必須列（track_id, track_name, artists）が無い場合はエラー。
    /// 特徴量の欠損・不正値は行を捨てずに None として保持する。
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns = ColumnMap::from_headers(csv_reader.headers()?)?;
        if columns.region.is_none() {
            tracing::debug!("カタログに地域列がありません（地域照合は常に不一致になります）");
        }

        let mut entries = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            match record {
                Ok(record) => entries.push(columns.entry(&record)),
                Err(e) => {
                    // ヘッダーが1行目なのでデータ行は2行目から
                    tracing::debug!(line = line + 2, error = %e, "カタログ行を読み飛ばしました");
                }
            }
        }

        Ok(Self { entries })
    }

    /// CSV文字列から読み込み
    pub fn from_csv_str(content: &str) -> Result<Self> {
        Self::from_reader(content.as_bytes())
    }

    /// CSVファイルから読み込み
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// CSVファイルから読み込み、失敗時は空カタログを返す
    ///
    /// カタログが読めなくても解析自体は続行できる（照合結果が常に0件になるだけ）。
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::from_path(path) {
            Ok(catalog) => {
                tracing::info!(
                    path = %path.display(),
                    rows = catalog.len(),
                    "カタログを読み込みました"
                );
                catalog
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "カタログを読み込めませんでした。空のカタログで続行します"
                );
                Self::default()
            }
        }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 地域ラベル一覧（重複なし、ソート済み）
    pub fn regions(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| e.region.as_deref())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// 特徴量が欠けている行数
    pub fn incomplete_rows(&self) -> usize {
        self.entries.iter().filter(|e| e.has_missing_features()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV_WITH_REGION: &str = "\
track_id,track_name,artists,danceability,energy,loudness,speechiness,acousticness,valence,region
id1,Song One,Artist A,0.75,0.72,-6.0,0.05,0.1,0.55,Europe
id2,\"Song, Two\",Artist B,0.3,0.2,-20.5,0.04,0.9,0.3,Asia
id3,Song Three,Artist C,abc,0.5,,0.1,0.2,0.4,
";

    #[test]
    fn test_parse_with_region() {
        let catalog = Catalog::from_csv_str(CSV_WITH_REGION).unwrap();
        assert_eq!(catalog.len(), 3);

        let first = &catalog.entries()[0];
        assert_eq!(first.track_id, "id1");
        assert_eq!(first.track_name, "Song One");
        assert_eq!(first.danceability, Some(0.75));
        assert_eq!(first.loudness, Some(-6.0));
        assert_eq!(first.region.as_deref(), Some("Europe"));

        // クォート内のカンマ
        assert_eq!(catalog.entries()[1].track_name, "Song, Two");
    }

    #[test]
    fn test_malformed_numbers_keep_row() {
        let catalog = Catalog::from_csv_str(CSV_WITH_REGION).unwrap();
        let third = &catalog.entries()[2];
        assert_eq!(third.track_id, "id3");
        assert_eq!(third.danceability, None);
        assert_eq!(third.loudness, None);
        assert_eq!(third.energy, Some(0.5));
        assert_eq!(third.region, None);
        assert_eq!(catalog.incomplete_rows(), 1);
    }

    #[test]
    fn test_without_region_column() {
        let csv = "\
track_id,track_name,artists,danceability,energy,loudness,speechiness,acousticness,valence
id1,Song,Artist,0.5,0.5,-5,0.1,0.1,0.5
";
        let catalog = Catalog::from_csv_str(csv).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.entries()[0].region, None);
        assert!(catalog.regions().is_empty());
    }

    #[test]
    fn test_continent_column_alias_and_column_order() {
        let csv = "\
Continent,valence,track_name,track_id,artists,energy,danceability,loudness
Africa,0.9,Song,xyz,Artist,0.8,0.7,-4
";
        let catalog = Catalog::from_csv_str(csv).unwrap();
        let entry = &catalog.entries()[0];
        assert_eq!(entry.track_id, "xyz");
        assert_eq!(entry.region.as_deref(), Some("Africa"));
        assert_eq!(entry.valence, Some(0.9));
        assert_eq!(entry.danceability, Some(0.7));
        // 列自体が無い特徴量
        assert_eq!(entry.speechiness, None);
    }

    #[test]
    fn test_short_rows_are_loaded() {
        let csv = "\
track_id,track_name,artists,danceability,energy,loudness,speechiness,acousticness,valence,region
id1,Song,Artist,0.5
";
        let catalog = Catalog::from_csv_str(csv).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.entries()[0].danceability, Some(0.5));
        assert_eq!(catalog.entries()[0].valence, None);
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "track_name,artists\nSong,Artist\n";
        let result = Catalog::from_csv_str(csv);
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_nan_cell_is_none() {
        let csv = "track_id,track_name,artists,energy\nid,Song,Artist,NaN\n";
        let catalog = Catalog::from_csv_str(csv).unwrap();
        assert_eq!(catalog.entries()[0].energy, None);
    }

    #[test]
    fn test_regions_sorted_unique() {
        let catalog = Catalog::from_csv_str(CSV_WITH_REGION).unwrap();
        assert_eq!(catalog.regions(), vec!["Asia", "Europe"]);
    }

    #[test]
    fn test_load_or_empty_missing_file() {
        let catalog = Catalog::load_or_empty(Path::new("/nonexistent/catalog.csv"));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_header_only() {
        let csv = "track_id,track_name,artists\n";
        let catalog = Catalog::from_csv_str(csv).unwrap();
        assert!(catalog.is_empty());
    }
}
