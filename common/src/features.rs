//! 解析レスポンスパーサー
//!
//! 画像解析サービスのテキストから照合ターゲット（6特徴量 + 地域）を取り出す。
//!
//! - Lenient: 末尾7行を位置で読む。数値にならない行は 0.5 で補完
//! - Strict: 行数・数値形式を検証し、崩れていればエラー
//! - Structured: JSONオブジェクトからキー名で読む

use crate::error::{Error, Result};
use crate::types::{AudioFeatures, Feature, TargetFeatureVector, NEUTRAL_FEATURE_VALUE};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// 末尾から数えた行数（6特徴量 + 地域）
pub const TRAILING_LINES: usize = 7;

lazy_static! {
    /// 行頭の浮動小数点数（"0.8", " -3dB", ".5;" など）
    static ref LEADING_FLOAT: Regex =
        Regex::new(r"^\s*[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?").unwrap();
}

/// レスポンスの読み方
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// 末尾7行を位置で読み、失敗は中立値で補完
    #[default]
    Lenient,
    /// 末尾7行を位置で読み、形式が崩れていればエラー
    Strict,
    /// JSONオブジェクトをキー名で読む
    Structured,
}

impl std::str::FromStr for ParseMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lenient" | "lines" => Ok(ParseMode::Lenient),
            "strict" => Ok(ParseMode::Strict),
            "structured" | "json" => Ok(ParseMode::Structured),
            _ => Err(format!(
                "Unknown parse mode: {}. Use lenient, strict, or structured",
                s
            )),
        }
    }
}

impl std::fmt::Display for ParseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseMode::Lenient => write!(f, "lenient"),
            ParseMode::Strict => write!(f, "strict"),
            ParseMode::Structured => write!(f, "structured"),
        }
    }
}

/// 行頭の数値を読む（JavaScriptの parseFloat 相当）
///
/// 数値で始まらない場合は None。
pub fn parse_leading_float(text: &str) -> Option<f64> {
    LEADING_FLOAT
        .find(text)
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// モードに応じてパース
pub fn parse_response(text: &str, mode: ParseMode) -> Result<TargetFeatureVector> {
    match mode {
        ParseMode::Lenient => Ok(parse_positional(text)),
        ParseMode::Strict => parse_positional_strict(text),
        ParseMode::Structured => parse_structured(text),
    }
}

/// 末尾7行を位置で読む
///
/// 行数が足りない・数値でない特徴量は 0.5 になり、他のフィールドには影響しない。
/// 末尾の改行・空白は行として数えない。
pub fn parse_positional(text: &str) -> TargetFeatureVector {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let from_end = |offset: usize| lines.len().checked_sub(offset).map(|i| lines[i]);

    let mut features = AudioFeatures::default();
    for (i, feature) in Feature::ALL.iter().enumerate() {
        let value = from_end(TRAILING_LINES - i).and_then(parse_leading_float);
        if value.is_none() {
            tracing::debug!(feature = %feature, "特徴量を読めないため中立値で補完");
        }
        features.set(*feature, value.unwrap_or(NEUTRAL_FEATURE_VALUE));
    }

    let region = from_end(1)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    TargetFeatureVector { features, region }
}

/// 末尾7行を検証しつつ読む
///
/// 空行は無視する。7行未満、特徴量行が数値でない、地域行が空または数値の場合はエラー。
pub fn parse_positional_strict(text: &str) -> Result<TargetFeatureVector> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.len() < TRAILING_LINES {
        return Err(Error::Parse(format!(
            "レスポンスが{}行しかありません（末尾{}行が必要）",
            lines.len(),
            TRAILING_LINES
        )));
    }

    let tail = &lines[lines.len() - TRAILING_LINES..];
    let mut features = AudioFeatures::default();

    for (feature, line) in Feature::ALL.iter().zip(tail) {
        let value = line
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                Error::Parse(format!("{} の行が数値ではありません: {:?}", feature, line))
            })?;
        features.set(*feature, value);
    }

    let region = tail[TRAILING_LINES - 1];
    if region.parse::<f64>().is_ok() {
        return Err(Error::Parse(format!(
            "最終行が地域ではなく数値です: {:?}",
            region
        )));
    }

    Ok(TargetFeatureVector {
        features,
        region: Some(region.to_string()),
    })
}

/// レスポンスからJSONオブジェクト部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 最初の `{` から最後の `}` まで
pub fn extract_json_object(response: &str) -> Result<&str> {
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7;
        if let Some(end_offset) = response[start..].find("```") {
            return Ok(response[start..start + end_offset].trim());
        }
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if end > start {
            return Ok(&response[start..=end]);
        }
    }

    Err(Error::Parse("JSONオブジェクトが見つかりません".into()))
}

/// JSONオブジェクトからキー名で読む
///
/// 数値キーが無い・数値にならない場合は 0.5。文字列の数値 ("0.8") も受け付ける。
pub fn parse_structured(text: &str) -> Result<TargetFeatureVector> {
    let json = extract_json_object(text)?;
    let value: serde_json::Value = serde_json::from_str(json)?;
    let object = value
        .as_object()
        .ok_or_else(|| Error::Parse("JSONがオブジェクトではありません".into()))?;

    let mut features = AudioFeatures::default();
    for feature in Feature::ALL {
        let parsed = match object.get(feature.name()) {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => parse_leading_float(s),
            _ => None,
        };
        features.set(feature, parsed.unwrap_or(NEUTRAL_FEATURE_VALUE));
    }

    let region = object
        .get("region")
        .and_then(|r| r.as_str())
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    Ok(TargetFeatureVector { features, region })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = "Bell\nBronze\nBuddhism\nGold\nCalm\nSerene\nReverent\nAncient\nChime\n0.8\n0.9\n-3\n0.1\n0.2\n0.65\nAsia";

    // =============================================
    // parse_leading_float テスト
    // =============================================

    #[test]
    fn test_parse_leading_float() {
        assert_eq!(parse_leading_float("0.8"), Some(0.8));
        assert_eq!(parse_leading_float("  -3.5 "), Some(-3.5));
        assert_eq!(parse_leading_float("-7dB"), Some(-7.0));
        assert_eq!(parse_leading_float(".5;"), Some(0.5));
        assert_eq!(parse_leading_float("1e-2"), Some(0.01));
        assert_eq!(parse_leading_float("0"), Some(0.0));
        assert_eq!(parse_leading_float("Danceability: 0.8"), None);
        assert_eq!(parse_leading_float(""), None);
        assert_eq!(parse_leading_float("None"), None);
    }

    // =============================================
    // parse_positional テスト
    // =============================================

    #[test]
    fn test_parse_positional_sample() {
        let target = parse_positional(SAMPLE_RESPONSE);
        assert_eq!(target.features.danceability, 0.8);
        assert_eq!(target.features.energy, 0.9);
        assert_eq!(target.features.loudness, -3.0);
        assert_eq!(target.features.speechiness, 0.1);
        assert_eq!(target.features.acousticness, 0.2);
        assert_eq!(target.features.valence, 0.65);
        assert_eq!(target.region.as_deref(), Some("Asia"));
    }

    #[test]
    fn test_parse_positional_exactly_seven_lines() {
        let target = parse_positional("0.8\n0.9\n-3\n0.1\n0.2\n0.65\n  Asia  ");
        assert_eq!(target.features.danceability, 0.8);
        assert_eq!(target.region.as_deref(), Some("Asia"));
    }

    #[test]
    fn test_parse_positional_trailing_newline_and_crlf() {
        let target = parse_positional("0.8\r\n0.9\r\n-3\r\n0.1\r\n0.2\r\n0.65\r\nEurope\r\n\n");
        assert_eq!(target.features.valence, 0.65);
        assert_eq!(target.region.as_deref(), Some("Europe"));
    }

    #[test]
    fn test_parse_positional_non_numeric_defaults_only_that_field() {
        let target = parse_positional("0.8\nhigh\n-3\n0.1\nN/A\n0.65\nAsia");
        assert_eq!(target.features.danceability, 0.8);
        assert_eq!(target.features.energy, NEUTRAL_FEATURE_VALUE);
        assert_eq!(target.features.loudness, -3.0);
        assert_eq!(target.features.acousticness, NEUTRAL_FEATURE_VALUE);
        assert_eq!(target.features.valence, 0.65);
        assert_eq!(target.region.as_deref(), Some("Asia"));
    }

    #[test]
    fn test_parse_positional_too_few_lines() {
        // 3行: 末尾から3行目と2行目だけが特徴量（acousticness, valence）になる
        let target = parse_positional("0.3\n0.4\nOceania");
        assert_eq!(target.features.danceability, NEUTRAL_FEATURE_VALUE);
        assert_eq!(target.features.speechiness, NEUTRAL_FEATURE_VALUE);
        assert_eq!(target.features.acousticness, 0.3);
        assert_eq!(target.features.valence, 0.4);
        assert_eq!(target.region.as_deref(), Some("Oceania"));
    }

    #[test]
    fn test_parse_positional_empty() {
        let target = parse_positional("");
        assert_eq!(target.features, AudioFeatures::default());
        assert_eq!(target.region, None);
    }

    #[test]
    fn test_parse_positional_extra_line_shifts_fields() {
        // 余分な1行で全フィールドがずれる（行形式の既知の弱点）
        let target = parse_positional("0.8\n0.9\n-3\n0.1\n0.2\n0.65\nAsia\nThanks!");
        assert_eq!(target.features.danceability, 0.9);
        assert_eq!(target.features.valence, NEUTRAL_FEATURE_VALUE);
        assert_eq!(target.region.as_deref(), Some("Thanks!"));
    }

    // =============================================
    // parse_positional_strict テスト
    // =============================================

    #[test]
    fn test_strict_accepts_well_formed() {
        let target = parse_positional_strict(SAMPLE_RESPONSE).unwrap();
        assert_eq!(target, parse_positional(SAMPLE_RESPONSE));
    }

    #[test]
    fn test_strict_ignores_blank_lines() {
        let target = parse_positional_strict("0.8\n\n0.9\n-3\n0.1\n  \n0.2\n0.65\nAsia\n").unwrap();
        assert_eq!(target.features.energy, 0.9);
        assert_eq!(target.features.acousticness, 0.2);
    }

    #[test]
    fn test_strict_rejects_short_response() {
        let err = parse_positional_strict("0.8\n0.9\nAsia").unwrap_err();
        assert!(matches!(err, Error::Parse(msg) if msg.contains("3行")));
    }

    #[test]
    fn test_strict_rejects_non_numeric_feature() {
        let err = parse_positional_strict("0.8\nhigh\n-3\n0.1\n0.2\n0.65\nAsia").unwrap_err();
        assert!(matches!(err, Error::Parse(msg) if msg.contains("energy")));
    }

    #[test]
    fn test_strict_rejects_missing_region() {
        let err = parse_positional_strict("x\n0.8\n0.9\n-3\n0.1\n0.2\n0.65").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    // =============================================
    // parse_structured テスト
    // =============================================

    #[test]
    fn test_structured_with_block() {
        let response = r#"Here you go:
```json
{"object": "bell", "danceability": 0.8, "energy": "0.9", "loudness": -3,
 "speechiness": 0.1, "acousticness": 0.2, "valence": 0.65, "region": "Asia"}
```"#;
        let target = parse_structured(response).unwrap();
        assert_eq!(target.features.energy, 0.9);
        assert_eq!(target.features.loudness, -3.0);
        assert_eq!(target.region.as_deref(), Some("Asia"));
    }

    #[test]
    fn test_structured_missing_keys_default() {
        let target = parse_structured(r#"{"danceability": 0.7}"#).unwrap();
        assert_eq!(target.features.danceability, 0.7);
        assert_eq!(target.features.energy, NEUTRAL_FEATURE_VALUE);
        assert_eq!(target.region, None);
    }

    #[test]
    fn test_structured_no_json() {
        assert!(parse_structured("just text").is_err());
    }

    #[test]
    fn test_structured_invalid_json() {
        let err = parse_structured("{ not json }").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    // =============================================
    // ParseMode テスト
    // =============================================

    #[test]
    fn test_parse_mode_from_str() {
        assert_eq!("lenient".parse::<ParseMode>().unwrap(), ParseMode::Lenient);
        assert_eq!("STRICT".parse::<ParseMode>().unwrap(), ParseMode::Strict);
        assert_eq!("json".parse::<ParseMode>().unwrap(), ParseMode::Structured);
        assert!("fuzzy".parse::<ParseMode>().is_err());
    }

    #[test]
    fn test_parse_response_dispatch() {
        let lenient = parse_response("garbage", ParseMode::Lenient).unwrap();
        assert_eq!(lenient.features, AudioFeatures::default());
        assert!(parse_response("garbage", ParseMode::Strict).is_err());
        assert!(parse_response("garbage", ParseMode::Structured).is_err());
    }
}
