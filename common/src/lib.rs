//! Objectify Common Library
//!
//! CLIと他のフロントエンドで共有される型とロジック:
//! カタログ読み込み、解析プロンプト、レスポンスパース、曲照合、最新結果ガード

pub mod types;
pub mod error;
pub mod catalog;
pub mod prompts;
pub mod features;
pub mod matcher;
pub mod session;

pub use types::{
    AudioFeatures, CatalogEntry, Feature, MatchResult, TargetFeatureVector,
    NEUTRAL_FEATURE_VALUE, SPOTIFY_TRACK_URL,
};
pub use error::{Error, Result};
pub use catalog::Catalog;
pub use prompts::{build_descriptor_prompt, build_structured_prompt, ANALYSIS_FAILED_MESSAGE, REGIONS};
pub use features::{
    extract_json_object, parse_leading_float, parse_positional, parse_positional_strict,
    parse_response, parse_structured, ParseMode,
};
pub use matcher::{match_catalog, MatchConfig};
pub use session::{LatestSlot, RequestId, RequestTracker};
