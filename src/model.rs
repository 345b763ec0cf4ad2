use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::time_codec::format_time;

/// What the download button does with the URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Merged video+audio file
    Video,
    /// Extracted audio track
    Audio,
    /// Resolve a direct URL and hand it to a player
    Stream,
}

impl Mode {
    pub const ALL: [Self; 3] = [Self::Video, Self::Audio, Self::Stream];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Stream => "stream",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Video => "Video",
            Self::Audio => "Audio",
            Self::Stream => "Stream",
        }
    }

    /// Trimming only means something when a file is produced.
    pub fn supports_trim(self) -> bool {
        !matches!(self, Self::Stream)
    }

    pub fn supports_quality(self) -> bool {
        !matches!(self, Self::Stream)
    }

    /// Stream mode skips the metadata round-trip entirely.
    pub fn needs_metadata(self) -> bool {
        !matches!(self, Self::Stream)
    }
}

/// Whether a playlist URL is downloaded whole or as its single current item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadKind {
    Single,
    Playlist,
}

impl DownloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Playlist => "playlist",
        }
    }
}

/// One entry of the backend's format list. Only the height matters here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Format {
    #[serde(default, deserialize_with = "lenient_whole")]
    pub height: Option<u64>,
}

/// Playlist member as listed by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_whole")]
    pub duration: Option<u64>,
}

impl Entry {
    /// `"<position>. <title> (<duration>)"`; a missing duration reads as `00:00`.
    pub fn describe(&self, position: usize) -> String {
        format!(
            "{position}. {} ({})",
            self.title.as_deref().unwrap_or("Untitled"),
            format_time(self.duration.unwrap_or(0))
        )
    }
}

/// `POST /api/info` success body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InfoResponse {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_whole")]
    pub duration: Option<u64>,
    #[serde(default)]
    pub formats: Vec<Format>,
    #[serde(default)]
    pub is_playlist: bool,
    #[serde(default)]
    pub entries: Option<Vec<Entry>>,
    #[serde(default)]
    pub entries_count: Option<usize>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub size_formatted: Option<String>,
}

/// Backend replies are either the payload or `{ "error": "..." }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiReply<T> {
    Failure { error: String },
    Success(T),
}

impl<T> ApiReply<T> {
    pub fn into_result(self) -> Result<T, String> {
        match self {
            Self::Failure { error } => Err(error),
            Self::Success(value) => Ok(value),
        }
    }
}

/// Descriptive metadata for the current URL. Replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub duration_seconds: u64,
    pub is_playlist: bool,
    pub entries: Option<Vec<Entry>>,
    pub entries_count: usize,
    pub available_formats: Vec<Format>,
    pub thumbnail_url: Option<String>,
    pub size_label: Option<String>,
}

impl From<InfoResponse> for Metadata {
    fn from(info: InfoResponse) -> Self {
        let entries_count = info
            .entries_count
            .or_else(|| info.entries.as_ref().map(Vec::len))
            .unwrap_or(1);
        Self {
            title: info.title.unwrap_or_else(|| "Unknown Title".to_string()),
            duration_seconds: info.duration.unwrap_or(0),
            is_playlist: info.is_playlist,
            entries: info.entries,
            entries_count,
            available_formats: info.formats,
            thumbnail_url: info.thumbnail.filter(|url| !url.is_empty()),
            size_label: info.size_formatted,
        }
    }
}

impl Metadata {
    /// Summary rows under the title. Duration and size only make sense for a single item.
    pub fn detail_rows(&self) -> Vec<String> {
        if self.is_playlist {
            return vec![format!("{} videos in playlist", self.entries_count)];
        }
        vec![
            format!("Duration: {}", format_time(self.duration_seconds)),
            format!(
                "Size: {}",
                self.size_label.as_deref().unwrap_or("~Unknown")
            ),
        ]
    }
}

/// Body of `POST /api/download`. Built once per download and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRequest {
    pub url: String,
    pub mode: Mode,
    #[serde(rename = "type")]
    pub kind: DownloadKind,
    pub save_path: Option<String>,
    pub quality: String,
    pub trim_start: Option<String>,
    pub trim_end: Option<String>,
    pub log_to_file: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsorblock: Option<bool>,
}

/// `POST /api/stream` success body
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamInfo {
    #[serde(default)]
    pub title: String,
    pub stream_url: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SetupCheck {
    pub installed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowseReply {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /api/debug`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DebugReport {
    #[serde(default)]
    pub system: BTreeMap<String, Value>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, Value>,
}

/// `POST /api/debug/test`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DebugTestResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Accepts integers, floats (floored) and null; anything else becomes `None`.
fn lenient_whole<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.floor() as u64)
        }),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_reply_parses_success_and_failure() {
        let ok: ApiReply<InfoResponse> = serde_json::from_str(
            r#"{"title":"Clip","duration":212.7,"formats":[{"height":720},{"height":null},{"format_id":"x"}],"is_playlist":false,"thumbnail":"http://t/1.jpg","size_formatted":"12 MB"}"#,
        )
        .unwrap();
        let meta = Metadata::from(ok.into_result().unwrap());
        assert_eq!(meta.title, "Clip");
        assert_eq!(meta.duration_seconds, 212);
        assert_eq!(meta.available_formats.len(), 3);
        assert_eq!(meta.available_formats[0].height, Some(720));
        assert_eq!(meta.available_formats[1].height, None);
        assert_eq!(meta.size_label.as_deref(), Some("12 MB"));

        let err: ApiReply<InfoResponse> =
            serde_json::from_str(r#"{"error":"Unsupported URL"}"#).unwrap();
        assert_eq!(err.into_result().unwrap_err(), "Unsupported URL");
    }

    #[test]
    fn missing_fields_fall_back() {
        let info: InfoResponse = serde_json::from_str(r#"{"duration":null}"#).unwrap();
        let meta = Metadata::from(info);
        assert_eq!(meta.title, "Unknown Title");
        assert_eq!(meta.duration_seconds, 0);
        assert_eq!(meta.entries_count, 1);
    }

    #[test]
    fn playlist_count_defaults_to_entries_len() {
        let info: InfoResponse = serde_json::from_str(
            r#"{"title":"Mix","is_playlist":true,"entries":[{"title":"a","duration":10},{"title":"b"}]}"#,
        )
        .unwrap();
        let meta = Metadata::from(info);
        assert!(meta.is_playlist);
        assert_eq!(meta.entries_count, 2);
    }

    #[test]
    fn single_item_rows_show_duration_and_size() {
        let info: InfoResponse = serde_json::from_str(r#"{"title":"Clip","duration":95}"#).unwrap();
        assert_eq!(
            Metadata::from(info).detail_rows(),
            ["Duration: 01:35", "Size: ~Unknown"]
        );
    }

    #[test]
    fn playlist_rows_skip_duration_and_size() {
        let info: InfoResponse = serde_json::from_str(
            r#"{"title":"Mix","is_playlist":true,"duration":600,"size_formatted":"1 GB","entries_count":12,"entries":[{"title":"a","duration":3700},{"title":"b"},{}]}"#,
        )
        .unwrap();
        let meta = Metadata::from(info);
        assert_eq!(meta.detail_rows(), ["12 videos in playlist"]);

        let entries = meta.entries.unwrap();
        assert_eq!(entries[0].describe(1), "1. a (1:01:40)");
        assert_eq!(entries[1].describe(2), "2. b (00:00)");
        assert_eq!(entries[2].describe(3), "3. Untitled (00:00)");
    }

    #[test]
    fn download_request_wire_shape() {
        let request = DownloadRequest {
            url: "https://example.com/v".to_string(),
            mode: Mode::Audio,
            kind: DownloadKind::Playlist,
            save_path: None,
            quality: "max".to_string(),
            trim_start: Some("00:10".to_string()),
            trim_end: Some("01:00".to_string()),
            log_to_file: true,
            sponsorblock: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["mode"], "audio");
        assert_eq!(json["type"], "playlist");
        assert_eq!(json["save_path"], Value::Null);
        assert_eq!(json["trim_start"], "00:10");
        assert!(json.get("sponsorblock").is_none());
    }
}
