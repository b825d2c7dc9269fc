use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use super::AnalyticsClient;
use crate::error::Result;
use crate::transport::{ApiRequest, Transport};

/// Preview row counts the backend accepts.
const PREVIEW_ROWS: std::ops::RangeInclusive<u32> = 1..=200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size_bytes: Option<i64>,
    #[serde(default)]
    pub n_rows: Option<i64>,
    #[serde(default)]
    pub n_cols: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// First rows of a dataset, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetPreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: String,
    pub missing: u64,
    pub missing_pct: f64,
    pub unique_count: u64,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Rows sampled to build the profile.
    pub rows: u64,
    pub columns: Vec<ColumnProfile>,
}

impl DatasetSchema {
    /// Columns whose name, dtype or role contains `needle` (case-insensitive).
    pub fn search<'a>(&'a self, needle: &str) -> Vec<&'a ColumnProfile> {
        let needle = needle.trim().to_lowercase();
        self.columns
            .iter()
            .filter(|c| {
                needle.is_empty()
                    || c.name.to_lowercase().contains(&needle)
                    || c.dtype.to_lowercase().contains(&needle)
                    || c.role
                        .as_deref()
                        .is_some_and(|r| r.to_lowercase().contains(&needle))
            })
            .collect()
    }
}

/// A file to upload as a new dataset.
#[derive(Debug, Clone)]
pub struct DatasetUpload {
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub bytes: Bytes,
}

/// Content type the backend expects for a tabular file, by extension.
pub fn guess_mime(file_name: &str) -> Option<&'static str> {
    let lower = file_name.to_ascii_lowercase();
    let ext = lower.rsplit_once('.').map(|(_, ext)| ext)?;
    Some(match ext {
        "csv" => "text/csv",
        "tsv" | "txt" => "text/plain",
        "gz" => "application/gzip",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => return None,
    })
}

impl<T: Transport + 'static> AnalyticsClient<T> {
    pub async fn list_datasets(&self) -> Result<Vec<Dataset>> {
        self.fetch(ApiRequest::get("/datasets")).await
    }

    #[instrument(skip(self, upload), fields(title = %upload.title, file = %upload.file_name, size = upload.bytes.len()))]
    pub async fn upload_dataset(&self, upload: DatasetUpload) -> Result<Dataset> {
        let mime = guess_mime(&upload.file_name).map(str::to_owned);
        let mut request = ApiRequest::post("/datasets/upload").text_part("title", upload.title);
        if let Some(description) = upload.description.filter(|d| !d.is_empty()) {
            request = request.text_part("description", description);
        }
        let request = request.file_part("file", upload.file_name, mime, upload.bytes);

        let dataset: Dataset = self.fetch(request).await?;
        info!(dataset_id = dataset.id, "dataset uploaded");
        Ok(dataset)
    }

    pub async fn delete_dataset(&self, dataset_id: i64) -> Result<()> {
        self.execute(ApiRequest::delete(format!("/datasets/{dataset_id}")))
            .await
    }

    /// First `rows` rows, clamped to what the backend accepts.
    pub async fn dataset_preview(&self, dataset_id: i64, rows: u32) -> Result<DatasetPreview> {
        let rows = rows.clamp(*PREVIEW_ROWS.start(), *PREVIEW_ROWS.end());
        self.fetch(ApiRequest::get(format!("/datasets/{dataset_id}/preview")).query("rows", rows))
            .await
    }

    pub async fn dataset_schema(&self, dataset_id: i64) -> Result<DatasetSchema> {
        self.fetch(ApiRequest::get(format!("/datasets/{dataset_id}/schema")))
            .await
    }
}
