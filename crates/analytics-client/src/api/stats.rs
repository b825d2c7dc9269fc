use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::AnalyticsClient;
use crate::error::{ClientError, Result};
use crate::transport::{ApiRequest, Transport};

/// Column selection and filters shared by the statistics endpoints.
///
/// Extra endpoint options (e.g. `n_components` for PCA) go in `options`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl StatsRequest {
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: Some(columns.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Pairwise correlation of the numeric columns.
///
/// Cells are `None` where the coefficient is undefined (constant columns).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub cols: Vec<String>,
    pub matrix: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.cols.iter().position(|c| c == a)?;
        let j = self.cols.iter().position(|c| c == b)?;
        self.matrix.get(i)?.get(j).copied().flatten()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PcaResult {
    /// Per-row projections, keyed `pc1`, `pc2`, ...
    #[serde(default)]
    pub scores: Vec<Map<String, Value>>,
    #[serde(default)]
    pub explained: Vec<f64>,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl PcaResult {
    /// Fewer than three complete rows or two columns yield no projection.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

fn body(request: &StatsRequest) -> Result<Value> {
    serde_json::to_value(request).map_err(|e| ClientError::configuration(e.to_string()))
}

impl<T: Transport + 'static> AnalyticsClient<T> {
    pub async fn correlation(&self, dataset_id: i64, request: &StatsRequest) -> Result<CorrelationMatrix> {
        let body = body(request)?;
        self.fetch(ApiRequest::post(format!("/datasets/{dataset_id}/stats/corr")).json(body))
            .await
    }

    pub async fn pca(&self, dataset_id: i64, request: &StatsRequest) -> Result<PcaResult> {
        let body = body(request)?;
        self.fetch(ApiRequest::post(format!("/datasets/{dataset_id}/stats/pca")).json(body))
            .await
    }

    /// Render one chart panel; the panel spec and the result are opaque JSON.
    pub async fn chart(&self, dataset_id: i64, panel: &Value) -> Result<Value> {
        self.fetch(ApiRequest::post(format!("/datasets/{dataset_id}/chart")).json(panel.clone()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{Method, StatusCode};
    use serde_json::json;

    use super::*;
    use crate::jobs::PollConfig;
    use crate::session::SessionClient;
    use crate::testing::{FakeBackend, PASSWORD};
    use crate::transport::RequestBody;

    async fn client() -> AnalyticsClient<FakeBackend> {
        let session = SessionClient::new(FakeBackend::new(), Default::default());
        session.login("ada@example.com", PASSWORD).await.unwrap();
        AnalyticsClient::new(session, PollConfig::default())
    }

    #[test]
    fn request_flattens_options() {
        let request = StatsRequest::columns(["a", "b"]).option("n_components", 3);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "columns": ["a", "b"], "n_components": 3 })
        );
        assert_eq!(serde_json::to_value(StatsRequest::default()).unwrap(), json!({}));
    }

    #[tokio::test]
    async fn correlation_tolerates_undefined_cells() {
        let client = client().await;
        client.session().transport().stub(
            Method::POST,
            "/datasets/2/stats/corr",
            StatusCode::OK,
            json!({ "cols": ["x", "y"], "matrix": [[1.0, null], [null, 1.0]] }),
        );

        let corr = client
            .correlation(2, &StatsRequest::columns(["x", "y"]))
            .await
            .unwrap();

        assert_eq!(corr.get("x", "x"), Some(1.0));
        assert_eq!(corr.get("x", "y"), None);
        assert_eq!(corr.get("x", "missing"), None);
        let sent = client
            .session()
            .transport()
            .last_request_for("/datasets/2/stats/corr")
            .unwrap();
        assert_eq!(sent.body, RequestBody::Json(json!({ "columns": ["x", "y"] })));
    }

    #[tokio::test]
    async fn pca_with_too_few_rows_is_empty() {
        let client = client().await;
        client.session().transport().stub(
            Method::POST,
            "/datasets/2/stats/pca",
            StatusCode::OK,
            json!({ "scores": [], "explained": [] }),
        );

        let pca = client.pca(2, &StatsRequest::default()).await.unwrap();

        assert!(pca.is_empty());
        assert!(pca.columns.is_empty());
    }

    #[tokio::test]
    async fn missing_dataset_surfaces_detail() {
        let client = client().await;
        client.session().transport().stub(
            Method::POST,
            "/datasets/99/chart",
            StatusCode::NOT_FOUND,
            json!({ "detail": "Dataset not found" }),
        );

        let err = client.chart(99, &json!({ "type": "hist", "x": "a" })).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Status { status: StatusCode::NOT_FOUND, ref detail, .. } if detail == "Dataset not found"
        ));
    }
}
