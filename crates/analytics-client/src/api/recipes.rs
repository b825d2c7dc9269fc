use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::AnalyticsClient;
use crate::error::Result;
use crate::transport::{ApiRequest, Transport};

/// An analysis the backend knows how to run, as listed for a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeTemplate {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A user-saved dashboard of chart panels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRecipe {
    pub id: i64,
    #[serde(default)]
    pub dataset_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub panels: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fields to change on a saved recipe; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecipeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panels: Option<Value>,
}

impl<T: Transport + 'static> AnalyticsClient<T> {
    pub async fn list_recipe_templates(&self, dataset_id: i64) -> Result<Vec<RecipeTemplate>> {
        self.fetch(ApiRequest::get("/recipes").query("dataset_id", dataset_id))
            .await
    }

    pub async fn save_recipe(&self, dataset_id: i64, name: &str, panels: Value) -> Result<SavedRecipe> {
        let body = json!({ "dataset_id": dataset_id, "name": name, "panels": panels });
        self.fetch(ApiRequest::post("/recipes").json(body)).await
    }

    pub async fn update_recipe(&self, recipe_id: i64, update: &RecipeUpdate) -> Result<SavedRecipe> {
        let body = serde_json::to_value(update).unwrap_or_default();
        self.fetch(ApiRequest::put(format!("/recipes/{recipe_id}")).json(body))
            .await
    }

    pub async fn delete_recipe(&self, recipe_id: i64) -> Result<()> {
        self.execute(ApiRequest::delete(format!("/recipes/{recipe_id}")))
            .await
    }
}
