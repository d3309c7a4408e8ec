use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({ "id": 1, "name": "Planta Central" }))]
pub struct WorkSite {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Planta Central")]
    pub name: String,
}
