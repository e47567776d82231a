//! HTTP handlers for the placeholder operations.
//!
//! Every route under `/documents/{doc}` works on one stored document; see
//! [`router`] for the full table.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use doctemplate::{
    CreateNamedRangeOptions, GenerateDocumentRequest, GenerationOutcome, InspectionReport,
    ListNamedRangesResponse, ListPropertiesResponse, OperationResponse, TemplateService,
};
use doctemplate_core::{DocumentStore, RangeElement};
use doctemplate_local::{LocalDocumentStore, MemoryDocument};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TemplateService<LocalDocumentStore>>,
}

impl AppState {
    fn store(&self) -> &LocalDocumentStore {
        self.service.documents()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/documents", post(import_document))
        .route("/documents/{doc}", get(export_document))
        .route("/documents/{doc}/selection", put(set_selection))
        .route("/documents/{doc}/selection/text", get(selected_text))
        .route(
            "/documents/{doc}/named-ranges",
            get(list_named_ranges)
                .post(create_named_range)
                .delete(remove_all_named_ranges),
        )
        .route("/documents/{doc}/named-ranges/{id}", delete(remove_named_range))
        .route("/documents/{doc}/named-ranges/{id}/text", get(named_range_text))
        .route("/documents/{doc}/named-ranges/{id}/locate", post(locate_named_range))
        .route("/documents/{doc}/named-ranges/{id}/inspect", get(inspect_named_range))
        .route(
            "/documents/{doc}/properties",
            get(list_properties).post(create_property),
        )
        .route("/documents/{doc}/properties/{name}", delete(remove_property))
        .route("/documents/{doc}/generate", post(generate_document))
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub copy_prefix: String,
}

/// GET /health - Health check endpoint.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        copy_prefix: state.service.copy_prefix().to_string(),
    })
}

// =============================================================================
// Documents
// =============================================================================

#[derive(Serialize, Deserialize)]
pub struct ImportResponse {
    pub id: String,
}

/// POST /documents - Store a document; an empty id gets a fresh one.
pub async fn import_document(
    State(state): State<AppState>,
    Json(document): Json<MemoryDocument>,
) -> Result<(StatusCode, Json<ImportResponse>)> {
    let id = state.store().import(document).await?;
    info!("Imported document {}", id);
    Ok((StatusCode::CREATED, Json(ImportResponse { id })))
}

pub async fn export_document(
    State(state): State<AppState>,
    Path(doc): Path<String>,
) -> Result<Json<MemoryDocument>> {
    Ok(Json(state.store().open(&doc).await?))
}

#[derive(Deserialize)]
pub struct SelectionRequest {
    #[serde(default)]
    pub selection: Option<Vec<RangeElement>>,
}

/// PUT /documents/{doc}/selection - Set or clear the user selection.
pub async fn set_selection(
    State(state): State<AppState>,
    Path(doc): Path<String>,
    Json(request): Json<SelectionRequest>,
) -> Result<StatusCode> {
    let mut document = state.store().open(&doc).await?;
    document.set_selection(request.selection)?;
    state.store().save(&document).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn selected_text(
    State(state): State<AppState>,
    Path(doc): Path<String>,
) -> Result<Json<Vec<String>>> {
    Ok(Json(state.service.selected_text(&doc).await?))
}

// =============================================================================
// Named ranges
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default = "default_true")]
    pub with_color: bool,
    #[serde(default = "default_true")]
    pub update_color: bool,
}

fn default_true() -> bool {
    true
}

pub async fn list_named_ranges(
    State(state): State<AppState>,
    Path(doc): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListNamedRangesResponse>> {
    Ok(Json(
        state
            .service
            .list_named_ranges(&doc, query.with_color, query.update_color)
            .await?,
    ))
}

pub async fn create_named_range(
    State(state): State<AppState>,
    Path(doc): Path<String>,
    Json(options): Json<CreateNamedRangeOptions>,
) -> Result<Json<OperationResponse<ListNamedRangesResponse>>> {
    Ok(Json(state.service.create_named_range(&doc, &options).await?))
}

pub async fn remove_all_named_ranges(
    State(state): State<AppState>,
    Path(doc): Path<String>,
) -> Result<Json<ListNamedRangesResponse>> {
    Ok(Json(state.service.remove_all_named_ranges(&doc).await?))
}

pub async fn remove_named_range(
    State(state): State<AppState>,
    Path((doc, id)): Path<(String, String)>,
) -> Result<Json<ListNamedRangesResponse>> {
    Ok(Json(state.service.remove_named_range(&doc, &id).await?))
}

pub async fn named_range_text(
    State(state): State<AppState>,
    Path((doc, id)): Path<(String, String)>,
) -> Result<Json<Vec<String>>> {
    Ok(Json(state.service.named_range_text(&doc, &id).await?))
}

pub async fn locate_named_range(
    State(state): State<AppState>,
    Path((doc, id)): Path<(String, String)>,
) -> Result<StatusCode> {
    state.service.locate_named_range(&doc, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn inspect_named_range(
    State(state): State<AppState>,
    Path((doc, id)): Path<(String, String)>,
) -> Result<Json<InspectionReport>> {
    Ok(Json(state.service.inspect_named_range(&doc, &id).await?))
}

// =============================================================================
// Properties
// =============================================================================

#[derive(Deserialize)]
pub struct PropertyRequest {
    pub name: String,
    pub value: String,
}

pub async fn list_properties(
    State(state): State<AppState>,
    Path(doc): Path<String>,
) -> Result<Json<ListPropertiesResponse>> {
    Ok(Json(state.service.list_properties(&doc).await?))
}

pub async fn create_property(
    State(state): State<AppState>,
    Path(doc): Path<String>,
    Json(request): Json<PropertyRequest>,
) -> Result<Json<OperationResponse<ListPropertiesResponse>>> {
    Ok(Json(
        state
            .service
            .create_property(&doc, &request.name, &request.value)
            .await?,
    ))
}

pub async fn remove_property(
    State(state): State<AppState>,
    Path((doc, name)): Path<(String, String)>,
) -> Result<Json<ListPropertiesResponse>> {
    Ok(Json(state.service.remove_property(&doc, &name).await?))
}

// =============================================================================
// Generation
// =============================================================================

/// POST /documents/{doc}/generate - Always 200; failures are a tagged body.
pub async fn generate_document(
    State(state): State<AppState>,
    Path(doc): Path<String>,
    Json(request): Json<GenerateDocumentRequest>,
) -> Json<GenerationOutcome> {
    Json(state.service.generate_document(&doc, &request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use doctemplate_core::NodeId;
    use doctemplate_local::create_backends;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        _dir: TempDir,
        app: Router,
        title: NodeId,
    }

    fn setup() -> TestApp {
        let dir = TempDir::new().unwrap();
        let (store, properties) = create_backends(dir.path());
        let state = AppState {
            service: Arc::new(TemplateService::new(store, properties)),
        };
        // Node ids are arena indices: body #0, paragraph #1, its text #2.
        TestApp {
            _dir: dir,
            app: router(state),
            title: NodeId(2),
        }
    }

    fn lease() -> Value {
        let mut document = MemoryDocument::new("", "Lease");
        document.append_paragraph("Lease for TENANT");
        document.append_paragraph("");
        document.append_paragraph("Signed");
        serde_json::to_value(&document).unwrap()
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn import(test: &TestApp) -> String {
        let (status, body) = send(&test.app, Method::POST, "/documents", Some(lease())).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let test = setup();
        let (status, body) = send(&test.app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);
        assert_eq!(body["copy_prefix"], "Test Case of ");
    }

    #[tokio::test]
    async fn test_placeholder_round_trip_and_generation() {
        let test = setup();
        let doc = import(&test).await;

        let selection =
            serde_json::to_value(vec![RangeElement::partial(test.title, 10, 15)]).unwrap();
        let (status, _) = send(
            &test.app,
            Method::PUT,
            &format!("/documents/{}/selection", doc),
            Some(json!({ "selection": selection })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let uri = format!("/documents/{}/selection/text", doc);
        let (_, text) = send(&test.app, Method::GET, &uri, None).await;
        assert_eq!(text, json!(["TENANT"]));

        let (status, created) = send(
            &test.app,
            Method::POST,
            &format!("/documents/{}/named-ranges", doc),
            Some(json!({ "name": "tenant", "kind": "filler" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["status"], 0);
        assert_eq!(created["data"]["placeholders"][0]["name"], "[F]tenant");
        assert_eq!(created["data"]["placeholders"][0]["color"], "#FFD700");
        let range_id = created["data"]["placeholders"][0]["id"].as_str().unwrap().to_string();

        let (_, listing) = send(
            &test.app,
            Method::GET,
            &format!("/documents/{}/named-ranges?withColor=false&updateColor=false", doc),
            None,
        )
        .await;
        assert_eq!(listing["placeholders"][0]["color"], Value::Null);

        let (_, range_text) = send(
            &test.app,
            Method::GET,
            &format!("/documents/{}/named-ranges/{}/text", doc, range_id),
            None,
        )
        .await;
        assert_eq!(range_text, json!(["TENANT"]));

        let (_, report) = send(
            &test.app,
            Method::GET,
            &format!("/documents/{}/named-ranges/{}/inspect", doc, range_id),
            None,
        )
        .await;
        assert_eq!(report["count"], 1);

        let (_, outcome) = send(
            &test.app,
            Method::POST,
            &format!("/documents/{}/generate", doc),
            Some(json!({ "mockedPlaceholders": [{ "id": range_id, "value": "Bob" }] })),
        )
        .await;
        assert_eq!(outcome["kind"], "success");
        let copy_id = outcome["summary"]["documentId"].as_str().unwrap().to_string();
        assert_ne!(copy_id, doc);

        let copy: MemoryDocument = {
            let uri = format!("/documents/{}", copy_id);
            let (status, body) = send(&test.app, Method::GET, &uri, None).await;
            assert_eq!(status, StatusCode::OK);
            serde_json::from_value(body).unwrap()
        };
        assert_eq!(
            copy.body_texts(),
            vec!["Lease for Bob".to_string(), "Signed".to_string()]
        );
    }

    #[tokio::test]
    async fn test_properties_routes() {
        let test = setup();
        let doc = import(&test).await;
        let uri = format!("/documents/{}/properties", doc);

        let (_, created) = send(
            &test.app,
            Method::POST,
            &uri,
            Some(json!({ "name": "tenant", "value": "Alice" })),
        )
        .await;
        assert_eq!(created["message"], "OK");
        assert_eq!(created["data"]["properties"], json!([{ "name": "tenant", "value": "Alice" }]));

        let (_, removed) = send(&test.app, Method::DELETE, &format!("{}/tenant", uri), None).await;
        assert_eq!(removed["properties"], json!([]));
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_found() {
        let test = setup();
        let (status, body) =
            send(&test.app, Method::GET, "/documents/missing/named-ranges", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, body) = send(
            &test.app,
            Method::POST,
            "/documents/missing/generate",
            Some(json!({ "placeholders": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "error");
    }

    #[tokio::test]
    async fn test_unknown_range_text_is_not_found() {
        let test = setup();
        let doc = import(&test).await;
        let (status, _) = send(
            &test.app,
            Method::GET,
            &format!("/documents/{}/named-ranges/nope/text", doc),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &test.app,
            Method::POST,
            &format!("/documents/{}/named-ranges/nope/locate", doc),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
