use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, RawQuery};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::Value;

use super::actor::MaybeActor;
use super::dto::{DataEnvelope, ListEnvelope};
use super::error::{json_rejection_to_problem, router_error_to_problem};
use super::problem::{ApiResult, Problem};
use super::query_params::{parse_query, string_param};
use crate::error::RouterError;
use crate::model::Record;
use crate::router::ResourceRouter;

type Resource = Extension<Arc<ResourceRouter>>;

fn object_body(body: Result<Json<Value>, JsonRejection>, uri: &Uri) -> ApiResult<Record> {
    match body {
        Ok(Json(Value::Object(map))) => Ok(map),
        Ok(Json(other)) => Err(router_error_to_problem(
            &RouterError::validation(format!("Request body must be an object, got: {other}")),
            uri.path(),
        )),
        Err(rejection) => Err(json_rejection_to_problem(&rejection, uri.path())),
    }
}

fn problem(uri: &Uri) -> impl Fn(RouterError) -> Problem + '_ {
    move |e| router_error_to_problem(&e, uri.path())
}

/// List records with filtering and pagination
///
/// # Errors
/// 400 for rejected query parameters, 403 when listing is denied.
#[tracing::instrument(
    skip(resource, actor, query),
    fields(resource = %resource.model_name())
)]
pub async fn list(
    uri: Uri,
    actor: MaybeActor,
    Extension(resource): Resource,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<ListEnvelope>> {
    let params = parse_query(query.as_deref()).map_err(problem(&uri))?;
    let page = resource
        .list(actor.actor(), &params)
        .await
        .map_err(problem(&uri))?;
    Ok(Json(page.into()))
}

/// Create one record, or a batch from a JSON array
///
/// # Errors
/// A malformed body, or any [`ResourceRouter::create`] failure, as a
/// [`Problem`].
#[tracing::instrument(
    skip(resource, actor, body),
    fields(resource = %resource.model_name())
)]
pub async fn create(
    uri: Uri,
    actor: MaybeActor,
    Extension(resource): Resource,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let created = match body {
        Ok(Json(Value::Array(items))) => {
            let mut bodies = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(map) => bodies.push(map),
                    other => {
                        return Err(problem(&uri)(RouterError::validation(format!(
                            "Request body must be an object, got: {other}"
                        ))));
                    }
                }
            }
            let records = resource
                .create_many(actor.actor(), bodies)
                .await
                .map_err(problem(&uri))?;
            Value::Array(records.into_iter().map(Value::Object).collect())
        }
        other => {
            let body = object_body(other, &uri)?;
            let record = resource
                .create(actor.actor(), body)
                .await
                .map_err(problem(&uri))?;
            Value::Object(record)
        }
    };
    Ok((StatusCode::CREATED, Json(DataEnvelope::new(created))).into_response())
}

/// Get one record by id
///
/// # Errors
/// 403 or 404 from [`ResourceRouter::read`].
#[tracing::instrument(
    skip(resource, actor),
    fields(resource = %resource.model_name(), id = %id)
)]
pub async fn read(
    uri: Uri,
    actor: MaybeActor,
    Extension(resource): Resource,
    Path(id): Path<String>,
) -> ApiResult<Json<DataEnvelope<Record>>> {
    let record = resource
        .read(actor.actor(), &id)
        .await
        .map_err(problem(&uri))?;
    Ok(Json(DataEnvelope::new(record)))
}

/// Patch one record
///
/// # Errors
/// A malformed body, or any [`ResourceRouter::update`] failure.
#[tracing::instrument(
    skip(resource, actor, body),
    fields(resource = %resource.model_name(), id = %id)
)]
pub async fn update(
    uri: Uri,
    actor: MaybeActor,
    Extension(resource): Resource,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<DataEnvelope<Record>>> {
    let body = object_body(body, &uri)?;
    let record = resource
        .update(actor.actor(), &id, body)
        .await
        .map_err(problem(&uri))?;
    Ok(Json(DataEnvelope::new(record)))
}

/// Delete one record. The variant key may come from the query string or an
/// optional JSON body.
///
/// # Errors
/// An unparsable body, or any [`ResourceRouter::delete`] failure.
#[tracing::instrument(
    skip(resource, actor, query, body),
    fields(resource = %resource.model_name(), id = %id)
)]
pub async fn delete(
    uri: Uri,
    actor: MaybeActor,
    Extension(resource): Resource,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let key = resource.definition().registry().key().to_owned();
    let params = parse_query(query.as_deref()).map_err(problem(&uri))?;
    let mut variant = string_param(&params, &key).map(str::to_owned);
    if variant.is_none() && !body.is_empty() {
        let parsed: Value = serde_json::from_slice(&body).map_err(|e| {
            problem(&uri)(RouterError::validation(format!("Malformed body: {e}")))
        })?;
        variant = parsed.get(&key).and_then(Value::as_str).map(str::to_owned);
    }
    resource
        .delete(actor.actor(), &id, variant.as_deref())
        .await
        .map_err(problem(&uri))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Append one element to an array field
///
/// # Errors
/// As [`ResourceRouter::add_item`].
#[tracing::instrument(
    skip(resource, actor, body),
    fields(resource = %resource.model_name(), id = %id, field = %field)
)]
pub async fn add_item(
    uri: Uri,
    actor: MaybeActor,
    Extension(resource): Resource,
    Path((id, field)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<DataEnvelope<Record>>> {
    let body = object_body(body, &uri)?;
    let record = resource
        .add_item(actor.actor(), &id, &field, body)
        .await
        .map_err(problem(&uri))?;
    Ok(Json(DataEnvelope::new(record)))
}

/// Replace one element of an array field
///
/// # Errors
/// As [`ResourceRouter::update_item`].
#[tracing::instrument(
    skip(resource, actor, body),
    fields(resource = %resource.model_name(), id = %id, field = %field, child = %child_id)
)]
pub async fn update_item(
    uri: Uri,
    actor: MaybeActor,
    Extension(resource): Resource,
    Path((id, field, child_id)): Path<(String, String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<DataEnvelope<Record>>> {
    let body = object_body(body, &uri)?;
    let record = resource
        .update_item(actor.actor(), &id, &field, &child_id, body)
        .await
        .map_err(problem(&uri))?;
    Ok(Json(DataEnvelope::new(record)))
}

/// Remove one element of an array field
///
/// # Errors
/// As [`ResourceRouter::remove_item`].
#[tracing::instrument(
    skip(resource, actor),
    fields(resource = %resource.model_name(), id = %id, field = %field, child = %child_id)
)]
pub async fn remove_item(
    uri: Uri,
    actor: MaybeActor,
    Extension(resource): Resource,
    Path((id, field, child_id)): Path<(String, String, String)>,
) -> ApiResult<Json<DataEnvelope<Record>>> {
    let record = resource
        .remove_item(actor.actor(), &id, &field, &child_id)
        .await
        .map_err(problem(&uri))?;
    Ok(Json(DataEnvelope::new(record)))
}
