//! Contact routes — address book, groups, and group membership.
//!
//! Phone numbers are normalized to `+254…` on every write, so uniqueness per
//! owner holds regardless of how the number was typed.

use axum::{
    extract::{Extension, Path, Query, State},
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use bulkline_common::{
    error::{BulklineError, BulklineResult},
    ids,
    models::contact::{
        Contact, ContactGroup, ContactGroupSummary, ContactQuery, CreateContactRequest,
        CreateGroupRequest, GroupMembersRequest, UpdateContactRequest,
    },
    validation::{is_valid_email, require_kenyan_phone, validate_name, validate_request},
};
use bulkline_db::repository::contacts;
use std::sync::Arc;
use uuid::Uuid;

use crate::{middleware::AuthContext, routes, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route(
            "/contacts/{contact_id}",
            patch(update_contact).delete(delete_contact),
        )
        .route("/contact-groups", get(list_groups).post(create_group))
        .route("/contact-groups/{group_id}", axum::routing::delete(delete_group))
        .route(
            "/contact-groups/{group_id}/members",
            post(add_members).delete(remove_members),
        )
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

/// Blank email means "no email"; anything else must parse.
fn clean_email(raw: Option<&str>) -> BulklineResult<Option<String>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(email) if is_valid_email(email) => Ok(Some(email.to_string())),
        Some(email) => Err(BulklineError::validation(format!(
            "'{email}' is not a valid email address"
        ))),
    }
}

async fn ensure_phone_free(
    state: &AppState,
    user_id: Uuid,
    phone: &str,
    except: Option<Uuid>,
) -> BulklineResult<()> {
    match contacts::find_by_phone(&state.db.pool, user_id, phone).await? {
        Some(existing) if Some(existing.id) != except => Err(BulklineError::AlreadyExists {
            resource: format!("Contact with phone {phone}"),
        }),
        _ => Ok(()),
    }
}

/// GET /api/v1/contacts?search=&group_id=&limit=&offset=
async fn list_contacts(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContactQuery>,
) -> BulklineResult<Json<Vec<Contact>>> {
    let (limit, offset) = routes::page(query.limit, query.offset);
    let search = query.search.as_deref().filter(|s| !s.trim().is_empty());

    let rows = contacts::list_contacts(
        &state.db.pool,
        auth.user_id,
        search,
        query.group_id,
        limit,
        offset,
    )
    .await?;

    Ok(Json(rows))
}

/// POST /api/v1/contacts
async fn create_contact(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateContactRequest>,
) -> BulklineResult<Json<Contact>> {
    validate_request(&body)?;
    validate_name(&body.name)?;
    let phone = require_kenyan_phone(&body.phone)?;
    let email = clean_email(body.email.as_deref())?;

    ensure_phone_free(&state, auth.user_id, &phone, None).await?;

    let contact = contacts::create_contact(
        &state.db.pool,
        ids::generate_id(),
        auth.user_id,
        body.name.trim(),
        &phone,
        email.as_deref(),
        body.notes.as_deref(),
    )
    .await?;

    routes::invalidate_tenant_cache(&state.perf, auth.user_id);
    tracing::debug!(user_id = %auth.user_id, contact_id = %contact.id, "Contact created");

    Ok(Json(contact))
}

/// PATCH /api/v1/contacts/{contact_id}
async fn update_contact(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(contact_id): Path<Uuid>,
    Json(body): Json<UpdateContactRequest>,
) -> BulklineResult<Json<Contact>> {
    validate_request(&body)?;
    if let Some(ref name) = body.name {
        validate_name(name)?;
    }

    let phone = body.phone.as_deref().map(require_kenyan_phone).transpose()?;
    if let Some(ref phone) = phone {
        ensure_phone_free(&state, auth.user_id, phone, Some(contact_id)).await?;
    }
    let email = clean_email(body.email.as_deref())?;

    let contact = contacts::update_contact(
        &state.db.pool,
        auth.user_id,
        contact_id,
        body.name.as_deref().map(str::trim),
        phone.as_deref(),
        email.as_deref(),
        body.notes.as_deref(),
    )
    .await?
    .ok_or_else(|| BulklineError::not_found("Contact"))?;

    Ok(Json(contact))
}

/// DELETE /api/v1/contacts/{contact_id}
async fn delete_contact(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(contact_id): Path<Uuid>,
) -> BulklineResult<Json<serde_json::Value>> {
    if !contacts::delete_contact(&state.db.pool, auth.user_id, contact_id).await? {
        return Err(BulklineError::not_found("Contact"));
    }

    routes::invalidate_tenant_cache(&state.perf, auth.user_id);
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ── Groups ────────────────────────────────────────────────────────────────────

/// GET /api/v1/contact-groups
async fn list_groups(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> BulklineResult<Json<Vec<ContactGroupSummary>>> {
    Ok(Json(contacts::list_groups(&state.db.pool, auth.user_id).await?))
}

/// POST /api/v1/contact-groups
async fn create_group(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateGroupRequest>,
) -> BulklineResult<Json<ContactGroup>> {
    validate_request(&body)?;
    validate_name(&body.name)?;

    let group = contacts::create_group(
        &state.db.pool,
        ids::generate_id(),
        auth.user_id,
        body.name.trim(),
        body.description.as_deref(),
    )
    .await?;

    routes::invalidate_tenant_cache(&state.perf, auth.user_id);
    Ok(Json(group))
}

/// DELETE /api/v1/contact-groups/{group_id}
///
/// Members stay in the address book; only the grouping goes.
async fn delete_group(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
) -> BulklineResult<Json<serde_json::Value>> {
    if !contacts::delete_group(&state.db.pool, auth.user_id, group_id).await? {
        return Err(BulklineError::not_found("Contact group"));
    }

    routes::invalidate_tenant_cache(&state.perf, auth.user_id);
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn owned_group(state: &AppState, user_id: Uuid, group_id: Uuid) -> BulklineResult<ContactGroup> {
    contacts::find_group(&state.db.pool, user_id, group_id)
        .await?
        .ok_or_else(|| BulklineError::not_found("Contact group"))
}

/// POST /api/v1/contact-groups/{group_id}/members
async fn add_members(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    Json(body): Json<GroupMembersRequest>,
) -> BulklineResult<Json<serde_json::Value>> {
    validate_request(&body)?;
    owned_group(&state, auth.user_id, group_id).await?;

    let added =
        contacts::add_members(&state.db.pool, auth.user_id, group_id, &body.contact_ids).await?;

    Ok(Json(serde_json::json!({ "added": added })))
}

/// DELETE /api/v1/contact-groups/{group_id}/members
async fn remove_members(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    Json(body): Json<GroupMembersRequest>,
) -> BulklineResult<Json<serde_json::Value>> {
    validate_request(&body)?;
    owned_group(&state, auth.user_id, group_id).await?;

    let removed = contacts::remove_members(&state.db.pool, group_id, &body.contact_ids).await?;

    Ok(Json(serde_json::json!({ "removed": removed })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_email_is_none() {
        assert_eq!(clean_email(None).unwrap(), None);
        assert_eq!(clean_email(Some("  ")).unwrap(), None);
        assert_eq!(
            clean_email(Some(" wanjiru@example.co.ke ")).unwrap().as_deref(),
            Some("wanjiru@example.co.ke")
        );
        assert!(clean_email(Some("not-an-email")).is_err());
    }
}
