//! Campaign routes — drafts, sending, and message history.
//!
//! Sending is a short pipeline: resolve and normalize recipients, claim the
//! campaign (`draft|scheduled → sending`), debit credits, hand the batch to
//! the SMS gateway, write one history row per recipient, then settle the
//! campaign as `sent` or `failed`. A gateway failure refunds the debit. Once
//! the debit is taken, the campaign is always settled even if the history
//! write or the refund fails.

use async_trait::async_trait;
use axum::{
    extract::{Extension, Path, Query, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use bulkline_common::{
    error::{BulklineError, BulklineResult},
    ids,
    models::{
        campaign::{
            segment_count, Campaign, CampaignChannel, CampaignStatus, CreateCampaignRequest,
            MessageHistory, MessageHistoryQuery, MessageStatus, UpdateCampaignRequest,
        },
        credit::TransactionKind,
    },
    validation::{normalize_kenyan_phone, validate_name, validate_request},
};
use bulkline_db::repository::{
    campaigns::{self, NewMessage},
    contacts, credentials,
    credits::{self, LedgerOutcome},
};
use bulkline_gateway::{Credentials, GatewayEnvelope};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::{middleware::AuthContext, routes, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route(
            "/campaigns/{campaign_id}",
            get(get_campaign).patch(update_campaign).delete(delete_campaign),
        )
        .route("/campaigns/{campaign_id}/send", post(send_campaign))
        .route("/messages", get(list_messages))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

/// Normalize explicit numbers, rejecting the first invalid one.
fn normalize_all(raw: &[String]) -> BulklineResult<Vec<String>> {
    raw.iter()
        .map(|r| {
            normalize_kenyan_phone(r).ok_or_else(|| {
                BulklineError::validation(format!("'{r}' is not a valid Kenyan phone number"))
            })
        })
        .collect()
}

/// Merge explicit and group recipients, keeping first-seen order.
fn merge_recipients(explicit: Vec<String>, group: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    explicit
        .into_iter()
        .chain(group)
        .filter(|phone| seen.insert(phone.clone()))
        .collect()
}

/// Pull the upstream message id out of a send response, if the gateway gave one.
fn gateway_message_id(data: &Value) -> Option<String> {
    ["message_id", "messageId", "id"]
        .iter()
        .find_map(|k| match data.get(*k) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
}

async fn ensure_group(state: &AppState, user_id: Uuid, group_id: Option<Uuid>) -> BulklineResult<()> {
    if let Some(group_id) = group_id {
        contacts::find_group(&state.db.pool, user_id, group_id)
            .await?
            .ok_or_else(|| BulklineError::not_found("Contact group"))?;
    }
    Ok(())
}

/// GET /api/v1/campaigns
async fn list_campaigns(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(paging): Query<routes::Pagination>,
) -> BulklineResult<Json<Vec<Campaign>>> {
    let (limit, offset) = routes::page(paging.limit, paging.offset);
    Ok(Json(
        campaigns::list_campaigns(&state.db.pool, auth.user_id, limit, offset).await?,
    ))
}

/// POST /api/v1/campaigns
async fn create_campaign(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateCampaignRequest>,
) -> BulklineResult<Json<Campaign>> {
    validate_request(&body)?;
    validate_name(&body.name)?;
    ensure_group(&state, auth.user_id, body.group_id).await?;

    let recipients = merge_recipients(normalize_all(&body.recipients)?, Vec::new());

    let campaign = campaigns::create_campaign(
        &state.db.pool,
        ids::generate_id(),
        auth.user_id,
        body.name.trim(),
        &body.message,
        body.sender_id.as_deref().filter(|s| !s.trim().is_empty()),
        body.channel.unwrap_or(CampaignChannel::Sms),
        body.group_id,
        &recipients,
        body.scheduled_at,
    )
    .await?;

    routes::invalidate_tenant_cache(&state.perf, auth.user_id);
    tracing::info!(user_id = %auth.user_id, campaign_id = %campaign.id, "Campaign created");

    Ok(Json(campaign))
}

/// GET /api/v1/campaigns/{campaign_id}
async fn get_campaign(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> BulklineResult<Json<Campaign>> {
    campaigns::find_by_id(&state.db.pool, auth.user_id, campaign_id)
        .await?
        .map(Json)
        .ok_or_else(|| BulklineError::not_found("Campaign"))
}

/// PATCH /api/v1/campaigns/{campaign_id}
///
/// Only drafts and scheduled campaigns can be edited.
async fn update_campaign(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
    Json(body): Json<UpdateCampaignRequest>,
) -> BulklineResult<Json<Campaign>> {
    validate_request(&body)?;
    if let Some(ref name) = body.name {
        validate_name(name)?;
    }
    ensure_group(&state, auth.user_id, body.group_id).await?;

    let recipients = body
        .recipients
        .as_deref()
        .map(normalize_all)
        .transpose()?
        .map(|r| merge_recipients(r, Vec::new()));

    let updated = campaigns::update_campaign(
        &state.db.pool,
        auth.user_id,
        campaign_id,
        body.name.as_deref().map(str::trim),
        body.message.as_deref(),
        body.sender_id.as_deref(),
        body.group_id,
        recipients.as_deref(),
        body.scheduled_at,
    )
    .await?;

    match updated {
        Some(campaign) => Ok(Json(campaign)),
        None => match campaigns::find_by_id(&state.db.pool, auth.user_id, campaign_id).await? {
            Some(_) => Err(BulklineError::Conflict {
                message: "Only draft or scheduled campaigns can be edited".into(),
            }),
            None => Err(BulklineError::not_found("Campaign")),
        },
    }
}

/// DELETE /api/v1/campaigns/{campaign_id}
async fn delete_campaign(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> BulklineResult<Json<Value>> {
    let campaign = campaigns::find_by_id(&state.db.pool, auth.user_id, campaign_id)
        .await?
        .ok_or_else(|| BulklineError::not_found("Campaign"))?;

    if campaign.status == CampaignStatus::Sending {
        return Err(BulklineError::Conflict {
            message: "Campaign is being sent".into(),
        });
    }

    campaigns::delete_campaign(&state.db.pool, auth.user_id, campaign_id).await?;
    routes::invalidate_tenant_cache(&state.perf, auth.user_id);

    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Serialize)]
struct SendCampaignResponse {
    campaign: Campaign,
    recipients: usize,
    cost: i64,
    gateway: GatewayEnvelope,
}

/// Bookkeeping that follows a gateway call.
#[async_trait]
trait SendSettlement: Send + Sync {
    type Settled: Send;

    async fn record_history(&self, rows: &[NewMessage]) -> BulklineResult<()>;

    async fn refund(&self, amount: i64) -> BulklineResult<()>;

    async fn finish(
        &self,
        status: CampaignStatus,
        recipients: i32,
        cost: i64,
    ) -> BulklineResult<Self::Settled>;
}

struct PgSettlement<'a> {
    pool: &'a PgPool,
    user_id: Uuid,
    campaign_id: Uuid,
    message: &'a str,
    refund_description: String,
    reference: &'a str,
}

#[async_trait]
impl<'a> SendSettlement for PgSettlement<'a> {
    type Settled = Campaign;

    async fn record_history(&self, rows: &[NewMessage]) -> BulklineResult<()> {
        campaigns::insert_messages(
            self.pool,
            self.user_id,
            Some(self.campaign_id),
            self.message,
            rows,
        )
        .await?;
        Ok(())
    }

    async fn refund(&self, amount: i64) -> BulklineResult<()> {
        credits::apply_transaction(
            self.pool,
            self.user_id,
            amount,
            TransactionKind::Refund,
            &self.refund_description,
            Some(self.reference),
        )
        .await?;
        Ok(())
    }

    async fn finish(
        &self,
        status: CampaignStatus,
        recipients: i32,
        cost: i64,
    ) -> BulklineResult<Campaign> {
        Ok(campaigns::finish_send(self.pool, self.campaign_id, status, recipients, cost).await?)
    }
}

/// Write history, refund a failed send and move the campaign out of
/// `sending`. Every step runs even when an earlier one fails; the first
/// error is returned once the campaign is settled. Returns the settled
/// campaign and the credits kept.
async fn settle<S: SendSettlement>(
    store: &S,
    delivered: bool,
    cost: i64,
    recipients: i32,
    rows: &[NewMessage],
) -> BulklineResult<(S::Settled, i64)> {
    let history = store.record_history(rows).await;
    if let Err(e) = &history {
        tracing::error!(error = %e, "Could not record message history");
    }

    let refund = if delivered {
        Ok(())
    } else {
        store.refund(cost).await
    };
    if let Err(e) = &refund {
        tracing::error!(error = %e, cost, "Could not refund failed send");
    }

    let (status, charged) = match (delivered, &refund) {
        (true, _) => (CampaignStatus::Sent, cost),
        (false, Ok(())) => (CampaignStatus::Failed, 0),
        (false, Err(_)) => (CampaignStatus::Failed, cost),
    };
    let settled = store.finish(status, recipients, charged).await?;

    history?;
    refund?;
    Ok((settled, charged))
}

/// POST /api/v1/campaigns/{campaign_id}/send
async fn send_campaign(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> BulklineResult<Json<SendCampaignResponse>> {
    let pool = &state.db.pool;

    let campaign = campaigns::find_by_id(pool, auth.user_id, campaign_id)
        .await?
        .ok_or_else(|| BulklineError::not_found("Campaign"))?;

    if !campaign.status.is_editable() {
        return Err(BulklineError::Conflict {
            message: "Campaign has already been sent".into(),
        });
    }
    if campaign.channel != CampaignChannel::Sms {
        return Err(BulklineError::validation(
            "Only SMS campaigns can be sent through the gateway",
        ));
    }

    let group = match campaign.group_id {
        Some(group_id) => contacts::group_phones(pool, auth.user_id, group_id).await?,
        None => Vec::new(),
    };
    let recipients = merge_recipients(normalize_all(&campaign.recipients)?, group);
    if recipients.is_empty() {
        return Err(BulklineError::validation("Campaign has no recipients"));
    }

    let credential = credentials::get_gateway_credential(pool, auth.user_id)
        .await?
        .ok_or_else(|| {
            BulklineError::validation("Save your SMS gateway credentials before sending")
        })?;

    let segments = segment_count(&campaign.message);
    let recipient_count = i32::try_from(recipients.len())
        .map_err(|_| BulklineError::validation("Too many recipients"))?;
    let cost = segments * i64::from(recipient_count);

    if !campaigns::mark_sending(pool, auth.user_id, campaign_id).await? {
        return Err(BulklineError::Conflict {
            message: "Campaign is already being sent".into(),
        });
    }

    let description = format!("Campaign '{}' to {} recipients", campaign.name, recipient_count);
    let reference = campaign_id.to_string();
    match credits::apply_transaction(
        pool,
        auth.user_id,
        -cost,
        TransactionKind::Usage,
        &description,
        Some(&reference),
    )
    .await
    {
        Ok(LedgerOutcome::Applied(_)) => {}
        Ok(LedgerOutcome::Insufficient { available }) => {
            campaigns::finish_send(pool, campaign_id, campaign.status, 0, 0).await?;
            return Err(BulklineError::InsufficientCredits {
                required: cost,
                available,
            });
        }
        Err(e) => {
            campaigns::finish_send(pool, campaign_id, campaign.status, 0, 0).await?;
            return Err(e.into());
        }
    }

    let creds = Credentials {
        username: credential.username.clone(),
        api_key: credential.api_key.clone(),
    };
    let sender = campaign
        .sender_id
        .as_deref()
        .or(credential.sender_id.as_deref());

    let outcome = state
        .gateway
        .send_sms(&creds, sender, &recipients, &campaign.message)
        .await;

    let delivered = outcome.is_ok();
    let (message_status, upstream_id, error) = match &outcome {
        Ok(data) => (MessageStatus::Sent, gateway_message_id(data), None),
        Err(e) => {
            tracing::warn!(
                user_id = %auth.user_id,
                %campaign_id,
                code = %e.code(),
                error = %e,
                "Campaign send rejected by gateway, refunding"
            );
            (MessageStatus::Failed, None, Some(e.to_string()))
        }
    };

    let per_message = if delivered { segments } else { 0 };
    let rows: Vec<NewMessage> = recipients
        .iter()
        .map(|recipient| NewMessage {
            id: ids::generate_id(),
            recipient: recipient.clone(),
            status: message_status,
            gateway_message_id: upstream_id.clone(),
            error: error.clone(),
            cost: per_message,
        })
        .collect();

    let settlement = PgSettlement {
        pool,
        user_id: auth.user_id,
        campaign_id,
        message: &campaign.message,
        refund_description: format!("Refund for failed campaign '{}'", campaign.name),
        reference: &reference,
    };
    let settled = settle(&settlement, delivered, cost, recipient_count, &rows).await;
    routes::invalidate_tenant_cache(&state.perf, auth.user_id);
    let (settled, charged) = settled?;

    tracing::info!(
        user_id = %auth.user_id,
        %campaign_id,
        recipients = recipient_count,
        cost = charged,
        status = ?settled.status,
        "Campaign send finished"
    );

    Ok(Json(SendCampaignResponse {
        campaign: settled,
        recipients: recipients.len(),
        cost: charged,
        gateway: GatewayEnvelope::from(outcome),
    }))
}

/// GET /api/v1/messages?campaign_id=&status=&limit=&offset=
async fn list_messages(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessageHistoryQuery>,
) -> BulklineResult<Json<Vec<MessageHistory>>> {
    let (limit, offset) = routes::page(query.limit, query.offset);
    Ok(Json(
        campaigns::list_messages(
            &state.db.pool,
            auth.user_id,
            query.campaign_id,
            query.status,
            limit,
            offset,
        )
        .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recipients_are_normalized_and_deduplicated() {
        let explicit = normalize_all(&["0712345678".into(), "254712345678".into()]).unwrap();
        let merged = merge_recipients(
            explicit,
            vec!["+254712345678".into(), "+254112345678".into()],
        );
        assert_eq!(merged, vec!["+254712345678", "+254112345678"]);
    }

    #[test]
    fn invalid_explicit_recipient_is_rejected() {
        let err = normalize_all(&["0712345678".into(), "123456".into()]).unwrap_err();
        assert!(err.to_string().contains("123456"));
    }

    #[test]
    fn cost_is_segments_times_recipients() {
        let message = "x".repeat(161);
        assert_eq!(segment_count(&message) * 3, 6);
    }

    #[derive(Default)]
    struct MemorySettlement {
        fail_history: bool,
        fail_refund: bool,
        refunded: std::sync::Mutex<Vec<i64>>,
        finished: std::sync::Mutex<Option<(CampaignStatus, i64)>>,
    }

    #[async_trait]
    impl SendSettlement for MemorySettlement {
        type Settled = CampaignStatus;

        async fn record_history(&self, _rows: &[NewMessage]) -> BulklineResult<()> {
            if self.fail_history {
                return Err(anyhow::anyhow!("history insert failed").into());
            }
            Ok(())
        }

        async fn refund(&self, amount: i64) -> BulklineResult<()> {
            if self.fail_refund {
                return Err(anyhow::anyhow!("ledger unavailable").into());
            }
            self.refunded.lock().unwrap().push(amount);
            Ok(())
        }

        async fn finish(
            &self,
            status: CampaignStatus,
            _recipients: i32,
            cost: i64,
        ) -> BulklineResult<CampaignStatus> {
            *self.finished.lock().unwrap() = Some((status, cost));
            Ok(status)
        }
    }

    #[tokio::test]
    async fn failed_send_is_refunded_and_settled_when_history_write_fails() {
        let store = MemorySettlement {
            fail_history: true,
            ..Default::default()
        };

        let result = settle(&store, false, 6, 3, &[]).await;

        assert!(result.is_err());
        assert_eq!(*store.refunded.lock().unwrap(), vec![6]);
        assert_eq!(
            *store.finished.lock().unwrap(),
            Some((CampaignStatus::Failed, 0))
        );
    }

    #[tokio::test]
    async fn unrefunded_send_is_still_settled_with_its_cost() {
        let store = MemorySettlement {
            fail_refund: true,
            ..Default::default()
        };

        let result = settle(&store, false, 4, 2, &[]).await;

        assert!(result.is_err());
        assert_eq!(
            *store.finished.lock().unwrap(),
            Some((CampaignStatus::Failed, 4))
        );
    }

    #[tokio::test]
    async fn delivered_send_keeps_the_debit() {
        let store = MemorySettlement::default();

        let (status, charged) = settle(&store, true, 5, 5, &[]).await.unwrap();

        assert_eq!(status, CampaignStatus::Sent);
        assert_eq!(charged, 5);
        assert!(store.refunded.lock().unwrap().is_empty());
    }

    #[test]
    fn extracts_upstream_message_id() {
        assert_eq!(gateway_message_id(&json!({"message_id": "abc"})).as_deref(), Some("abc"));
        assert_eq!(gateway_message_id(&json!({"id": 42})).as_deref(), Some("42"));
        assert_eq!(gateway_message_id(&json!({"message": "queued"})), None);
    }
}
