use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::Backend;
use crate::error::{ClientError, ClientResult, ErrorResponse};
use crate::models::{
    Appointment, AppointmentUpdate, CancelRequest, CartItem, CheckoutRequest, ChildProfile, Envelope, Feedback,
    FeedbackRequest, NewChild, Reaction,
};

/// reqwest-backed implementation of [`Backend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout_secs: u64) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ClientError::Network(format!("http client init: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends the request and turns transport failures and non-2xx answers
    /// into `ClientError`.
    async fn send(&self, req: RequestBuilder, token: &str) -> ClientResult<Response> {
        let resp = req.bearer_auth(token).send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(Duration::from_secs(self.timeout_secs))
            } else {
                ClientError::Network(e.to_string())
            }
        })?;

        let status = resp.status();
        tracing::debug!(url = %resp.url(), status = status.as_u16(), "backend response");
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(backend_error(status, &body))
    }

    async fn json<T: DeserializeOwned>(&self, req: RequestBuilder, token: &str) -> ClientResult<T> {
        let body = self.send(req, token).await?.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        Ok(envelope.into_inner())
    }

    /// List endpoints: records that fail to decode are logged and skipped so
    /// one bad row does not empty the whole list.
    async fn json_list<T: DeserializeOwned>(&self, req: RequestBuilder, token: &str, what: &str) -> ClientResult<Vec<T>> {
        let raw: Vec<Value> = self.json(req, token).await?;
        Ok(decode_records(raw, what))
    }

    /// Lookup endpoints answer 404, an empty body, `null`, an object or a
    /// one-element list depending on the endpoint.
    async fn optional<T: DeserializeOwned>(&self, req: RequestBuilder, token: &str) -> ClientResult<Option<T>> {
        let resp = match self.send(req, token).await {
            Ok(resp) => resp,
            Err(ClientError::Backend { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        first_or_none(serde_json::from_str(&body)?)
    }
}

fn backend_error(status: StatusCode, body: &str) -> ClientError {
    let (code, message) = serde_json::from_str::<ErrorResponse>(body)
        .map(ErrorResponse::into_parts)
        .unwrap_or((None, None));

    let fallback = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body.trim().to_string()
    };

    ClientError::Backend {
        status: status.as_u16(),
        code: code.unwrap_or_else(|| format!("HTTP_{}", status.as_u16())),
        message: message.unwrap_or(fallback),
    }
}

fn decode_records<T: DeserializeOwned>(raw: Vec<Value>, what: &str) -> Vec<T> {
    let total = raw.len();
    let items: Vec<T> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value(record) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(what, index, error = %e, "skipping malformed record");
                None
            }
        })
        .collect();
    if items.len() != total {
        tracing::warn!(what, total, kept = items.len(), "list decoded with skipped records");
    }
    items
}

fn first_or_none<T: DeserializeOwned>(value: Value) -> ClientResult<Option<T>> {
    let value = match value {
        Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or(Value::Null),
        other => other,
    };
    let value = match value {
        Value::Array(items) => match items.into_iter().next() {
            Some(first) => first,
            None => return Ok(None),
        },
        other => other,
    };
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(value)?))
}

/// Checkout answers with the payment URL as plain text, as a JSON string, or
/// inside an object. Anything else is handed back untouched for the caller
/// to reject.
fn extract_payment_url(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::String(s)) => s,
        Ok(Value::Object(map)) => ["paymentUrl", "url", "data"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        _ => body.trim().to_string(),
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_appointments(&self, token: &str, user_id: &str) -> ClientResult<Vec<Appointment>> {
        let req = self.client.get(self.url(&format!("/api/appointments/user/{user_id}")));
        self.json_list(req, token, "appointment").await
    }

    async fn cancel_appointment(&self, token: &str, appointment_id: &str, reason: &str) -> ClientResult<()> {
        let req = self
            .client
            .put(self.url(&format!("/api/appointments/{appointment_id}/cancel")))
            .json(&CancelRequest {
                reason: reason.to_string(),
            });
        self.send(req, token).await?;
        Ok(())
    }

    async fn update_appointment(
        &self,
        token: &str,
        appointment_id: &str,
        payload: &AppointmentUpdate,
    ) -> ClientResult<()> {
        let req = self
            .client
            .put(self.url(&format!("/api/appointments/{appointment_id}")))
            .json(payload);
        self.send(req, token).await?;
        Ok(())
    }

    async fn fetch_all_feedback(&self, token: &str) -> ClientResult<Vec<Feedback>> {
        let req = self.client.get(self.url("/api/feedback"));
        self.json_list(req, token, "feedback").await
    }

    async fn fetch_feedback(&self, token: &str, appointment_id: &str) -> ClientResult<Option<Feedback>> {
        let req = self
            .client
            .get(self.url(&format!("/api/feedback/appointment/{appointment_id}")));
        self.optional(req, token).await
    }

    async fn post_feedback(&self, token: &str, body: &FeedbackRequest) -> ClientResult<Feedback> {
        let req = self.client.post(self.url("/api/feedback")).json(body);
        self.json(req, token).await
    }

    async fn fetch_all_reactions(&self, token: &str) -> ClientResult<Vec<Reaction>> {
        let req = self.client.get(self.url("/api/reactions"));
        self.json_list(req, token, "reaction").await
    }

    async fn fetch_reaction(&self, token: &str, appointment_id: &str) -> ClientResult<Option<Reaction>> {
        let req = self
            .client
            .get(self.url(&format!("/api/reactions/appointment/{appointment_id}")));
        self.optional(req, token).await
    }

    async fn add_cart_item(&self, token: &str, user_id: &str, item: &CartItem) -> ClientResult<()> {
        let req = self
            .client
            .post(self.url(&format!("/api/cart/{user_id}/items")))
            .json(item);
        self.send(req, token).await?;
        Ok(())
    }

    async fn remove_cart_item(&self, token: &str, user_id: &str, vaccine_details_id: &str) -> ClientResult<()> {
        let req = self
            .client
            .delete(self.url(&format!("/api/cart/{user_id}/items/{vaccine_details_id}")));
        self.send(req, token).await?;
        Ok(())
    }

    async fn checkout(&self, token: &str, user_id: &str, body: &CheckoutRequest) -> ClientResult<String> {
        let req = self
            .client
            .post(self.url(&format!("/api/checkout/{user_id}")))
            .json(body);
        let text = self.send(req, token).await?.text().await?;
        Ok(extract_payment_url(&text))
    }

    async fn fetch_children(&self, token: &str, user_id: &str) -> ClientResult<Vec<ChildProfile>> {
        let req = self.client.get(self.url(&format!("/api/children/user/{user_id}")));
        self.json_list(req, token, "child").await
    }

    async fn create_child(&self, token: &str, user_id: &str, child: &NewChild) -> ClientResult<ChildProfile> {
        let req = self
            .client
            .post(self.url("/api/children"))
            .query(&[("userId", user_id)])
            .json(child);
        self.json(req, token).await
    }

    async fn update_child(&self, token: &str, child: &ChildProfile) -> ClientResult<ChildProfile> {
        let req = self
            .client
            .put(self.url(&format!("/api/children/{}", child.children_id)))
            .json(child);
        self.json(req, token).await
    }

    async fn delete_child(&self, token: &str, children_id: &str) -> ClientResult<()> {
        let req = self.client.delete(self.url(&format!("/api/children/{children_id}")));
        self.send(req, token).await?;
        Ok(())
    }
}
