use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;

use super::{DeliveredMessage, GatewayError, GatewayResult, MemberFilter, MemberRef, MessagingGateway};

/// Gateway speaking JSON to a bridge process that owns the chat-platform
/// connection.
///
/// Routes, relative to the configured base URL:
///
/// | call | route |
/// |------|-------|
/// | `send_message` | `POST /channels/{channel}/messages` |
/// | `send_direct` | `POST /members/{member}/messages` |
/// | `edit_message` | `PATCH /channels/{channel}/messages/{message}` |
/// | `fetch_members` | `POST /members/search` |
/// | `release_attachment` | `DELETE /attachments/{ref}` |
#[derive(Clone)]
pub struct WebhookGateway {
    client: Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

#[derive(Serialize)]
struct OutgoingMessage {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<String>,
}

#[derive(Serialize)]
struct MessageEdit {
    text: String,
}

impl WebhookGateway {
    /// Build a gateway targeting `base_url`, authenticating with a bearer
    /// `token` when one is configured.
    pub fn new(base_url: &str, token: Option<String>) -> GatewayResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| GatewayError::transport("client_builder", source))?;
        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            token: token.map(Arc::from),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token.as_ref()),
            None => builder,
        }
    }

    async fn send(operation: &'static str, builder: RequestBuilder) -> GatewayResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|source| GatewayError::transport(operation, source))?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(GatewayError::Status {
                operation,
                status: status.as_u16(),
            })
        }
    }
}

impl MessagingGateway for WebhookGateway {
    fn send_message(
        &self,
        channel: &str,
        text: &str,
        attachment: Option<&str>,
    ) -> BoxFuture<'static, GatewayResult<DeliveredMessage>> {
        let builder = self
            .request(Method::POST, &format!("channels/{channel}/messages"))
            .json(&OutgoingMessage {
                text: text.to_owned(),
                attachment: attachment.map(str::to_owned),
            });
        Box::pin(async move {
            Self::send("send_message", builder)
                .await?
                .json::<DeliveredMessage>()
                .await
                .map_err(|source| GatewayError::transport("send_message", source))
        })
    }

    fn send_direct(
        &self,
        member: &str,
        text: &str,
        attachment: Option<&str>,
    ) -> BoxFuture<'static, GatewayResult<()>> {
        let builder = self
            .request(Method::POST, &format!("members/{member}/messages"))
            .json(&OutgoingMessage {
                text: text.to_owned(),
                attachment: attachment.map(str::to_owned),
            });
        Box::pin(async move { Self::send("send_direct", builder).await.map(|_| ()) })
    }

    fn edit_message(
        &self,
        channel: &str,
        message: &str,
        text: &str,
    ) -> BoxFuture<'static, GatewayResult<()>> {
        let builder = self
            .request(
                Method::PATCH,
                &format!("channels/{channel}/messages/{message}"),
            )
            .json(&MessageEdit {
                text: text.to_owned(),
            });
        Box::pin(async move { Self::send("edit_message", builder).await.map(|_| ()) })
    }

    fn fetch_members(
        &self,
        filter: MemberFilter,
    ) -> BoxFuture<'static, GatewayResult<Vec<MemberRef>>> {
        let builder = self.request(Method::POST, "members/search").json(&filter);
        Box::pin(async move {
            Self::send("fetch_members", builder)
                .await?
                .json::<Vec<MemberRef>>()
                .await
                .map_err(|source| GatewayError::transport("fetch_members", source))
        })
    }

    fn release_attachment(&self, attachment: &str) -> BoxFuture<'static, GatewayResult<()>> {
        let builder = self.request(Method::DELETE, &format!("attachments/{attachment}"));
        Box::pin(async move {
            match Self::send("release_attachment", builder).await {
                Ok(_) => Ok(()),
                Err(GatewayError::Status { status, .. })
                    if status == StatusCode::NOT_FOUND.as_u16() =>
                {
                    Ok(())
                }
                Err(err) => Err(err),
            }
        })
    }
}
