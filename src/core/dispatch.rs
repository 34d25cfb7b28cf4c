// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use super::message::{Agent, Message};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// The result of one dispatch attempt. `Transient` and `Terminal` both carry the
/// human-readable reason that ends up on `Message::error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success,
    Terminal(String),
    Transient(String),
}

/// The exact JSON shape signed and sent to a recipient's webhook. `timestamp` is
/// the message's `created_at`, never the attempt time, so a recipient can
/// detect replays.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    message_id: &'a str,
    from_agent_id: &'a str,
    to_agent_id: &'a str,
    message_content: &'a serde_json::Value,
    timestamp: DateTime<Utc>,
}

/// HMAC-SHA256 over the exact bytes that will be sent, hex-encoded lowercase.
fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Builds a fresh `reqwest::Client` suitable for webhook dispatch: redirects are
/// disabled since the relay has no business following a signed payload to a
/// recipient-controlled location.
pub fn new_client(timeout: std::time::Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
        .expect("reqwest client configuration is always valid")
}

/// Performs one signed HTTP POST attempt against `recipient.webhook_url` and
/// classifies the result. Pure with respect to the store: callers apply the outcome.
#[tracing::instrument(skip_all, fields(msg_id = %msg.id, to = %recipient.id))]
pub async fn dispatch(client: &reqwest::Client, msg: &Message, recipient: &Agent) -> DispatchOutcome {
    let payload = WebhookPayload {
        message_id: msg.id.as_ref(),
        from_agent_id: msg.from_agent.as_ref(),
        to_agent_id: msg.to_agent.as_ref(),
        message_content: &msg.content,
        timestamp: msg.created_at,
    };

    let body = match serde_json::to_vec(&payload) {
        Ok(b) => b,
        Err(e) => return DispatchOutcome::Transient(format!("failed to serialize payload: {e}")),
    };

    let signature = sign(&recipient.secret, &body);

    let res = client
        .post(&recipient.webhook_url)
        .header("Content-Type", "application/json")
        .header("X-Signature", format!("sha256={signature}"))
        .header("User-Agent", USER_AGENT)
        .body(body)
        .send()
        .await;

    match res {
        Ok(res) if res.status().is_success() => DispatchOutcome::Success,
        Ok(res) if res.status().is_client_error() => {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            DispatchOutcome::Terminal(format!("webhook returned {status}: {}", truncate(&text)))
        }
        Ok(res) => {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            DispatchOutcome::Transient(format!("webhook returned {status}: {}", truncate(&text)))
        }
        Err(e) if e.is_timeout() => DispatchOutcome::Transient("webhook request timed out".into()),
        Err(e) if e.is_connect() => {
            DispatchOutcome::Transient(format!("could not connect to webhook url: {e}"))
        }
        Err(e) => DispatchOutcome::Transient(format!("unexpected transport error: {e}")),
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_stable_for_identical_bytes() {
        let sig_a = sign("shh", b"{\"x\":1}");
        let sig_b = sign("shh", b"{\"x\":1}");
        assert_eq!(sig_a, sig_b);
    }

    #[test]
    fn signature_changes_with_secret() {
        let sig_a = sign("shh", b"{\"x\":1}");
        let sig_b = sign("other", b"{\"x\":1}");
        assert_ne!(sig_a, sig_b);
    }

    #[test]
    fn signature_is_lowercase_hex() {
        let sig = sign("shh", b"payload");
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn signature_round_trips_through_independent_recomputation() {
        let secret = "it's a secret";
        let body = b"Hello, World!";
        let signature = sign(secret, body);

        // A verifier recomputing independently (as a recipient would) must agree.
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(signature, expected);
        assert_eq!(signature.len(), 64);
    }
}
