//! Measurement Protocol hits
//!
//! Logged events wait in a queue that a background task drains every
//! [`QUEUE_INTERVAL`], at most [`MAX_EVENTS_PER_TICK`] events per tick. Each
//! event becomes one `POST /g/collect` hit whose payload lives entirely in
//! the query string.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tracing::{debug, warn};

/// Google Analytics collection endpoint
pub(crate) const COLLECT_URL: &str = "https://www.google-analytics.com/g/collect";

/// Delay between queue drains
pub(crate) const QUEUE_INTERVAL: Duration = Duration::from_millis(250);

/// Events sent per drain
pub(crate) const MAX_EVENTS_PER_TICK: usize = 5;

/// An event waiting to be sent
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueuedEvent {
    pub name: String,
    pub params: Map<String, Value>,
}

/// Per-hit state snapshotted from the Analytics instance
#[derive(Debug, Clone, Default)]
pub(crate) struct HitContext {
    pub measurement_id: String,
    pub client_id: String,
    pub session_id: i64,
    pub user_id: Option<String>,
    pub user_properties: BTreeMap<String, String>,
    pub installation_id: Option<String>,
    pub ad_personalization: bool,
}

/// Remove the next batch from the front of the queue
pub(crate) fn take_batch(queue: &mut VecDeque<QueuedEvent>) -> Vec<QueuedEvent> {
    let n = queue.len().min(MAX_EVENTS_PER_TICK);
    queue.drain(..n).collect()
}

/// Query parameters of one hit
pub(crate) fn hit_params(ctx: &HitContext, event: &QueuedEvent, now_millis: i64) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = vec![
        ("v".into(), "2".into()),
        ("tid".into(), ctx.measurement_id.clone()),
        ("en".into(), event.name.clone()),
        ("cid".into(), ctx.client_id.clone()),
        ("sid".into(), ctx.session_id.to_string()),
        ("ep.origin".into(), "firebase".into()),
        ("_p".into(), now_millis.to_string()),
        ("_s".into(), "1".into()),
        ("seg".into(), "1".into()),
    ];

    params.push(("npa".into(), if ctx.ad_personalization { "0" } else { "1" }.into()));

    if let Some(uid) = &ctx.user_id {
        params.push(("uid".into(), uid.clone()));
    }
    if let Some(fid) = &ctx.installation_id {
        params.push(("_fid".into(), fid.clone()));
    }
    for (key, value) in &ctx.user_properties {
        params.push((format!("up.{}", key), value.clone()));
    }

    // Item arrays are sent as JSON text, not expanded into pr1..prN
    for (key, value) in &event.params {
        match value {
            Value::Number(n) => params.push((format!("epn.{}", key), n.to_string())),
            Value::String(s) => params.push((format!("ep.{}", key), s.clone())),
            Value::Null => {}
            other => params.push((format!("ep.{}", key), other.to_string())),
        }
    }
    params
}

/// Send one hit; failures are logged and dropped
pub(crate) async fn send_hit(client: &reqwest::Client, url: &str, params: &[(String, String)]) {
    let result = client
        .post(url)
        .query(params)
        .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=UTF-8")
        .send()
        .await;
    match result {
        Err(e) => warn!(error = %e, "failed to send analytics hit"),
        Ok(response) if !response.status().is_success() => {
            warn!(status = %response.status(), "analytics hit rejected");
        }
        Ok(_) => debug!("analytics hit sent"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: &str, params: Value) -> QueuedEvent {
        QueuedEvent {
            name: name.to_string(),
            params: params.as_object().cloned().unwrap_or_default(),
        }
    }

    fn get<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_take_batch_limits_per_tick() {
        let mut queue: VecDeque<_> = (0..7).map(|i| event(&format!("e{}", i), json!({}))).collect();
        let first = take_batch(&mut queue);
        assert_eq!(first.len(), 5);
        assert_eq!(first[0].name, "e0");
        let second = take_batch(&mut queue);
        assert_eq!(second.len(), 2);
        assert_eq!(second[1].name, "e6");
        assert!(take_batch(&mut queue).is_empty());
    }

    #[test]
    fn test_hit_params() {
        let mut ctx = HitContext {
            measurement_id: "G-TEST".to_string(),
            client_id: "123.456".to_string(),
            session_id: 456,
            user_id: Some("user-1".to_string()),
            installation_id: Some("fid-1".to_string()),
            ..Default::default()
        };
        ctx.user_properties.insert("tier".to_string(), "gold".to_string());

        let params = hit_params(
            &ctx,
            &event("level_up", json!({ "level": 3, "character": "mage", "hard": true, "gone": null })),
            1_000,
        );

        assert_eq!(get(&params, "tid"), Some("G-TEST"));
        assert_eq!(get(&params, "en"), Some("level_up"));
        assert_eq!(get(&params, "cid"), Some("123.456"));
        assert_eq!(get(&params, "sid"), Some("456"));
        assert_eq!(get(&params, "uid"), Some("user-1"));
        assert_eq!(get(&params, "_fid"), Some("fid-1"));
        assert_eq!(get(&params, "up.tier"), Some("gold"));
        assert_eq!(get(&params, "epn.level"), Some("3"));
        assert_eq!(get(&params, "ep.character"), Some("mage"));
        assert_eq!(get(&params, "ep.hard"), Some("true"));
        assert_eq!(get(&params, "ep.gone"), None);
        assert_eq!(get(&params, "npa"), Some("1"));
    }

    #[test]
    fn test_personalization_consent() {
        let ctx = HitContext {
            ad_personalization: true,
            ..Default::default()
        };
        let params = hit_params(&ctx, &event("x", json!({})), 0);
        assert_eq!(get(&params, "npa"), Some("0"));
        assert_eq!(get(&params, "uid"), None);
    }
}
