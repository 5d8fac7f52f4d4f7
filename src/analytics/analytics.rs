//! Google Analytics for Firebase
//!
//! Events are validated locally, queued, and sent in the background as
//! Measurement Protocol hits.

use crate::analytics::dispatcher::{self, HitContext, QueuedEvent, COLLECT_URL, QUEUE_INTERVAL};
use crate::analytics::events::{
    self, AddPaymentInfoParameters, AddShippingInfoParameters, BeginCheckoutParameters, CampaignDetailsParameters,
    CartParameters, EarnVirtualCurrencyParameters, GenerateLeadParameters, JoinGroupParameters, LevelEndParameters,
    LevelStartParameters, LevelUpParameters, LoginParameters, PostScoreParameters, PurchaseParameters,
    ScreenViewParameters, SearchParameters, SelectContentParameters, SelectItemParameters, SelectPromotionParameters,
    SetCheckoutOptionParameters, ShareParameters, SignUpParameters, SpendVirtualCurrencyParameters,
    UnlockAchievementParameters, ViewItemListParameters, ViewPromotionParameters, ViewSearchResultsParameters,
};
use crate::app::App;
use crate::error::{AnalyticsError, FirebaseError};
use crate::installations::Installations;
use rand::Rng;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

const COMPONENT: &str = "analytics";

/// Inactivity after which a new session starts
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Longest accepted user property name
pub const MAX_USER_PROPERTY_NAME_LENGTH: usize = 24;

/// Consent state; `None` leaves the current value untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsentSettings {
    /// Storage related to advertising
    pub ad_storage: Option<bool>,
    /// Sending user data for advertising
    pub ad_user_data: Option<bool>,
    /// Personalized advertising
    pub ad_personalization: Option<bool>,
    /// Storage related to analytics
    pub analytics_storage: Option<bool>,
    /// Storage supporting app functionality
    pub functionality_storage: Option<bool>,
    /// Storage related to personalization
    pub personalization_storage: Option<bool>,
    /// Storage related to security
    pub security_storage: Option<bool>,
}

impl ConsentSettings {
    fn merge(&mut self, other: ConsentSettings) {
        let pairs = [
            (&mut self.ad_storage, other.ad_storage),
            (&mut self.ad_user_data, other.ad_user_data),
            (&mut self.ad_personalization, other.ad_personalization),
            (&mut self.analytics_storage, other.analytics_storage),
            (&mut self.functionality_storage, other.functionality_storage),
            (&mut self.personalization_storage, other.personalization_storage),
            (&mut self.security_storage, other.security_storage),
        ];
        for (current, update) in pairs {
            if update.is_some() {
                *current = update;
            }
        }
    }
}

/// Analytics instance, one per App
#[derive(Clone)]
pub struct Analytics {
    inner: Arc<AnalyticsInner>,
}

struct AnalyticsInner {
    measurement_id: String,
    http_client: reqwest::Client,
    installations: Installations,
    collect_url: RwLock<String>,
    state: Mutex<AnalyticsState>,
}

struct AnalyticsState {
    queue: VecDeque<QueuedEvent>,
    worker: Option<JoinHandle<()>>,
    collection_enabled: bool,
    client_id: Option<String>,
    session: Option<Session>,
    session_timeout: Duration,
    user_id: Option<String>,
    user_properties: BTreeMap<String, String>,
    default_params: Map<String, Value>,
    consent: ConsentSettings,
}

#[derive(Debug, Clone, Copy)]
struct Session {
    id: i64,
    last_activity_millis: i64,
}

impl Default for AnalyticsState {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            worker: None,
            collection_enabled: true,
            client_id: None,
            session: None,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            user_id: None,
            user_properties: BTreeMap::new(),
            default_params: Map::new(),
            consent: ConsentSettings::default(),
        }
    }
}

impl AnalyticsState {
    /// GA client id `random.timestamp`, generated on first use
    fn client_id(&mut self) -> String {
        self.client_id
            .get_or_insert_with(|| {
                let random: u32 = rand::thread_rng().gen_range(0..=i32::MAX as u32);
                format!("{}.{}", random, chrono::Utc::now().timestamp())
            })
            .clone()
    }

    fn active_session(&self, now_millis: i64) -> Option<Session> {
        self.session
            .filter(|s| now_millis - s.last_activity_millis <= self.session_timeout.as_millis() as i64)
    }

    /// Current session, starting a new one after the inactivity timeout
    fn touch_session(&mut self, now_millis: i64) -> i64 {
        let id = match self.active_session(now_millis) {
            Some(session) => session.id,
            None => now_millis / 1000,
        };
        self.session = Some(Session {
            id,
            last_activity_millis: now_millis,
        });
        id
    }
}

impl Analytics {
    /// Get or create the Analytics instance for the given App
    ///
    /// The App must have a `measurement_id`.
    pub async fn get_analytics(app: &App) -> Result<Self, FirebaseError> {
        let Some(measurement_id) = app.options().measurement_id.clone() else {
            return Err(AnalyticsError::NoMeasurementId.into());
        };
        let installations = Installations::get_installations(app).await?;
        let http_client = app.http_client().clone();

        let inner = app
            .component(COMPONENT, move || {
                Ok(AnalyticsInner {
                    measurement_id,
                    http_client,
                    installations,
                    collect_url: RwLock::new(COLLECT_URL.to_string()),
                    state: Mutex::new(AnalyticsState::default()),
                })
            })
            .await?;

        Ok(Self { inner })
    }

    /// Queue a custom event
    ///
    /// Names must be 1 to 40 alphanumeric or `_` characters and not reserved.
    /// Default event parameters are merged under `params`. Nothing is queued
    /// while collection is disabled.
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(analytics: firebase_client_sdk::Analytics) -> Result<(), Box<dyn std::error::Error>> {
    /// let mut params = serde_json::Map::new();
    /// params.insert("level".to_string(), serde_json::json!(3));
    /// analytics.log_event("level_up", params).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn log_event(&self, name: &str, params: Map<String, Value>) -> Result<(), FirebaseError> {
        // Error-first
        events::validate_event_name(name)?;

        let mut state = self.inner.state.lock().await;
        if !state.collection_enabled {
            debug!(event = name, "analytics collection disabled, dropping event");
            return Ok(());
        }

        let mut merged = state.default_params.clone();
        merged.extend(params);
        state.touch_session(chrono::Utc::now().timestamp_millis());
        state.queue.push_back(QueuedEvent {
            name: name.to_string(),
            params: merged,
        });
        debug!(event = name, queued = state.queue.len(), "queued analytics event");
        self.start_worker(&mut state);
        Ok(())
    }

    /// `screen_view`
    pub async fn log_screen_view(&self, params: ScreenViewParameters) -> Result<(), FirebaseError> {
        self.log_event("screen_view", events::to_params(&params)?).await
    }

    /// `login`
    pub async fn log_login(&self, params: LoginParameters) -> Result<(), FirebaseError> {
        self.log_event("login", events::to_params(&params)?).await
    }

    /// `sign_up`
    pub async fn log_sign_up(&self, params: SignUpParameters) -> Result<(), FirebaseError> {
        self.log_event("sign_up", events::to_params(&params)?).await
    }

    /// `search`
    pub async fn log_search(&self, params: SearchParameters) -> Result<(), FirebaseError> {
        self.log_event("search", events::to_params(&params)?).await
    }

    /// `purchase`; `currency` is required when `value` is set
    pub async fn log_purchase(&self, params: PurchaseParameters) -> Result<(), FirebaseError> {
        params.validate()?;
        self.log_event("purchase", events::to_params(&params)?).await
    }

    /// `app_open`
    pub async fn log_app_open(&self) -> Result<(), FirebaseError> {
        self.log_event("app_open", Map::new()).await
    }

    /// `select_content`
    pub async fn log_select_content(&self, params: SelectContentParameters) -> Result<(), FirebaseError> {
        self.log_event("select_content", events::to_params(&params)?).await
    }

    /// `share`
    pub async fn log_share(&self, params: ShareParameters) -> Result<(), FirebaseError> {
        self.log_event("share", events::to_params(&params)?).await
    }

    /// `refund`; `currency` is required when `value` is set
    pub async fn log_refund(&self, params: PurchaseParameters) -> Result<(), FirebaseError> {
        params.validate()?;
        self.log_event("refund", events::to_params(&params)?).await
    }

    /// `add_to_cart`; `currency` is required when `value` is set
    pub async fn log_add_to_cart(&self, params: CartParameters) -> Result<(), FirebaseError> {
        self.log_cart_event("add_to_cart", params).await
    }

    /// `add_to_wishlist`
    pub async fn log_add_to_wishlist(&self, params: CartParameters) -> Result<(), FirebaseError> {
        self.log_cart_event("add_to_wishlist", params).await
    }

    /// `remove_from_cart`
    pub async fn log_remove_from_cart(&self, params: CartParameters) -> Result<(), FirebaseError> {
        self.log_cart_event("remove_from_cart", params).await
    }

    /// `view_cart`
    pub async fn log_view_cart(&self, params: CartParameters) -> Result<(), FirebaseError> {
        self.log_cart_event("view_cart", params).await
    }

    /// `view_item`
    pub async fn log_view_item(&self, params: CartParameters) -> Result<(), FirebaseError> {
        self.log_cart_event("view_item", params).await
    }

    /// `add_payment_info`; `currency` is required when `value` is set
    pub async fn log_add_payment_info(&self, params: AddPaymentInfoParameters) -> Result<(), FirebaseError> {
        params.validate()?;
        self.log_event("add_payment_info", events::to_params(&params)?).await
    }

    /// `add_shipping_info`; `currency` is required when `value` is set
    pub async fn log_add_shipping_info(&self, params: AddShippingInfoParameters) -> Result<(), FirebaseError> {
        params.validate()?;
        self.log_event("add_shipping_info", events::to_params(&params)?).await
    }

    /// `begin_checkout`; `currency` is required when `value` is set
    pub async fn log_begin_checkout(&self, params: BeginCheckoutParameters) -> Result<(), FirebaseError> {
        params.validate()?;
        self.log_event("begin_checkout", events::to_params(&params)?).await
    }

    /// `generate_lead`; `currency` is required when `value` is set
    pub async fn log_generate_lead(&self, params: GenerateLeadParameters) -> Result<(), FirebaseError> {
        params.validate()?;
        self.log_event("generate_lead", events::to_params(&params)?).await
    }

    /// `campaign_details`
    pub async fn log_campaign_details(&self, params: CampaignDetailsParameters) -> Result<(), FirebaseError> {
        self.log_event("campaign_details", events::to_params(&params)?).await
    }

    /// `earn_virtual_currency`
    pub async fn log_earn_virtual_currency(&self, params: EarnVirtualCurrencyParameters) -> Result<(), FirebaseError> {
        self.log_event("earn_virtual_currency", events::to_params(&params)?).await
    }

    /// `spend_virtual_currency`
    pub async fn log_spend_virtual_currency(&self, params: SpendVirtualCurrencyParameters) -> Result<(), FirebaseError> {
        self.log_event("spend_virtual_currency", events::to_params(&params)?).await
    }

    /// `join_group`
    pub async fn log_join_group(&self, params: JoinGroupParameters) -> Result<(), FirebaseError> {
        self.log_event("join_group", events::to_params(&params)?).await
    }

    /// `level_start`
    pub async fn log_level_start(&self, params: LevelStartParameters) -> Result<(), FirebaseError> {
        self.log_event("level_start", events::to_params(&params)?).await
    }

    /// `level_end`
    pub async fn log_level_end(&self, params: LevelEndParameters) -> Result<(), FirebaseError> {
        self.log_event("level_end", events::to_params(&params)?).await
    }

    /// `level_up`
    pub async fn log_level_up(&self, params: LevelUpParameters) -> Result<(), FirebaseError> {
        self.log_event("level_up", events::to_params(&params)?).await
    }

    /// `post_score`
    pub async fn log_post_score(&self, params: PostScoreParameters) -> Result<(), FirebaseError> {
        self.log_event("post_score", events::to_params(&params)?).await
    }

    /// `select_item`
    pub async fn log_select_item(&self, params: SelectItemParameters) -> Result<(), FirebaseError> {
        self.log_event("select_item", events::to_params(&params)?).await
    }

    /// `select_promotion`
    pub async fn log_select_promotion(&self, params: SelectPromotionParameters) -> Result<(), FirebaseError> {
        self.log_event("select_promotion", events::to_params(&params)?).await
    }

    /// `set_checkout_option`
    pub async fn log_set_checkout_option(&self, params: SetCheckoutOptionParameters) -> Result<(), FirebaseError> {
        self.log_event("set_checkout_option", events::to_params(&params)?).await
    }

    /// `unlock_achievement`
    pub async fn log_unlock_achievement(&self, params: UnlockAchievementParameters) -> Result<(), FirebaseError> {
        self.log_event("unlock_achievement", events::to_params(&params)?).await
    }

    /// `view_item_list`
    pub async fn log_view_item_list(&self, params: ViewItemListParameters) -> Result<(), FirebaseError> {
        self.log_event("view_item_list", events::to_params(&params)?).await
    }

    /// `view_promotion`
    pub async fn log_view_promotion(&self, params: ViewPromotionParameters) -> Result<(), FirebaseError> {
        self.log_event("view_promotion", events::to_params(&params)?).await
    }

    /// `view_search_results`
    pub async fn log_view_search_results(&self, params: ViewSearchResultsParameters) -> Result<(), FirebaseError> {
        self.log_event("view_search_results", events::to_params(&params)?).await
    }

    /// `tutorial_begin`
    pub async fn log_tutorial_begin(&self) -> Result<(), FirebaseError> {
        self.log_event("tutorial_begin", Map::new()).await
    }

    /// `tutorial_complete`
    pub async fn log_tutorial_complete(&self) -> Result<(), FirebaseError> {
        self.log_event("tutorial_complete", Map::new()).await
    }

    async fn log_cart_event(&self, name: &str, params: CartParameters) -> Result<(), FirebaseError> {
        params.validate()?;
        self.log_event(name, events::to_params(&params)?).await
    }

    /// Set or clear the user id sent with every hit
    pub async fn set_user_id(&self, id: Option<String>) {
        self.inner.state.lock().await.user_id = id;
    }

    /// Set a user property; `None` removes it
    pub async fn set_user_property(&self, name: &str, value: Option<String>) -> Result<(), FirebaseError> {
        validate_user_property_name(name)?;
        let mut state = self.inner.state.lock().await;
        match value {
            Some(value) => state.user_properties.insert(name.to_string(), value),
            None => state.user_properties.remove(name),
        };
        Ok(())
    }

    /// Set several user properties; `None` values remove them
    ///
    /// All names are checked before any property changes.
    pub async fn set_user_properties(&self, properties: BTreeMap<String, Option<String>>) -> Result<(), FirebaseError> {
        for name in properties.keys() {
            validate_user_property_name(name)?;
        }
        let mut state = self.inner.state.lock().await;
        for (name, value) in properties {
            match value {
                Some(value) => state.user_properties.insert(name, value),
                None => state.user_properties.remove(&name),
            };
        }
        Ok(())
    }

    /// Update consent; unset fields keep their current value
    pub async fn set_consent(&self, consent: ConsentSettings) {
        self.inner.state.lock().await.consent.merge(consent);
    }

    /// Parameters merged into every event; `None` clears them
    ///
    /// Keys mapped to `Null` are removed, other keys are added or replaced.
    pub async fn set_default_event_parameters(&self, params: Option<Map<String, Value>>) {
        let mut state = self.inner.state.lock().await;
        let Some(params) = params else {
            state.default_params.clear();
            return;
        };
        for (key, value) in params {
            if value.is_null() {
                state.default_params.remove(&key);
            } else {
                state.default_params.insert(key, value);
            }
        }
    }

    /// Enable or disable collection
    ///
    /// While disabled, logged events are dropped and queued events wait.
    pub async fn set_analytics_collection_enabled(&self, enabled: bool) {
        let mut state = self.inner.state.lock().await;
        state.collection_enabled = enabled;
        if enabled {
            if !state.queue.is_empty() {
                self.start_worker(&mut state);
            }
        } else if let Some(worker) = state.worker.take() {
            worker.abort();
        }
        debug!(enabled, "analytics collection toggled");
    }

    /// Inactivity after which the next event starts a new session
    pub async fn set_session_timeout_duration(&self, timeout: Duration) {
        self.inner.state.lock().await.session_timeout = timeout;
    }

    /// Clear the user id, user properties, client id, session and queue
    pub async fn reset_analytics_data(&self) {
        let mut state = self.inner.state.lock().await;
        state.user_id = None;
        state.user_properties.clear();
        state.client_id = None;
        state.session = None;
        state.queue.clear();
    }

    /// GA client id, `None` while collection is disabled
    pub async fn get_app_instance_id(&self) -> Option<String> {
        let mut state = self.inner.state.lock().await;
        if !state.collection_enabled {
            return None;
        }
        Some(state.client_id())
    }

    /// Id of the current session, `None` when no session is active
    pub async fn get_session_id(&self) -> Option<i64> {
        let state = self.inner.state.lock().await;
        if !state.collection_enabled {
            return None;
        }
        state
            .active_session(chrono::Utc::now().timestamp_millis())
            .map(|s| s.id)
    }

    fn start_worker(&self, state: &mut AnalyticsState) {
        if state.worker.as_ref().is_some_and(|w| !w.is_finished()) {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        state.worker = Some(tokio::spawn(run_dispatcher(weak)));
    }

    pub(crate) async fn set_collect_url(&self, url: impl Into<String>) {
        *self.inner.collect_url.write().await = url.into();
    }

    /// Send every queued event now
    pub(crate) async fn flush(&self) {
        while self.inner.send_batch().await {}
    }
}

impl AnalyticsInner {
    /// Send one batch; returns whether events remain queued
    async fn send_batch(&self) -> bool {
        let (batch, mut ctx) = {
            let mut state = self.state.lock().await;
            let batch = dispatcher::take_batch(&mut state.queue);
            if batch.is_empty() {
                state.worker = None;
                return false;
            }
            let now = chrono::Utc::now().timestamp_millis();
            let ctx = HitContext {
                measurement_id: self.measurement_id.clone(),
                client_id: state.client_id(),
                session_id: state.active_session(now).map(|s| s.id).unwrap_or(now / 1000),
                user_id: state.user_id.clone(),
                user_properties: state.user_properties.clone(),
                installation_id: None,
                ad_personalization: state.consent.ad_personalization == Some(true),
            };
            (batch, ctx)
        };

        ctx.installation_id = match self.installations.get_id().await {
            Ok(fid) => Some(fid),
            Err(e) => {
                debug!(error = %e, "sending analytics hits without installation id");
                None
            }
        };

        let url = self.collect_url.read().await.clone();
        for event in &batch {
            let params = dispatcher::hit_params(&ctx, event, chrono::Utc::now().timestamp_millis());
            dispatcher::send_hit(&self.http_client, &url, &params).await;
        }
        debug!(sent = batch.len(), "analytics batch sent");

        let mut state = self.state.lock().await;
        if state.queue.is_empty() {
            state.worker = None;
            return false;
        }
        true
    }
}

async fn run_dispatcher(inner: Weak<AnalyticsInner>) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + QUEUE_INTERVAL, QUEUE_INTERVAL);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.send_batch().await {
            break;
        }
    }
}

fn validate_user_property_name(name: &str) -> Result<(), AnalyticsError> {
    if name.is_empty() || name.len() > MAX_USER_PROPERTY_NAME_LENGTH {
        return Err(AnalyticsError::InvalidArgument(format!(
            "user property name '{}' must be 1 to {} characters",
            name, MAX_USER_PROPERTY_NAME_LENGTH
        )));
    }
    Ok(())
}

impl std::fmt::Debug for Analytics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analytics")
            .field("measurement_id", &self.inner.measurement_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppOptions;
    use httpmock::prelude::*;
    use serde_json::json;

    async fn analytics(app_name: &str, server: &MockServer) -> Analytics {
        let mut options = AppOptions::new("k", "p").with_name(app_name);
        options.measurement_id = Some("G-TEST".to_string());
        let app = App::create(options).await.unwrap();
        let analytics = Analytics::get_analytics(&app).await.unwrap();
        analytics.set_collect_url(server.url("/g/collect")).await;
        analytics
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_requires_measurement_id() {
        let app = App::create(AppOptions::new("k", "p").with_name("analytics-no-mid")).await.unwrap();
        assert!(matches!(
            Analytics::get_analytics(&app).await,
            Err(FirebaseError::Analytics(AnalyticsError::NoMeasurementId))
        ));
    }

    #[tokio::test]
    async fn test_invalid_names_fail_before_queueing() {
        let server = MockServer::start();
        let analytics = analytics("analytics-invalid", &server).await;
        assert!(analytics.log_event("session_start", Map::new()).await.is_err());
        assert!(analytics.log_event("bad name", Map::new()).await.is_err());
        assert!(analytics.inner.state.lock().await.queue.is_empty());
    }

    #[tokio::test]
    async fn test_flush_sends_hits() {
        let server = MockServer::start();
        let analytics = analytics("analytics-flush", &server).await;

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/g/collect")
                .query_param("v", "2")
                .query_param("tid", "G-TEST")
                .query_param("en", "level_up")
                .query_param("epn.level", "3")
                .query_param("ep.origin", "firebase")
                .query_param("uid", "user-1")
                .query_param("up.tier", "gold")
                .query_param("npa", "1");
            then.status(204);
        });

        analytics.set_user_id(Some("user-1".to_string())).await;
        analytics.set_user_property("tier", Some("gold".to_string())).await.unwrap();
        analytics.log_event("level_up", params(json!({ "level": 3 }))).await.unwrap();
        analytics.flush().await;

        mock.assert();
    }

    #[tokio::test]
    async fn test_background_dispatch() {
        let server = MockServer::start();
        let analytics = analytics("analytics-background", &server).await;

        let mock = server.mock(|when, then| {
            when.method(POST).path("/g/collect");
            then.status(204);
        });

        for _ in 0..7 {
            analytics.log_app_open().await.unwrap();
        }
        tokio::time::sleep(QUEUE_INTERVAL * 6).await;

        mock.assert_calls(7);
        assert!(analytics.inner.state.lock().await.queue.is_empty());
    }

    #[tokio::test]
    async fn test_collection_disabled_drops_events() {
        let server = MockServer::start();
        let analytics = analytics("analytics-disabled", &server).await;

        let mock = server.mock(|when, then| {
            when.method(POST).path("/g/collect");
            then.status(204);
        });

        analytics.set_analytics_collection_enabled(false).await;
        analytics.log_app_open().await.unwrap();
        analytics.flush().await;
        assert_eq!(analytics.get_app_instance_id().await, None);
        assert_eq!(analytics.get_session_id().await, None);

        mock.assert_calls(0);
    }

    #[tokio::test]
    async fn test_default_parameters_merge() {
        let server = MockServer::start();
        let analytics = analytics("analytics-defaults", &server).await;

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/g/collect")
                .query_param("ep.platform", "desktop")
                .query_param("ep.screen_name", "home");
            then.status(204);
        });

        analytics
            .set_default_event_parameters(Some(params(json!({ "platform": "desktop", "stale": "x" }))))
            .await;
        analytics
            .set_default_event_parameters(Some(params(json!({ "stale": null }))))
            .await;
        analytics
            .log_screen_view(ScreenViewParameters {
                screen_name: Some("home".to_string()),
                screen_class: None,
            })
            .await
            .unwrap();

        let queued = analytics.inner.state.lock().await.queue[0].params.clone();
        assert!(!queued.contains_key("stale"));
        analytics.flush().await;
        mock.assert();
    }

    #[tokio::test]
    async fn test_consent_controls_npa() {
        let server = MockServer::start();
        let analytics = analytics("analytics-consent", &server).await;

        let mock = server.mock(|when, then| {
            when.method(POST).path("/g/collect").query_param("npa", "0");
            then.status(204);
        });

        analytics
            .set_consent(ConsentSettings {
                ad_personalization: Some(true),
                ..Default::default()
            })
            .await;
        analytics
            .set_consent(ConsentSettings {
                analytics_storage: Some(false),
                ..Default::default()
            })
            .await;
        analytics.log_app_open().await.unwrap();
        analytics.flush().await;
        mock.assert();
    }

    #[tokio::test]
    async fn test_ids_and_reset() {
        let server = MockServer::start();
        let analytics = analytics("analytics-ids", &server).await;

        let first = analytics.get_app_instance_id().await.unwrap();
        let (random, timestamp) = first.split_once('.').unwrap();
        assert!(random.parse::<u32>().is_ok());
        assert!(timestamp.parse::<i64>().is_ok());
        assert_eq!(analytics.get_app_instance_id().await.unwrap(), first);

        assert_eq!(analytics.get_session_id().await, None);
        analytics.log_app_open().await.unwrap();
        let session = analytics.get_session_id().await.unwrap();
        assert!(session > 0);

        analytics.set_user_id(Some("u".to_string())).await;
        analytics.reset_analytics_data().await;
        assert_eq!(analytics.get_session_id().await, None);
        let state = analytics.inner.state.lock().await;
        assert!(state.user_id.is_none());
        assert!(state.client_id.is_none());
        assert!(state.queue.is_empty());
    }

    #[test]
    fn test_session_timeout_starts_new_session() {
        let mut state = AnalyticsState::default();
        state.session_timeout = Duration::from_secs(10);
        let first = state.touch_session(1_000_000);
        assert_eq!(state.touch_session(1_005_000), first);
        let second = state.touch_session(1_020_000);
        assert_ne!(second, first);
        assert_eq!(second, 1_020);
    }

    #[tokio::test]
    async fn test_typed_events_send_their_names() {
        let server = MockServer::start();
        let analytics = analytics("analytics-typed", &server).await;

        let add_to_cart = server.mock(|when, then| {
            when.method(POST)
                .path("/g/collect")
                .query_param("en", "add_to_cart")
                .query_param("epn.value", "20.5")
                .query_param("ep.currency", "EUR");
            then.status(204);
        });
        let level_up = server.mock(|when, then| {
            when.method(POST)
                .path("/g/collect")
                .query_param("en", "level_up")
                .query_param("epn.level", "7")
                .query_param("ep.character", "mage");
            then.status(204);
        });
        let tutorial = server.mock(|when, then| {
            when.method(POST).path("/g/collect").query_param("en", "tutorial_begin");
            then.status(204);
        });

        analytics
            .log_add_to_cart(CartParameters {
                currency: Some("EUR".to_string()),
                value: Some(20.5),
                items: vec![],
            })
            .await
            .unwrap();
        analytics
            .log_level_up(LevelUpParameters {
                level: 7,
                character: Some("mage".to_string()),
            })
            .await
            .unwrap();
        analytics.log_tutorial_begin().await.unwrap();
        analytics.flush().await;

        add_to_cart.assert();
        level_up.assert();
        tutorial.assert();

        // value without currency is rejected before queueing
        let result = analytics
            .log_view_item(CartParameters {
                value: Some(3.0),
                ..Default::default()
            })
            .await;
        assert!(result.is_err());
        assert!(analytics.log_generate_lead(GenerateLeadParameters::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_purchase_validation() {
        let server = MockServer::start();
        let analytics = analytics("analytics-purchase", &server).await;
        let result = analytics
            .log_purchase(PurchaseParameters {
                value: Some(1.0),
                ..Default::default()
            })
            .await;
        assert!(matches!(
            result,
            Err(FirebaseError::Analytics(AnalyticsError::InvalidArgument(_)))
        ));
        assert!(analytics.set_user_property("", None).await.is_err());
    }
}
