//! Event names and typed event parameters

use crate::error::AnalyticsError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Longest accepted event name
pub const MAX_EVENT_NAME_LENGTH: usize = 40;

/// Event names collected automatically, which can't be logged manually
pub const RESERVED_EVENT_NAMES: &[&str] = &[
    "ad_activeview",
    "ad_click",
    "ad_exposure",
    "ad_query",
    "ad_reward",
    "adunit_exposure",
    "app_background",
    "app_clear_data",
    "app_remove",
    "app_store_refund",
    "app_store_subscription_cancel",
    "app_store_subscription_convert",
    "app_store_subscription_renew",
    "app_update",
    "app_upgrade",
    "dynamic_link_app_open",
    "dynamic_link_app_update",
    "dynamic_link_first_open",
    "error",
    "first_open",
    "first_visit",
    "in_app_purchase",
    "notification_dismiss",
    "notification_foreground",
    "notification_open",
    "notification_receive",
    "os_update",
    "session_start",
    "session_start_with_rollout",
    "user_engagement",
];

/// Check an event name: not reserved, 1 to 40 alphanumeric or `_` characters
pub fn validate_event_name(name: &str) -> Result<(), AnalyticsError> {
    if RESERVED_EVENT_NAMES.contains(&name) {
        return Err(AnalyticsError::ReservedEventName(name.to_string()));
    }
    let well_formed = !name.is_empty()
        && name.len() <= MAX_EVENT_NAME_LENGTH
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !well_formed {
        return Err(AnalyticsError::InvalidEventName(name.to_string()));
    }
    Ok(())
}

/// Serialize typed parameters into an event parameter map
pub(crate) fn to_params<T: Serialize>(params: &T) -> Result<Map<String, Value>, AnalyticsError> {
    match serde_json::to_value(params) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AnalyticsError::InvalidArgument(
            "event parameters must serialize to an object".to_string(),
        )),
        Err(e) => Err(AnalyticsError::InvalidArgument(e.to_string())),
    }
}

/// A `value` needs a `currency` to be meaningful
fn validate_compound(value: Option<f64>, currency: Option<&str>, event: &str) -> Result<(), AnalyticsError> {
    if value.is_some() && currency.is_none() {
        return Err(AnalyticsError::InvalidArgument(format!(
            "{}: if you supply the 'value' parameter, you must also supply the 'currency' parameter",
            event
        )));
    }
    Ok(())
}

/// A product in an ecommerce event
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Item {
    /// Product id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    /// Product name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    /// Brand
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_brand: Option<String>,
    /// Category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_category: Option<String>,
    /// Variant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_variant: Option<String>,
    /// Unit price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Quantity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    /// Second category level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_category2: Option<String>,
    /// Third category level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_category3: Option<String>,
    /// Fourth category level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_category4: Option<String>,
    /// Fifth category level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_category5: Option<String>,
    /// List the item was presented in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_list_id: Option<String>,
    /// Name of that list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_list_name: Option<String>,
    /// Physical location id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_location_id: Option<String>,
}

/// `screen_view` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScreenViewParameters {
    /// Screen name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_name: Option<String>,
    /// Screen class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_class: Option<String>,
}

/// `login` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginParameters {
    /// Sign-in method (`password`, `google.com`, ...)
    pub method: String,
}

/// `sign_up` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignUpParameters {
    /// Sign-up method
    pub method: String,
}

/// `search` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchParameters {
    /// What was searched for
    pub search_term: String,
    /// Number of nights (travel searches)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_nights: Option<u32>,
    /// Number of rooms (travel searches)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_rooms: Option<u32>,
    /// Number of passengers (travel searches)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_passengers: Option<u32>,
    /// Origin (travel searches)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Destination (travel searches)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Departure date (travel searches)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<chrono::NaiveDate>,
    /// Return date (travel searches)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<chrono::NaiveDate>,
    /// Travel class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_class: Option<String>,
}

/// `purchase` and `refund` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PurchaseParameters {
    /// ISO 4217 currency code; required when `value` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Total value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Transaction id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Affiliation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    /// Coupon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<String>,
    /// Shipping cost
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping: Option<f64>,
    /// Tax
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<f64>,
    /// Purchased items
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
}

impl PurchaseParameters {
    pub(crate) fn validate(&self) -> Result<(), AnalyticsError> {
        validate_compound(self.value, self.currency.as_deref(), "purchase")
    }
}

/// `select_content` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectContentParameters {
    /// Content type
    pub content_type: String,
    /// Content id
    pub item_id: String,
}

/// `share` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareParameters {
    /// Content type
    pub content_type: String,
    /// Content id
    pub item_id: String,
    /// Share method
    pub method: String,
}

/// Parameters of the cart and product events: `add_to_cart`,
/// `add_to_wishlist`, `remove_from_cart`, `view_cart` and `view_item`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CartParameters {
    /// ISO 4217 currency code; required when `value` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Monetary value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Items in the event
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
}

impl CartParameters {
    pub(crate) fn validate(&self) -> Result<(), AnalyticsError> {
        validate_compound(self.value, self.currency.as_deref(), "cart event")
    }
}

/// `add_payment_info` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AddPaymentInfoParameters {
    /// ISO 4217 currency code; required when `value` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Monetary value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Items in the event
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// Coupon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<String>,
    /// Chosen payment method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
}

impl AddPaymentInfoParameters {
    pub(crate) fn validate(&self) -> Result<(), AnalyticsError> {
        validate_compound(self.value, self.currency.as_deref(), "add_payment_info")
    }
}

/// `add_shipping_info` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AddShippingInfoParameters {
    /// ISO 4217 currency code; required when `value` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Monetary value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Items in the event
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// Coupon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<String>,
    /// Chosen shipping tier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_tier: Option<String>,
}

impl AddShippingInfoParameters {
    pub(crate) fn validate(&self) -> Result<(), AnalyticsError> {
        validate_compound(self.value, self.currency.as_deref(), "add_shipping_info")
    }
}

/// `begin_checkout` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BeginCheckoutParameters {
    /// ISO 4217 currency code; required when `value` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Monetary value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Items in the event
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// Coupon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<String>,
}

impl BeginCheckoutParameters {
    pub(crate) fn validate(&self) -> Result<(), AnalyticsError> {
        validate_compound(self.value, self.currency.as_deref(), "begin_checkout")
    }
}

/// `generate_lead` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerateLeadParameters {
    /// ISO 4217 currency code; required when `value` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Monetary value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl GenerateLeadParameters {
    pub(crate) fn validate(&self) -> Result<(), AnalyticsError> {
        validate_compound(self.value, self.currency.as_deref(), "generate_lead")
    }
}

/// `campaign_details` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignDetailsParameters {
    /// Referrer (`google`, `newsletter`, ...)
    pub source: String,
    /// Marketing medium (`cpc`, `email`, ...)
    pub medium: String,
    /// Campaign name
    pub campaign: String,
    /// Search terms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    /// Ad or link variant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Ad click id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aclid: Option<String>,
    /// Custom campaign parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cp1: Option<String>,
}

/// `earn_virtual_currency` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EarnVirtualCurrencyParameters {
    /// Currency name
    pub virtual_currency_name: String,
    /// Amount earned
    pub value: f64,
}

/// `spend_virtual_currency` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendVirtualCurrencyParameters {
    /// What the currency was spent on
    pub item_name: String,
    /// Currency name
    pub virtual_currency_name: String,
    /// Amount spent
    pub value: f64,
}

/// `join_group` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinGroupParameters {
    /// Group joined
    pub group_id: String,
}

/// `level_start` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelStartParameters {
    /// Level started
    pub level: i64,
}

/// `level_end` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelEndParameters {
    /// Level ended
    pub level: i64,
    /// Whether the level was completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
}

/// `level_up` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelUpParameters {
    /// Level reached
    pub level: i64,
    /// Character that levelled up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
}

/// `post_score` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostScoreParameters {
    /// Score posted
    pub score: i64,
    /// Level of the score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    /// Character that scored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
}

/// `select_item` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectItemParameters {
    /// Items in the event
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// List the item was selected from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_list_id: Option<String>,
    /// Name of that list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_list_name: Option<String>,
    /// Content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// `select_promotion` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectPromotionParameters {
    /// Promotion creative
    pub creative_name: String,
    /// Creative slot
    pub creative_slot: String,
    /// Items in the event
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// Where the promotion was shown
    pub location_id: String,
    /// Promotion id
    pub promotion_id: String,
    /// Promotion name
    pub promotion_name: String,
}

/// `set_checkout_option` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetCheckoutOptionParameters {
    /// Checkout step
    pub checkout_step: u32,
    /// Option chosen at that step
    pub checkout_option: String,
}

/// `unlock_achievement` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnlockAchievementParameters {
    /// Achievement unlocked
    pub achievement_id: String,
}

/// `view_item_list` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewItemListParameters {
    /// Items in the event
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// List id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_list_id: Option<String>,
    /// List name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_list_name: Option<String>,
}

/// `view_promotion` parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewPromotionParameters {
    /// Items in the event
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// Where the promotion was shown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    /// Promotion creative
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_name: Option<String>,
    /// Creative slot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_slot: Option<String>,
    /// Promotion id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_id: Option<String>,
    /// Promotion name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_name: Option<String>,
}

/// `view_search_results` parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSearchResultsParameters {
    /// What was searched for
    pub search_term: String,
}
