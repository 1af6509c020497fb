//! Inbound fulfillment request types.
//!
//! Mirrors the webhook request body sent by the assistant platform.
//! Only `handler.name`, `intent.name` and `user.locale` are consulted by
//! the router; everything else is passed through to handlers untouched.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::fulfillment::response::Prompt;

/// Decode `null` as the field's default, the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Root request body posted to the webhook.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FulfillmentRequest {
    #[serde(deserialize_with = "null_as_default")]
    pub handler: Handler,
    #[serde(deserialize_with = "null_as_default")]
    pub intent: Intent,
    #[serde(deserialize_with = "null_as_default")]
    pub scene: Scene,
    #[serde(deserialize_with = "null_as_default")]
    pub session: Session,
    #[serde(deserialize_with = "null_as_default")]
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<Home>,
    #[serde(deserialize_with = "null_as_default")]
    pub device: Device,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
}

impl FulfillmentRequest {
    /// Build a minimal request carrying only the routing discriminants.
    pub fn new(
        intent: impl Into<String>,
        handler: impl Into<String>,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            handler: Handler { name: handler.into() },
            intent: Intent {
                name: intent.into(),
                ..Intent::default()
            },
            user: User {
                locale: locale.into(),
                ..User::default()
            },
            ..Self::default()
        }
    }

    pub fn handler_name(&self) -> &str {
        &self.handler.name
    }

    pub fn intent_name(&self) -> &str {
        &self.intent.name
    }

    pub fn locale(&self) -> &str {
        &self.user.locale
    }
}

/// Conversational application that originated the call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Handler {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Intent {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub params: HashMap<String, IntentParam>,
    #[serde(deserialize_with = "null_as_default")]
    pub query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IntentParam {
    #[serde(deserialize_with = "null_as_default")]
    pub original: String,
    pub resolved: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub params: HashMap<String, Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub type_overrides: Vec<TypeOverride>,
    #[serde(deserialize_with = "null_as_default")]
    pub language_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TypeOverride {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub mode: String,
    #[serde(deserialize_with = "null_as_default")]
    pub synonym: SynonymType,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SynonymType {
    #[serde(deserialize_with = "null_as_default")]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Entry {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub synonyms: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub display: EntryDisplay,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryDisplay {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    pub image: Option<crate::fulfillment::response::Image>,
    #[serde(deserialize_with = "null_as_default")]
    pub footer: String,
    pub open_url: Option<OpenUrl>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenUrl {
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub hint: String,
}

/// The end user as seen by the platform.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    #[serde(deserialize_with = "null_as_default")]
    pub locale: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    #[serde(deserialize_with = "null_as_default")]
    pub params: HashMap<String, Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub account_linking_status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub verification_status: String,
    /// RFC 3339 timestamp, kept verbatim.
    pub last_seen_time: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub engagement: Engagement,
    #[serde(deserialize_with = "null_as_default")]
    pub package_entitlements: Vec<PackageEntitlements>,
    #[serde(deserialize_with = "null_as_default")]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Engagement {
    #[serde(deserialize_with = "null_as_default")]
    pub push_notification_intents: Vec<IntentSubscription>,
    #[serde(deserialize_with = "null_as_default")]
    pub daily_update_intents: Vec<IntentSubscription>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentSubscription {
    #[serde(deserialize_with = "null_as_default")]
    pub intent: String,
    #[serde(deserialize_with = "null_as_default")]
    pub content_title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageEntitlements {
    #[serde(deserialize_with = "null_as_default")]
    pub package_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub entitlements: Vec<Entitlement>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Entitlement {
    #[serde(deserialize_with = "null_as_default")]
    pub sku: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sku_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub in_app_details: SignedData,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignedData {
    pub in_app_purchase_data: Value,
    #[serde(deserialize_with = "null_as_default")]
    pub in_app_data_signature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Home {
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    #[serde(deserialize_with = "null_as_default")]
    pub params: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Device {
    #[serde(deserialize_with = "null_as_default")]
    pub capabilities: Vec<String>,
    pub current_location: Option<Location>,
    pub time_zone: Option<TimeZone>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
    #[serde(deserialize_with = "null_as_default")]
    pub coordinates: LatLng,
    #[serde(deserialize_with = "null_as_default")]
    pub postal_address: PostalAddress,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LatLng {
    #[serde(deserialize_with = "null_as_default")]
    pub latitude: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostalAddress {
    #[serde(deserialize_with = "null_as_default")]
    pub revision: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub region_code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub language_code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub postal_code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sorting_code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub administrative_area: String,
    #[serde(deserialize_with = "null_as_default")]
    pub locality: String,
    #[serde(rename = "sublocality")]
    #[serde(deserialize_with = "null_as_default")]
    pub sub_locality: String,
    #[serde(deserialize_with = "null_as_default")]
    pub address_lines: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub recipients: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub organization: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeZone {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Context {
    #[serde(deserialize_with = "null_as_default")]
    pub media: MediaContext,
    #[serde(deserialize_with = "null_as_default")]
    pub canvas: CanvasContext,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MediaContext {
    /// Duration formatted as `<seconds>s`.
    #[serde(deserialize_with = "null_as_default")]
    pub progress: String,
    #[serde(deserialize_with = "null_as_default")]
    pub index: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CanvasContext {
    pub state: Value,
}

/// Current scene. Also echoed back in responses to drive transitions.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scene {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub slot_filling_status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub slots: HashMap<String, Slot>,
    pub next: Option<NextScene>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Slot {
    #[serde(deserialize_with = "null_as_default")]
    pub mode: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    pub value: Value,
    #[serde(deserialize_with = "null_as_default")]
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Prompt>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NextScene {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}
