//! Outbound fulfillment response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fulfillment::request::{Device, Home, OpenUrl, Scene, Session, User};

/// Root response body returned by a handler.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FulfillmentResponse {
    pub prompt: Option<Prompt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<Scene>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<Home>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Expected>,
}

impl FulfillmentResponse {
    /// A response that only speaks (and displays) `text`.
    pub fn speech(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            prompt: Some(Prompt::simple(text.clone(), text)),
            ..Self::default()
        }
    }

    pub fn with_prompt(prompt: Prompt) -> Self {
        Self {
            prompt: Some(prompt),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Prompt {
    #[serde(rename = "override")]
    pub override_: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_simple: Option<Simple>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_simple: Option<Simple>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<Suggestion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas: Option<Canvas>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_update: Option<OrderUpdate>,
}

impl Prompt {
    pub fn simple(speech: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            first_simple: Some(Simple {
                speech: speech.into(),
                text: text.into(),
            }),
            ..Self::default()
        }
    }

    /// Replace, rather than append to, previously accumulated prompts.
    pub fn overriding(mut self) -> Self {
        self.override_ = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Simple {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub speech: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Media {
    pub media_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub start_offset: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub optional_media_controls: Vec<String>,
    pub media_objects: Vec<MediaObject>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub repeat_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_media_object_index: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MediaObject {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MediaImage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large: Option<Image>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Image>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Image {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub alt: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub height: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub width: u32,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Suggestion {
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Link {
    pub name: String,
    pub open: OpenUrl,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Canvas {
    pub url: String,
    pub data: Vec<Value>,
    pub suppress_mic: bool,
    pub continuous_match_config: Option<ContinuousMatchConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContinuousMatchConfig {
    pub expected_phrases: Vec<ExpectedPhrase>,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpectedPhrase {
    pub phrase: String,
    pub alternative_phrases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderUpdate {
    pub update_mask: String,
    pub user_notification: UserNotification,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct UserNotification {
    pub title: String,
    pub text: String,
}

/// Phrases the platform should bias recognition towards on the next turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Expected {
    pub speech: Vec<String>,
}
