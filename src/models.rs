// Wire types for the webhooks v4 API.
//
// Field names follow the API's camelCase JSON. Ids and timestamps that the
// service sends sometimes as numbers and sometimes as strings are kept as
// strings so they can be shown and sent back untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Fields an event carries that this client does not model explicitly.
pub type Extensions = BTreeMap<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionType {
    Object,
    Association,
}

impl fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "OBJECT"),
            Self::Association => write!(f, "ASSOCIATION"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub app_id: Option<String>,
    pub subscription_type: SubscriptionType,
    pub object_type_id: String,
    pub portal_id: u64,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_ids: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_object_type_ids: Option<Vec<String>>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub updated_at: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub deleted_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionList {
    #[serde(default)]
    pub results: Vec<Subscription>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub subscription_type: SubscriptionType,
    pub object_type_id: String,
    pub portal_id: u64,
    pub actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_ids: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub associated_object_type_ids: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRequest {
    pub portal_id: u64,
    pub object_id: u64,
    pub object_type_id: String,
    pub properties: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotBatch<'a> {
    pub snapshot_requests: &'a [SnapshotRequest],
}

/// Pointer to one journal payload. `url` is a short-lived signed link;
/// an entry without one means there is nothing further to read.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub expires_at: Option<String>,
    pub current_offset: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalPayload {
    #[serde(deserialize_with = "string_or_number")]
    pub offset: String,
    #[serde(default)]
    pub journal_events: Vec<JournalEvent>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub published_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum JournalEvent {
    #[serde(rename = "OBJECT", alias = "object")]
    Object(ObjectEvent),
    #[serde(rename = "ASSOCIATION", alias = "association")]
    Association(AssociationEvent),
}

impl JournalEvent {
    pub fn header(&self) -> &EventHeader {
        match self {
            Self::Object(e) => &e.header,
            Self::Association(e) => &e.header,
        }
    }
}

/// Fields shared by every event variant, plus anything unrecognised.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    pub portal_id: u64,
    pub action: String,
    #[serde(deserialize_with = "string_or_number")]
    pub occurred_at: String,
    #[serde(default)]
    pub property_changes: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEvent {
    pub object_type_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub object_id: String,
    #[serde(flatten)]
    pub header: EventHeader,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationEvent {
    pub from_object_type_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub from_object_id: String,
    pub to_object_type_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub to_object_id: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub association_type_id: Option<String>,
    #[serde(default)]
    pub association_category: Option<String>,
    #[serde(default)]
    pub is_primary: Option<bool>,
    #[serde(flatten)]
    pub header: EventHeader,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl From<StringOrNumber> for String {
    fn from(v: StringOrNumber) -> Self {
        match v {
            StringOrNumber::String(s) => s,
            StringOrNumber::Int(n) => n.to_string(),
            StringOrNumber::UInt(n) => n.to_string(),
            StringOrNumber::Float(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(d).map(String::from)
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Option::<StringOrNumber>::deserialize(d).map(|v| v.map(String::from))
}
