//! Activity data model
//!
//! An activity is an immutable event record: an actor did `verb` to an
//! object, optionally towards a target, at `published` time. The engine
//! only interprets `id` and `published`; everything else is carried
//! through the payload untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// Kind of a base object, e.g. `Person`, `Group`, `Note`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectType(pub String);

impl ObjectType {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ObjectType {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub width: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub height: u32,
}

impl Image {
    pub fn is_empty(&self) -> bool {
        self.url.is_empty() && self.width == 0 && self.height == 0
    }
}

/// Actor, object and target of an activity all share this shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseObject {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "ObjectType::is_empty")]
    pub object_type: ObjectType,
    #[serde(default, skip_serializing_if = "Image::is_empty")]
    pub image: Image,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl BaseObject {
    /// Object with just an id and a type, the common case for actors
    pub fn new(id: impl Into<String>, object_type: impl Into<ObjectType>) -> Self {
        Self {
            id: id.into(),
            object_type: object_type.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == BaseObject::default()
    }
}

/// An immutable event record referenced from streams
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub verb: String,
    #[serde(default, skip_serializing_if = "BaseObject::is_empty")]
    pub actor: BaseObject,
    #[serde(default, skip_serializing_if = "BaseObject::is_empty")]
    pub object: BaseObject,
    #[serde(default, skip_serializing_if = "BaseObject::is_empty")]
    pub target: BaseObject,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl Activity {
    pub fn new(id: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            verb: verb.into(),
            ..Default::default()
        }
    }

    /// Score of the activity: `published` in milliseconds since the epoch,
    /// 0 when unset
    pub fn score(&self) -> i64 {
        self.published.map(make_timestamp).unwrap_or(0)
    }

    /// Whether `published` counts as set. Times at or before the epoch
    /// are treated as missing.
    pub fn has_published(&self) -> bool {
        self.score() > 0
    }

    /// Set `published` to now (UTC) if it is unset. Returns the score.
    pub fn ensure_published(&mut self) -> i64 {
        if !self.has_published() {
            self.published = Some(Utc::now());
        }
        self.score()
    }

    /// Encode to the payload stored under the activity id
    pub fn encode(&self) -> Result<Vec<u8>, StreamError> {
        if self.id.is_empty() {
            return Err(StreamError::Malformed("activity has an empty id".to_string()));
        }
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a stored payload. Records without an id are invalid.
    pub fn decode(payload: &[u8]) -> Result<Self, StreamError> {
        let activity: Activity = serde_json::from_slice(payload)
            .map_err(|e| StreamError::Malformed(format!("Failed to decode activity: {}", e)))?;
        if activity.id.is_empty() {
            return Err(StreamError::Malformed("object was not a valid activity".to_string()));
        }
        Ok(activity)
    }
}

/// Milliseconds since the Unix epoch
pub fn make_timestamp(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}
