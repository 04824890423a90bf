// File: src/message_bag.rs
// Purpose: Validation message containers carried across a redirect

use crate::error::RedirectError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered multimap from field name to its error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageBag {
    messages: IndexMap<String, Vec<String>>,
}

impl MessageBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message for a field. A message already recorded for that field is skipped.
    pub fn add(&mut self, key: impl Into<String>, message: impl Into<String>) -> &mut Self {
        let message = message.into();
        let entry = self.messages.entry(key.into()).or_default();
        if !entry.contains(&message) {
            entry.push(message);
        }
        self
    }

    pub fn add_if(
        &mut self,
        condition: bool,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> &mut Self {
        if condition {
            self.add(key, message);
        }
        self
    }

    /// Merge another provider's messages into this bag.
    pub fn merge(&mut self, other: &impl MessageProvider) -> &mut Self {
        for (key, messages) in other.message_bag().messages {
            for message in messages {
                self.add(key.clone(), message);
            }
        }
        self
    }

    pub fn has(&self, key: &str) -> bool {
        self.messages
            .get(key)
            .map(|messages| !messages.is_empty())
            .unwrap_or(false)
    }

    pub fn has_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|key| self.has(key))
    }

    /// First message for a field, or the first message overall when `key` is `None`.
    pub fn first(&self, key: Option<&str>) -> Option<&str> {
        match key {
            Some(key) => self.messages.get(key)?.first().map(String::as_str),
            None => self.all().next(),
        }
    }

    pub fn get(&self, key: &str) -> &[String] {
        self.messages
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every message, field by field, in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.messages.values().flatten().map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    pub fn count(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn messages(&self) -> &IndexMap<String, Vec<String>> {
        &self.messages
    }
}

impl From<IndexMap<String, Vec<String>>> for MessageBag {
    fn from(raw: IndexMap<String, Vec<String>>) -> Self {
        let mut bag = MessageBag::new();
        for (key, messages) in raw {
            for message in messages {
                bag.add(key.clone(), message);
            }
        }
        bag
    }
}

/// Anything that can hand out its validation messages as a [`MessageBag`].
pub trait MessageProvider {
    fn message_bag(&self) -> MessageBag;
}

impl MessageProvider for MessageBag {
    fn message_bag(&self) -> MessageBag {
        self.clone()
    }
}

/// The shapes accepted when flashing validation errors.
#[derive(Debug, Clone)]
pub enum ErrorSource {
    /// Already a bag, or taken from a [`MessageProvider`]. Passed through as is.
    Bag(MessageBag),
    /// Raw field -> messages mapping.
    Map(IndexMap<String, Vec<String>>),
    /// A single message with no field.
    Str(String),
    /// Arbitrary JSON, accepted when it is an object, array, string or null.
    Json(serde_json::Value),
}

impl ErrorSource {
    pub fn provider(provider: &impl MessageProvider) -> Self {
        ErrorSource::Bag(provider.message_bag())
    }
}

impl From<MessageBag> for ErrorSource {
    fn from(bag: MessageBag) -> Self {
        ErrorSource::Bag(bag)
    }
}

impl From<&MessageBag> for ErrorSource {
    fn from(bag: &MessageBag) -> Self {
        ErrorSource::Bag(bag.clone())
    }
}

impl From<IndexMap<String, Vec<String>>> for ErrorSource {
    fn from(map: IndexMap<String, Vec<String>>) -> Self {
        ErrorSource::Map(map)
    }
}

impl From<HashMap<String, Vec<String>>> for ErrorSource {
    fn from(map: HashMap<String, Vec<String>>) -> Self {
        ErrorSource::Map(map.into_iter().collect())
    }
}

impl From<HashMap<String, String>> for ErrorSource {
    fn from(map: HashMap<String, String>) -> Self {
        ErrorSource::Map(map.into_iter().map(|(k, v)| (k, vec![v])).collect())
    }
}

impl From<String> for ErrorSource {
    fn from(message: String) -> Self {
        ErrorSource::Str(message)
    }
}

impl From<&str> for ErrorSource {
    fn from(message: &str) -> Self {
        ErrorSource::Str(message.to_string())
    }
}

impl From<serde_json::Value> for ErrorSource {
    fn from(value: serde_json::Value) -> Self {
        ErrorSource::Json(value)
    }
}

impl TryFrom<ErrorSource> for MessageBag {
    type Error = RedirectError;

    fn try_from(source: ErrorSource) -> Result<Self, Self::Error> {
        match source {
            ErrorSource::Bag(bag) => Ok(bag),
            ErrorSource::Map(map) => Ok(MessageBag::from(map)),
            ErrorSource::Str(message) => {
                let mut bag = MessageBag::new();
                bag.add("0", message);
                Ok(bag)
            }
            ErrorSource::Json(value) => bag_from_json(value),
        }
    }
}

/// Messages for one key. Scalars are stringified, `null` is skipped and
/// nested arrays or objects are flattened in order.
fn json_messages(value: serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Null => {}
        serde_json::Value::String(s) => out.push(s),
        serde_json::Value::Bool(b) => out.push(b.to_string()),
        serde_json::Value::Number(n) => out.push(n.to_string()),
        serde_json::Value::Array(items) => {
            for item in items {
                json_messages(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, item) in map {
                json_messages(item, out);
            }
        }
    }
}

fn add_json(bag: &mut MessageBag, key: String, value: serde_json::Value) {
    let mut messages = Vec::new();
    json_messages(value, &mut messages);
    for message in messages {
        bag.add(key.clone(), message);
    }
}

fn bag_from_json(value: serde_json::Value) -> Result<MessageBag, RedirectError> {
    let mut bag = MessageBag::new();

    match value {
        serde_json::Value::Null => {}
        serde_json::Value::String(message) => {
            bag.add("0", message);
        }
        serde_json::Value::Array(items) => {
            for (index, item) in items.into_iter().enumerate() {
                add_json(&mut bag, index.to_string(), item);
            }
        }
        serde_json::Value::Object(map) => {
            for (key, item) in map {
                add_json(&mut bag, key, item);
            }
        }
        other => return Err(RedirectError::UnsupportedErrorShape(json_kind(&other))),
    }

    Ok(bag)
}

fn json_kind(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
    .to_string()
}

/// Named message bags, flashed to the session as one value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewErrorBag {
    bags: IndexMap<String, MessageBag>,
}

impl ViewErrorBag {
    pub const DEFAULT: &'static str = "default";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, bag: MessageBag) -> &mut Self {
        self.bags.insert(key.into(), bag);
        self
    }

    pub fn has_bag(&self, key: &str) -> bool {
        self.bags.contains_key(key)
    }

    /// The named bag, or an empty one when it was never set.
    pub fn bag(&self, key: &str) -> MessageBag {
        self.bags.get(key).cloned().unwrap_or_default()
    }

    pub fn bags(&self) -> impl Iterator<Item = (&str, &MessageBag)> {
        self.bags.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn count(&self) -> usize {
        self.bag(Self::DEFAULT).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// First message of the default bag for a field.
    pub fn first(&self, key: &str) -> Option<String> {
        self.bags
            .get(Self::DEFAULT)
            .and_then(|bag| bag.first(Some(key)))
            .map(str::to_string)
    }
}

impl MessageProvider for ViewErrorBag {
    fn message_bag(&self) -> MessageBag {
        self.bag(Self::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_add_skips_duplicate_messages() {
        let mut bag = MessageBag::new();
        bag.add("email", "Invalid email").add("email", "Invalid email");
        bag.add("email", "Email is taken");

        assert_eq!(bag.get("email"), ["Invalid email", "Email is taken"]);
        assert_eq!(bag.count(), 2);
    }

    #[test]
    fn test_first_and_all_keep_insertion_order() {
        let mut bag = MessageBag::new();
        bag.add("name", "Name is required");
        bag.add("email", "Invalid email");

        assert_eq!(bag.first(None), Some("Name is required"));
        assert_eq!(bag.first(Some("email")), Some("Invalid email"));
        assert_eq!(bag.first(Some("age")), None);
        assert_eq!(
            bag.all().collect::<Vec<_>>(),
            vec!["Name is required", "Invalid email"]
        );
        assert_eq!(bag.keys().collect::<Vec<_>>(), vec!["name", "email"]);
    }

    #[test]
    fn test_has_any_and_add_if() {
        let mut bag = MessageBag::new();
        bag.add_if(false, "name", "skipped");
        bag.add_if(true, "email", "kept");

        assert!(!bag.has("name"));
        assert!(bag.has_any(&["name", "email"]));
        assert!(bag.get("missing").is_empty());
    }

    #[test]
    fn test_merge_from_provider() {
        let mut a = MessageBag::new();
        a.add("name", "Name is required");
        let mut b = MessageBag::new();
        b.add("name", "Name is required").add("age", "Too young");

        a.merge(&b);

        assert_eq!(a.count(), 2);
        assert!(a.has("age"));
    }

    #[test]
    fn test_string_becomes_single_unkeyed_message() {
        let bag = MessageBag::try_from(ErrorSource::from("msg")).unwrap();

        assert_eq!(bag.keys().count(), 1);
        assert_eq!(bag.get("0"), ["msg"]);
    }

    #[test]
    fn test_bag_passes_through_unchanged() {
        let mut bag = MessageBag::new();
        bag.add("email", "Invalid email").add("email", "Email is taken");

        let parsed = MessageBag::try_from(ErrorSource::provider(&bag)).unwrap();

        assert_eq!(parsed, bag);
    }

    #[test]
    fn test_hash_map_of_single_messages() {
        let mut errors = HashMap::new();
        errors.insert("name".to_string(), "Name is required".to_string());

        let bag = MessageBag::try_from(ErrorSource::from(errors)).unwrap();

        assert_eq!(bag.get("name"), ["Name is required"]);
    }

    #[test]
    fn test_json_object_and_array() {
        let bag = MessageBag::try_from(ErrorSource::from(serde_json::json!({
            "name": "Name is required",
            "email": ["Invalid email", "Email is taken"]
        })))
        .unwrap();
        assert_eq!(bag.count(), 3);

        let bag = MessageBag::try_from(ErrorSource::from(serde_json::json!(["a", "b"]))).unwrap();
        assert_eq!(bag.get("0"), ["a"]);
        assert_eq!(bag.get("1"), ["b"]);

        let bag = MessageBag::try_from(ErrorSource::from(serde_json::Value::Null)).unwrap();
        assert!(bag.is_empty());
    }

    #[test]
    fn test_json_members_are_stringified_and_flattened() {
        let bag = MessageBag::try_from(ErrorSource::from(serde_json::json!({
            "age": 3,
            "agree": false,
            "tags": [["x"], "y"],
            "skip": null
        })))
        .unwrap();
        assert_eq!(bag.get("age"), ["3"]);
        assert_eq!(bag.get("agree"), ["false"]);
        assert_eq!(bag.get("tags"), ["x", "y"]);
        assert!(!bag.has("skip"));

        let bag = MessageBag::try_from(ErrorSource::from(serde_json::json!([["nested"]]))).unwrap();
        assert_eq!(bag.get("0"), ["nested"]);
    }

    #[rstest]
    #[case(serde_json::json!(42))]
    #[case(serde_json::json!(true))]
    fn test_unsupported_json_shapes(#[case] value: serde_json::Value) {
        let result = MessageBag::try_from(ErrorSource::from(value));
        assert!(matches!(
            result,
            Err(RedirectError::UnsupportedErrorShape(_))
        ));
    }

    #[test]
    fn test_view_error_bag_named_bags() {
        let mut login = MessageBag::new();
        login.add("password", "Wrong password");

        let mut errors = ViewErrorBag::new();
        errors.put("login", login);

        assert!(errors.has_bag("login"));
        assert!(errors.is_empty());
        assert_eq!(errors.bag("login").first(Some("password")), Some("Wrong password"));
        assert!(errors.bag("signup").is_empty());
    }

    #[test]
    fn test_view_error_bag_serde_shape() {
        let mut bag = MessageBag::new();
        bag.add("name", "Name is required");
        let mut errors = ViewErrorBag::new();
        errors.put(ViewErrorBag::DEFAULT, bag);

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({ "default": { "name": ["Name is required"] } }));

        let back: ViewErrorBag = serde_json::from_value(json).unwrap();
        assert_eq!(back.first("name"), Some("Name is required".to_string()));
    }
}
