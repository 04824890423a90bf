// File: src/value.rs
// Purpose: Request input values and the helpers that reshape them

use axum::body::Bytes;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Insertion-ordered map of input field name to value.
pub type InputMap = IndexMap<String, InputValue>;

/// A single request input value.
///
/// Query strings and form bodies only ever produce `String`, `List` and
/// `Map`; JSON bodies can carry every scalar; multipart bodies add `File`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InputValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    File(UploadedFile),
    List(Vec<InputValue>),
    Map(InputMap),
}

/// A file part received in a multipart body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    #[serde(skip)]
    pub content: Bytes,
}

impl UploadedFile {
    pub fn new(
        field: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content_type,
            content: content.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}

impl InputValue {
    pub fn is_file(&self) -> bool {
        matches!(self, InputValue::File(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            InputValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&InputMap> {
        match self {
            InputValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            InputValue::File(file) => Some(file),
            _ => None,
        }
    }

    /// Copy of this value with every uploaded file removed, at any depth.
    pub fn without_files(&self) -> InputValue {
        match self {
            InputValue::Map(map) => InputValue::Map(remove_files(map)),
            InputValue::List(items) => InputValue::List(
                items
                    .iter()
                    .filter(|item| !item.is_file())
                    .map(InputValue::without_files)
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// Renders the value the way a form field would show it again.
impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Null => Ok(()),
            InputValue::Bool(b) => write!(f, "{}", b),
            InputValue::Number(n) => write!(f, "{}", n),
            InputValue::String(s) => f.write_str(s),
            InputValue::File(file) => f.write_str(&file.file_name),
            InputValue::List(items) => {
                let items: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", items.join(", "))
            }
            InputValue::Map(_) => f.write_str("[Object]"),
        }
    }
}

impl From<serde_json::Value> for InputValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => InputValue::Null,
            serde_json::Value::Bool(b) => InputValue::Bool(b),
            serde_json::Value::Number(n) => InputValue::Number(n),
            serde_json::Value::String(s) => InputValue::String(s),
            serde_json::Value::Array(items) => {
                InputValue::List(items.into_iter().map(InputValue::from).collect())
            }
            serde_json::Value::Object(map) => InputValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, InputValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for InputValue {
    fn from(b: bool) -> Self {
        InputValue::Bool(b)
    }
}

impl From<i64> for InputValue {
    fn from(n: i64) -> Self {
        InputValue::Number(n.into())
    }
}

impl From<i32> for InputValue {
    fn from(n: i32) -> Self {
        InputValue::Number(i64::from(n).into())
    }
}

impl From<String> for InputValue {
    fn from(s: String) -> Self {
        InputValue::String(s)
    }
}

impl From<&str> for InputValue {
    fn from(s: &str) -> Self {
        InputValue::String(s.to_string())
    }
}

impl From<Vec<InputValue>> for InputValue {
    fn from(items: Vec<InputValue>) -> Self {
        InputValue::List(items)
    }
}

impl From<InputMap> for InputValue {
    fn from(map: InputMap) -> Self {
        InputValue::Map(map)
    }
}

impl From<UploadedFile> for InputValue {
    fn from(file: UploadedFile) -> Self {
        InputValue::File(file)
    }
}

/// Copy of `input` with uploaded files stripped at every depth.
pub fn remove_files(input: &InputMap) -> InputMap {
    input
        .iter()
        .filter(|(_, value)| !value.is_file())
        .map(|(key, value)| (key.clone(), value.without_files()))
        .collect()
}

/// Look up a dot-separated path (`user.address.city`, `tags.0`).
pub fn get_path<'a>(map: &'a InputMap, path: &str) -> Option<&'a InputValue> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = map.get(first)?;

    for segment in segments {
        current = match current {
            InputValue::Map(inner) => inner.get(segment)?,
            InputValue::List(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Set a dot-separated path, creating intermediate maps as needed.
pub fn set_path(map: &mut InputMap, path: &str, value: InputValue) {
    let segments: Vec<&str> = path.split('.').collect();
    set_segments(map, &segments, value);
}

fn set_segments(map: &mut InputMap, segments: &[&str], value: InputValue) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    if rest.is_empty() {
        map.insert((*head).to_string(), value);
        return;
    }

    let slot = map
        .entry((*head).to_string())
        .or_insert_with(|| InputValue::Map(InputMap::new()));
    if !matches!(slot, InputValue::Map(_)) {
        *slot = InputValue::Map(InputMap::new());
    }
    if let InputValue::Map(inner) = slot {
        set_segments(inner, rest, value);
    }
}

/// Remove a key. A literal top-level key wins over a dot-separated path.
pub fn forget_path(map: &mut InputMap, path: &str) {
    if map.shift_remove(path).is_some() {
        return;
    }

    let segments: Vec<&str> = path.split('.').collect();
    forget_segments(map, &segments);
}

fn forget_segments(map: &mut InputMap, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    if rest.is_empty() {
        map.shift_remove(*head);
        return;
    }

    if let Some(next) = map.get_mut(*head) {
        forget_in_value(next, rest);
    }
}

fn forget_in_value(value: &mut InputValue, segments: &[&str]) {
    match value {
        InputValue::Map(inner) => forget_segments(inner, segments),
        InputValue::List(items) => {
            let Some((head, rest)) = segments.split_first() else {
                return;
            };
            let Ok(index) = head.parse::<usize>() else {
                return;
            };
            if rest.is_empty() {
                if index < items.len() {
                    items.remove(index);
                }
            } else if let Some(item) = items.get_mut(index) {
                forget_in_value(item, rest);
            }
        }
        _ => {}
    }
}

/// Merge `overlay` into `base`, descending into maps present on both sides.
pub fn merge_recursive(base: &mut InputMap, overlay: &InputMap) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(InputValue::Map(existing)), InputValue::Map(incoming)) => {
                merge_recursive(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Split a form key using bracket notation: `user[name]` -> `["user", "name"]`,
/// `tags[]` -> `["tags", ""]`. Malformed keys are kept whole.
pub fn bracket_segments(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };
    if open == 0 || !key.ends_with(']') {
        return vec![key.to_string()];
    }

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];

    while !rest.is_empty() {
        let Some(inner) = rest.strip_prefix('[') else {
            return vec![key.to_string()];
        };
        let Some(close) = inner.find(']') else {
            return vec![key.to_string()];
        };
        segments.push(inner[..close].to_string());
        rest = &inner[close + 1..];
    }

    segments
}

/// Insert a value under a bracket-notation form key.
pub fn insert_bracketed(map: &mut InputMap, key: &str, value: InputValue) {
    let segments = bracket_segments(key);
    insert_segments(map, &segments, value);
}

fn empty_container(next: &str) -> InputValue {
    if next.is_empty() {
        InputValue::List(Vec::new())
    } else {
        InputValue::Map(InputMap::new())
    }
}

fn insert_segments(map: &mut InputMap, segments: &[String], value: InputValue) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    match rest.first() {
        None => {
            map.insert(head.clone(), value);
        }
        Some(next) => {
            let slot = map
                .entry(head.clone())
                .or_insert_with(|| empty_container(next));
            insert_into_value(slot, rest, value);
        }
    }
}

fn insert_into_value(slot: &mut InputValue, segments: &[String], value: InputValue) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    if head.is_empty() {
        if !matches!(slot, InputValue::List(_)) {
            *slot = InputValue::List(Vec::new());
        }
        if let InputValue::List(items) = slot {
            match rest.first() {
                None => items.push(value),
                Some(next) => {
                    let mut child = empty_container(next);
                    insert_into_value(&mut child, rest, value);
                    items.push(child);
                }
            }
        }
        return;
    }

    if !matches!(slot, InputValue::Map(_)) {
        *slot = InputValue::Map(InputMap::new());
    }
    if let InputValue::Map(inner) = slot {
        insert_segments(inner, segments, value);
    }
}
