use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Tag text as received from callers. The shape is decided once, when the
/// JSON is read: a string is a comma list, an array of hyphenated UUIDs is a
/// list of pre-resolved ids, any other array is a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TagInput {
    Raw(String),
    Names(Vec<String>),
    Ids(Vec<Uuid>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTagInput {
    One(String),
    Many(Vec<String>),
}

impl From<RawTagInput> for TagInput {
    fn from(raw: RawTagInput) -> Self {
        match raw {
            RawTagInput::One(text) => TagInput::Raw(text),
            RawTagInput::Many(items) => {
                let ids: Option<Vec<Uuid>> = if items.is_empty() {
                    None
                } else {
                    items.iter().map(|item| parse_hyphenated(item)).collect()
                };
                match ids {
                    Some(ids) => TagInput::Ids(ids),
                    None => TagInput::Names(items),
                }
            }
        }
    }
}

impl<'de> Deserialize<'de> for TagInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawTagInput::deserialize(deserializer).map(TagInput::from)
    }
}

// Only the 8-4-4-4-12 form counts as an id; bare 32-hex names stay names.
fn parse_hyphenated(text: &str) -> Option<Uuid> {
    if text.len() != 36 {
        return None;
    }
    Uuid::try_parse(text).ok()
}

impl TagInput {
    pub fn is_empty(&self) -> bool {
        match self {
            TagInput::Raw(text) => text.trim().is_empty(),
            TagInput::Names(names) => names.is_empty(),
            TagInput::Ids(ids) => ids.is_empty(),
        }
    }
}

impl From<Vec<Uuid>> for TagInput {
    fn from(ids: Vec<Uuid>) -> Self {
        TagInput::Ids(ids)
    }
}
