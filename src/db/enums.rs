use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// What a message is for, as decided by the intent classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    Thought,
    List,
    Research,
    DriveQuery,
    Order,
    /// Only ever written on system apology messages; never produced by classification.
    Error,
}

impl Intent {
    /// The intents a classifier may return.
    pub const CLASSIFIABLE: [Intent; 5] = [
        Intent::Thought,
        Intent::List,
        Intent::Research,
        Intent::DriveQuery,
        Intent::Order,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Thought => "thought",
            Intent::List => "list",
            Intent::Research => "research",
            Intent::DriveQuery => "drive_query",
            Intent::Order => "order",
            Intent::Error => "error",
        }
    }

    /// Coarse UI classification: only thoughts are shown as thoughts.
    pub fn message_type(&self) -> MessageType {
        match self {
            Intent::Thought => MessageType::Thought,
            _ => MessageType::Order,
        }
    }
}

impl FromStr for Intent {
    type Err = ();

    /// Accepts only classifiable tokens, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_lowercase();
        Intent::CLASSIFIABLE
            .into_iter()
            .find(|intent| intent.as_str() == token)
            .ok_or(())
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Thought,
    Order,
}

/// How the tags on an entity were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagSource {
    Manual,
    #[serde(rename = "AI")]
    Ai,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_parsing_is_case_insensitive_and_closed() {
        assert_eq!(" LIST ".parse::<Intent>(), Ok(Intent::List));
        assert_eq!("drive_query".parse::<Intent>(), Ok(Intent::DriveQuery));
        assert!("error".parse::<Intent>().is_err());
        assert!("shopping".parse::<Intent>().is_err());
    }

    #[test]
    fn test_message_type_mapping() {
        assert_eq!(Intent::Thought.message_type(), MessageType::Thought);
        for intent in [Intent::List, Intent::Research, Intent::DriveQuery, Intent::Order] {
            assert_eq!(intent.message_type(), MessageType::Order);
        }
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&Intent::DriveQuery).unwrap(), "\"drive_query\"");
        assert_eq!(serde_json::to_string(&MessageType::Order).unwrap(), "\"order\"");
        assert_eq!(serde_json::to_string(&TagSource::Ai).unwrap(), "\"AI\"");
        assert_eq!(serde_json::to_string(&TagSource::Manual).unwrap(), "\"Manual\"");
    }
}
