//! Topic name / topic filter syntax validation.
//!
//! This module only checks wire-level well-formedness of the strings carried
//! in CONNECT wills, PUBLISH topics and SUBSCRIBE/UNSUBSCRIBE filters.
//! Wildcard matching against a concrete topic lives in the broker crate's
//! topic tree, not here: the codec only needs to know a filter is
//! *syntactically* valid before handing it up.

use crate::error::DecodeError;

/// Validate a concrete topic name (as carried in a PUBLISH packet).
///
/// # Errors
/// Returns `InvalidTopic` if the topic is empty or contains a wildcard
/// character, which concrete topics must not.
pub fn validate_topic_name(topic: &str) -> Result<(), DecodeError> {
    if topic.is_empty() {
        return Err(DecodeError::InvalidTopic);
    }
    if topic.contains('+') || topic.contains('#') {
        return Err(DecodeError::InvalidTopic);
    }
    Ok(())
}

/// Validate a topic filter (as carried in SUBSCRIBE/UNSUBSCRIBE).
///
/// `+` must occupy an entire level; `#` must occupy an entire level and can
/// only be the last level. Empty levels are allowed (two adjacent `/`).
///
/// # Errors
/// Returns `EmptyTopicFilter` for an empty filter string, or `InvalidTopic`
/// if a wildcard is misplaced.
pub fn validate_topic_filter(filter: &str) -> Result<(), DecodeError> {
    if filter.is_empty() {
        return Err(DecodeError::EmptyTopicFilter);
    }
    let levels: Vec<&str> = filter.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') && *level != "#" {
            return Err(DecodeError::InvalidTopic);
        }
        if *level == "#" && i != levels.len() - 1 {
            return Err(DecodeError::InvalidTopic);
        }
        if level.contains('+') && *level != "+" {
            return Err(DecodeError::InvalidTopic);
        }
    }
    Ok(())
}

/// `true` if `filter` subscribes to the root multi-level wildcard only,
/// i.e. the literal filter `#`. Used to enforce
/// `AllowRootWildcardSubscription`.
#[must_use]
pub fn is_root_wildcard(filter: &str) -> bool {
    filter == "#"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_wildcard_filters() {
        assert!(validate_topic_filter("a/b/c").is_ok());
        assert!(validate_topic_filter("a/+/c").is_ok());
        assert!(validate_topic_filter("a/b/#").is_ok());
        assert!(validate_topic_filter("#").is_ok());
        assert!(validate_topic_filter("").is_err());
        assert!(validate_topic_filter("a/#/c").is_err());
        assert!(validate_topic_filter("a/b+/c").is_err());
    }

    #[test]
    fn rejects_wildcards_in_concrete_topic() {
        assert!(validate_topic_name("a/b/c").is_ok());
        assert!(validate_topic_name("a/+/c").is_err());
        assert!(validate_topic_name("").is_err());
    }

    #[test]
    fn detects_root_wildcard() {
        assert!(is_root_wildcard("#"));
        assert!(!is_root_wildcard("a/#"));
    }
}
