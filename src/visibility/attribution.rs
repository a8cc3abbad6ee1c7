use std::collections::HashMap;
use uuid::Uuid;

const PARTNER_TOPIC_PREFIX: &str = "Notes with ";

/// Name given to the topic created implicitly for a partner pair
pub fn partner_topic_name(partner_username: &str) -> String {
    format!("{}{}", PARTNER_TOPIC_PREFIX, partner_username.trim())
}

/// Resolve the other person of a legacy "Notes with <username>" topic.
///
/// Only consulted for topics that have neither `partner_id` nor `group_id`.
/// Returns `None` when the name does not follow the pattern, the username is
/// unknown, or it names the topic's own creator.
pub fn topic_name_counterpart(topic_name: &str, created_by: Uuid, usernames: &HashMap<String, Uuid>) -> Option<Uuid> {
    let username = topic_name.trim().strip_prefix(PARTNER_TOPIC_PREFIX)?.trim();
    if username.is_empty() {
        return None;
    }
    let id = *usernames.get(&username.to_lowercase())?;
    (id != created_by).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_username_case_insensitively() {
        let creator = Uuid::new_v4();
        let alex = Uuid::new_v4();
        let names = HashMap::from([("alex".to_string(), alex)]);
        assert_eq!(topic_name_counterpart("Notes with ALEX", creator, &names), Some(alex));
        assert_eq!(topic_name_counterpart(&partner_topic_name("alex"), creator, &names), Some(alex));
    }

    #[test]
    fn ignores_other_names_and_self_references() {
        let creator = Uuid::new_v4();
        let names = HashMap::from([("sam".to_string(), creator)]);
        assert_eq!(topic_name_counterpart("Groceries", creator, &names), None);
        assert_eq!(topic_name_counterpart("Notes with ", creator, &names), None);
        assert_eq!(topic_name_counterpart("Notes with sam", creator, &names), None);
        assert_eq!(topic_name_counterpart("Notes with nobody", creator, &names), None);
    }
}
