//! Cluster label resolution: user overrides via the `Store`, falling back
//! to an auto-label derived from top members.

use crate::types::{AccountView, LabelSource};

/// Build the default "Cluster {n}: @h1, @h2, @h3" label from up to 3 top
/// members by follower count, ties broken lexicographically by username.
pub fn auto_label(cluster_id: u32, members: &[&AccountView]) -> String {
    let mut sorted: Vec<&&AccountView> = members.iter().collect();
    sorted.sort_by(|a, b| {
        b.follower_count
            .cmp(&a.follower_count)
            .then_with(|| a.username.cmp(&b.username))
    });
    let handles: Vec<String> = sorted.iter().take(3).map(|m| format!("@{}", m.username)).collect();
    if handles.is_empty() {
        format!("Cluster {cluster_id}")
    } else {
        format!("Cluster {cluster_id}: {}", handles.join(", "))
    }
}

/// Resolve a label, preferring a user override when present.
pub fn resolve_label(user_override: Option<String>, cluster_id: u32, members: &[&AccountView]) -> (String, LabelSource) {
    match user_override {
        Some(label) => (label, LabelSource::User),
        None => (auto_label(cluster_id, members), LabelSource::Auto),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, Provenance};

    fn member(username: &str, followers: u64) -> AccountView {
        AccountView {
            id: AccountId::resolved(username),
            username: username.to_string(),
            display_name: username.to_string(),
            follower_count: followers,
            following_count: 0,
            tweet_count: 0,
            like_count: 0,
            bio: None,
            provenance: Provenance::Archive,
            fetched_at: 0,
        }
    }

    #[test]
    fn auto_label_picks_top_three_by_followers() {
        let members = vec![member("a", 1), member("b", 100), member("c", 50), member("d", 10)];
        let refs: Vec<&AccountView> = members.iter().collect();
        let label = auto_label(7, &refs);
        assert_eq!(label, "Cluster 7: @b, @c, @d");
    }

    #[test]
    fn ties_break_lexicographically() {
        let members = vec![member("zed", 10), member("amy", 10)];
        let refs: Vec<&AccountView> = members.iter().collect();
        let label = auto_label(1, &refs);
        assert_eq!(label, "Cluster 1: @amy, @zed");
    }

    #[test]
    fn user_override_wins() {
        let members = vec![member("a", 1)];
        let refs: Vec<&AccountView> = members.iter().collect();
        let (label, source) = resolve_label(Some("Friends".to_string()), 1, &refs);
        assert_eq!(label, "Friends");
        assert_eq!(source, LabelSource::User);
    }
}
