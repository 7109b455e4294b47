use crate::cache::CacheInvalidationRule;

/// Extra cache templates for coaching entities, on top of the by-id,
/// owner-list and type-list invalidation every entity gets.
pub fn invalidation_rules() -> Vec<CacheInvalidationRule> {
    vec![
        CacheInvalidationRule::new("focus_area", ["user:{user_id}:dashboard:*"]),
        CacheInvalidationRule::new(
            "challenge",
            [
                "user:{user_id}:dashboard:*",
                "focus_area:{focus_area_id}:progress",
                "leaderboard:*",
            ],
        ),
    ]
}
