//! Run-scoped activity deduplicator.
//!
//! The provider has no memory of what it already suggested, so every
//! generated day is filtered against the set of keys used earlier in the
//! same run. The key is a normalized slug of the activity name plus a
//! coarse time bucket, so "Visit the Louvre" at 10:00 and "visit Louvre!"
//! at 11:00 collide, while the same name in the evening does not.

use std::collections::HashSet;

use crate::model::Activity;

/// Coarse time-of-day bucket used in the dedup key.
fn time_bucket(start_minutes: Option<u32>) -> &'static str {
    match start_minutes {
        Some(m) if m < 12 * 60 => "morning",
        Some(m) if m < 18 * 60 => "afternoon",
        Some(_) => "evening",
        // Unparseable times all share one bucket so an unparseable repeat
        // still collides with itself.
        None => "anytime",
    }
}

/// Normalized slug of an activity name: lowercase, alphanumeric runs
/// joined by single hyphens.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_sep = true;
        }
    }
    slug
}

/// Deterministic dedup key for an activity.
pub fn activity_key(activity: &Activity) -> String {
    format!(
        "{}@{}",
        slugify(&activity.name),
        time_bucket(activity.start_minutes())
    )
}

/// Filter a day's activities against the run's used-key set.
///
/// Returns the surviving activities (with `dedup_key` filled in) and the
/// new keys the caller must add to the set. Idempotent: running the
/// result through again with the updated set removes nothing further.
pub fn filter_day(
    activities: Vec<Activity>,
    used: &HashSet<String>,
) -> (Vec<Activity>, Vec<String>) {
    let mut kept = Vec::with_capacity(activities.len());
    let mut new_keys: Vec<String> = Vec::new();

    for mut activity in activities {
        let key = activity_key(&activity);
        let already_kept = activity.dedup_key.as_deref() == Some(key.as_str());
        if !already_kept && (used.contains(&key) || new_keys.iter().any(|k| *k == key)) {
            tracing::debug!(key = %key, name = %activity.name, "dropped duplicate activity");
            continue;
        }
        if !already_kept {
            new_keys.push(key.clone());
        }
        activity.dedup_key = Some(key);
        kept.push(activity);
    }

    (kept, new_keys)
}
