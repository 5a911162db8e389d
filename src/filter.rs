use crate::collection::CollectionIndex;
use crate::error::Result;

/// Keep the ids whose group equals `group`, in their current order.
///
/// If no id belongs to `group` the unfiltered list is returned unchanged, so a
/// mistyped or unknown video name degrades to an ordinary search instead of an
/// empty result. Whether this should be an empty list instead is an open
/// product decision.
pub fn filter_by_group(
    ids: Vec<usize>,
    group: &str,
    collection: &dyn CollectionIndex,
) -> Result<Vec<usize>> {
    let mut kept = Vec::new();
    for &id in &ids {
        if collection.group_of(id)? == group {
            kept.push(id);
        }
    }

    if kept.is_empty() {
        tracing::debug!(group, "no item in group, keeping unfiltered ranking");
        return Ok(ids);
    }
    Ok(kept)
}
