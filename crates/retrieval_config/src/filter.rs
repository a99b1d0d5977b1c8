//! Access-filter expressions.
//!
//! Filters are OData-style boolean expressions evaluated by the search
//! backend. Retrieval must never cross user or conversation boundaries,
//! so every filter is intersected with the ownership clause.

/// Restrict results to documents whose permitted-groups column contains
/// one of the caller's groups.
pub fn group_filter(permitted_groups_column: &str, groups: &[String]) -> String {
    let group_ids = groups.join(", ");
    format!("{permitted_groups_column}/any(g:search.in(g, '{group_ids}'))")
}

/// Intersect an optional base filter with the per-conversation ownership
/// clause (`user_id == caller AND conversation_id == current`).
pub fn conversation_scope_filter(
    base: Option<String>,
    user_id: &str,
    conversation_id: Option<&str>,
) -> String {
    let mut clauses = Vec::new();
    if let Some(base) = base {
        clauses.push(format!("({base})"));
    }
    clauses.push(format!("user_id eq '{user_id}'"));
    if let Some(conversation_id) = conversation_id {
        clauses.push(format!("conversation_id eq '{conversation_id}'"));
    }
    clauses.join(" and ")
}
