//! Identifier generation and resolution
//!
//! Fresh IDs use the format `{type}-{uuid-v7}`, e.g. `task-0192f5c3a1b27c4e8d90f1a2b3c4d5e6`.
//! Artifact IDs are derived from their session: `{session_id}_{slot}`.

/// Generate a fresh, unique ID for the given domain type
pub fn generate_id(domain_type: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    format!("{}-{}", domain_type, uuid.simple())
}

/// Derive the ID of the artifact occupying `slot` in a session
pub fn artifact_id(session_id: &str, slot: usize) -> String {
    format!("{}_{}", session_id, slot)
}

/// Short form of an ID for display (the random tail of the UUID)
///
/// The leading UUID v7 digits are a millisecond timestamp and collide for IDs
/// minted together, so the tail is what tells them apart.
pub fn short_id(id: &str) -> &str {
    // Artifact IDs keep their `_{slot}` suffix
    let base_len = match id.rsplit_once('_') {
        Some((base, slot)) if !slot.is_empty() && slot.chars().all(|c| c.is_ascii_digit()) => base.len(),
        _ => id.len(),
    };
    id.get(base_len.saturating_sub(8)..).unwrap_or(id)
}

/// ID resolution for partial matches
pub struct IdResolver<'a> {
    ids: Vec<&'a str>,
}

impl<'a> IdResolver<'a> {
    pub fn new(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Resolve a partial reference to a full ID
    ///
    /// Returns:
    /// - Ok(Some(id)) if exactly one match
    /// - Ok(None) if no matches
    /// - Err with candidates if ambiguous
    pub fn resolve(&self, reference: &str) -> Result<Option<String>, Vec<String>> {
        if let Some(exact) = self.ids.iter().find(|id| **id == reference) {
            return Ok(Some(exact.to_string()));
        }

        let matches: Vec<String> = self
            .ids
            .iter()
            .filter(|id| Self::matches(id, reference))
            .map(|id| id.to_string())
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.into_iter().next()),
            _ => Err(matches),
        }
    }

    /// Check if an ID matches a partial reference
    fn matches(id: &str, reference: &str) -> bool {
        !reference.is_empty() && (id.starts_with(reference) || id.ends_with(reference) || id.contains(reference))
    }
}
