use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global string interner for object IDs.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// A lightweight, interned identifier for scene objects.
/// Internally a `Spur` index: 4 bytes, Copy, O(1) Eq and Hash.
///
/// IDs survive clipboard round-trips and crop sessions, so the same object
/// can be found again after the scene has been reordered.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(Spur);

impl ObjectId {
    /// Intern a string as an ObjectId, or return the existing one.
    pub fn intern(s: &str) -> Self {
        ObjectId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &'static str {
        INTERNER.resolve(&self.0)
    }

    /// Mint a never-before-seen ID with a type prefix (e.g. `rect_4`).
    ///
    /// Candidates that were already interned (for example by a loaded
    /// document that used the same naming scheme) are skipped, so a fresh
    /// ID can never alias an existing object.
    pub fn fresh(prefix: &str) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        loop {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("{prefix}_{n}");
            if INTERNER.get(&candidate).is_none() {
                return Self::intern(&candidate);
            }
        }
    }

    /// Fresh ID for objects that arrive without one (older documents).
    pub fn anonymous() -> Self {
        Self::fresh("obj")
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ObjectId::intern(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = ObjectId::intern("shape_a");
        let b = ObjectId::intern("shape_a");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "shape_a");
    }

    #[test]
    fn fresh_ids_are_unique() {
        let a = ObjectId::fresh("rect");
        let b = ObjectId::fresh("rect");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("rect_"));
    }

    #[test]
    fn fresh_skips_ids_seen_elsewhere() {
        // Pre-intern the next few candidates as if a document had used them.
        let taken: Vec<ObjectId> = (0..64)
            .map(|n| ObjectId::intern(&format!("loaded_{n}")))
            .collect();
        let minted = ObjectId::fresh("loaded");
        assert!(!taken.contains(&minted));
    }
}
