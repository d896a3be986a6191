//! Change events delivered to a mapping's consumer loop.

use std::path::PathBuf;

/// A filesystem change notification for one path.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// The kind of change.
    pub kind: ChangeKind,

    /// Path to the affected file.
    pub path: PathBuf,
}

impl ChangeEvent {
    /// Create a new change event.
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Whether this event can represent new file content.
    pub fn is_content_change(&self) -> bool {
        matches!(self.kind, ChangeKind::Created | ChangeKind::Modified)
    }
}

/// Kind of change, reduced to what the copy pipeline cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File was created.
    Created,

    /// File content or metadata was modified.
    Modified,

    /// Anything else (removal, access, rename bookkeeping).
    Other,
}

impl From<notify::EventKind> for ChangeKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => Self::Created,
            notify::EventKind::Modify(_) => Self::Modified,
            _ => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_change_classification() {
        assert!(ChangeEvent::new(ChangeKind::Created, "/a").is_content_change());
        assert!(ChangeEvent::new(ChangeKind::Modified, "/a").is_content_change());
        assert!(!ChangeEvent::new(ChangeKind::Other, "/a").is_content_change());
    }
}
