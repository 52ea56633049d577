//! Resource change events and the reload message sent to browsers.

use serde::Serialize;

/// A change to one watched resource.
///
/// Carries just enough to identify the resource in logs and in the
/// diagnostic path of the reload message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceChange {
    name: String,
    uid: String,
    kind: String,
}

impl ResourceChange {
    /// Create a change for the resource identified by `uid`.
    pub fn new(name: impl Into<String>, uid: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: uid.into(),
            kind: kind.into(),
        }
    }

    /// Human-readable resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique identifier of the resource.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Resource kind (e.g. `"file"`).
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// Message sent to connected clients when a reload fires.
///
/// Clients reload on any message with `command == "reload"`; `path` only
/// helps when reading browser consoles.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct ReloadCommand {
    command: &'static str,
    path: String,
}

impl ReloadCommand {
    /// Reload command pointing at `change`.
    pub(crate) fn for_resource(change: &ResourceChange) -> Self {
        Self {
            command: "reload",
            path: format!("/d/{}/slug", change.uid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_command_serialization() {
        let change = ResourceChange::new("Overview", "abc123", "Dashboard");
        let json = serde_json::to_value(ReloadCommand::for_resource(&change)).unwrap();

        assert_eq!(json["command"], "reload");
        assert_eq!(json["path"], "/d/abc123/slug");
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_resource_change_accessors() {
        let change = ResourceChange::new("index.html", "docs/index.html", "file");

        assert_eq!(change.name(), "index.html");
        assert_eq!(change.uid(), "docs/index.html");
        assert_eq!(change.kind(), "file");
    }
}
