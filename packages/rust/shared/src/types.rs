//! Wire types shared between the loader and the design-document model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An inline attachment as embedded in a design document's `_attachments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    /// MIME type inferred from the stored (possibly renamed) path.
    pub content_type: String,
    /// Base64-encoded payload.
    pub data: String,
}

/// Attachments keyed by their path relative to the attachment root.
pub type Attachments = BTreeMap<String, AttachmentRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_uses_couchdb_field_names() {
        let record = AttachmentRecord {
            content_type: "text/html".into(),
            data: "PGh0bWw+PC9odG1sPg==".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["content_type"], "text/html");
        assert_eq!(json["data"], "PGh0bWw+PC9odG1sPg==");
    }
}
