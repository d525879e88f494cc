use {
    serde_json::Value,
    switchboard_messages::{Attachment, AttachmentKind},
};

/// Pull the single attachment out of a message element.
///
/// At most one media kind is kept, chosen by [`AttachmentKind::PRECEDENCE`].
/// Which optional fields are read depends on the kind: audio carries no
/// caption and only documents carry a filename.
pub fn extract_attachment(message: &Value) -> Option<Attachment> {
    AttachmentKind::PRECEDENCE.iter().find_map(|&kind| {
        let media = message.get(kind.as_str())?.as_object()?;
        let field = |name: &str| media.get(name).and_then(Value::as_str).map(str::to_string);

        let external_ref = field("id").or_else(|| field("link")).unwrap_or_default();
        let (filename, caption) = match kind {
            AttachmentKind::Image | AttachmentKind::Video => (None, field("caption")),
            AttachmentKind::Audio => (None, None),
            AttachmentKind::Document => (field("filename"), field("caption")),
        };

        Some(Attachment {
            kind,
            external_ref,
            filename,
            caption,
            mime_type: field("mime_type"),
        })
    })
}
