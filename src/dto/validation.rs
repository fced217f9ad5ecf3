//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest attachment reference accepted from the bridge.
const MAX_ATTACHMENT_REF_LEN: usize = 256;

/// Attachment references must be non-empty, reasonably short and contain no
/// whitespace or control characters.
#[allow(clippy::ptr_arg)]
pub fn validate_attachment_refs(attachments: &Vec<String>) -> Result<(), ValidationError> {
    for reference in attachments {
        if reference.is_empty() || reference.len() > MAX_ATTACHMENT_REF_LEN {
            let mut err = ValidationError::new("attachment_length");
            err.message = Some(
                format!(
                    "Attachment references must be 1 to {MAX_ATTACHMENT_REF_LEN} bytes (got {})",
                    reference.len()
                )
                .into(),
            );
            return Err(err);
        }

        if reference
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            let mut err = ValidationError::new("attachment_format");
            err.message = Some("Attachment references cannot contain whitespace".into());
            return Err(err);
        }
    }

    Ok(())
}

/// Strip chat-platform mention syntax (`<#123>`, `<@123>`, `<@!123>`,
/// `<@&123>`) down to the bare id; plain ids pass through.
pub fn strip_mention(reference: &str) -> &str {
    let trimmed = reference.trim();
    trimmed
        .strip_prefix('<')
        .and_then(|inner| inner.strip_suffix('>'))
        .map(|inner| inner.trim_start_matches(['#', '@', '!', '&']))
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_attachment_refs() {
        assert!(validate_attachment_refs(&vec!["a1b2.png".into()]).is_ok());
        assert!(validate_attachment_refs(&Vec::new()).is_ok());
        assert!(validate_attachment_refs(&vec![String::new()]).is_err());
        assert!(validate_attachment_refs(&vec!["two words".into()]).is_err());
        assert!(validate_attachment_refs(&vec!["x".repeat(300)]).is_err());
    }

    #[test]
    fn test_strip_mention() {
        assert_eq!(strip_mention("<#123>"), "123");
        assert_eq!(strip_mention("<@!456>"), "456");
        assert_eq!(strip_mention("<@&789>"), "789");
        assert_eq!(strip_mention(" 101 "), "101");
        assert_eq!(strip_mention("<oops"), "<oops");
    }
}
