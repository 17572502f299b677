use uuid::Uuid;

use crate::domain::error::DomainError;

/// Storage path for a user's avatar: `<prefix>/<user id>/<file name>`.
///
/// Only the final component of `filename` is kept, so client-supplied
/// directories never reach the asset store.
pub fn path_for(prefix: &str, user_id: Uuid, filename: &str) -> Result<String, DomainError> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." || name.chars().any(char::is_control) {
        return Err(DomainError::invalid_avatar_filename(filename));
    }

    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        Ok(format!("{user_id}/{name}"))
    } else {
        Ok(format!("{prefix}/{user_id}/{name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_scoped_by_prefix_and_user() {
        let id = Uuid::new_v4();
        assert_eq!(
            path_for("profiles", id, "me.png").unwrap(),
            format!("profiles/{id}/me.png")
        );
        assert_eq!(
            path_for("/profiles/", id, "me.png").unwrap(),
            format!("profiles/{id}/me.png")
        );
        assert_eq!(path_for("", id, "me.png").unwrap(), format!("{id}/me.png"));
    }

    #[test]
    fn directories_in_filename_are_dropped() {
        let id = Uuid::new_v4();
        assert_eq!(
            path_for("profiles", id, "../../etc/passwd").unwrap(),
            format!("profiles/{id}/passwd")
        );
        assert_eq!(
            path_for("profiles", id, r"C:\Users\me\avatar.jpg").unwrap(),
            format!("profiles/{id}/avatar.jpg")
        );
    }

    #[test]
    fn unusable_filenames_are_rejected() {
        let id = Uuid::new_v4();
        for bad in ["", "   ", "dir/", "..", "a/.", "bad\nname.png"] {
            assert!(
                matches!(
                    path_for("profiles", id, bad),
                    Err(DomainError::InvalidAvatarFilename { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }
}
