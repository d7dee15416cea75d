//! Option Validation (C8): shared validators run before any I/O (§4.8).

use crate::error::OperationError;
use crate::model::Host;

/// Database names: non-empty, starting with a letter, ASCII
/// alphanumeric/underscore thereafter.
pub fn validate_db_name(name: &str) -> Result<(), OperationError> {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(OperationError::Validation("database name must start with a letter".into())),
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(OperationError::Validation(format!(
            "database name '{name}' contains invalid characters"
        )));
    }
    Ok(())
}

/// Subcluster and sandbox names share the same identifier grammar as
/// database names (§4.8).
pub fn validate_identifier(kind: &str, name: &str) -> Result<(), OperationError> {
    validate_db_name(name).map_err(|_| {
        OperationError::Validation(format!(
            "{kind} name '{name}' must start with a letter and contain only letters, digits, or underscores"
        ))
    })
}

pub fn validate_hosts_non_empty(hosts: &[Host]) -> Result<(), OperationError> {
    if hosts.is_empty() {
        Err(OperationError::Validation("resolved host list must not be empty".into()))
    } else {
        Ok(())
    }
}

/// Gate a verb that only makes sense against an Eon (communal-storage)
/// database.
pub fn validate_eon_required(eon: bool) -> Result<(), OperationError> {
    if eon {
        Ok(())
    } else {
        Err(OperationError::Validation("this operation requires an Eon-mode database".into()))
    }
}

pub fn validate_absolute_path(label: &str, path: &str) -> Result<(), OperationError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(OperationError::Validation(format!("{label} must be an absolute path, got '{path}'")))
    }
}

/// A password without a username is always a mistake.
pub fn validate_credentials(username: &str, password: &str) -> Result<(), OperationError> {
    if !password.is_empty() && username.is_empty() {
        Err(OperationError::Validation("password supplied without a username".into()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_name_must_start_with_a_letter() {
        assert!(validate_db_name("1db").is_err());
        assert!(validate_db_name("mydb_01").is_ok());
    }

    #[test]
    fn identifier_rejects_punctuation() {
        assert!(validate_identifier("subcluster", "sc-1").is_err());
        assert!(validate_identifier("subcluster", "sc1").is_ok());
    }

    #[test]
    fn absolute_path_required() {
        assert!(validate_absolute_path("catalog prefix", "data").is_err());
        assert!(validate_absolute_path("catalog prefix", "/data").is_ok());
    }

    #[test]
    fn password_requires_username() {
        assert!(validate_credentials("", "secret").is_err());
        assert!(validate_credentials("dbadmin", "secret").is_ok());
        assert!(validate_credentials("", "").is_ok());
    }
}
