#![forbid(unsafe_code)]

//! Domain core for loom: identifiers, the node payload envelope, the graph
//! builder that reconstructs the conversation DAG from ref histories, and the
//! lane layout engine that turns the DAG into render-ready geometry.
//!
//! Nothing in this crate performs I/O; the storage crate feeds it snapshots.

pub mod graph;
pub mod layout;
pub mod model;

pub mod ids {
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct ProjectId(String);

    impl ProjectId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn into_string(self) -> String {
            self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, ProjectIdError> {
            let value = value.into();
            validate_project_id(&value)?;
            Ok(Self(value))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum ProjectIdError {
        Empty,
        TooLong,
        InvalidFirstChar,
        InvalidChar { ch: char, index: usize },
    }

    impl ProjectIdError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "project id must not be empty",
                Self::TooLong => "project id is too long",
                Self::InvalidFirstChar => "project id must start with an ascii letter or digit",
                Self::InvalidChar { .. } => "project id contains an unsupported character",
            }
        }
    }

    fn validate_project_id(value: &str) -> Result<(), ProjectIdError> {
        if value.is_empty() {
            return Err(ProjectIdError::Empty);
        }
        if value.len() > 128 {
            return Err(ProjectIdError::TooLong);
        }
        let Some(first) = value.chars().next() else {
            return Err(ProjectIdError::Empty);
        };
        if !first.is_ascii_alphanumeric() {
            return Err(ProjectIdError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate().skip(1) {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                continue;
            }
            return Err(ProjectIdError::InvalidChar { ch, index });
        }
        Ok(())
    }

    /// Name of a movable history pointer. Stored trimmed.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct RefName(String);

    impl RefName {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn into_string(self) -> String {
            self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, RefNameError> {
            let value = value.into();
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(RefNameError::Empty);
            }
            if trimmed.len() > 200 {
                return Err(RefNameError::TooLong);
            }
            if trimmed.chars().any(|c| c.is_control()) {
                return Err(RefNameError::ContainsControl);
            }
            Ok(Self(trimmed.to_string()))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum RefNameError {
        Empty,
        TooLong,
        ContainsControl,
    }

    impl RefNameError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "ref name must not be blank",
                Self::TooLong => "ref name is too long",
                Self::ContainsControl => "ref name contains control characters",
            }
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct UserId(String);

    impl UserId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, UserIdError> {
            let value = value.into();
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(UserIdError::Empty);
            }
            if trimmed.len() > 128 {
                return Err(UserIdError::TooLong);
            }
            if trimmed.chars().any(|c| c.is_control()) {
                return Err(UserIdError::ContainsControl);
            }
            Ok(Self(trimmed.to_string()))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum UserIdError {
        Empty,
        TooLong,
        ContainsControl,
    }

    impl UserIdError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "user id must not be blank",
                Self::TooLong => "user id is too long",
                Self::ContainsControl => "user id contains control characters",
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn project_id_validation() {
            assert_eq!(ProjectId::try_new("").unwrap_err(), ProjectIdError::Empty);
            assert_eq!(
                ProjectId::try_new("-chat").unwrap_err(),
                ProjectIdError::InvalidFirstChar
            );
            assert_eq!(
                ProjectId::try_new("chat room").unwrap_err(),
                ProjectIdError::InvalidChar { ch: ' ', index: 4 }
            );
            assert!(ProjectId::try_new("chat-01.a_b").is_ok());
        }

        #[test]
        fn ref_names_are_trimmed_and_reject_blank() {
            assert_eq!(RefName::try_new("   ").unwrap_err(), RefNameError::Empty);
            assert_eq!(
                RefName::try_new("feat\u{0007}").unwrap_err(),
                RefNameError::ContainsControl
            );
            assert_eq!(
                RefName::try_new("  feat/idea ").unwrap().as_str(),
                "feat/idea"
            );
        }

        #[test]
        fn user_id_rejects_blank() {
            assert_eq!(UserId::try_new(" ").unwrap_err(), UserIdError::Empty);
            assert_eq!(UserId::try_new(" ada ").unwrap().as_str(), "ada");
        }
    }
}
