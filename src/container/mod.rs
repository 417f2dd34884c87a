use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

mod error;

pub use error::{Error, Result};

/// The maximum allowed length for a [`ContainerID`].
const CONTAINER_ID_MAX_LEN: usize = 255;

/// A validated container identifier.
///
/// # Examples
///
/// ```
/// # use dockstat::container::{ContainerID, Error};
/// let raw_id = "abc123abc123abc123abc123abc123abc123abc123abc123abc123abc123abcd";
/// let container_id = ContainerID::new(raw_id).unwrap();
/// assert_eq!(container_id.as_ref(), "abc123abc123abc123abc123abc123abc123abc123abc123abc123abc123abcd");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerID(Arc<str>);

impl ContainerID {
    /// Creates a new `ContainerID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerID`] if the input is empty or its
    /// length exceeds [`CONTAINER_ID_MAX_LEN`].
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.is_empty() || src.len() > CONTAINER_ID_MAX_LEN {
            return Err(Error::InvalidContainerID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_arc(&self) -> Arc<str> {
        Arc::clone(&self.0)
    }
}

impl FromStr for ContainerID {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for ContainerID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a monitored container, resolved once per monitoring attempt
/// from runtime inspection metadata and network settings.
///
/// The `app` and `task` fields come from the scheduler-assigned container
/// labels (`SRV_NAME` and `MESOS_TASK_ID`); `ip` is best-effort metadata and
/// may hold the fallback sentinel address when no attached network reported
/// an address and out-of-band discovery failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerIdentity {
    id: ContainerID,
    app: String,
    task: String,
    ip: String,
}

impl ContainerIdentity {
    pub fn new(id: ContainerID, app: String, task: String, ip: String) -> Self {
        Self { id, app, task, ip }
    }

    pub fn id(&self) -> &ContainerID {
        &self.id
    }

    /// Returns the application name from the `SRV_NAME` label.
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Returns the scheduler task id from the `MESOS_TASK_ID` label.
    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_container_id() {
        let id = ContainerID::new("abc123").unwrap();
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(id.to_string(), "abc123");
    }

    #[test]
    fn test_empty_container_id_rejected() {
        assert!(matches!(
            ContainerID::new(""),
            Err(Error::InvalidContainerID(_))
        ));
    }

    #[test]
    fn test_oversized_container_id_rejected() {
        let raw = "a".repeat(256);
        assert!(matches!(
            ContainerID::new(&raw),
            Err(Error::InvalidContainerID(_))
        ));
    }

    #[test]
    fn test_from_str_roundtrip() {
        let id: ContainerID = "deadbeef".parse().unwrap();
        assert_eq!(id.as_ref(), "deadbeef");
    }
}
