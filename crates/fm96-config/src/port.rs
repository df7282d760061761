//! Port identifiers.
//!
//! A port identifier names where audio comes from or goes to:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `default` | the system's default input or output device |
//! | `file:<path>` | a WAV file (read for capture, written for playback) |
//! | anything else | an audio device, matched by case-insensitive substring |

use crate::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const FILE_PREFIX: &str = "file:";
const DEFAULT_NAME: &str = "default";

/// Identifies one capture or playback endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PortId {
    /// System default device.
    #[default]
    Default,
    /// Device whose name contains this string (case-insensitive).
    Device(String),
    /// WAV file on disk.
    File(PathBuf),
}

impl PortId {
    /// Whether this port is backed by a file rather than a device.
    pub fn is_file(&self) -> bool {
        matches!(self, PortId::File(_))
    }

    /// Device name filter, `None` for the default device and for files.
    pub fn device_name(&self) -> Option<&str> {
        match self {
            PortId::Device(name) => Some(name),
            _ => None,
        }
    }
}

impl FromStr for PortId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &'static str| ValidationError::InvalidPortId {
            value: s.escape_default().to_string(),
            reason,
        };

        if s.trim().is_empty() {
            return Err(invalid("identifier is empty"));
        }
        if s.chars().any(char::is_control) {
            return Err(invalid("identifier contains control characters"));
        }

        if s == DEFAULT_NAME {
            Ok(PortId::Default)
        } else if let Some(path) = s.strip_prefix(FILE_PREFIX) {
            if path.is_empty() {
                return Err(invalid("file path is empty"));
            }
            Ok(PortId::File(PathBuf::from(path)))
        } else {
            Ok(PortId::Device(s.to_string()))
        }
    }
}

impl TryFrom<String> for PortId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PortId> for String {
    fn from(port: PortId) -> Self {
        port.to_string()
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortId::Default => f.write_str(DEFAULT_NAME),
            PortId::Device(name) => f.write_str(name),
            PortId::File(path) => write!(f, "{FILE_PREFIX}{}", path.display()),
        }
    }
}
