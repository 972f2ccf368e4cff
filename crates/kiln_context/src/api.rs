//! Client API versions

use serde::{Deserialize, Serialize};
use std::fmt;

/// OpenGL ES client API level, ordered from oldest to newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Api {
    OpenGLES2,
    OpenGLES3,
    OpenGLES31,
    OpenGLES32,
}

impl Api {
    /// All levels, newest first (probe order).
    pub const NEWEST_FIRST: [Api; 4] = [
        Api::OpenGLES32,
        Api::OpenGLES31,
        Api::OpenGLES3,
        Api::OpenGLES2,
    ];

    pub fn major(self) -> i32 {
        match self {
            Api::OpenGLES2 => 2,
            Api::OpenGLES3 | Api::OpenGLES31 | Api::OpenGLES32 => 3,
        }
    }

    pub fn minor(self) -> i32 {
        match self {
            Api::OpenGLES2 | Api::OpenGLES3 => 0,
            Api::OpenGLES31 => 1,
            Api::OpenGLES32 => 2,
        }
    }

    /// `RENDERABLE_TYPE` bit a config must carry to serve this API.
    pub fn renderable_bit(self) -> i32 {
        match self {
            Api::OpenGLES2 => 0x0004,
            _ => 0x0040,
        }
    }

    /// Minor versions above 3.0 can only be requested through the
    /// create-context extension.
    pub fn needs_create_context_extension(self) -> bool {
        self > Api::OpenGLES3
    }
}

impl Default for Api {
    fn default() -> Self {
        Api::OpenGLES2
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpenGL ES {}.{}", self.major(), self.minor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_version() {
        assert!(Api::OpenGLES2 < Api::OpenGLES3);
        assert!(Api::OpenGLES31 < Api::OpenGLES32);
        assert_eq!(Api::NEWEST_FIRST[0], Api::OpenGLES32);
    }

    #[test]
    fn display_names_version() {
        assert_eq!(Api::OpenGLES31.to_string(), "OpenGL ES 3.1");
        assert!(Api::OpenGLES32.needs_create_context_extension());
        assert!(!Api::OpenGLES3.needs_create_context_extension());
    }
}
