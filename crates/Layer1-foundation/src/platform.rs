//! Platform Detection - 실행 플랫폼 감지
//!
//! 플러그인 descriptor의 `platforms` 목록과 비교하여 로드 가능 여부를 판단합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 운영체제 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    MacOS,
    Linux,
    Unknown,
}

impl Platform {
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOS
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::Unknown
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::MacOS => "macos",
            Self::Linux => "linux",
            Self::Unknown => "unknown",
        }
    }

    /// 모든 알려진 플랫폼
    pub fn all() -> &'static [Platform] {
        &[Self::Windows, Self::MacOS, Self::Linux]
    }

    pub fn is_unix(&self) -> bool {
        matches!(self, Self::MacOS | Self::Linux)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Platform {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "windows" | "win32" | "win" => Ok(Self::Windows),
            "macos" | "darwin" | "osx" | "mac" => Ok(Self::MacOS),
            "linux" => Ok(Self::Linux),
            other => Err(crate::Error::Config(format!("Unknown platform: {}", other))),
        }
    }
}
