//! Version and build information.

use std::fmt;

use serde::Serialize;

/// Build information embedded by `build.rs`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_date: Option<&'static str>,
    pub target: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rustc_version: Option<&'static str>,
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "docauth {}", self.version)?;

        if let Some(commit) = self.commit {
            write!(f, "\nCommit: {}", commit)?;
        }

        if let Some(date) = self.build_date {
            write!(f, "\nBuilt: {}", date)?;
        }

        write!(f, "\nTarget: {}", self.target)?;

        if let Some(rustc) = self.rustc_version {
            write!(f, "\nRustc: {}", rustc)?;
        }

        Ok(())
    }
}

pub fn get_build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("DOCAUTH_GIT_HASH"),
        build_date: option_env!("DOCAUTH_BUILD_DATE"),
        target: option_env!("DOCAUTH_TARGET").unwrap_or(std::env::consts::ARCH),
        rustc_version: option_env!("DOCAUTH_RUSTC_VERSION"),
    }
}
