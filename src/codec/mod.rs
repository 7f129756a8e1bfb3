//! Structural-deduplication tree codec
//!
//! Flattens a tree into `[value records][pointer records]` and back:
//! - Value records hold groups of leaves; identical groups are stored once
//! - Pointer records tie a container name to the record holding its content
//! - Root-level leaves form value record 0, which no pointer targets

mod decode;
mod encode;
mod values;

pub use decode::{decode, decode_stored, decode_untagged};
pub use encode::encode;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How pointer records describe nesting
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// One pointer per distinct container name, linking only to the record of
    /// the container's first sub-container. Compact, but a container keeps at
    /// most one sub-container, loses leaves that sit beside sub-containers,
    /// and names must be unique across the whole tree.
    FirstChild,
    /// One pointer per container, listing every sub-container and the value
    /// record of its own leaves. Keeps every entry; within a container the
    /// leaves come back ahead of the sub-containers.
    #[default]
    ChildList,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::FirstChild => write!(f, "first-child"),
            Layout::ChildList => write!(f, "child-list"),
        }
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-child" => Ok(Layout::FirstChild),
            "child-list" => Ok(Layout::ChildList),
            other => Err(format!(
                "unknown layout '{}' (expected first-child or child-list)",
                other
            )),
        }
    }
}
