//! Builders for world-edit command strings
//!
//! Commands are emitted without the leading command trigger; the transport
//! owns trigger handling.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CaptureError;

use super::BlockPos;

pub const DEFAULT_NAMESPACE: &str = "minecraft";

const FILL_MODES: &str = "replace, destroy, hollow, keep, outline";
const SET_MODES: &str = "replace, destroy, keep";

/// Block state properties, serialized in key order as `[key=value,...]`
pub type BlockStates = BTreeMap<String, String>;

/// Add the default namespace when the identifier has none
pub fn namespaced(id: &str) -> String {
    if id.contains(':') {
        id.to_string()
    } else {
        format!("{DEFAULT_NAMESPACE}:{id}")
    }
}

/// Modes accepted by the `fill` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    #[default]
    Replace,
    Destroy,
    Hollow,
    Keep,
    Outline,
}

impl FillMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Destroy => "destroy",
            Self::Hollow => "hollow",
            Self::Keep => "keep",
            Self::Outline => "outline",
        }
    }
}

impl FromStr for FillMode {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(Self::Replace),
            "destroy" => Ok(Self::Destroy),
            "hollow" => Ok(Self::Hollow),
            "keep" => Ok(Self::Keep),
            "outline" => Ok(Self::Outline),
            other => Err(CaptureError::InvalidMode {
                kind: "fill",
                value: other.to_string(),
                allowed: FILL_MODES,
            }),
        }
    }
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Modes accepted by the `setblock` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetMode {
    #[default]
    Replace,
    Destroy,
    Keep,
}

impl SetMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Destroy => "destroy",
            Self::Keep => "keep",
        }
    }
}

impl FromStr for SetMode {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(Self::Replace),
            "destroy" => Ok(Self::Destroy),
            "keep" => Ok(Self::Keep),
            other => Err(CaptureError::InvalidMode {
                kind: "placement",
                value: other.to_string(),
                allowed: SET_MODES,
            }),
        }
    }
}

impl fmt::Display for SetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a region fill
#[derive(Debug, Clone, Default)]
pub struct FillOptions {
    pub mode: Option<FillMode>,
    pub block_states: BlockStates,
    /// Block to replace; only consulted under [`FillMode::Replace`]
    pub replace_filter: Option<String>,
    pub replace_filter_states: BlockStates,
}

/// Options for a single-block placement
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub mode: Option<SetMode>,
    pub block_states: BlockStates,
}

fn state_suffix(states: &BlockStates) -> String {
    if states.is_empty() {
        return String::new();
    }
    let inner = states
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("[{inner}]")
}

/// Build a `fill` command covering the region between two corners
pub fn fill_command(
    corner1: BlockPos,
    corner2: BlockPos,
    block: &str,
    options: &FillOptions,
) -> String {
    let mut command = format!(
        "fill {} {} {} {} {} {} {}{}",
        corner1.x,
        corner1.y,
        corner1.z,
        corner2.x,
        corner2.y,
        corner2.z,
        namespaced(block),
        state_suffix(&options.block_states)
    );

    if let Some(mode) = options.mode {
        command.push(' ');
        command.push_str(mode.as_str());

        if mode == FillMode::Replace
            && let Some(ref filter) = options.replace_filter
        {
            command.push(' ');
            command.push_str(&namespaced(filter));
            command.push_str(&state_suffix(&options.replace_filter_states));
        }
    }

    command
}

/// Build a `setblock` command for a single position
pub fn set_block_command(pos: BlockPos, block: &str, options: &SetOptions) -> String {
    let mut command = format!(
        "setblock {} {} {} {}{}",
        pos.x,
        pos.y,
        pos.z,
        namespaced(block),
        state_suffix(&options.block_states)
    );

    if let Some(mode) = options.mode {
        command.push(' ');
        command.push_str(mode.as_str());
    }

    command
}
