// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dynamic method surface for script hosts.
//!
//! Hosts that dispatch by method name with loosely typed arguments call
//! [`Stage::call_method`]; argument counts are checked here and values are
//! coerced the way a dynamically typed caller expects.

use crate::clip::{parse_number, FrameScript, FrameTarget};
use crate::error::{Result, TimelineError};
use crate::stage::Stage;
use ordoplay_stage::NodeId;
use std::fmt;

/// Loosely typed value passed across the script boundary
#[derive(Clone, Default)]
pub enum ScriptValue {
    /// No value
    #[default]
    Undefined,
    /// Explicit null
    Null,
    /// Boolean
    Bool(bool),
    /// Number
    Number(f64),
    /// String
    String(String),
    /// Callable frame script
    Function(FrameScript),
}

impl ScriptValue {
    /// String coercion
    pub fn coerce_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
            Self::Function(_) => "function".to_string(),
        }
    }

    /// Numeric coercion, NaN when the value has no numeric reading
    pub fn coerce_number(&self) -> f64 {
        match self {
            Self::Undefined | Self::Function(_) => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => parse_number(s).unwrap_or(f64::NAN),
        }
    }

    fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    fn to_frame_target(&self) -> FrameTarget {
        match self {
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 => FrameTarget::Number(*n as i64),
            Self::Undefined | Self::Null => FrameTarget::Name("null".to_string()),
            other => FrameTarget::Name(other.coerce_string()),
        }
    }
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "Undefined"),
            Self::Null => write!(f, "Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Function(_) => write!(f, "Function(..)"),
        }
    }
}

impl PartialEq for ScriptValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => std::rc::Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<f64> for ScriptValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<u32> for ScriptValue {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<Option<String>> for ScriptValue {
    fn from(s: Option<String>) -> Self {
        s.map_or(Self::Null, Self::String)
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn expect_args(method: &'static str, args: &[ScriptValue], min: usize, max: usize, expected: &'static str) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(TimelineError::InvalidArgumentCount {
            method,
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

impl Stage {
    /// Invoke a timeline method by name
    pub fn call_method(&mut self, node: NodeId, method: &str, args: &[ScriptValue]) -> Result<ScriptValue> {
        match method {
            "gotoAndPlay" => self.call_goto("gotoAndPlay", node, args, true),
            "gotoAndStop" => self.call_goto("gotoAndStop", node, args, false),
            "play" => self.call_without_args("play", args, |stage| stage.play(node)),
            "stop" => self.call_without_args("stop", args, |stage| stage.stop(node)),
            "nextFrame" => self.call_without_args("nextFrame", args, |stage| stage.next_frame(node)),
            "prevFrame" => self.call_without_args("prevFrame", args, |stage| stage.prev_frame(node)),
            "nextScene" => self.call_without_args("nextScene", args, |stage| stage.next_scene(node)),
            "prevScene" => self.call_without_args("prevScene", args, |stage| stage.prev_scene(node)),
            "addFrameScript" => {
                if args.len() < 2 || args.len() % 2 != 0 {
                    return Err(TimelineError::InvalidArgumentCount {
                        method: "addFrameScript",
                        expected: "an even number, at least 2",
                        got: args.len(),
                    });
                }
                for pair in args.chunks_exact(2) {
                    let index = pair[0].coerce_number();
                    if !index.is_finite() || index < 0.0 || index > f64::from(u32::MAX) {
                        tracing::debug!(?node, index, "Ignoring frame script with invalid index");
                        continue;
                    }
                    match &pair[1] {
                        ScriptValue::Function(script) => {
                            self.add_shared_frame_script(node, index as u32, script.clone())?;
                        }
                        other => tracing::debug!(?node, value = ?other, "Ignoring non-function frame script"),
                    }
                }
                Ok(ScriptValue::Undefined)
            }
            "currentFrame" => Ok(self.current_frame(node)?.into()),
            "totalFrames" => Ok(self.total_frames(node)?.into()),
            "framesLoaded" => Ok(self.frames_loaded(node)?.into()),
            "currentLabel" => Ok(self.current_label(node)?.into()),
            "currentFrameLabel" => Ok(self.current_frame_label(node)?.into()),
            "isPlaying" => Ok(self.is_playing(node)?.into()),
            other => Err(TimelineError::UnknownMethod(other.to_string())),
        }
    }

    fn call_goto(&mut self, method: &'static str, node: NodeId, args: &[ScriptValue], play: bool) -> Result<ScriptValue> {
        expect_args(method, args, 1, 2, "1 or 2")?;
        let target = args[0].to_frame_target();
        let scene = args
            .get(1)
            .filter(|scene| !scene.is_nullish())
            .map(ScriptValue::coerce_string);
        if play {
            self.goto_and_play(node, target, scene.as_deref())?;
        } else {
            self.goto_and_stop(node, target, scene.as_deref())?;
        }
        Ok(ScriptValue::Undefined)
    }

    fn call_without_args(
        &mut self,
        method: &'static str,
        args: &[ScriptValue],
        call: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<ScriptValue> {
        expect_args(method, args, 0, 0, "0")?;
        call(self)?;
        Ok(ScriptValue::Undefined)
    }
}
