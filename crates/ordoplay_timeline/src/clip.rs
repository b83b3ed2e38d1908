// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-instance timeline state.
//!
//! A [`MovieClip`] is the timeline side of a display node: its frame cursor,
//! scene table, frame scripts and playback flags. The display side lives in
//! the stage tree; both are keyed by the same [`NodeId`].

use crate::error::{Result, ScriptError, TimelineError};
use crate::scene::{Scene, SceneIndex};
use crate::stage::Stage;
use crate::symbol::{ActionBlock, TimelineDefinition};
use ordoplay_stage::NodeId;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Script invoked when a clip enters a frame
pub type FrameScript = Rc<dyn Fn(&mut Stage, NodeId) -> std::result::Result<(), ScriptError>>;

/// Goto target: a frame number or a label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameTarget {
    /// Scene-relative frame number
    Number(i64),
    /// Label, or a string that reads as a frame number
    Name(String),
}

impl From<i64> for FrameTarget {
    fn from(frame: i64) -> Self {
        Self::Number(frame)
    }
}

impl From<i32> for FrameTarget {
    fn from(frame: i32) -> Self {
        Self::Number(i64::from(frame))
    }
}

impl From<u32> for FrameTarget {
    fn from(frame: u32) -> Self {
        Self::Number(i64::from(frame))
    }
}

impl From<&str> for FrameTarget {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for FrameTarget {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Timeline state of one display node
pub struct MovieClip {
    pub(crate) definition: Rc<TimelineDefinition>,
    pub(crate) scenes: SceneIndex,
    /// Absolute frame whose content is on display
    pub(crate) current_frame: u32,
    /// Absolute frame the next advance will move to
    pub(crate) next_frame: u32,
    pub(crate) frame_scripts: BTreeMap<u32, FrameScript>,
    pub(crate) legacy_actions: BTreeMap<u32, Vec<ActionBlock>>,
    pub(crate) is_playing: bool,
    pub(crate) stopped: bool,
    /// Cleared while one of this clip's frame scripts runs
    pub(crate) allow_frame_navigation: bool,
    enabled: bool,
    track_as_menu: bool,
}

impl MovieClip {
    /// Create a clip positioned on frame 1
    pub fn new(definition: Rc<TimelineDefinition>) -> Self {
        let scenes = definition.scene_index();
        Self {
            definition,
            scenes,
            current_frame: 1,
            next_frame: 1,
            frame_scripts: BTreeMap::new(),
            legacy_actions: BTreeMap::new(),
            is_playing: false,
            stopped: false,
            allow_frame_navigation: true,
            enabled: true,
            track_as_menu: false,
        }
    }

    /// Timeline definition
    pub fn definition(&self) -> &Rc<TimelineDefinition> {
        &self.definition
    }

    /// Total frames
    pub fn total_frames(&self) -> u32 {
        self.definition.total_frames()
    }

    /// Frames loaded so far
    pub fn frames_loaded(&self) -> u32 {
        self.definition.frames.frames_loaded()
    }

    /// Current frame, relative to the current scene
    pub fn current_frame(&self) -> u32 {
        self.scenes
            .scene_for_frame(self.current_frame)
            .map_or(self.current_frame, |scene| self.current_frame - scene.offset)
    }

    /// Current frame across all scenes
    pub fn current_frame_absolute(&self) -> u32 {
        self.current_frame
    }

    /// Pending frame for the next advance
    pub fn next_frame(&self) -> u32 {
        self.next_frame
    }

    /// Whether the clip advances on each tick
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Whether the clip was stopped explicitly
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Whether gotos take effect immediately
    pub fn allows_frame_navigation(&self) -> bool {
        self.allow_frame_navigation
    }

    /// Scene containing the current frame
    pub fn current_scene(&self) -> Result<Scene> {
        self.scenes.scene_for_frame(self.current_frame).cloned()
    }

    /// All scenes
    pub fn scenes(&self) -> Vec<Scene> {
        self.scenes.scenes().to_vec()
    }

    /// Scene table
    pub fn scene_index(&self) -> &SceneIndex {
        &self.scenes
    }

    /// Label at or before the current frame
    pub fn current_label(&self) -> Option<String> {
        self.scenes
            .label_before_or_at(self.current_frame)
            .map(|label| label.name.clone())
    }

    /// Label exactly on the current frame
    pub fn current_frame_label(&self) -> Option<String> {
        self.scenes.label_at(self.current_frame).map(|label| label.name.clone())
    }

    /// Button-mode enabled flag
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Set the button-mode enabled flag
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Button-mode menu tracking flag
    pub fn track_as_menu(&self) -> bool {
        self.track_as_menu
    }

    /// Set the button-mode menu tracking flag
    pub fn set_track_as_menu(&mut self, track_as_menu: bool) {
        self.track_as_menu = track_as_menu;
    }

    /// Resume advancing. Single-frame clips never play.
    pub fn play(&mut self) {
        self.is_playing = self.total_frames() > 1;
        self.stopped = false;
    }

    /// Stop advancing
    pub fn stop(&mut self) {
        self.is_playing = false;
        self.stopped = true;
    }

    /// Script attached to an absolute frame
    pub fn frame_script(&self, frame: u32) -> Option<FrameScript> {
        self.frame_scripts.get(&frame).cloned()
    }

    /// Whether a script is attached to an absolute frame
    pub fn has_frame_script(&self, frame: u32) -> bool {
        self.frame_scripts.contains_key(&frame)
    }

    pub(crate) fn set_frame_script(&mut self, frame: u32, script: FrameScript) {
        self.frame_scripts.insert(frame, script);
    }

    /// Queue a legacy block for a frame. Returns true for the frame's first block.
    pub(crate) fn push_legacy_actions(&mut self, frame: u32, block: ActionBlock) -> bool {
        let blocks = self.legacy_actions.entry(frame).or_default();
        blocks.push(block);
        blocks.len() == 1
    }

    pub(crate) fn legacy_actions_at(&self, frame: u32) -> &[ActionBlock] {
        self.legacy_actions.get(&frame).map_or(&[], Vec::as_slice)
    }

    /// Resolve a goto target to an absolute frame (not yet clamped)
    pub fn resolve_goto(&self, target: &FrameTarget, scene_name: Option<&str>) -> Result<i64> {
        let scene = match scene_name {
            Some(name) => self
                .scenes
                .scene_by_name(name)
                .ok_or_else(|| TimelineError::SceneNotFound(name.to_string()))?,
            None => self.scenes.scene_for_frame(self.current_frame)?,
        };

        let frame = match target {
            FrameTarget::Number(frame) => *frame,
            FrameTarget::Name(name) => match numeric_frame(name) {
                Some(frame) => frame,
                None => scene
                    .label(name)
                    .map(|label| i64::from(label.frame))
                    .ok_or_else(|| TimelineError::FrameLabelNotFound {
                        label: name.clone(),
                        scene: scene_name.map(str::to_string),
                    })?,
            },
        };
        Ok(i64::from(scene.offset).saturating_add(frame))
    }
}

impl fmt::Debug for MovieClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MovieClip")
            .field("current_frame", &self.current_frame)
            .field("next_frame", &self.next_frame)
            .field("total_frames", &self.total_frames())
            .field("frames_loaded", &self.frames_loaded())
            .field("is_playing", &self.is_playing)
            .field("stopped", &self.stopped)
            .field("allow_frame_navigation", &self.allow_frame_navigation)
            .field("frame_scripts", &self.frame_scripts.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A string names a frame number only when its integer-prefix parse equals
/// its full numeric conversion ("10" and "0x1F" do, "10a" and "1.5" do not).
/// Values past the `i64` range saturate and are clamped by the caller.
pub(crate) fn numeric_frame(text: &str) -> Option<i64> {
    let prefix = parse_int_prefix(text)?;
    let full = parse_number(text)?;
    (prefix == full).then_some(prefix as i64)
}

fn is_js_whitespace(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// Leading integer of `text`, decimal or `0x` hex, ignoring trailing garbage
fn parse_int_prefix(text: &str) -> Option<f64> {
    let text = text.trim_start_matches(is_js_whitespace);
    let (negative, text) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = match text.get(..2) {
        Some("0x" | "0X") => (16, &text[2..]),
        _ => (10, text),
    };

    let mut value: Option<f64> = None;
    for c in digits.chars() {
        let Some(digit) = c.to_digit(radix) else {
            break;
        };
        value = Some(value.unwrap_or(0.0) * f64::from(radix) + f64::from(digit));
    }
    value.map(|v| if negative { -v } else { v })
}

/// Full numeric conversion of `text`; `None` where the result is NaN
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim_matches(is_js_whitespace);
    if text.is_empty() {
        return Some(0.0);
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if hex.is_empty() {
            return None;
        }
        return hex
            .chars()
            .try_fold(0.0, |acc: f64, c| c.to_digit(16).map(|d| acc * 16.0 + f64::from(d)));
    }
    match text {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    if !text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return None;
    }
    text.parse::<f64>().ok()
}
