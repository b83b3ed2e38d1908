// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scenes and frame labels.
//!
//! Frames are addressed absolutely across the whole timeline, while labels
//! are stored relative to their scene. The index translates between the two.

use crate::error::{Result, TimelineError};
use serde::{Deserialize, Serialize};

/// A named frame within a scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLabel {
    /// Label name
    pub name: String,
    /// Frame number, 1-based and relative to the scene's first frame
    pub frame: u32,
}

impl FrameLabel {
    /// Create a new label
    pub fn new(name: impl Into<String>, frame: u32) -> Self {
        Self {
            name: name.into(),
            frame,
        }
    }
}

/// A contiguous range of the timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// Scene name
    pub name: String,
    /// Absolute frames before this scene
    pub offset: u32,
    /// Number of frames in the scene
    pub num_frames: u32,
    /// Labels in non-decreasing frame order
    pub labels: Vec<FrameLabel>,
}

impl Scene {
    /// Create a new scene
    pub fn new(name: impl Into<String>, labels: Vec<FrameLabel>, offset: u32, num_frames: u32) -> Self {
        let mut labels = labels;
        labels.sort_by_key(|l| l.frame);
        Self {
            name: name.into(),
            offset,
            num_frames,
            labels,
        }
    }

    /// Whether the absolute frame lies in this scene
    pub fn covers(&self, frame: u32) -> bool {
        self.offset < frame && frame <= self.offset + self.num_frames
    }

    /// First label with the given name
    pub fn label(&self, name: &str) -> Option<&FrameLabel> {
        self.labels.iter().find(|l| l.name == name)
    }
}

/// Ordered scene table of one timeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneIndex {
    scenes: Vec<Scene>,
}

impl SceneIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Index with one unnamed scene covering the whole timeline
    pub fn single(labels: Vec<FrameLabel>, total_frames: u32) -> Self {
        let mut index = Self::new();
        index.add_scene("", labels, 0, total_frames);
        index
    }

    /// Append a scene. Authoring time only.
    pub fn add_scene(&mut self, name: impl Into<String>, labels: Vec<FrameLabel>, offset: u32, num_frames: u32) {
        self.scenes.push(Scene::new(name, labels, offset, num_frames));
    }

    /// Add a label at an absolute frame to the scene covering it. Authoring time only.
    pub fn add_frame_label(&mut self, name: impl Into<String>, frame: u32) -> Result<()> {
        let scene = self
            .scenes
            .iter_mut()
            .find(|s| s.covers(frame))
            .ok_or(TimelineError::NoCoveringScene(frame))?;
        let relative = frame - scene.offset;
        let at = scene.labels.partition_point(|l| l.frame <= relative);
        scene.labels.insert(at, FrameLabel::new(name, relative));
        Ok(())
    }

    /// All scenes in table order
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    /// Number of scenes
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Whether no scene is defined
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// The scene containing an absolute frame
    pub fn scene_for_frame(&self, frame: u32) -> Result<&Scene> {
        self.scenes
            .iter()
            .find(|s| s.covers(frame))
            .ok_or(TimelineError::NoCoveringScene(frame))
    }

    /// First scene with the given name
    pub fn scene_by_name(&self, name: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.name == name)
    }

    /// Label closest to, but not after, an absolute frame
    pub fn label_before_or_at(&self, frame: u32) -> Option<&FrameLabel> {
        let mut found = None;
        for scene in &self.scenes {
            if scene.offset > frame {
                return found;
            }
            for label in &scene.labels {
                if label.frame > frame - scene.offset {
                    return found;
                }
                found = Some(label);
            }
        }
        found
    }

    /// Label placed exactly on an absolute frame
    pub fn label_at(&self, frame: u32) -> Option<&FrameLabel> {
        let scene = self.scene_for_frame(frame).ok()?;
        self.label_before_or_at(frame)
            .filter(|l| scene.offset + l.frame == frame)
    }

    /// Check that the scenes partition `[1, total_frames]`
    pub fn validate(&self, total_frames: u32) -> Result<()> {
        let mut scenes: Vec<&Scene> = self.scenes.iter().collect();
        scenes.sort_by_key(|s| s.offset);

        let mut expected_offset = 0;
        for scene in scenes {
            if scene.num_frames == 0 {
                return Err(TimelineError::InvalidTimeline(format!(
                    "scene {:?} has no frames",
                    scene.name
                )));
            }
            if scene.offset != expected_offset {
                return Err(TimelineError::NoCoveringScene(expected_offset + 1));
            }
            if let Some(label) = scene.labels.iter().find(|l| l.frame == 0 || l.frame > scene.num_frames) {
                return Err(TimelineError::InvalidTimeline(format!(
                    "label {:?} lies outside scene {:?}",
                    label.name, scene.name
                )));
            }
            expected_offset += scene.num_frames;
        }
        if expected_offset != total_frames {
            return Err(TimelineError::NoCoveringScene(expected_offset.min(total_frames) + 1));
        }
        Ok(())
    }
}
