// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stage: the playback session.
//!
//! The stage owns the display tree, the timeline state of every clip in it,
//! the frame-script queue and the symbol library. All navigation goes through
//! it so that a goto can restructure the tree, construct new children and run
//! queued scripts in one call.

use crate::clip::{FrameScript, FrameTarget, MovieClip};
use crate::config::PlaybackConfig;
use crate::delta::FrameDelta;
use crate::error::{Result, ScriptError, TimelineError};
use crate::hooks::{FrameEvent, FrameListener, LegacyRuntime, ListenerId, StageHooks, Telemetry};
use crate::scene::{FrameLabel, Scene};
use crate::scheduler::FrameScheduler;
use crate::symbol::{ActionBlock, SymbolLibrary, TimelineDefinition};
use indexmap::IndexMap;
use ordoplay_stage::{DisplayNode, DisplayTree, NodeContent, NodeId, SymbolId, SymbolKind};
use std::fmt;
use std::rc::Rc;

/// Playback session rooted at a main timeline
pub struct Stage {
    pub(crate) tree: DisplayTree,
    pub(crate) clips: IndexMap<NodeId, MovieClip>,
    pub(crate) scheduler: FrameScheduler,
    pub(crate) library: Rc<SymbolLibrary>,
    pub(crate) config: PlaybackConfig,
    pub(crate) hooks: StageHooks,
    root: NodeId,
}

impl Stage {
    /// Create a stage whose root plays `root_timeline`
    pub fn new(
        root_timeline: TimelineDefinition,
        library: SymbolLibrary,
        config: PlaybackConfig,
    ) -> Result<Self> {
        Self::build(root_timeline, library, config, StageHooks::default())
    }

    /// Create a stage with a legacy runtime installed before the root is constructed
    pub fn with_legacy_runtime(
        root_timeline: TimelineDefinition,
        library: SymbolLibrary,
        config: PlaybackConfig,
        runtime: Rc<dyn LegacyRuntime>,
    ) -> Result<Self> {
        let hooks = StageHooks {
            legacy: Some(runtime),
            ..StageHooks::default()
        };
        Self::build(root_timeline, library, config, hooks)
    }

    fn build(
        root_timeline: TimelineDefinition,
        library: SymbolLibrary,
        config: PlaybackConfig,
        hooks: StageHooks,
    ) -> Result<Self> {
        root_timeline.validate()?;
        let total_frames = root_timeline.total_frames();

        let mut tree = DisplayTree::new();
        let root = tree.insert(DisplayNode::new(NodeContent::Symbol(SymbolKind::Sprite)).with_name("root"));
        let mut clips = IndexMap::new();
        clips.insert(root, MovieClip::new(Rc::new(root_timeline)));

        let mut stage = Self {
            tree,
            clips,
            scheduler: FrameScheduler::new(),
            library: Rc::new(library),
            config,
            hooks,
            root,
        };
        stage.construct_node(root)?;

        tracing::info!(total_frames, symbols = stage.library.len(), "Stage created");
        Ok(stage)
    }

    /// Root node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Display tree
    pub fn tree(&self) -> &DisplayTree {
        &self.tree
    }

    /// Get a display node
    pub fn node(&self, id: NodeId) -> Option<&DisplayNode> {
        self.tree.node(id)
    }

    /// Get a mutable display node
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut DisplayNode> {
        self.tree.node_mut(id)
    }

    /// Timeline state of a node
    pub fn clip(&self, id: NodeId) -> Option<&MovieClip> {
        self.clips.get(&id)
    }

    /// Mutable timeline state of a node
    pub fn clip_mut(&mut self, id: NodeId) -> Option<&mut MovieClip> {
        self.clips.get_mut(&id)
    }

    pub(crate) fn expect_clip(&self, id: NodeId) -> Result<&MovieClip> {
        self.clips.get(&id).ok_or(TimelineError::NotAMovieClip(id))
    }

    pub(crate) fn expect_clip_mut(&mut self, id: NodeId) -> Result<&mut MovieClip> {
        self.clips.get_mut(&id).ok_or(TimelineError::NotAMovieClip(id))
    }

    /// Symbol library
    pub fn library(&self) -> &SymbolLibrary {
        &self.library
    }

    /// Playback config
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Frame-script queue
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Install the runtime for legacy-bound placements
    pub fn set_legacy_runtime(&mut self, runtime: Rc<dyn LegacyRuntime>) {
        self.hooks.legacy = Some(runtime);
    }

    /// Replace the telemetry sink
    pub fn set_telemetry(&mut self, telemetry: Rc<dyn Telemetry>) {
        self.hooks.telemetry = telemetry;
    }

    /// Register a frame listener
    pub fn add_frame_listener(&mut self, listener: impl Fn(&mut Stage, FrameEvent) + 'static) -> ListenerId {
        let id = ListenerId::new();
        self.hooks.listeners.insert(id, Rc::new(listener));
        id
    }

    /// Remove a frame listener
    pub fn remove_frame_listener(&mut self, id: ListenerId) -> bool {
        self.hooks.listeners.shift_remove(&id).is_some()
    }

    pub(crate) fn broadcast(&mut self, event: FrameEvent) {
        let listeners: Vec<FrameListener> = self.hooks.listeners.values().cloned().collect();
        tracing::trace!(?event, listeners = listeners.len(), "Broadcasting frame event");
        for listener in listeners {
            listener(self, event);
        }
    }

    // Playback control

    /// Resume advancing a clip
    pub fn play(&mut self, node: NodeId) -> Result<()> {
        self.expect_clip_mut(node)?.play();
        Ok(())
    }

    /// Stop advancing a clip
    pub fn stop(&mut self, node: NodeId) -> Result<()> {
        self.expect_clip_mut(node)?.stop();
        Ok(())
    }

    /// Play, then go to a frame number or label
    pub fn goto_and_play(
        &mut self,
        node: NodeId,
        frame: impl Into<FrameTarget>,
        scene: Option<&str>,
    ) -> Result<()> {
        self.expect_clip_mut(node)?.play();
        self.goto_frame(node, &frame.into(), scene)
    }

    /// Stop, then go to a frame number or label
    pub fn goto_and_stop(
        &mut self,
        node: NodeId,
        frame: impl Into<FrameTarget>,
        scene: Option<&str>,
    ) -> Result<()> {
        self.expect_clip_mut(node)?.stop();
        self.goto_frame(node, &frame.into(), scene)
    }

    /// Stop and step one frame forward
    pub fn next_frame(&mut self, node: NodeId) -> Result<()> {
        let clip = self.expect_clip_mut(node)?;
        clip.stop();
        let target = i64::from(clip.current_frame) + 1;
        self.goto_frame_absolute(node, target)
    }

    /// Stop and step one frame back
    pub fn prev_frame(&mut self, node: NodeId) -> Result<()> {
        let clip = self.expect_clip_mut(node)?;
        clip.stop();
        let target = i64::from(clip.current_frame) - 1;
        self.goto_frame_absolute(node, target)
    }

    /// Go to the first frame of the following scene
    pub fn next_scene(&mut self, node: NodeId) -> Result<()> {
        let scene = self.expect_clip(node)?.current_scene()?;
        self.goto_frame_absolute(node, i64::from(scene.offset + scene.num_frames) + 1)
    }

    /// Go to the first frame of the preceding scene
    pub fn prev_scene(&mut self, node: NodeId) -> Result<()> {
        let clip = self.expect_clip(node)?;
        let scene = clip.current_scene()?;
        if scene.offset == 0 {
            return Ok(());
        }
        let previous = clip.scene_index().scene_for_frame(scene.offset)?;
        let target = i64::from(previous.offset) + 1;
        self.goto_frame_absolute(node, target)
    }

    /// Go to a frame number or label, optionally within a named scene
    pub fn goto_frame(&mut self, node: NodeId, target: &FrameTarget, scene: Option<&str>) -> Result<()> {
        let frame = self.expect_clip(node)?.resolve_goto(target, scene)?;
        self.goto_frame_absolute(node, frame)
    }

    /// Go to an absolute frame, clamped into the timeline. While one of the
    /// clip's own frame scripts runs, the move is deferred to the end of it.
    pub fn goto_frame_absolute(&mut self, node: NodeId, frame: i64) -> Result<()> {
        let clip = self.expect_clip_mut(node)?;
        let frame = frame.clamp(1, i64::from(clip.total_frames())) as u32;
        if frame == clip.next_frame {
            return Ok(());
        }
        clip.next_frame = frame;
        tracing::trace!(?node, frame, deferred = !clip.allow_frame_navigation, "Goto frame");

        if clip.allow_frame_navigation {
            self.advance_frame(node)?;
            self.construct_frame()?;
            self.execute_and_exit_frame()?;
        }
        Ok(())
    }

    // Scripts and authoring

    /// Attach a script to a 0-based frame index, replacing any existing one
    pub fn add_frame_script<F>(&mut self, node: NodeId, frame_index: u32, script: F) -> Result<()>
    where
        F: Fn(&mut Stage, NodeId) -> std::result::Result<(), ScriptError> + 'static,
    {
        self.add_shared_frame_script(node, frame_index, Rc::new(script))
    }

    /// Attach an already shared script to a 0-based frame index
    pub fn add_shared_frame_script(&mut self, node: NodeId, frame_index: u32, script: FrameScript) -> Result<()> {
        let clip = self.expect_clip_mut(node)?;
        let frame = frame_index.saturating_add(1);
        if frame > clip.total_frames() {
            tracing::debug!(?node, frame_index, "Ignoring frame script outside timeline");
            return Ok(());
        }
        clip.set_frame_script(frame, script);
        if frame == clip.current_frame {
            self.scheduler.enqueue(node);
        }
        Ok(())
    }

    /// Queue a block of legacy actions on a 0-based frame index
    pub fn add_legacy_frame_actions(&mut self, node: NodeId, frame_index: u32, block: ActionBlock) -> Result<()> {
        let frame = frame_index.saturating_add(1);
        if self.expect_clip_mut(node)?.push_legacy_actions(frame, block) {
            self.add_frame_script(node, frame_index, Self::run_legacy_actions)?;
        }
        Ok(())
    }

    fn run_legacy_actions(&mut self, node: NodeId) -> std::result::Result<(), ScriptError> {
        let Some(runtime) = self.hooks.legacy.clone() else {
            tracing::warn!(?node, "No legacy runtime installed; skipping frame actions");
            return Ok(());
        };
        let clip = self.expect_clip(node)?;
        let blocks = clip.legacy_actions_at(clip.current_frame).to_vec();
        for block in &blocks {
            runtime.execute_actions(self, node, block)?;
        }
        Ok(())
    }

    /// Append a scene to a clip's scene table
    pub fn add_scene(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        labels: Vec<FrameLabel>,
        offset: u32,
        num_frames: u32,
    ) -> Result<()> {
        self.expect_clip_mut(node)?.scenes.add_scene(name, labels, offset, num_frames);
        Ok(())
    }

    /// Label an absolute frame of a clip
    pub fn add_frame_label(&mut self, node: NodeId, name: impl Into<String>, frame: u32) -> Result<()> {
        self.expect_clip_mut(node)?.scenes.add_frame_label(name, frame)
    }

    /// Append the next streamed frame to a clip. Returns false past the last frame.
    pub fn append_frame(&mut self, node: NodeId, delta: FrameDelta) -> Result<bool> {
        let clip = self.expect_clip_mut(node)?;
        let accepted = Rc::make_mut(&mut clip.definition).frames.push(delta);
        tracing::trace!(?node, loaded = clip.frames_loaded(), "Appended frame");
        Ok(accepted)
    }

    // Readers

    /// Current frame, relative to the current scene
    pub fn current_frame(&self, node: NodeId) -> Result<u32> {
        Ok(self.expect_clip(node)?.current_frame())
    }

    /// Total frames
    pub fn total_frames(&self, node: NodeId) -> Result<u32> {
        Ok(self.expect_clip(node)?.total_frames())
    }

    /// Frames loaded so far
    pub fn frames_loaded(&self, node: NodeId) -> Result<u32> {
        Ok(self.expect_clip(node)?.frames_loaded())
    }

    /// Label at or before the current frame
    pub fn current_label(&self, node: NodeId) -> Result<Option<String>> {
        Ok(self.expect_clip(node)?.current_label())
    }

    /// Label exactly on the current frame
    pub fn current_frame_label(&self, node: NodeId) -> Result<Option<String>> {
        Ok(self.expect_clip(node)?.current_frame_label())
    }

    /// Scene containing the current frame
    pub fn current_scene(&self, node: NodeId) -> Result<Scene> {
        self.expect_clip(node)?.current_scene()
    }

    /// All scenes of a clip
    pub fn scenes(&self, node: NodeId) -> Result<Vec<Scene>> {
        Ok(self.expect_clip(node)?.scenes())
    }

    /// Whether a clip advances on each tick
    pub fn is_playing(&self, node: NodeId) -> Result<bool> {
        Ok(self.expect_clip(node)?.is_playing())
    }

    // Script-owned tree operations

    /// Add a detached script-owned node
    pub fn create_node(&mut self, node: DisplayNode) -> NodeId {
        self.tree.insert(node)
    }

    /// Instantiate a library symbol as a detached script-owned node.
    /// Sprites get their own timeline, starting on frame 1.
    pub fn instantiate_symbol(&mut self, symbol: SymbolId) -> Result<NodeId> {
        let (kind, timeline) = self
            .library
            .get(symbol)
            .map(|s| (s.kind, s.timeline.clone()))
            .ok_or(TimelineError::SymbolNotFound(symbol))?;

        let id = self.tree.insert(DisplayNode::from_symbol(symbol, kind));
        if let Some(timeline) = timeline {
            self.clips.insert(id, MovieClip::new(timeline));
        }
        self.construct_node(id)?;
        Ok(id)
    }

    /// Attach `child` above the host's existing children.
    /// The child is script-owned from now on.
    pub fn add_child(&mut self, host: NodeId, child: NodeId) -> Result<i32> {
        let depth = self.tree.add_child(host, child)?;
        self.release_from_timeline(child);
        self.construct_node(child)?;
        Ok(depth)
    }

    /// Attach `child` to the host at `depth`
    pub fn add_child_at_depth(&mut self, host: NodeId, child: NodeId, depth: i32) -> Result<()> {
        self.tree.add_child_at_depth(host, child, depth)?;
        self.release_from_timeline(child);
        self.construct_node(child)?;
        Ok(())
    }

    /// Detach a node from its parent, keeping it alive
    pub fn remove_child(&mut self, child: NodeId) -> bool {
        let detached = self.tree.detach(child).is_some();
        self.release_from_timeline(child);
        detached
    }

    fn release_from_timeline(&mut self, child: NodeId) {
        if let Some(node) = self.tree.node_mut(child) {
            node.detach_from_timeline();
        }
    }

    /// Drop a node, its descendants and their timelines
    pub fn destroy(&mut self, node: NodeId) {
        for id in self.tree.remove_subtree(node) {
            self.clips.swap_remove(&id);
        }
    }

    /// Child of a host at a depth
    pub fn child_at_depth(&self, host: NodeId, depth: i32) -> Option<NodeId> {
        self.tree.child_at_depth(host, depth)
    }

    /// Child bound to a name on the host
    pub fn child_by_name(&self, host: NodeId, name: &str) -> Option<NodeId> {
        self.tree.child_by_name(host, name)
    }

    // Frame cycle

    /// Run one frame: advance every clip, construct new nodes, drain scripts
    pub fn tick(&mut self) -> Result<()> {
        for id in self.tree.descendants(self.root) {
            if self.tree.contains(id) {
                self.init_frame(id)?;
            }
        }
        self.construct_frame()?;
        self.execute_and_exit_frame()
    }

    /// Step a playing clip one frame, or retry a frame still waiting to load
    fn init_frame(&mut self, node: NodeId) -> Result<()> {
        let constructed = self.tree.node(node).is_some_and(DisplayNode::is_constructed);
        let Some(clip) = self.clips.get_mut(&node) else {
            return Ok(());
        };
        if clip.total_frames() <= 1 || !constructed {
            return Ok(());
        }
        if !clip.stopped && clip.next_frame == clip.current_frame {
            clip.next_frame += 1;
        }
        self.advance_frame(node)
    }

    /// Construct every node under the root that has not been constructed yet
    pub fn construct_frame(&mut self) -> Result<()> {
        self.construct_node(self.root)
    }

    /// Construct `id` if needed, then its descendants
    pub(crate) fn construct_node(&mut self, id: NodeId) -> Result<()> {
        let waiting_for_frames = self.clips.get(&id).is_some_and(|clip| clip.frames_loaded() == 0);
        let newly_constructed = match self.tree.node_mut(id) {
            Some(node) if !waiting_for_frames => node.mark_constructed(),
            Some(_) => false,
            None => return Ok(()),
        };

        if newly_constructed {
            if let Some(clip) = self.clips.get(&id) {
                let definition = Rc::clone(&clip.definition);
                self.apply_delta(id, &definition.frames, 0)?;
                for (n, actions) in definition.frame_actions.iter().enumerate() {
                    let block = ActionBlock::new(
                        format!("frame_{}_actions_{}", actions.frame_index, n),
                        actions.bytes.clone(),
                    );
                    self.add_legacy_frame_actions(id, actions.frame_index, block)?;
                }
            }
            tracing::trace!(?id, "Constructed node");
        }

        for (_, child) in self.tree.children_of(id) {
            self.construct_node(child)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("root", &self.root)
            .field("nodes", &self.tree.node_count())
            .field("clips", &self.clips.len())
            .field("queued", &self.scheduler.len())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
