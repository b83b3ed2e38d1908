// SPDX-License-Identifier: MIT OR Apache-2.0
//! Applying frame deltas to a clip's children.
//!
//! Moving forward replays the deltas between the current and the target
//! frame. Moving backward first reconciles the children with frame 1 and
//! then replays from there, so the result is the same as playing the
//! timeline from the start.

use crate::clip::MovieClip;
use crate::delta::{FrameAvailability, FrameDeltaStore};
use crate::error::{Result, TimelineError};
use crate::stage::Stage;
use ordoplay_stage::{Animatable, DepthChange, DisplayNode, NodeId, PlaceState, SymbolRef};
use std::rc::Rc;

impl Stage {
    /// Move a clip's cursor to its pending frame, restructuring its children
    pub(crate) fn advance_frame(&mut self, node: NodeId) -> Result<()> {
        let clip = self.expect_clip_mut(node)?;
        let current = clip.current_frame;
        let mut next = clip.next_frame;
        if next > clip.total_frames() {
            next = 1;
        }
        if current == next {
            clip.next_frame = next;
            return Ok(());
        }
        if next > clip.frames_loaded() {
            clip.next_frame = next;
            tracing::trace!(?node, next, loaded = clip.frames_loaded(), "Waiting for frame to load");
            return Ok(());
        }

        let definition = Rc::clone(&clip.definition);
        let frames = &definition.frames;
        let start = if next < current {
            self.rewind_children(node, frames)?;
            0
        } else {
            current
        };
        for index in start..next {
            self.apply_delta(node, frames, index)?;
        }

        let Some(clip) = self.clips.get_mut(&node) else {
            tracing::debug!(?node, "Clip removed while advancing");
            return Ok(());
        };
        if clip.has_frame_script(next) {
            self.scheduler.enqueue(node);
        }
        clip.current_frame = next;
        clip.next_frame = next;
        tracing::trace!(?node, from = current, to = next, "Advanced frame");
        Ok(())
    }

    /// Apply one loaded frame delta to `host`
    pub(crate) fn apply_delta(&mut self, host: NodeId, frames: &FrameDeltaStore, index: u32) -> Result<()> {
        let FrameAvailability::Available(delta) = frames.delta_at(index) else {
            return Err(TimelineError::InvalidTimeline(format!(
                "frame {} is not loaded",
                index + 1
            )));
        };
        for (depth, change) in delta.iter() {
            self.apply_depth_change(host, depth, change)?;
        }
        Ok(())
    }

    /// Drop children that frame 1 would not keep. Script-owned children
    /// survive unless frame 1 claims their depth.
    fn rewind_children(&mut self, host: NodeId, frames: &FrameDeltaStore) -> Result<()> {
        let FrameAvailability::Available(first) = frames.delta_at(0) else {
            return Err(TimelineError::InvalidTimeline("frame 1 is not loaded".into()));
        };
        for (depth, child) in self.tree.children_of(host) {
            let Some(node) = self.tree.node(child) else {
                continue;
            };
            let keep = match first.change_at(depth) {
                Some(DepthChange::Place(state)) => node.can_be_animated(state),
                Some(DepthChange::Remove) => false,
                None => !node.is_animated_by_timeline(),
            };
            if !keep {
                self.remove_timeline_child(host, child);
            }
        }
        Ok(())
    }

    fn apply_depth_change(&mut self, host: NodeId, depth: i32, change: &DepthChange) -> Result<()> {
        if let Some(child) = self.tree.child_at_depth(host, depth) {
            if let (DepthChange::Place(state), Some(node)) = (change, self.tree.node_mut(child)) {
                if node.can_be_animated(state) {
                    if let Some(symbol) = state.symbol.filter(|s| !s.is_dynamic()) {
                        node.set_static_content(&symbol);
                    }
                    node.animate(state);
                    return Ok(());
                }
            }
            self.remove_timeline_child(host, child);
        }

        match change {
            DepthChange::Place(state) => match state.symbol {
                Some(symbol) => self.place_child(host, depth, state, symbol),
                None => Ok(()),
            },
            DepthChange::Remove => Ok(()),
        }
    }

    /// Detach a child and clear its name binding. Nodes the timeline
    /// created are dropped with their subtree; script-owned nodes stay alive.
    fn remove_timeline_child(&mut self, host: NodeId, child: NodeId) {
        let Some((name, timeline_owned)) = self
            .tree
            .node(child)
            .map(|n| (n.name.clone(), n.is_animated_by_timeline()))
        else {
            return;
        };
        self.tree.detach(child);
        if let Some(name) = name {
            self.tree.unbind_name_if(host, &name, child);
        }
        if !timeline_owned {
            tracing::trace!(?host, ?child, "Released script-owned child");
            return;
        }
        for id in self.tree.remove_subtree(child) {
            self.clips.swap_remove(&id);
        }
    }

    /// Instantiate a placement's symbol at `depth` and construct it
    fn place_child(&mut self, host: NodeId, depth: i32, state: &PlaceState, symbol: SymbolRef) -> Result<()> {
        let timeline = match self.library.get(symbol.id) {
            Some(definition) => definition.timeline.clone(),
            None if self.config.strict_symbols => return Err(TimelineError::SymbolNotFound(symbol.id)),
            None => {
                tracing::warn!(?host, depth, symbol = ?symbol.id, "Skipping placement of unknown symbol");
                return Ok(());
            }
        };
        if self.places_own_ancestor(host, symbol) {
            tracing::warn!(?host, symbol = ?symbol.id, "Skipping recursive placement");
            return Ok(());
        }

        let child = self.tree.insert(DisplayNode::from_placement(state, &symbol));
        if let Err(error) = self.tree.add_child_at_depth(host, child, depth) {
            self.tree.remove_subtree(child);
            return Err(error.into());
        }
        if let Some(timeline) = timeline {
            self.clips.insert(child, MovieClip::new(timeline));
        }
        if let Some(name) = &state.name {
            self.tree.bind_name(host, name.clone(), child);
        }
        if symbol.legacy {
            match self.hooks.legacy.clone() {
                Some(runtime) => runtime.bind_child(self, host, child, state),
                None => tracing::debug!(?child, "No legacy runtime; placement left unbound"),
            }
        }
        self.construct_node(child)
    }

    /// Whether `symbol` already provides `host` or one of its ancestors
    fn places_own_ancestor(&self, host: NodeId, symbol: SymbolRef) -> bool {
        if !symbol.kind.has_timeline() {
            return false;
        }
        let mut current = Some(host);
        while let Some(id) = current {
            let Some(node) = self.tree.node(id) else {
                return false;
            };
            if node.symbol() == Some(symbol.id) {
                return true;
            }
            current = node.parent();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use crate::config::PlaybackConfig;
    use crate::delta::FrameDelta;
    use crate::error::TimelineError;
    use crate::stage::Stage;
    use crate::symbol::{Symbol, SymbolLibrary, TimelineDefinition};
    use crate::testing::{init_tracing, shape};
    use ordoplay_stage::{DisplayNode, Matrix, NodeContent, NodeId, PlaceState, SymbolId, SymbolKind, SymbolRef};

    fn library() -> SymbolLibrary {
        let inner = TimelineDefinition::with_empty_frames(3)
            .with_delta(0, FrameDelta::new().place(PlaceState::new(1, shape(10))));
        SymbolLibrary::new()
            .with(Symbol::new(10, SymbolKind::Shape))
            .with(Symbol::new(11, SymbolKind::Shape))
            .with(Symbol::new(12, SymbolKind::Bitmap))
            .with(Symbol::sprite(20, inner))
    }

    /// Frame 1: shape at depth 1. Frame 2: moved. Frame 3: swapped to
    /// another shape. Frame 4: removed, sprite placed at 2. Frame 5: bitmap at 2.
    fn timeline() -> TimelineDefinition {
        let sprite = SymbolRef::new(20, SymbolKind::Sprite);
        TimelineDefinition::with_empty_frames(5)
            .with_delta(0, FrameDelta::new().place(PlaceState::new(1, shape(10)).with_name("body")))
            .with_delta(1, FrameDelta::new().place(PlaceState::modify(1).with_matrix(Matrix::translate(5.0, 0.0))))
            .with_delta(2, FrameDelta::new().place(PlaceState::new(1, shape(11))))
            .with_delta(3, FrameDelta::new().remove(1).place(PlaceState::new(2, sprite).with_name("walker")))
            .with_delta(4, FrameDelta::new().place(PlaceState::new(2, SymbolRef::new(12, SymbolKind::Bitmap))))
    }

    fn stage() -> Stage {
        init_tracing();
        Stage::new(timeline(), library(), PlaybackConfig::default()).unwrap()
    }

    fn snapshot(stage: &Stage) -> Vec<(i32, Option<SymbolId>, Matrix)> {
        stage
            .tree()
            .children_of(stage.root())
            .into_iter()
            .map(|(depth, id)| {
                let node = stage.node(id).unwrap();
                (depth, node.symbol(), node.matrix())
            })
            .collect()
    }

    #[test]
    fn test_forward_replay_animates_in_place() {
        let mut stage = stage();
        let root = stage.root();
        let body = stage.child_by_name(root, "body").unwrap();

        stage.goto_and_stop(root, 3, None).unwrap();
        assert_eq!(stage.child_at_depth(root, 1), Some(body));
        let node = stage.node(body).unwrap();
        assert_eq!(node.symbol(), Some(SymbolId(11)));
        assert_eq!(node.matrix().tx, 5.0);
    }

    #[test]
    fn test_remove_and_nested_construction() {
        let mut stage = stage();
        let root = stage.root();
        stage.goto_and_stop(root, 4, None).unwrap();

        assert_eq!(stage.child_at_depth(root, 1), None);
        assert_eq!(stage.child_by_name(root, "body"), None);
        let walker = stage.child_by_name(root, "walker").unwrap();
        assert!(stage.node(walker).unwrap().is_constructed());
        assert_eq!(stage.current_frame(walker).unwrap(), 1);
        let grandchild = stage.child_at_depth(walker, 1).unwrap();
        assert!(stage.node(grandchild).unwrap().is_constructed());
    }

    #[test]
    fn test_kind_change_replaces_child() {
        let mut stage = stage();
        let root = stage.root();
        stage.goto_and_stop(root, 4, None).unwrap();
        let walker = stage.child_at_depth(root, 2).unwrap();
        let grandchild = stage.child_at_depth(walker, 1).unwrap();

        stage.goto_and_stop(root, 5, None).unwrap();
        let bitmap = stage.child_at_depth(root, 2).unwrap();
        assert_ne!(walker, bitmap);
        assert!(stage.node(walker).is_none());
        assert!(stage.node(grandchild).is_none());
        assert!(stage.clip(walker).is_none());
        assert_eq!(stage.child_by_name(root, "walker"), None);
        assert_eq!(stage.node(bitmap).unwrap().symbol(), Some(SymbolId(12)));
    }

    #[test]
    fn test_goto_applies_traversed_frames() {
        init_tracing();
        let timeline = TimelineDefinition::with_empty_frames(5)
            .with_delta(2, FrameDelta::new().place(PlaceState::new(1, shape(10))));
        let mut stage = Stage::new(timeline, library(), PlaybackConfig::default()).unwrap();
        let root = stage.root();
        assert_eq!(stage.child_at_depth(root, 1), None);

        stage.goto_and_stop(root, 4, None).unwrap();
        assert!(stage.child_at_depth(root, 1).is_some());
        assert_eq!(stage.current_frame(root).unwrap(), 4);
        assert!(!stage.is_playing(root).unwrap());
    }

    #[test]
    fn test_rewind_matches_fresh_playback() {
        let mut replayed = stage();
        let root = replayed.root();
        replayed.goto_and_stop(root, 5, None).unwrap();
        replayed.goto_and_stop(root, 2, None).unwrap();

        let mut fresh = stage();
        let fresh_root = fresh.root();
        fresh.goto_and_stop(fresh_root, 2, None).unwrap();

        assert_eq!(snapshot(&replayed), snapshot(&fresh));
        assert!(replayed.child_by_name(root, "walker").is_none());
        assert!(replayed.child_by_name(root, "body").is_some());
    }

    #[test]
    fn test_rewind_keeps_script_owned_children() {
        let mut stage = stage();
        let root = stage.root();
        stage.goto_and_stop(root, 3, None).unwrap();
        let extra = stage.create_node(DisplayNode::new(NodeContent::Container));
        stage.add_child_at_depth(root, extra, 50).unwrap();

        stage.goto_and_stop(root, 1, None).unwrap();
        assert_eq!(stage.child_at_depth(root, 50), Some(extra));
    }

    #[test]
    fn test_script_mutated_child_is_replaced() {
        let mut stage = stage();
        let root = stage.root();
        let body = stage.child_by_name(root, "body").unwrap();
        stage.node_mut(body).unwrap().set_matrix(Matrix::translate(1.0, 1.0));

        stage.goto_and_stop(root, 3, None).unwrap();
        let replacement = stage.child_at_depth(root, 1).unwrap();
        assert_ne!(replacement, body);
        let released = stage.node(body).unwrap();
        assert_eq!(released.parent(), None);
        assert_eq!(stage.child_by_name(root, "body"), None);
    }

    #[test]
    fn test_readded_child_leaves_timeline_control() {
        let mut stage = stage();
        let root = stage.root();
        let body = stage.child_by_name(root, "body").unwrap();
        assert!(stage.remove_child(body));
        stage.add_child_at_depth(root, body, 1).unwrap();
        assert!(!stage.node(body).unwrap().is_animated_by_timeline());

        stage.goto_and_stop(root, 2, None).unwrap();
        let node = stage.node(body).unwrap();
        assert_eq!(node.matrix().tx, 0.0);
        assert_eq!(node.parent(), None);
        assert_eq!(stage.child_at_depth(root, 1), None);

        stage.goto_and_stop(root, 1, None).unwrap();
        let placed = stage.child_at_depth(root, 1).unwrap();
        assert_ne!(placed, body);
        assert!(stage.node(placed).unwrap().is_animated_by_timeline());
    }

    #[test]
    fn test_replaced_script_child_stays_alive() {
        init_tracing();
        let timeline = TimelineDefinition::with_empty_frames(2)
            .with_delta(1, FrameDelta::new().place(PlaceState::new(1, shape(10))));
        let mut stage = Stage::new(timeline, library(), PlaybackConfig::default()).unwrap();
        let root = stage.root();
        let container = stage.create_node(DisplayNode::new(NodeContent::Container));
        let inner = stage.create_node(DisplayNode::new(NodeContent::Container));
        stage.add_child_at_depth(root, container, 1).unwrap();
        assert_eq!(stage.add_child(container, inner).unwrap(), 0);

        stage.goto_and_stop(root, 2, None).unwrap();
        let shape_node = stage.child_at_depth(root, 1).unwrap();
        assert_ne!(shape_node, container);
        assert_eq!(stage.node(container).unwrap().parent(), None);
        assert_eq!(stage.child_at_depth(container, 0), Some(inner));
    }

    #[test]
    fn test_idempotent_goto() {
        let mut stage = stage();
        let root = stage.root();
        stage.goto_and_stop(root, 4, None).unwrap();
        let before = snapshot(&stage);
        let walker = stage.child_by_name(root, "walker");

        stage.goto_and_stop(root, 4, None).unwrap();
        assert_eq!(snapshot(&stage), before);
        assert_eq!(stage.child_by_name(root, "walker"), walker);
    }

    #[test]
    fn test_not_yet_loaded_waits() {
        init_tracing();
        let mut root = TimelineDefinition::new(3);
        root.frames.push(FrameDelta::new().place(PlaceState::new(1, shape(10))));
        let mut stage = Stage::new(root, library(), PlaybackConfig::default()).unwrap();
        let root = stage.root();

        stage.tick().unwrap();
        assert_eq!(stage.clip(root).unwrap().current_frame_absolute(), 1);
        assert_eq!(stage.clip(root).unwrap().next_frame(), 2);

        stage.tick().unwrap();
        assert_eq!(stage.clip(root).unwrap().next_frame(), 2);

        assert!(stage
            .append_frame(root, FrameDelta::new().place(PlaceState::new(2, shape(11))))
            .unwrap());
        stage.tick().unwrap();
        assert_eq!(stage.current_frame(root).unwrap(), 2);
        assert!(stage.child_at_depth(root, 2).is_some());
    }

    #[test]
    fn test_root_waits_for_first_frame() {
        init_tracing();
        let mut stage = Stage::new(TimelineDefinition::new(2), library(), PlaybackConfig::default()).unwrap();
        let root = stage.root();
        assert!(!stage.node(root).unwrap().is_constructed());

        stage.append_frame(root, FrameDelta::new().place(PlaceState::new(1, shape(10)))).unwrap();
        stage.tick().unwrap();
        assert!(stage.node(root).unwrap().is_constructed());
        assert!(stage.child_at_depth(root, 1).is_some());
    }

    #[test]
    fn test_unknown_symbol_skipped_or_rejected() {
        init_tracing();
        let timeline = TimelineDefinition::with_empty_frames(2)
            .with_delta(1, FrameDelta::new().place(PlaceState::new(1, shape(99))));

        let mut lenient = Stage::new(timeline.clone(), library(), PlaybackConfig::default()).unwrap();
        let root = lenient.root();
        lenient.goto_and_stop(root, 2, None).unwrap();
        assert_eq!(lenient.child_at_depth(root, 1), None);

        let config = PlaybackConfig {
            strict_symbols: true,
            ..Default::default()
        };
        let mut strict = Stage::new(timeline, library(), config).unwrap();
        let root = strict.root();
        assert!(matches!(
            strict.goto_and_stop(root, 2, None),
            Err(TimelineError::SymbolNotFound(SymbolId(99)))
        ));
    }

    #[test]
    fn test_recursive_sprite_not_placed() {
        init_tracing();
        let looping = SymbolRef::new(30, SymbolKind::Sprite);
        let inner = TimelineDefinition::with_empty_frames(1)
            .with_delta(0, FrameDelta::new().place(PlaceState::new(1, looping)));
        let library = SymbolLibrary::new().with(Symbol::sprite(30, inner.clone()));
        let stage = Stage::new(inner, library, PlaybackConfig::default()).unwrap();

        let outer: NodeId = stage.child_at_depth(stage.root(), 1).unwrap();
        assert_eq!(stage.child_at_depth(outer, 1), None);
    }
}
