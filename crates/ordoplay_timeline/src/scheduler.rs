// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame-script queue and the drain loop.

use crate::error::{Result, TimelineError};
use crate::hooks::{FrameEvent, TelemetryEvent};
use crate::stage::Stage;
use ordoplay_stage::NodeId;
use std::collections::VecDeque;

/// FIFO of clips whose current frame has a script to run
#[derive(Debug, Clone, Default)]
pub struct FrameScheduler {
    queue: VecDeque<NodeId>,
}

impl FrameScheduler {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a clip. A clip may be queued more than once.
    pub fn enqueue(&mut self, node: NodeId) {
        self.queue.push_back(node);
    }

    /// Take the oldest queued clip
    pub fn dequeue(&mut self) -> Option<NodeId> {
        self.queue.pop_front()
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queued clips in run order
    pub fn pending(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.queue.iter().copied()
    }
}

impl Stage {
    /// Run queued frame scripts until the queue is empty, including clips
    /// queued while draining, then broadcast exit-frame. A failing script
    /// stops its clip and does not prevent the others from running; the
    /// first failure is returned.
    pub fn execute_and_exit_frame(&mut self) -> Result<()> {
        let mut first_failure = None;

        while let Some(node) = self.scheduler.dequeue() {
            let Some(clip) = self.clips.get_mut(&node) else {
                tracing::debug!(?node, "Skipping queued clip that no longer exists");
                continue;
            };
            clip.allow_frame_navigation = false;
            let frame = clip.current_frame;

            let mut result = self.call_frame(node, frame);

            if let Some(clip) = self.clips.get_mut(&node) {
                clip.allow_frame_navigation = true;
                if result.is_ok() && clip.next_frame != clip.current_frame {
                    result = self
                        .advance_frame(node)
                        .and_then(|()| self.construct_node(node));
                }
            }

            if let Err(error) = result {
                match first_failure {
                    None => first_failure = Some(error),
                    Some(_) => tracing::error!(%error, "Additional failure while draining frame scripts"),
                }
            }
        }

        self.broadcast(FrameEvent::ExitFrame);
        first_failure.map_or(Ok(()), Err)
    }

    /// Run the script attached to an absolute frame of a clip
    pub(crate) fn call_frame(&mut self, node: NodeId, frame: u32) -> Result<()> {
        if self.config.ignore_frame_scripts {
            return Ok(());
        }
        let Some(script) = self.clips.get(&node).and_then(|clip| clip.frame_script(frame)) else {
            return Ok(());
        };

        tracing::trace!(?node, frame, "Running frame script");
        if let Err(error) = script(self, node) {
            self.hooks.telemetry.report(&TelemetryEvent::ScriptError {
                node,
                frame,
                message: error.to_string(),
            });
            if let Some(clip) = self.clips.get_mut(&node) {
                clip.stop();
            }
            return Err(TimelineError::FrameScript {
                node,
                frame,
                source: Box::new(error),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaybackConfig;
    use crate::error::ScriptError;
    use crate::symbol::{Symbol, SymbolLibrary, TimelineDefinition};
    use crate::testing::{init_tracing, RecordingTelemetry};
    use ordoplay_stage::SymbolId;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn stage(total: u32) -> Stage {
        init_tracing();
        let library = SymbolLibrary::new().with(Symbol::sprite(1, TimelineDefinition::with_empty_frames(3)));
        Stage::new(TimelineDefinition::with_empty_frames(total), library, PlaybackConfig::default()).unwrap()
    }

    fn record(stage: &mut Stage, node: NodeId, frame_index: u32, log: &Log, entry: &str) {
        let log = Rc::clone(log);
        let entry = entry.to_string();
        stage
            .add_frame_script(node, frame_index, move |_, _| {
                log.borrow_mut().push(entry.clone());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_queue_order() {
        let mut scheduler = FrameScheduler::new();
        let a = NodeId::new();
        let b = NodeId::new();
        scheduler.enqueue(a);
        scheduler.enqueue(b);
        scheduler.enqueue(a);
        assert_eq!(scheduler.pending().collect::<Vec<_>>(), vec![a, b, a]);
        assert_eq!(scheduler.dequeue(), Some(a));
        assert_eq!(scheduler.len(), 2);
    }

    #[test]
    fn test_goto_skips_intermediate_scripts() {
        let mut stage = stage(5);
        let root = stage.root();
        let log = Log::default();
        record(&mut stage, root, 1, &log, "frame 2");
        record(&mut stage, root, 3, &log, "frame 4");

        stage.goto_and_stop(root, 4, None).unwrap();
        assert_eq!(log.borrow().as_slice(), &["frame 4"]);
        assert_eq!(stage.current_frame(root).unwrap(), 4);
        assert!(stage.scheduler().is_empty());
    }

    #[test]
    fn test_script_on_current_frame_runs_on_next_drain() {
        let mut stage = stage(3);
        let root = stage.root();
        let log = Log::default();
        record(&mut stage, root, 0, &log, "frame 1");
        assert_eq!(stage.scheduler().len(), 1);

        stage.execute_and_exit_frame().unwrap();
        assert_eq!(log.borrow().as_slice(), &["frame 1"]);
    }

    #[test]
    fn test_script_outside_timeline_ignored() {
        let mut stage = stage(3);
        let root = stage.root();
        let log = Log::default();
        record(&mut stage, root, 3, &log, "never");
        assert!(!stage.clip(root).unwrap().has_frame_script(4));
        assert!(stage.scheduler().is_empty());
    }

    #[test]
    fn test_replacing_script() {
        let mut stage = stage(3);
        let root = stage.root();
        let log = Log::default();
        record(&mut stage, root, 1, &log, "old");
        record(&mut stage, root, 1, &log, "new");
        stage.goto_and_stop(root, 2, None).unwrap();
        assert_eq!(log.borrow().as_slice(), &["new"]);
    }

    #[test]
    fn test_goto_inside_script_is_deferred() {
        let mut stage = stage(5);
        let root = stage.root();
        let log = Log::default();
        let seen = Rc::clone(&log);
        stage
            .add_frame_script(root, 1, move |stage, node| {
                stage.goto_and_stop(node, 4, None)?;
                let clip = stage.clip(node).ok_or_else(|| ScriptError::thrown("missing clip"))?;
                seen.borrow_mut()
                    .push(format!("{}->{}", clip.current_frame_absolute(), clip.next_frame()));
                Ok(())
            })
            .unwrap();
        record(&mut stage, root, 3, &log, "frame 4");

        stage.goto_and_play(root, 2, None).unwrap();
        assert_eq!(log.borrow().as_slice(), &["2->4", "frame 4"]);
        assert_eq!(stage.current_frame(root).unwrap(), 4);
        assert!(!stage.is_playing(root).unwrap());
    }

    #[test]
    fn test_nodes_queued_during_drain_run_in_same_drain() {
        let mut stage = stage(1);
        let root = stage.root();
        let child = stage.instantiate_symbol(SymbolId(1)).unwrap();
        stage.add_child(root, child).unwrap();
        let log = Log::default();

        let seen = Rc::clone(&log);
        let inner = Rc::clone(&log);
        stage
            .add_frame_script(root, 0, move |stage, _| {
                seen.borrow_mut().push("root".into());
                let inner = Rc::clone(&inner);
                stage.add_frame_script(child, 0, move |_, _| {
                    inner.borrow_mut().push("child".into());
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap();

        stage.execute_and_exit_frame().unwrap();
        assert_eq!(log.borrow().as_slice(), &["root", "child"]);
        assert!(stage.scheduler().is_empty());
    }

    #[test]
    fn test_double_enqueue_runs_twice() {
        let mut stage = stage(3);
        let root = stage.root();
        let log = Log::default();
        record(&mut stage, root, 0, &log, "a");
        record(&mut stage, root, 0, &log, "b");
        assert_eq!(stage.scheduler().len(), 2);

        stage.execute_and_exit_frame().unwrap();
        assert_eq!(log.borrow().as_slice(), &["b", "b"]);
    }

    #[test]
    fn test_failure_isolation() {
        let mut stage = stage(3);
        let root = stage.root();
        let telemetry = Rc::new(RecordingTelemetry::default());
        stage.set_telemetry(telemetry.clone());

        let child = stage.instantiate_symbol(SymbolId(1)).unwrap();
        stage.add_child(root, child).unwrap();
        stage.play(root).unwrap();
        stage.play(child).unwrap();

        stage
            .add_frame_script(root, 0, |_, _| Err(ScriptError::thrown("boom")))
            .unwrap();
        let log = Log::default();
        record(&mut stage, child, 0, &log, "child ran");
        stage
            .add_frame_script(child, 0, |_, _| Err(ScriptError::thrown("second")))
            .unwrap();

        let error = stage.execute_and_exit_frame().unwrap_err();
        match error {
            TimelineError::FrameScript { node, frame, source } => {
                assert_eq!(node, root);
                assert_eq!(frame, 1);
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!stage.is_playing(root).unwrap());
        assert!(!stage.is_playing(child).unwrap());
        assert_eq!(telemetry.events.borrow().len(), 3);
        assert!(stage.scheduler().is_empty());
    }

    #[test]
    fn test_failed_script_skips_its_pending_goto() {
        let mut stage = stage(5);
        let root = stage.root();
        let log = Log::default();
        record(&mut stage, root, 3, &log, "frame 4");
        stage
            .add_frame_script(root, 0, |stage, node| {
                stage.goto_and_stop(node, 4, None)?;
                Err(ScriptError::thrown("after goto"))
            })
            .unwrap();

        assert!(matches!(
            stage.execute_and_exit_frame(),
            Err(TimelineError::FrameScript { frame: 1, .. })
        ));
        let clip = stage.clip(root).unwrap();
        assert_eq!(clip.current_frame_absolute(), 1);
        assert_eq!(clip.next_frame(), 4);
        assert!(clip.allows_frame_navigation());
        assert!(clip.is_stopped());
        assert!(log.borrow().is_empty());
        assert!(stage.scheduler().is_empty());
    }

    #[test]
    fn test_ignore_frame_scripts() {
        init_tracing();
        let config = PlaybackConfig {
            ignore_frame_scripts: true,
            ..Default::default()
        };
        let mut stage = Stage::new(TimelineDefinition::with_empty_frames(2), SymbolLibrary::new(), config).unwrap();
        let root = stage.root();
        let log = Log::default();
        record(&mut stage, root, 0, &log, "skipped");
        stage.execute_and_exit_frame().unwrap();
        assert!(log.borrow().is_empty());
        assert!(stage.scheduler().is_empty());
    }

    #[test]
    fn test_removed_clip_is_skipped() {
        let mut stage = stage(1);
        let root = stage.root();
        let child = stage.instantiate_symbol(SymbolId(1)).unwrap();
        stage.add_child(root, child).unwrap();
        let log = Log::default();
        record(&mut stage, child, 0, &log, "child");
        stage.destroy(child);

        stage.execute_and_exit_frame().unwrap();
        assert!(log.borrow().is_empty());
    }
}
