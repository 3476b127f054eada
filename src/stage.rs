//! The presentation surface media is attached to.
//!
//! A stage holds one container per slide, each with at most one visual
//! sub-container. The coordinator only talks to the `Stage` trait; `HeadlessStage`
//! is the in-memory implementation used by the binary and the tests.

use crate::media::RenderableHandle;
use crate::model::{MediaKind, SlideIndex};
use log::{debug, trace};
use std::collections::BTreeSet;
#[cfg(test)]
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Ready flag the hosting environment raises once slide containers exist.
#[derive(Clone, Debug, Default)]
pub struct ReadySignal(Arc<AtomicBool>);

impl ReadySignal {
    pub fn new(ready: bool) -> Self {
        Self(Arc::new(AtomicBool::new(ready)))
    }

    pub fn set_ready(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What a visual container holds once media is attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaNode {
    pub element_id: u64,
    pub kind: MediaKind,
    pub src: String,
}

impl From<&RenderableHandle> for MediaNode {
    fn from(handle: &RenderableHandle) -> Self {
        Self { element_id: handle.element_id(), kind: handle.kind(), src: handle.src().to_string() }
    }
}

/// Direction of a slide change, seen from the old slide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

pub trait Stage {
    fn is_ready(&self) -> bool;
    fn slide_count(&self) -> usize;
    fn has_visual(&self, index: SlideIndex) -> bool;
    /// Removes every child of the visual.
    fn clear_visual(&mut self, index: SlideIndex);
    /// Returns `false` if the node could not be placed.
    fn append_to_visual(&mut self, index: SlideIndex, node: MediaNode) -> bool;
    fn child_count(&self, index: SlideIndex) -> usize;
    fn add_class(&mut self, index: SlideIndex, class: &str);
    fn remove_class(&mut self, index: SlideIndex, class: &str);
    /// Starts the enter/exit treatment.
    fn begin_transition(&mut self, from: SlideIndex, to: SlideIndex, direction: Direction);
    fn finish_transition(&mut self, from: SlideIndex, to: SlideIndex);
}

#[derive(Debug, Default)]
struct Visual {
    children: Vec<MediaNode>,
    classes: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct SlideContainer {
    visual: Option<Visual>,
    active: bool,
    prev: bool,
}

/// In-memory stage.
#[derive(Debug, Default)]
pub struct HeadlessStage {
    ready: ReadySignal,
    slides: Vec<SlideContainer>,
    /// Remaining appends to refuse, per slide.
    #[cfg(test)]
    refuse_appends: HashMap<SlideIndex, u32>,
    #[cfg(test)]
    append_calls: HashMap<SlideIndex, u32>,
    transitioning: Option<(SlideIndex, SlideIndex)>,
}

impl HeadlessStage {
    /// A ready stage with `count` slides, each with a visual; slide 1 active.
    pub fn new(count: u32) -> Self {
        Self::pending(count, ReadySignal::new(true))
    }

    /// A stage whose readiness follows `ready`.
    pub fn pending(count: u32, ready: ReadySignal) -> Self {
        let mut slides: Vec<SlideContainer> = (0..count)
            .map(|_| SlideContainer { visual: Some(Visual::default()), ..Default::default() })
            .collect();
        if let Some(first) = slides.first_mut() {
            first.active = true;
        }
        Self { ready, slides, ..Default::default() }
    }

    /// A handle the host raises once the containers exist.
    pub fn ready_signal(&self) -> ReadySignal {
        self.ready.clone()
    }

    /// Drops the visual sub-container of a slide.
    #[cfg(test)]
    pub fn remove_visual(&mut self, index: SlideIndex) {
        if let Some(slide) = self.slot_mut(index) {
            slide.visual = None;
        }
    }

    /// Makes the next `times` appends to `index` fail.
    #[cfg(test)]
    pub fn refuse_appends(&mut self, index: SlideIndex, times: u32) {
        self.refuse_appends.insert(index, times);
    }

    #[cfg(test)]
    pub fn append_calls(&self, index: SlideIndex) -> u32 {
        self.append_calls.get(&index).copied().unwrap_or(0)
    }

    /// Nodes currently in the slide's visual.
    pub fn children(&self, index: SlideIndex) -> &[MediaNode] {
        self.visual(index).map(|v| v.children.as_slice()).unwrap_or(&[])
    }

    /// Whether the slide's visual carries `class`.
    pub fn has_class(&self, index: SlideIndex, class: &str) -> bool {
        self.visual(index).is_some_and(|v| v.classes.contains(class))
    }

    /// Whether the slide is the one on screen.
    pub fn is_active(&self, index: SlideIndex) -> bool {
        self.slot(index).is_some_and(|s| s.active)
    }

    /// Whether the slide was the one most recently left.
    pub fn is_prev(&self, index: SlideIndex) -> bool {
        self.slot(index).is_some_and(|s| s.prev)
    }

    /// The `(from, to)` pair of a treatment that has started but not finished.
    pub fn transitioning(&self) -> Option<(SlideIndex, SlideIndex)> {
        self.transitioning
    }

    /// Counts the append and consumes one scripted refusal, if any remain.
    #[cfg(test)]
    fn refuses_append(&mut self, index: SlideIndex) -> bool {
        *self.append_calls.entry(index).or_insert(0) += 1;
        match self.refuse_appends.get_mut(&index) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    #[cfg(not(test))]
    fn refuses_append(&mut self, _index: SlideIndex) -> bool {
        false
    }

    fn slot(&self, index: SlideIndex) -> Option<&SlideContainer> {
        self.slides.get(index.get() as usize - 1)
    }

    fn slot_mut(&mut self, index: SlideIndex) -> Option<&mut SlideContainer> {
        self.slides.get_mut(index.get() as usize - 1)
    }

    fn visual(&self, index: SlideIndex) -> Option<&Visual> {
        self.slot(index).and_then(|s| s.visual.as_ref())
    }

    fn visual_mut(&mut self, index: SlideIndex) -> Option<&mut Visual> {
        self.slot_mut(index).and_then(|s| s.visual.as_mut())
    }
}

impl Stage for HeadlessStage {
    fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    fn slide_count(&self) -> usize {
        if self.is_ready() { self.slides.len() } else { 0 }
    }

    fn has_visual(&self, index: SlideIndex) -> bool {
        self.is_ready() && self.visual(index).is_some()
    }

    fn clear_visual(&mut self, index: SlideIndex) {
        if let Some(visual) = self.visual_mut(index) {
            visual.children.clear();
        }
    }

    fn append_to_visual(&mut self, index: SlideIndex, node: MediaNode) -> bool {
        if self.refuses_append(index) {
            debug!("Refusing append of element #{} to slide {}", node.element_id, index);
            return false;
        }
        match self.visual_mut(index) {
            Some(visual) => {
                trace!("Appending element #{} to slide {}", node.element_id, index);
                visual.children.push(node);
                true
            }
            None => false,
        }
    }

    fn child_count(&self, index: SlideIndex) -> usize {
        self.visual(index).map_or(0, |v| v.children.len())
    }

    fn add_class(&mut self, index: SlideIndex, class: &str) {
        if let Some(visual) = self.visual_mut(index) {
            visual.classes.insert(class.to_string());
        }
    }

    fn remove_class(&mut self, index: SlideIndex, class: &str) {
        if let Some(visual) = self.visual_mut(index) {
            visual.classes.remove(class);
        }
    }

    fn begin_transition(&mut self, from: SlideIndex, to: SlideIndex, direction: Direction) {
        trace!("Transition {} -> {} ({:?})", from, to, direction);
        for slide in self.slides.iter_mut() {
            slide.active = false;
            slide.prev = false;
        }
        if let Some(slide) = self.slot_mut(to) {
            slide.active = true;
        }
        self.transitioning = Some((from, to));
    }

    fn finish_transition(&mut self, from: SlideIndex, to: SlideIndex) {
        if let Some(slide) = self.slot_mut(from) {
            slide.prev = true;
        }
        trace!("Transition {} -> {} finished", from, to);
        self.transitioning = None;
    }
}
