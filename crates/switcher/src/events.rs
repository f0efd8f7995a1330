use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::layer::LayerId;

/// Host notifications the control subscribes to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    /// The host's style (and therefore its layer collection) may have changed.
    StyleData,
    /// The host finished its initial load.
    Load,
}

impl HostEventKind {
    /// Event name used by MapLibre-style hosts.
    pub fn name(self) -> &'static str {
        match self {
            HostEventKind::StyleData => "styledata",
            HostEventKind::Load => "load",
        }
    }

    pub fn event(self) -> ControlEvent {
        match self {
            HostEventKind::StyleData => ControlEvent::StyleData,
            HostEventKind::Load => ControlEvent::Load,
        }
    }
}

/// Everything that can drive the control once it is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    StyleData,
    Load,
    /// The panel visibility toggle was activated.
    TogglePressed,
    /// A rendered item was activated.
    ItemPressed(LayerId),
    /// The thumbnail of an item failed to load.
    ImageFailed(LayerId),
    /// The deferred post-attach layout frame fired.
    LayoutFrame,
}

/// Host-assigned handle for a subscription.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

struct SinkInner {
    open: Cell<bool>,
    queue: RefCell<VecDeque<ControlEvent>>,
    waker: RefCell<Option<Rc<dyn Fn()>>>,
}

/// Inbox of one attachment.
///
/// Collaborators keep clones and push events into it; the control drains it in
/// order. Once closed, pushes are dropped, which turns every callback still
/// held by a collaborator into a no-op.
#[derive(Clone)]
pub struct EventSink {
    inner: Rc<SinkInner>,
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("open", &self.inner.open.get())
            .field("pending", &self.inner.queue.borrow().len())
            .finish()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SinkInner {
                open: Cell::new(true),
                queue: RefCell::new(VecDeque::new()),
                waker: RefCell::new(None),
            }),
        }
    }

    /// Installs a callback invoked after every accepted push.
    pub fn set_waker(&self, waker: Rc<dyn Fn()>) {
        *self.inner.waker.borrow_mut() = Some(waker);
    }

    /// Queues `event`. Returns `false` if the sink is closed.
    pub fn push(&self, event: ControlEvent) -> bool {
        if !self.inner.open.get() {
            return false;
        }
        self.inner.queue.borrow_mut().push_back(event);
        // Clone out so the waker may push again without a live borrow.
        let waker = self.inner.waker.borrow().clone();
        if let Some(wake) = waker {
            wake();
        }
        true
    }

    pub fn pop(&self) -> Option<ControlEvent> {
        if !self.inner.open.get() {
            return None;
        }
        self.inner.queue.borrow_mut().pop_front()
    }

    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.get()
    }

    /// Closes the sink, drops queued events and the waker.
    pub fn close(&self) {
        self.inner.open.set(false);
        self.inner.queue.borrow_mut().clear();
        self.inner.waker.borrow_mut().take();
    }

    /// True when both handles refer to the same inbox.
    pub fn same_sink(&self, other: &EventSink) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_push_order() {
        let sink = EventSink::new();
        assert!(sink.push(ControlEvent::Load));
        assert!(sink.push(ControlEvent::TogglePressed));
        assert_eq!(sink.pending(), 2);
        assert_eq!(sink.pop(), Some(ControlEvent::Load));
        assert_eq!(sink.pop(), Some(ControlEvent::TogglePressed));
        assert_eq!(sink.pop(), None);
    }

    #[test]
    fn closed_sink_drops_pushes() {
        let sink = EventSink::new();
        let held_by_callback = sink.clone();
        sink.push(ControlEvent::StyleData);
        sink.close();
        assert!(!held_by_callback.push(ControlEvent::LayoutFrame));
        assert_eq!(held_by_callback.pending(), 0);
        assert_eq!(sink.pop(), None);
    }

    #[test]
    fn waker_runs_after_each_accepted_push() {
        let sink = EventSink::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        sink.set_waker(Rc::new(move || counter.set(counter.get() + 1)));
        sink.push(ControlEvent::Load);
        sink.push(ControlEvent::StyleData);
        assert_eq!(hits.get(), 2);
        sink.close();
        sink.push(ControlEvent::Load);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn host_kinds_map_to_events() {
        assert_eq!(HostEventKind::StyleData.name(), "styledata");
        assert_eq!(HostEventKind::Load.event(), ControlEvent::Load);
    }
}
