use crate::events::{EventSink, HostEventKind, ListenerId};
use crate::layer::{LayerCollection, LayerId, Visibility};

/// The map component the control is attached to.
///
/// The control never inspects the host's style directly; it only needs these
/// queries and mutations. Hosts deliver notifications by pushing
/// [`HostEventKind::event`] into the sink handed over at subscription time.
pub trait MapHost {
    /// Current layers in style order, or `None` when the host has no style yet.
    fn layers(&self) -> Option<LayerCollection>;

    fn set_visibility(&mut self, layer: &LayerId, visibility: Visibility);

    /// Whether the initial load has already completed.
    fn is_style_loaded(&self) -> bool;

    fn subscribe(&mut self, kind: HostEventKind, sink: EventSink) -> ListenerId;

    /// Like [`subscribe`](Self::subscribe), but the listener is dropped after
    /// its first delivery.
    fn subscribe_once(&mut self, kind: HostEventKind, sink: EventSink) -> ListenerId;

    /// Removes a listener. Unknown or already fired listeners are ignored.
    fn unsubscribe(&mut self, listener: ListenerId);
}
