//! Host events the engine reacts to.

/// Window notifications relevant to redrawing.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WindowEvent {
    Exposed,
    Restored,
    Shown,

    /// Anything the engine does not care about.
    Other,
}

/// Engine-internal timer events.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Event {
    Blink,
}

/// Peek/poll access to the host's event queue.
///
/// [`peep`](EventPump::peep) must not consume the event; the engine only
/// polls events it actually handles, leaving everything else queued for the
/// host.
pub trait EventPump {
    fn peep(&mut self) -> Option<WindowEvent>;

    fn poll(&mut self) -> Option<WindowEvent>;
}
