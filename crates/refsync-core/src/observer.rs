//! A small generic publish/subscribe primitive.
//!
//! `notify` is synchronous and invokes every registered handler in
//! registration order, from whatever thread calls it. The site does not
//! provide its own thread-safety: the orchestrator is the only caller of
//! `notify`, always from its own driving task, so handlers never race each
//! other. A presentation layer that needs to hop to another execution
//! context (a UI thread, say) does that inside its own handler.

/// Opaque handle returned by [`ObserverSite::subscribe`], usable with
/// [`ObserverSite::unsubscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandlerId(u64);

pub struct ObserverSite<T> {
    next_id: u64,
    handlers: Vec<(HandlerId, Box<dyn Fn(&T) + Send + Sync>)>,
}

impl<T> Default for ObserverSite<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            handlers: Vec::new(),
        }
    }
}

impl<T> ObserverSite<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, returning an id that can later be passed to
    /// `unsubscribe`.
    pub fn subscribe<F>(&mut self, handler: F) -> HandlerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a single handler by id. Returns `true` if it was present.
    pub fn unsubscribe(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(hid, _)| *hid != id);
        self.handlers.len() != before
    }

    /// Remove every registered handler.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke every current handler, in registration order, with `value`.
    pub fn notify(&self, value: &T) {
        for (_, handler) in &self.handlers {
            handler(value);
        }
    }
}
