//! Typed subscriber list, ported from the original engine's
//! `Event<Signature>` (`common/event.hpp`): a vector of boxed callbacks
//! invoked in subscription order.
//!
//! The source identifies a delegate to remove by comparing a freshly
//! constructed delegate against the stored ones for equality, then deletes
//! the found delegate *after* erasing it from the vector — a use-after-free
//! in C++ since `erase` on a `Vector<Delegate*>` doesn't free the pointee,
//! but the pattern assumes the delete happens on the dangling copy. Rust
//! closures have no meaningful identity to compare, so `subscribe` instead
//! returns a `SubscriptionId` token; `unsubscribe` removes by token. This
//! sidesteps the hazard entirely: `Vec::remove` returns the removed `Box`
//! by value, so it drops only once it is already out of the vector.

pub struct SubscriptionId(u64);

pub struct Event<Args> {
    next_id: u64,
    callbacks: Vec<(u64, Box<dyn FnMut(&Args) + Send>)>,
}

impl<Args> Default for Event<Args> {
    fn default() -> Self {
        Self {
            next_id: 0,
            callbacks: Vec::new(),
        }
    }
}

impl<Args> Event<Args> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `callback`, invoked on every future `invoke`. Multiple
    /// subscriptions of equivalent closures are independent entries, as in
    /// the source ("method will be called multiple times").
    pub fn subscribe(&mut self, callback: impl FnMut(&Args) + Send + 'static) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        SubscriptionId(id)
    }

    /// Detaches the subscription identified by `id`. A no-op (not an error)
    /// if the id was already removed, mirroring the source's
    /// `Outcome::Failed` return on "no such delegate found".
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        if let Some(pos) = self.callbacks.iter().position(|(cid, _)| *cid == id.0) {
            self.callbacks.remove(pos);
            true
        } else {
            false
        }
    }

    /// Invokes every subscribed callback in subscription order.
    pub fn invoke(&mut self, args: &Args) {
        for (_, callback) in &mut self.callbacks {
            callback(args);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn invoke_calls_every_subscriber_in_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut event: Event<()> = Event::new();

        let o1 = order.clone();
        event.subscribe(move |_| o1.lock().unwrap().push(1));
        let o2 = order.clone();
        event.subscribe(move |_| o2.lock().unwrap().push(2));

        event.invoke(&());
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn unsubscribe_stops_future_invocations() {
        let count = Arc::new(AtomicU32::new(0));
        let mut event: Event<()> = Event::new();

        let c = count.clone();
        let id = event.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        event.invoke(&());
        assert!(event.unsubscribe(id));
        event.invoke(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_unknown_id_is_a_no_op() {
        let mut event: Event<()> = Event::new();
        let id = event.subscribe(|_| {});
        assert!(event.unsubscribe(id));
        // second unsubscribe of the same (now-consumed) slot never runs in
        // practice since SubscriptionId isn't Copy; a stale numeric id would
        // simply find nothing and return false.
        assert_eq!(event.len(), 0);
    }
}
