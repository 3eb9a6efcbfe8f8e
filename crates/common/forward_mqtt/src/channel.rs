use std::sync::Arc;
use std::sync::Mutex;

/// A single-slot, replaceable hook. Only the most recently installed callback
/// fires; installing a new one does not affect a callback that is already
/// executing, matching the bus client's "no hook chaining" contract.
#[derive(Clone)]
pub struct Hook<T>(Arc<Mutex<Option<Arc<dyn Fn(T) + Send + Sync>>>>);

impl<T> Default for Hook<T> {
    fn default() -> Self {
        Hook(Arc::new(Mutex::new(None)))
    }
}

impl<T> Hook<T> {
    pub fn new() -> Hook<T> {
        Hook::default()
    }

    /// Replace the current callback, returning the one it displaced.
    pub fn install(
        &self,
        hook: impl Fn(T) + Send + Sync + 'static,
    ) -> Option<Arc<dyn Fn(T) + Send + Sync>> {
        let mut slot = self.0.lock().unwrap();
        slot.replace(Arc::new(hook))
    }

    /// Remove the current callback, restoring a previously displaced one if given.
    pub fn restore(&self, previous: Option<Arc<dyn Fn(T) + Send + Sync>>) {
        *self.0.lock().unwrap() = previous;
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().take();
    }

    /// Call the installed hook, if any, with the given event.
    pub fn fire(&self, event: T) {
        let hook = self.0.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    #[test]
    fn fires_the_installed_hook() {
        let hook: Hook<u32> = Hook::new();
        let seen = Arc::new(AtomicU32::new(0));
        let seen2 = seen.clone();
        hook.install(move |n| seen2.store(n, Ordering::SeqCst));

        hook.fire(42);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn replacing_a_hook_only_affects_future_fires() {
        let hook: Hook<u32> = Hook::new();
        let total = Arc::new(AtomicU32::new(0));

        let total_a = total.clone();
        hook.install(move |n| {
            total_a.fetch_add(n, Ordering::SeqCst);
        });
        hook.fire(1);

        let total_b = total.clone();
        hook.install(move |n| {
            total_b.fetch_add(n * 10, Ordering::SeqCst);
        });
        hook.fire(1);

        assert_eq!(total.load(Ordering::SeqCst), 1 + 10);
    }

    #[test]
    fn clearing_leaves_no_hook() {
        let hook: Hook<u32> = Hook::new();
        let fired = Arc::new(AtomicU32::new(0));
        let fired2 = fired.clone();
        hook.install(move |_| {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        hook.clear();
        hook.fire(1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
