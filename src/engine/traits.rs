//! Shared traits.

/// Display surface driven by the coordinator.
///
/// Every call happens on the event-loop thread, never from a worker.
pub trait Presenter {
    /// A task was admitted; show a loading affordance.
    fn show_loading(&mut self);

    /// First fragment is about to arrive; switch to live content.
    fn begin_stream(&mut self);

    fn append(&mut self, fragment: &str);

    /// The task's stream is over, successfully or not.
    fn end_stream(&mut self);

    /// The user dismissed the panel.
    fn withdraw(&mut self);
}
