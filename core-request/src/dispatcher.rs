//! Single-flight request dispatcher
//!
//! `dispatch` never waits. It resolves the descriptor, claims the target in
//! the in-flight registry and spawns the transport call on the current tokio
//! runtime. A second dispatch for a target that is still outstanding is
//! rejected rather than queued.
//!
//! When the fetch finishes, the registry entry is released and the busy
//! indicator (if any) is ended *before* the [`Completion`] is delivered, so
//! whoever receives it may dispatch the same target again right away.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use core_runtime::events::{CoreEvent, EventBus, RequestEvent};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::descriptor::{ResourceDescriptor, Target, TargetArgs};
use crate::endpoint::SearchEndpoint;
use crate::error::{RequestError, Result};
use crate::transport::Transport;

type Registry = Arc<Mutex<HashSet<Target>>>;

/// Outcome of one fetch, delivered exactly once per accepted dispatch.
#[derive(Debug)]
pub struct Completion {
    pub args: TargetArgs,
    pub target: Target,
    pub result: Result<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The descriptor is missing an argument needed to build a target.
    Unresolved,
    /// A fetch for this target is still outstanding.
    AlreadyInFlight(Target),
    /// `dispatch` was called outside a tokio runtime.
    NoRuntime,
}

#[derive(Debug)]
pub enum Dispatch {
    Accepted(Ticket),
    Rejected(RejectReason),
}

impl Dispatch {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Dispatch::Accepted(_))
    }

    pub fn into_ticket(self) -> Option<Ticket> {
        match self {
            Dispatch::Accepted(ticket) => Some(ticket),
            Dispatch::Rejected(_) => None,
        }
    }
}

/// Handle to an accepted fetch.
#[derive(Debug)]
pub struct Ticket {
    target: Target,
    args: TargetArgs,
    receiver: oneshot::Receiver<Completion>,
}

impl Ticket {
    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn args(&self) -> &TargetArgs {
        &self.args
    }

    /// Wait for the fetch to finish.
    ///
    /// If the fetch task dies without reporting, the completion carries
    /// [`RequestError::Abandoned`].
    pub async fn wait(self) -> Completion {
        match self.receiver.await {
            Ok(completion) => completion,
            Err(_) => Completion {
                args: self.args,
                target: self.target,
                result: Err(RequestError::Abandoned),
            },
        }
    }
}

/// Removes its target from the registry when dropped, including when the
/// fetch task unwinds.
struct InFlightGuard {
    registry: Registry,
    target: Target,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.target);
    }
}

fn lock(registry: &Registry) -> MutexGuard<'_, HashSet<Target>> {
    registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct RequestDispatcher {
    transport: Arc<dyn Transport>,
    endpoint: Arc<SearchEndpoint>,
    in_flight: Registry,
    events: EventBus,
}

impl RequestDispatcher {
    pub fn new(transport: Arc<dyn Transport>, endpoint: SearchEndpoint, events: EventBus) -> Self {
        Self {
            transport,
            endpoint: Arc::new(endpoint),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            events,
        }
    }

    pub fn endpoint(&self) -> &SearchEndpoint {
        &self.endpoint
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub fn is_in_flight(&self, target: &Target) -> bool {
        lock(&self.in_flight).contains(target)
    }

    /// Start fetching the resource `descriptor` names.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, descriptor: ResourceDescriptor) -> Dispatch {
        let Some(target) = descriptor.resolve_target(&self.endpoint) else {
            debug!(args = ?descriptor.args(), "Descriptor has no target");
            return Dispatch::Rejected(RejectReason::Unresolved);
        };

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(resource = %target, "Dispatch outside of a tokio runtime");
                return Dispatch::Rejected(RejectReason::NoRuntime);
            }
        };

        if !lock(&self.in_flight).insert(target.clone()) {
            debug!(resource = %target, "Already in flight");
            return Dispatch::Rejected(RejectReason::AlreadyInFlight(target));
        }
        let guard = InFlightGuard {
            registry: Arc::clone(&self.in_flight),
            target: target.clone(),
        };

        let busy_context = descriptor.shows_busy().then(|| descriptor.context().map(str::to_string));
        if let Some(context) = &busy_context {
            let _ = self.events.emit(CoreEvent::Request(RequestEvent::BusyStarted {
                context: context.clone(),
                target: target.redacted(),
            }));
        }

        let args = descriptor.into_args();
        let (sender, receiver) = oneshot::channel();
        let transport = Arc::clone(&self.transport);
        let events = self.events.clone();
        let task_target = target.clone();
        let task_args = args.clone();

        debug!(resource = %target, transport = transport.name(), "Dispatching");
        handle.spawn(async move {
            let result = match transport.fetch(&task_target, &task_args).await {
                Ok(body) if body.is_empty() => Err(RequestError::EmptyPayload(task_target.redacted())),
                other => other,
            };

            drop(guard);
            if let Some(context) = busy_context {
                let _ = events.emit(CoreEvent::Request(RequestEvent::BusyEnded {
                    context,
                    target: task_target.redacted(),
                }));
            }

            match &result {
                Ok(body) => debug!(resource = %task_target, bytes = body.len(), "Fetch completed"),
                Err(e) => warn!(resource = %task_target, error = %e, "Fetch failed"),
            }

            // The receiver may already be gone; the result is then dropped.
            let _ = sender.send(Completion {
                args: task_args,
                target: task_target,
                result,
            });
        });

        Dispatch::Accepted(Ticket {
            target,
            args,
            receiver,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use core_runtime::config::SearchApiConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Holds every fetch until the test releases a permit.
    struct GatedTransport {
        gate: Arc<Semaphore>,
        calls: AtomicUsize,
        respond: fn(&TargetArgs) -> Result<Bytes>,
    }

    impl GatedTransport {
        fn new(respond: fn(&TargetArgs) -> Result<Bytes>) -> Arc<Self> {
            Arc::new(Self {
                gate: Arc::new(Semaphore::new(0)),
                calls: AtomicUsize::new(0),
                respond,
            })
        }

        fn release(&self, permits: usize) {
            self.gate.add_permits(permits);
        }
    }

    #[async_trait]
    impl Transport for GatedTransport {
        async fn fetch(&self, _target: &Target, args: &TargetArgs) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.acquire().await.unwrap().forget();
            (self.respond)(args)
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    fn ok_body(_: &TargetArgs) -> Result<Bytes> {
        Ok(Bytes::from_static(b"{\"stat\":\"ok\"}"))
    }

    fn dispatcher(transport: Arc<GatedTransport>) -> (RequestDispatcher, EventBus) {
        let events = EventBus::new(16);
        let endpoint = SearchEndpoint::new(&SearchApiConfig::new().with_api_key("key"));
        (RequestDispatcher::new(transport, endpoint, events.clone()), events)
    }

    #[tokio::test]
    async fn test_second_dispatch_of_same_target_is_rejected() {
        let transport = GatedTransport::new(ok_body);
        let (dispatcher, _) = dispatcher(transport.clone());

        let ticket = dispatcher
            .dispatch(ResourceDescriptor::listing("Cats", 1))
            .into_ticket()
            .unwrap();
        let second = dispatcher.dispatch(ResourceDescriptor::listing("Cats", 1));

        assert!(matches!(
            second,
            Dispatch::Rejected(RejectReason::AlreadyInFlight(ref t)) if t == ticket.target()
        ));
        assert_eq!(dispatcher.in_flight_count(), 1);

        transport.release(1);
        let completion = ticket.wait().await;
        assert!(completion.result.is_ok());
        assert_eq!(dispatcher.in_flight_count(), 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_same_target_can_be_dispatched_again_after_completion() {
        let transport = GatedTransport::new(ok_body);
        transport.release(2);
        let (dispatcher, _) = dispatcher(transport.clone());

        let first = dispatcher
            .dispatch(ResourceDescriptor::listing("Cats", 1))
            .into_ticket()
            .unwrap()
            .wait()
            .await;
        assert!(!dispatcher.is_in_flight(&first.target));

        let again = dispatcher.dispatch(ResourceDescriptor::listing("Cats", 1));
        assert!(again.is_accepted());
        assert!(again.into_ticket().unwrap().wait().await.result.is_ok());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_targets_run_side_by_side() {
        let transport = GatedTransport::new(ok_body);
        let (dispatcher, _) = dispatcher(transport.clone());

        let one = dispatcher.dispatch(ResourceDescriptor::listing("Cats", 1));
        let two = dispatcher.dispatch(ResourceDescriptor::listing("Cats", 2));
        assert!(one.is_accepted() && two.is_accepted());
        assert_eq!(dispatcher.in_flight_count(), 2);

        transport.release(2);
        let (a, b) = tokio::join!(
            one.into_ticket().unwrap().wait(),
            two.into_ticket().unwrap().wait()
        );
        assert_eq!(a.args.page(), 1);
        assert_eq!(b.args.page(), 2);
        assert_eq!(dispatcher.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_busy_ends_before_completion_is_delivered() {
        let transport = GatedTransport::new(ok_body);
        transport.release(1);
        let (dispatcher, events) = dispatcher(transport);
        let mut rx = events.subscribe();

        let ticket = dispatcher
            .dispatch(ResourceDescriptor::listing("Cats", 1).with_busy_indicator("grid"))
            .into_ticket()
            .unwrap();
        ticket.wait().await;

        match rx.try_recv().unwrap() {
            CoreEvent::Request(RequestEvent::BusyStarted { context, target }) => {
                assert_eq!(context.as_deref(), Some("grid"));
                assert!(!target.contains("api_key=key"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            CoreEvent::Request(RequestEvent::BusyEnded { .. })
        ));
    }

    #[tokio::test]
    async fn test_no_busy_events_unless_requested() {
        let transport = GatedTransport::new(ok_body);
        transport.release(1);
        let (dispatcher, events) = dispatcher(transport);
        let mut rx = events.subscribe();

        dispatcher
            .dispatch(ResourceDescriptor::listing("Cats", 1))
            .into_ticket()
            .unwrap()
            .wait()
            .await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_transport_error_is_delivered_and_registry_cleaned() {
        let transport = GatedTransport::new(|_| Err(RequestError::NotFound("Cats-P7.json".into())));
        transport.release(1);
        let (dispatcher, _) = dispatcher(transport);

        let completion = dispatcher
            .dispatch(ResourceDescriptor::listing("Cats", 7))
            .into_ticket()
            .unwrap()
            .wait()
            .await;

        assert!(completion.result.unwrap_err().is_not_found());
        assert_eq!(dispatcher.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_payload_is_an_error() {
        let transport = GatedTransport::new(|_| Ok(Bytes::new()));
        transport.release(1);
        let (dispatcher, _) = dispatcher(transport);

        let completion = dispatcher
            .dispatch(ResourceDescriptor::listing("Cats", 1))
            .into_ticket()
            .unwrap()
            .wait()
            .await;

        assert!(matches!(completion.result, Err(RequestError::EmptyPayload(_))));
    }

    #[tokio::test]
    async fn test_unresolved_descriptor_touches_nothing() {
        let transport = GatedTransport::new(ok_body);
        let (dispatcher, _) = dispatcher(transport.clone());

        let dispatch = dispatcher.dispatch(ResourceDescriptor::thumbnail("Cats", 1, 3, None));

        assert!(matches!(dispatch, Dispatch::Rejected(RejectReason::Unresolved)));
        assert_eq!(dispatcher.in_flight_count(), 0);
        tokio::task::yield_now().await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dispatch_without_runtime_is_rejected() {
        let (dispatcher, _) = dispatcher(GatedTransport::new(ok_body));

        let dispatch = dispatcher.dispatch(ResourceDescriptor::listing("Cats", 1));

        assert!(matches!(dispatch, Dispatch::Rejected(RejectReason::NoRuntime)));
        assert_eq!(dispatcher.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_ticket_still_releases_target() {
        let transport = GatedTransport::new(ok_body);
        let (dispatcher, _) = dispatcher(transport.clone());

        let dispatch = dispatcher.dispatch(ResourceDescriptor::listing("Cats", 1));
        drop(dispatch);
        transport.release(1);

        for _ in 0..100 {
            if dispatcher.in_flight_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(dispatcher.in_flight_count(), 0);
    }
}
