//! Domain events - emitted after identity records change

mod domain_event;
mod sink;

pub use domain_event::{DomainEvent, RelationEvent, RoleEvent, UserEvent};
pub use sink::{EventSink, NoopEventSink, RecordingEventSink};
