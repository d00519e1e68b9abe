//! Transform synchronization on top of the tsync codec.
//!
//! An owner samples its entity every tick and sends only the quantities
//! that changed enough. Receivers buffer what arrives, reconcile the
//! owner's clock and play the entity back slightly in the past,
//! interpolating between snapshots and extrapolating past the newest one.
//!
//! # Design Principles
//!
//! - **Host authority** - Owners send to the host; the host validates and
//!   relays to everyone else that observes the entity.
//! - **Injected collaborators** - The engine never touches a scene or a
//!   socket directly. It reads and writes through [`EntityAdapter`] and
//!   sends through [`Transport`].
//! - **Explicit time** - Local time only moves through `advance`/`update`,
//!   so every run is reproducible.
//!
//! # Example
//!
//! ```
//! use codec::{EntityId, EntityState, SyncIndex};
//! use glam::Vec3;
//! use replica::{Outbox, PeerId, StateAdapter, SyncedEntity};
//! use schema::{MotionSource, SyncConfig};
//!
//! let adapter = StateAdapter::new(EntityState::at(Vec3::new(1.0, 0.0, 0.0)));
//! let mut owner = SyncedEntity::new(
//!     EntityId::new(1),
//!     SyncIndex::ROOT,
//!     SyncConfig::default(),
//!     MotionSource::None,
//!     true,
//!     adapter,
//! )
//! .unwrap();
//!
//! let update = owner.produce_update(&wire::Limits::default()).unwrap();
//! assert!(update.is_some());
//! # let _ = (Outbox::new(), PeerId(0));
//! ```

mod adapter;
mod change;
mod clock;
mod entity;
mod playback;
mod registry;
mod validate;

pub use adapter::{EntityAdapter, Outbox, OutgoingMessage, PeerId, StateAdapter, Transport};
pub use change::ChangeDetector;
pub use clock::ClockReconciler;
pub use entity::{IngestOutcome, OwnerUpdate, SyncedEntity};
pub use playback::{interpolate, PlaybackEngine, PlaybackState};
pub use registry::{HandlerTable, NetRole, ReceiveOutcome, SyncRegistry, TickReport};
pub use validate::{AcceptAll, MaxDisplacement, StateValidator};
