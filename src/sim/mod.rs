//! Deterministic simulation module
//!
//! All redirection logic lives here. This module must stay deterministic:
//! - Time is injected by the caller (`dt`), never read from a clock
//! - Seeded RNG only
//! - Avatars are processed sequentially in a single agreed order
//! - No I/O

pub mod redirect;
pub mod reset;
pub mod state;
pub mod stats;
pub mod tick;
pub mod walker;

pub use redirect::{Redirector, RedirectContext, create_redirector};
pub use reset::{ResetStatus, Resetter, collision_happens, create_resetter};
pub use state::{AvatarSnapshot, AvatarState, GainEvent, GainKind, ResetEvent, RngState, TrackingSpace};
pub use stats::{AvatarSummary, Statistics};
pub use tick::{AvatarResult, EndState, Simulation, TickInput, TrialSummary};
pub use walker::{Mission, MotionInput};
