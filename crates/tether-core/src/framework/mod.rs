//! Framework layer - Event processing pipeline.
//!
//! This module contains everything between the transports and the sink:
//! - The funnel every transport pushes into
//! - The addressing filter deciding what reaches the brain
//! - The user directory resolving typing users
//! - The dispatch loop tying them together

pub mod addressing;
pub mod directory;
pub mod dispatch;
pub mod funnel;

pub use addressing::{Addressing, AddressingPolicy, Verdict, strip_mention};
pub use directory::{UserDirectory, UserLookup};
pub use dispatch::{DispatchLoop, DispatchState, ExitReason};
pub use funnel::{DEFAULT_FUNNEL_CAPACITY, FunnelClosed, FunnelReceiver, FunnelSender, funnel};
