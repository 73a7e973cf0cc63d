//! # LED Streamer Service
//!
//! Renders each configured site at its frame rate and streams the result to
//! the strip controllers that display it.
//!
//! ## Architecture Role
//!
//! ```text
//!  SiteScheduler ──render──▶ PixelBuffer
//!       │
//!       │ compress_and_enqueue (per channel, drops when full)
//!       ▼
//!  DeviceChannel queue ──▶ ChannelWorker ──▶ ConnectionRegistry ──TCP──▶ controller
//!                               ▲                                          │
//!                               └─────────────── telemetry ◀───────────────┘
//! ```
//!
//! Sites never wait on devices. Socket failures stay inside the channel
//! workers, and a device that falls behind loses frames rather than
//! delaying the renderer.

pub mod channel;
pub mod effects;
pub mod error;
pub mod schedule;
pub mod scheduler;
pub mod server;
pub mod site;
pub mod status;
pub mod surface;
pub mod worker;

pub use channel::{ChannelConfig, ChannelStatus, DeviceChannel, LinkState, MAX_QUEUE_DEPTH};
pub use effects::{build_effect, ColorCycle, Effect, SolidColor};
pub use error::{EnqueueRejected, Result, StreamerError};
pub use schedule::{DaySet, ScheduledEffect, TimeWindow};
pub use scheduler::{SiteScheduler, TickReport};
pub use server::{Server, ServerStatus};
pub use site::{Site, SiteStatus, NO_EFFECT_RUNNING};
pub use surface::Canvas;
pub use worker::{ChannelWorker, StepOutcome};
