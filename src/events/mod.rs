//! # Events Module
//!
//! Ephemeral status channel for progress reporting.
//!
//! ## Design
//! The core library emits events through channels, allowing any front end
//! to render progress. Events are observational only: dropping the receiver
//! never changes what the archiver does.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Convert(ConvertEvent::Progress(p)) = event {
//!             println!("{:?}% of {}", p.percent, p.path.display());
//!         }
//!     }
//! });
//!
//! orchestrator.run_once(&sender)?;
//! ```

mod channel;
mod types;

pub use channel::{EventChannel, EventReceiver, EventSender, null_sender};
pub use types::*;
