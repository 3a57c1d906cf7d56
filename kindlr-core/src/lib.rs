//! The core, UI-agnostic library for the `kindlr` e-book transfer utility.
//!
//! `kindlr-core` can sit behind any front-end, whether it's a terminal
//! interface (like `kindlr`) or a window that accepts dropped files. It
//! finds a connected Kindle, runs the external converter on each dropped
//! book, and moves the results onto the device, reporting the state of an
//! in-flight batch for the front-end to render.
//!
//! The library is structured into several key modules:
//! - [`device`]: Finds the reader among mounted volumes by its marker file.
//! - [`platform`]: Per-OS converter location and volume discovery.
//! - [`convert`]: Invokes the converter on one file.
//! - [`relocate`]: Copy-then-delete moves across volumes.
//! - [`transfer`]: The per-file pipeline joining the two.
//! - [`batch`]: Fans a batch out to workers and aggregates their results.
//!
//! ## Example: Sending a Batch
//!
//! ```rust,no_run
//! use kindlr_core::batch::BatchCoordinator;
//! use kindlr_core::config::Settings;
//! use kindlr_core::device::DeviceLocator;
//! use kindlr_core::transfer::Pipeline;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let settings = Settings::default();
//! let mut locator = DeviceLocator::new(&settings.marker);
//! if !locator.is_connected() {
//!     println!("Connect your Kindle!");
//!     return;
//! }
//! let dest = locator.device().unwrap().content_dir(&settings.content_dir);
//!
//! let pipeline = Arc::new(Pipeline::from_settings(&settings));
//! let mut batch = BatchCoordinator::new(pipeline, settings.dwell);
//! batch.start_batch(&dest, ["/home/me/Books/Dune.epub"]).unwrap();
//!
//! // A real front-end polls once per frame instead of spinning.
//! let report = loop {
//!     if let Some(report) = batch.poll() {
//!         break report;
//!     }
//!     std::thread::sleep(Duration::from_millis(16));
//! };
//! println!("sent {:?}, failed {:?}", report.succeeded, report.failed_names().collect::<Vec<_>>());
//! ```

pub mod batch;
pub mod config;
pub mod convert;
pub mod device;
pub mod error;
pub mod platform;
pub mod relocate;
pub mod transfer;
