//! # psf-rs
//!
//! `psf-rs` is a pure Rust reader for Cadence PSF (Parameter Storage Format) result
//! files as written by analog circuit simulators. It enables loading a result file,
//! listing the contained signals, and fetching them by name as typed values or
//! waveforms.
//!
//! ## Features
//! - Decode binary PSF files (DC operating points, DC/AC sweeps, transients)
//! - Decode PSF-XL index files with their Blosc-compressed `.psfxl` sidecars
//! - List signals and their metadata; groups are flattened one level
//!
//! ## PsfBinFile
//! The main entry point is the [`PsfBinFile`](crate::psf_file::PsfBinFile) struct. It parses
//! the whole file at open time (header, type, sweep, trace and value sections), and exposes
//! signals through `names`, `signal_info`, `get_signal` and `get_signals`. For a PSF-XL index
//! file the sample data lives in a sidecar next to the primary file, which is only opened when
//! a signal is fetched.
//!
//! ## Waveform
//! Swept and PSF-XL signals come back as a [`Waveform`](crate::waveform::Waveform): dense x
//! and y vectors of equal length plus their units. Non-swept files return a
//! [`Value`](crate::Value) per signal, which may be a struct of named members
//! (an operating-point record, for example).
//!
//! ## Error Handling
//! All fallible operations return a [`PsfError`](crate::error::PsfError). Parser errors carry
//! the absolute file offset at which they were raised; a failed open never yields a partially
//! decoded file.
//!
//! ## Usage
//! Add to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! psf-rs = "0.2"
//! ```
//!
//! ### Example: Listing and Fetching Signals
//! ```no_run
//! use psf_rs::{PsfBinFile, Signal};
//!
//! // Open a binary PSF result file
//! let file = PsfBinFile::open("results/tran.tran.tran").unwrap();
//!
//! // List all signals
//! for name in file.names() {
//!     println!("signal: {name}");
//! }
//!
//! // Fetch one signal by name
//! if let Signal::Waveform(wfm) = file.get_signal("vout").unwrap() {
//!     println!("{} points from {} to {} {}", wfm.len(), wfm.x[0],
//!              wfm.x[wfm.len() - 1], wfm.x_unit);
//! }
//! ```
//!
//! A note on INT8: non-swept value sections store INT8 literals in a full
//! big-endian int32 slot, and this reader reproduces that read bit-exactly.
//! Whether that is a quirk of the format or of the tools that write it is
//! unresolved; the value comes back as [`Value::Int`].

mod blosc;
mod byte_cursor;
mod element;
pub mod error;
mod header_section;
mod property;
pub mod psf_file;
mod psf_xl;
mod section;
mod signal_def;
mod sweep_section;
mod trace_section;
mod type_def;
mod type_section;
mod value_section;
pub mod waveform;

pub use error::PsfError;
pub use property::{Properties, PropertyValue, XlIndex};
pub use psf_file::{detect_format, FileFormat, PsfBinFile, PsfFile, Signal, SignalFile};
pub use section::SectionKind;
pub use signal_def::{Group, SignalDef, TraceElem};
pub use type_def::{TypeDef, TypeId};
pub use value_section::Value;
pub use waveform::{Samples, Waveform};
