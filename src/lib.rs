//! # dallify
//!
//! Generate images from text with a DALL·E Mini ONNX export, optionally lay
//! them over an existing picture, post-process the result and preview it as
//! ASCII art.
//!
//! ## Example
//!
//! ```no_run
//! use dallify::{DalleGenerator, Options};
//!
//! # fn main() -> dallify::Result<()> {
//! let mut generator = DalleGenerator::default();
//! let outcome = dallify::run(&mut generator, &Options::default())?;
//!
//! if let Some(preview) = outcome.preview {
//!     println!("{preview}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod error;
pub mod image;
pub mod model;
pub mod pipeline;

pub use app::{Options, Outcome, run};
pub use error::{Error, Result};
pub use pipeline::{DalleGenerator, GenerationConfig, ImageGenerator};
