//! Test utility for the thunk-insertion core.
//!
//! Provides a builder for assembling synthetic sections (atoms, symbols,
//! branch relocations, stub entries) into a ready [`LinkSession`], so
//! tests describe layouts in terms of sizes and gaps instead of wiring
//! arenas by hand.
//!
//! # Example
//!
//! ```rust
//! use ld_test_util::SectionBuilder;
//! use ld_thunks::{create_thunks, LayoutParams};
//!
//! let mut builder = SectionBuilder::new();
//! let a = builder.add_atom(4096, 2);
//! let b = builder.add_atom(16, 2);
//! builder.add_branch(b, 0, a);
//! let (mut session, text) = builder.finish();
//!
//! create_thunks(&mut session, text, &LayoutParams::default()).unwrap();
//! ```

mod section_builder;

pub use section_builder::SectionBuilder;
