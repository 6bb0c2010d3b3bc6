//! envd process protocol bindings
//!
//! Regenerate with `ENVD_SDK_REGENERATE_PROTO=1 cargo build -p envd-sdk`.

#![allow(clippy::all)]
#![allow(unused_imports)]
#![allow(missing_docs)]

include!("process.rs");
