//! Crate-private logging macros.
//!
//! `defmt` on hardware, `tracing` on the host, nothing otherwise. Format
//! strings must stay within the subset both backends accept: `{}` and `{:?}`.

#![allow(unused_macros)]

#[cfg(all(feature = "defmt", feature = "tracing"))]
compile_error!("features `defmt` and `tracing` are mutually exclusive");

macro_rules! log_impl {
    ($level:ident, $s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        ::defmt::$level!($s $(, $x)*);
        #[cfg(feature = "tracing")]
        ::tracing::$level!($s $(, $x)*);
        #[cfg(not(any(feature = "defmt", feature = "tracing")))]
        let _ = ($( & $x ),*);
    }};
}

macro_rules! trace {
    ($($arg:tt)*) => { $crate::fmt::log_impl!(trace, $($arg)*) };
}

macro_rules! debug {
    ($($arg:tt)*) => { $crate::fmt::log_impl!(debug, $($arg)*) };
}

macro_rules! info {
    ($($arg:tt)*) => { $crate::fmt::log_impl!(info, $($arg)*) };
}

macro_rules! warn_ {
    ($($arg:tt)*) => { $crate::fmt::log_impl!(warn, $($arg)*) };
}

macro_rules! error {
    ($($arg:tt)*) => { $crate::fmt::log_impl!(error, $($arg)*) };
}

pub(crate) use {debug, error, info, log_impl, trace};
pub(crate) use warn_ as warn;
