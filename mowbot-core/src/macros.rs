//! Logging shim.
//!
//! With the `defmt` feature the macros forward to `defmt`, otherwise to the
//! `log` facade. Format strings must stay within the common subset: plain
//! `{}` and `{:?}` placeholders, no width or precision.

#[cfg(feature = "defmt")]
macro_rules! info {
    ($($arg:tt)*) => {
        ::defmt::info!($($arg)*)
    };
}

#[cfg(not(feature = "defmt"))]
macro_rules! info {
    ($($arg:tt)*) => {
        ::log::info!($($arg)*)
    };
}

#[cfg(feature = "defmt")]
macro_rules! warn {
    ($($arg:tt)*) => {
        ::defmt::warn!($($arg)*)
    };
}

#[cfg(not(feature = "defmt"))]
macro_rules! warn {
    ($($arg:tt)*) => {
        ::log::warn!($($arg)*)
    };
}

#[cfg(feature = "defmt")]
macro_rules! error {
    ($($arg:tt)*) => {
        ::defmt::error!($($arg)*)
    };
}

#[cfg(not(feature = "defmt"))]
macro_rules! error {
    ($($arg:tt)*) => {
        ::log::error!($($arg)*)
    };
}

#[cfg(feature = "defmt")]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {
        ::defmt::debug!($($arg)*)
    };
}

#[cfg(not(feature = "defmt"))]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {
        ::log::debug!($($arg)*)
    };
}

#[cfg(feature = "defmt")]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {
        ::defmt::trace!($($arg)*)
    };
}

#[cfg(not(feature = "defmt"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {
        ::log::trace!($($arg)*)
    };
}
