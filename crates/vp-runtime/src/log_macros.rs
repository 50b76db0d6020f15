/// Domain-aware logging macros.
///
/// Each macro injects a `domain` field so every event can be filtered by the
/// part of the engine it came from:
///
/// | domain | covers |
/// |--------|--------|
/// | `sys`  | engine lifecycle, task groups, signals |
/// | `pipe` | data path: routing, invocations, outputs |
/// | `state`| state store, TTL sweeps |
/// | `conf` | configuration loading |
/// | `res`  | resources and metrics |
///
/// ```ignore
/// vp_info!(sys, operator = name, "engine started");
/// vp_warn!(pipe, key = %key, error = %e, "invocation failed");
/// ```
///
/// The domain is a bare identifier, not a string.

#[doc(hidden)]
macro_rules! vp_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

macro_rules! vp_error {
    ($domain:ident, $($rest:tt)*) => {
        vp_log!(error, $domain, $($rest)*)
    };
}

macro_rules! vp_warn {
    ($domain:ident, $($rest:tt)*) => {
        vp_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! vp_info {
    ($domain:ident, $($rest:tt)*) => {
        vp_log!(info, $domain, $($rest)*)
    };
}

macro_rules! vp_debug {
    ($domain:ident, $($rest:tt)*) => {
        vp_log!(debug, $domain, $($rest)*)
    };
}

#[allow(unused_macros)]
macro_rules! vp_trace {
    ($domain:ident, $($rest:tt)*) => {
        vp_log!(trace, $domain, $($rest)*)
    };
}
