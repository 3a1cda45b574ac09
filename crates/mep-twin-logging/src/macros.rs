//! ---
//! twin_section: "03-persistence-logging"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Structured logging context and convenience macros."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---

#[doc(hidden)]
#[macro_export]
macro_rules! __twin_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            run = ctx.run.unwrap_or(""),
            month = ctx.month.unwrap_or(""),
            equipment = ctx.equipment.unwrap_or(""),
            task = ctx.task.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with simulation context.
#[macro_export]
macro_rules! twin_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__twin_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__twin_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with simulation context.
#[macro_export]
macro_rules! twin_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__twin_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__twin_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with simulation context.
#[macro_export]
macro_rules! twin_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__twin_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__twin_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with simulation context.
#[macro_export]
macro_rules! twin_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__twin_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__twin_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
