//! Emission macros that record the full call site.
//!
//! The `Output` methods capture the caller's file and line and look the
//! function up on the call stack when a target needs it. These macros
//! capture the enclosing function at compile time instead, which keeps
//! the `func` metadata flags and the debug scope filter off the stack walk.
//!
//! # Examples
//!
//! ```
//! use rust_output_system::prelude::*;
//! use rust_output_system::{note, out, outln};
//! use std::sync::Arc;
//!
//! let screen = Arc::new(MemorySink::new());
//! let output = Output::builder()
//!     .sink(LevelSelector::All, screen.clone(), Targets::SCREEN)
//!     .build();
//!
//! // Line form with format arguments
//! note!(output, "copied {} files", 3).unwrap();
//!
//! // Print form: arguments joined by spaces, no newline added
//! out!(output, Level::Info, "total:", 3, "files").unwrap();
//! outln!(output, Level::Info).unwrap();
//!
//! assert_eq!(screen.contents(), "Note: copied 3 files\ntotal: 3 files\n");
//! ```

/// The current call site: file, line and enclosing function path.
///
/// ```
/// use rust_output_system::call_site;
///
/// fn locate() -> rust_output_system::CallSite {
///     call_site!()
/// }
/// assert!(locate().function.ends_with("::locate"));
/// ```
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(file!(), line!(), $crate::__function_path!())
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __function_path {
    () => {{
        fn __here() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::CallSite::enclosing_function(__type_name_of(__here))
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __joined {
    () => {
        ::std::string::String::new()
    };
    ($($arg:expr),+ $(,)?) => {
        [$(::std::string::ToString::to_string(&$arg)),+].join(" ")
    };
}

/// Print form: emit the arguments joined by spaces, without a newline.
#[macro_export]
macro_rules! out {
    ($output:expr, $level:expr $(, $arg:expr)* $(,)?) => {
        $output.emit(
            $crate::Emission::new($level, $crate::__joined!($($arg),*)).at($crate::call_site!()),
        )
    };
}

/// Line form: like [`out!`] with a trailing newline.
#[macro_export]
macro_rules! outln {
    ($output:expr, $level:expr $(, $arg:expr)* $(,)?) => {{
        let mut __message = $crate::__joined!($($arg),*);
        __message.push('\n');
        $output.emit($crate::Emission::new($level, __message).at($crate::call_site!()))
    }};
}

/// Formatted form: `format!` arguments, no newline added.
#[macro_export]
macro_rules! outf {
    ($output:expr, $level:expr, $($arg:tt)+) => {
        $output.emit(
            $crate::Emission::new($level, format!($($arg)+)).at($crate::call_site!()),
        )
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __line {
    ($output:expr, $level:expr, $($arg:tt)+) => {{
        let mut __message = format!($($arg)+);
        __message.push('\n');
        $output.emit($crate::Emission::new($level, __message).at($crate::call_site!()))
    }};
}

/// Emit a formatted Trace line.
#[macro_export]
macro_rules! trace {
    ($output:expr, $($arg:tt)+) => {
        $crate::__line!($output, $crate::Level::Trace, $($arg)+)
    };
}

/// Emit a formatted Debug line.
///
/// ```
/// # use rust_output_system::prelude::*;
/// # let output = Output::new();
/// use rust_output_system::debug;
/// debug!(output, "cache hits: {}", 10).unwrap();
/// ```
#[macro_export]
macro_rules! debug {
    ($output:expr, $($arg:tt)+) => {
        $crate::__line!($output, $crate::Level::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! verbose {
    ($output:expr, $($arg:tt)+) => {
        $crate::__line!($output, $crate::Level::Verbose, $($arg)+)
    };
}

/// Emit a formatted Info line.
#[macro_export]
macro_rules! info {
    ($output:expr, $($arg:tt)+) => {
        $crate::__line!($output, $crate::Level::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! note {
    ($output:expr, $($arg:tt)+) => {
        $crate::__line!($output, $crate::Level::Note, $($arg)+)
    };
}

/// Emit a formatted Issue line.
#[macro_export]
macro_rules! issue {
    ($output:expr, $($arg:tt)+) => {
        $crate::__line!($output, $crate::Level::Issue, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($output:expr, $($arg:tt)+) => {
        $crate::__line!($output, $crate::Level::Error, $($arg)+)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __line_exit {
    ($output:expr, $level:expr, $code:expr, $($arg:tt)+) => {{
        let mut __message = format!($($arg)+);
        __message.push('\n');
        $output.emit(
            $crate::Emission::new($level, __message)
                .at($crate::call_site!())
                .terminal($code),
        )
    }};
}

/// Emit a formatted Issue line, then terminate with the given code.
#[macro_export]
macro_rules! issue_exit {
    ($output:expr, $code:expr, $($arg:tt)+) => {
        $crate::__line_exit!($output, $crate::Level::Issue, $code, $($arg)+)
    };
}

/// Emit a formatted Error line, then terminate with the given code.
///
/// ```
/// # use rust_output_system::prelude::*;
/// use rust_output_system::error_exit;
///
/// let output = Output::builder().no_exit().build();
/// let emitted = error_exit!(output, 2, "cannot read {}", "config.toml").unwrap();
/// assert_eq!(emitted.exit_code, Some(2));
/// ```
#[macro_export]
macro_rules! error_exit {
    ($output:expr, $code:expr, $($arg:tt)+) => {
        $crate::__line_exit!($output, $crate::Level::Error, $code, $($arg)+)
    };
}

/// Emit a formatted Fatal line and terminate with the error exit code.
#[macro_export]
macro_rules! fatal {
    ($output:expr, $($arg:tt)+) => {{
        let __output = &$output;
        $crate::__line_exit!(
            __output,
            $crate::Level::Fatal,
            __output.error_exit_code(),
            $($arg)+
        )
    }};
}
