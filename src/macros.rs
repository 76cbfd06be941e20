/// Builds a `Vec<Arg>` from call-site expressions.
///
/// Each expression is classified by its type:
///
/// - closures and functions callable as `Fn(&Delivery)` become
///   [`Arg::Callback`](crate::Arg::Callback);
/// - values implementing [`std::error::Error`] become
///   [`Arg::Error`](crate::Arg::Error), recording the macro's call site as the
///   error location;
/// - everything else is converted with [`Into<Arg>`](crate::Arg).
///
/// Closure parameters need a type annotation so the closure's signature is
/// known when it is classified.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tattle::{Arg, Delivery, args};
///
/// let args = args![
///     std::io::Error::other("timed out"),
///     "fetching profile",
///     json!({"user_id": 7}),
///     |outcome: &Delivery| println!("delivered: {outcome:?}"),
///     3.5_f64,
///     None::<&str>,
/// ];
///
/// assert!(matches!(args[0], Arg::Error(_)));
/// assert!(matches!(args[1], Arg::String(_)));
/// assert!(matches!(args[2], Arg::Object(_)));
/// assert!(matches!(args[3], Arg::Callback(_)));
/// assert!(matches!(args[4], Arg::Scalar(_)));
/// assert!(matches!(args[5], Arg::Null));
/// ```
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {{
        let args: ::std::vec::Vec<$crate::Arg> = ::std::vec![$({
            use $crate::__private::kind::*;
            let arg = $arg;
            let kind = (&&&Wrap(&arg)).arg_kind();
            kind.into_arg(arg)
        }),*];
        args
    }};
}
