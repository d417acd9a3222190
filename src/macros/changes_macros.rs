//! Literal syntax for [`Changes`](crate::core::types::Changes).

/// Build a `Changes` mapping from `port => value` pairs.
///
/// # Example
/// ```rust
/// use ticksim::changes;
/// use ticksim::core::types::Value;
///
/// let changes = changes! { "out" => 1, "label" => "ready" };
/// assert_eq!(changes.get("out"), Some(&Value::Int(1)));
/// assert!(changes! {}.is_empty());
/// ```
#[macro_export]
macro_rules! changes {
    () => {
        $crate::core::types::Changes::new()
    };
    ($($port:expr => $value:expr),+ $(,)?) => {
        $crate::core::types::Changes::new()
            $(.with($port, $value))+
    };
}
