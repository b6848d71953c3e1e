//! Message formatting shared by every call pattern.

/// Number of responses produced by the server-streaming call.
pub const SERVER_STREAM_COUNT: usize = 5;

/// `"Hello, {name}!"`
pub fn greet(name: &str) -> String {
    format!("Hello, {name}!")
}

/// `"[{index}] Hello, {name}!"`
pub fn numbered_greeting(index: usize, name: &str) -> String {
    format!("[{index}] Hello, {name}!")
}

/// Greets a list of names in order: `"Hello, [Alice Bob]!"`.
pub fn list_greeting<S: AsRef<str>>(names: &[S]) -> String {
    let joined = names
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ");
    format!("Hello, [{joined}]!")
}
