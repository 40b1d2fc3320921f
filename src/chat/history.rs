/// Flattens prior message contents into one block of text for the question
/// rewriter. Roles are not carried; the answer call gets the full messages.
pub fn format_conv_history<S: AsRef<str>>(contents: &[S]) -> String {
    contents
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_is_empty_string() {
        let none: [&str; 0] = [];
        assert_eq!(format_conv_history(&none), "");
    }

    #[test]
    fn keeps_order() {
        let formatted = format_conv_history(&["Which mentor knows Rust?", "Ada does."]);
        let a = formatted.find("Which mentor knows Rust?").unwrap();
        let b = formatted.find("Ada does.").unwrap();
        assert!(a < b);
        assert_eq!(formatted, "Which mentor knows Rust?\nAda does.");
    }

    #[test]
    fn accepts_owned_strings() {
        let owned = vec!["one".to_string(), "two".to_string()];
        assert_eq!(format_conv_history(&owned), "one\ntwo");
    }
}
