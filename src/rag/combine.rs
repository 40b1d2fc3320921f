use super::store::RetrievedDocument;

pub const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Joins document contents in retrieval order, separated by a blank line.
pub fn combine_documents(documents: &[RetrievedDocument]) -> String {
    combine_documents_within(documents, None)
}

/// Like [`combine_documents`], but stops before the first document that would
/// push the result past `max_chars` characters. Documents are never split.
pub fn combine_documents_within(documents: &[RetrievedDocument], max_chars: Option<usize>) -> String {
    let mut context = String::new();
    let mut used = 0usize;

    for (index, doc) in documents.iter().enumerate() {
        let separator = if index == 0 { "" } else { DOCUMENT_SEPARATOR };
        let added = separator.chars().count() + doc.content.chars().count();

        if let Some(limit) = max_chars {
            if used + added > limit {
                tracing::debug!(
                    kept = index,
                    dropped = documents.len() - index,
                    "Context cap reached"
                );
                break;
            }
        }

        context.push_str(separator);
        context.push_str(&doc.content);
        used += added;
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(contents: &[&str]) -> Vec<RetrievedDocument> {
        contents.iter().map(|c| RetrievedDocument::new(*c)).collect()
    }

    #[test]
    fn empty_input_gives_empty_context() {
        assert_eq!(combine_documents(&[]), "");
    }

    #[test]
    fn contents_appear_in_input_order() {
        let documents = docs(&["Ada: visual learners", "Grace: compilers", "Alan: theory"]);
        let context = combine_documents(&documents);

        assert_eq!(context, "Ada: visual learners\n\nGrace: compilers\n\nAlan: theory");
        let mut last = 0;
        for doc in &documents {
            let pos = context[last..].find(&doc.content).unwrap() + last;
            assert!(pos >= last);
            last = pos + doc.content.len();
        }
    }

    #[test]
    fn duplicates_are_kept() {
        let context = combine_documents(&docs(&["same", "same"]));
        assert_eq!(context, "same\n\nsame");
    }

    #[test]
    fn cap_drops_whole_trailing_documents() {
        let documents = docs(&["aaaa", "bbbb", "cccc"]);
        assert_eq!(combine_documents_within(&documents, Some(10)), "aaaa\n\nbbbb");
        assert_eq!(combine_documents_within(&documents, Some(9)), "aaaa");
        assert_eq!(combine_documents_within(&documents, Some(3)), "");
        assert_eq!(
            combine_documents_within(&documents, None),
            combine_documents(&documents)
        );
    }
}
