//! Custom assertions for tests

use crate::sync::MemoryDocument;

/// Assert that an Option is Some and return the value
pub fn assert_some<T>(option: Option<T>) -> T {
    match option {
        Some(value) => value,
        None => panic!("Expected Some, got None"),
    }
}

/// Assert that every document holds exactly the same entities
pub fn assert_converged(documents: &[&MemoryDocument]) {
    let Some((first, rest)) = documents.split_first() else {
        return;
    };
    let expected = first.snapshot();
    for (index, document) in rest.iter().enumerate() {
        let actual = document.snapshot();
        if actual != expected {
            panic!(
                "Document {} diverged from document 0:\n  expected: {:?}\n  actual:   {:?}",
                index + 1,
                expected,
                actual
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oplog::NewOperation;
    use crate::sync::Updater;
    use crate::test_utils::stamped;
    use serde_json::json;

    #[test]
    #[should_panic(expected = "Expected Some")]
    fn test_assert_some_panics_on_none() {
        assert_some::<u8>(None);
    }

    #[test]
    #[should_panic(expected = "diverged")]
    fn test_assert_converged_detects_divergence() {
        let a = MemoryDocument::new();
        let b = MemoryDocument::new();
        a.apply_message(&stamped(NewOperation::upsert("map", json!("m"), json!({})), 1, "n"));
        assert_converged(&[&a, &b]);
    }
}
