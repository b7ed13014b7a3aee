//! Judge guidance packing never exceeds its budget and never truncates an item

use proptest::prelude::*;
use requiredai::backend::estimate_tokens;
use requiredai::requirement::judge::pack_guidance;
use requiredai::requirement::EvaluationError;

fn items(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z ]{0,200}", 0..max)
}

proptest! {
    #[test]
    fn prop_packing_respects_budget(
        phrasings in items(5),
        positives in items(8),
        negatives in items(8),
        limit in 0usize..120,
    ) {
        match pack_guidance(&phrasings, &positives, &negatives, limit, estimate_tokens) {
            Ok(packed) => {
                prop_assert!(packed.tokens <= limit);
                prop_assert!(!packed.phrasings.is_empty());

                let counted: usize = packed
                    .phrasings
                    .iter()
                    .chain(&packed.positive_examples)
                    .chain(&packed.negative_examples)
                    .map(|item| estimate_tokens(item))
                    .sum();
                prop_assert_eq!(counted, packed.tokens);

                // Every packed item is a whole input item, kept in input order.
                let mut cursor = phrasings.iter();
                for p in &packed.phrasings {
                    prop_assert!(cursor.any(|orig| orig == p));
                }
                let mut cursor = positives.iter();
                for p in &packed.positive_examples {
                    prop_assert!(cursor.any(|orig| orig == p));
                }
            }
            Err(EvaluationError::PromptOverBudget(reported)) => {
                prop_assert_eq!(reported, limit);
                prop_assert!(phrasings.iter().all(|p| estimate_tokens(p) > limit));
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn prop_phrasings_pack_before_examples(
        phrasing in "[a-z ]{1,40}",
        examples in items(6),
    ) {
        let phrasings = vec![phrasing.clone()];
        let limit = estimate_tokens(&phrasing);
        let packed = pack_guidance(&phrasings, &examples, &examples, limit, estimate_tokens).unwrap();
        prop_assert_eq!(packed.phrasings, vec![phrasing.as_str()]);
        // Whatever examples fit cost nothing beyond the phrasing.
        prop_assert_eq!(packed.tokens, limit);
    }
}
