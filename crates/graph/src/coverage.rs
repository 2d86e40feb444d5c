//! Test-to-endpoint coverage heuristic.
//!
//! A test is taken to cover an endpoint when every name token of the endpoint
//! appears among the test's name tokens. The rule favours recall: short endpoint
//! names (`create`) are "covered" by any test that mentions the word.

use std::collections::BTreeSet;

/// Lower-cased alphanumeric runs of `name`
pub fn tokenize(name: &str) -> BTreeSet<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether the endpoint's token set is a non-empty subset of the test's token set
pub fn covers(api_name: &str, test_name: &str) -> bool {
    let api_tokens = tokenize(api_name);
    !api_tokens.is_empty() && api_tokens.is_subset(&tokenize(test_name))
}
