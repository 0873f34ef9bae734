//! Per-token cost metadata for known oracle models.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Look up (input, output) cost per token in USD for a model.
///
/// Unknown models report zero cost rather than guessing.
pub fn model_costs(model: &str) -> (Decimal, Decimal) {
    if model.starts_with("claude-sonnet") {
        (dec!(0.000003), dec!(0.000015))
    } else if model.starts_with("claude-haiku") || model.starts_with("claude-3-5-haiku") {
        (dec!(0.0000008), dec!(0.000004))
    } else if model.starts_with("gpt-4o-mini") {
        (dec!(0.00000015), dec!(0.0000006))
    } else if model.starts_with("gpt-4o") {
        (dec!(0.0000025), dec!(0.00001))
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_has_nonzero_costs() {
        let (input, output) = model_costs("claude-sonnet-4-20250514");
        assert!(input > Decimal::ZERO);
        assert!(output > input);
    }

    #[test]
    fn mini_matched_before_base_model() {
        let (mini_in, _) = model_costs("gpt-4o-mini");
        let (base_in, _) = model_costs("gpt-4o");
        assert!(mini_in < base_in);
    }

    #[test]
    fn unknown_model_is_free() {
        assert_eq!(model_costs("mock"), (Decimal::ZERO, Decimal::ZERO));
    }
}
