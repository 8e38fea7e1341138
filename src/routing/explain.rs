//! Human readable explanation attached to every decision

use crate::protocol::RoutingMethod;
use crate::routing::expert::Expert;
use crate::routing::strategy::Strategy;

pub const MAX_EXPLAINED_KEYWORDS: usize = 5;

/// What the primary expert was chosen on
#[derive(Debug, Clone, PartialEq)]
pub enum Basis<'a> {
    Keywords(&'a [String]),
    TypeClassification,
    Complexity(u8),
    Fallback(&'a str),
}

fn describe_basis(basis: &Basis<'_>) -> String {
    match basis {
        Basis::Keywords(keywords) if !keywords.is_empty() => {
            let shown: Vec<&str> = keywords
                .iter()
                .take(MAX_EXPLAINED_KEYWORDS)
                .map(String::as_str)
                .collect();
            format!("keywords: {}", shown.join(", "))
        }
        Basis::Keywords(_) => "best available match".to_string(),
        Basis::TypeClassification => "type classification".to_string(),
        Basis::Complexity(score) => format!("complexity score {score}/10"),
        Basis::Fallback(reason) => format!("fallback ({reason})"),
    }
}

fn describe_strategy(strategy: Strategy, parallel: &[Expert], method: RoutingMethod) -> String {
    match (method, strategy) {
        (RoutingMethod::ComplexityBased, _) => "task decomposition required".to_string(),
        (_, Strategy::SingleExpert) => "single expert dispatch".to_string(),
        (_, Strategy::MultiExpertParallel) => {
            let names: Vec<&str> = parallel.iter().map(Expert::as_str).collect();
            format!("parallel dispatch with {}", names.join(", "))
        }
        (_, Strategy::SingleExpertLowConfidence) => "low confidence, single expert".to_string(),
    }
}

/// `Routed to <expert> (<pct>% confidence) based on <basis>; <strategy> [via <method>]`
pub fn explain(
    primary: &Expert,
    confidence: f64,
    basis: &Basis<'_>,
    strategy: Strategy,
    parallel: &[Expert],
    method: RoutingMethod,
) -> String {
    let pct = (confidence.clamp(0.0, 1.0) * 100.0).round() as u8;
    format!(
        "Routed to {primary} ({pct}% confidence) based on {}; {} [via {method}]",
        describe_basis(basis),
        describe_strategy(strategy, parallel, method),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_explanation_caps_keywords() {
        let keywords: Vec<String> = ["a", "b", "c", "d", "e", "f"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let text = explain(
            &Expert::Security,
            0.87,
            &Basis::Keywords(&keywords),
            Strategy::SingleExpert,
            &[],
            RoutingMethod::Keyword,
        );

        assert_eq!(
            text,
            "Routed to security (87% confidence) based on keywords: a, b, c, d, e; single expert dispatch [via keyword]"
        );
    }

    #[test]
    fn test_type_classification_explanation() {
        let text = explain(
            &Expert::Cicd,
            0.95,
            &Basis::TypeClassification,
            Strategy::SingleExpert,
            &[],
            RoutingMethod::TypeClassification,
        );
        assert!(text.contains("based on type classification"));
        assert!(text.ends_with("[via type-classification]"));
    }

    #[test]
    fn test_parallel_and_empty_keywords() {
        let text = explain(
            &Expert::Security,
            0.6,
            &Basis::Keywords(&[]),
            Strategy::MultiExpertParallel,
            &[Expert::Inventory, Expert::Cicd],
            RoutingMethod::Semantic,
        );
        assert!(text.contains("best available match"));
        assert!(text.contains("parallel dispatch with inventory, cicd"));
    }

    #[test]
    fn test_complexity_explanation() {
        let text = explain(
            &Expert::Initializer,
            1.0,
            &Basis::Complexity(7),
            Strategy::SingleExpert,
            &[],
            RoutingMethod::ComplexityBased,
        );
        assert_eq!(
            text,
            "Routed to initializer (100% confidence) based on complexity score 7/10; task decomposition required [via complexity-based]"
        );
    }
}
