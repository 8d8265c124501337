/// Builds the mandatory reasoning string: mentions the incident type and the
/// rule that produced the decision, and is always at least 10 characters.
/// Centralized so every branch of [`crate::Decider::decide`] produces the
/// same shape.
pub fn build(incident_type: &str, rule: &str) -> String {
    format!("incident_type={incident_type}: {rule}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_incident_type_and_rule_and_meets_minimum_length() {
        let reasoning = build("service_down", "no autonomy at N0, observation only");
        assert!(reasoning.len() >= 10);
        assert!(reasoning.contains("service_down"));
        assert!(reasoning.contains("observation only"));
    }
}
