use serde_json::Value;

/// Formats an amount in quetzales with two decimals.
///
/// Missing or unparseable amounts read as zero.
pub fn format_q(amount: &Value) -> String {
    let parsed = match amount {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed.filter(|n| n.is_finite()) {
        Some(n) => format!("Q{:.2}", n),
        None => "Q0.00".to_string(),
    }
}
