//! Native setter bypass
//!
//! Builds the script that sets a form field the way a user's keystrokes
//! would appear to a React-style framework: the prototype's own `value`
//! setter runs (skipping the framework's instance override), then the
//! notification events fire.

/// Events dispatched after a value change, in dispatch order
pub const NOTIFY_EVENTS: [&str; 3] = ["input", "change", "blur"];

/// Script that sets the field matching `css` to `value`.
///
/// Evaluates to the field's value read back after the events fired, or
/// `null` when no element matches.
pub fn set_value_script(css: &str, value: &str) -> String {
    // serde_json string encoding is a valid JS string literal
    let css = serde_json::Value::from(css).to_string();
    let value = serde_json::Value::from(value).to_string();
    let events = serde_json::Value::from(NOTIFY_EVENTS.to_vec()).to_string();

    format!(
        r#"(() => {{
    const el = document.querySelector({css});
    if (!el) return null;
    const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype
        : el instanceof HTMLSelectElement ? HTMLSelectElement.prototype
        : HTMLInputElement.prototype;
    const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
    setter.call(el, {value});
    for (const type of {events}) {{
        el.dispatchEvent(new Event(type, {{ bubbles: true }}));
    }}
    return el.value;
}})()"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_uses_prototype_setter() {
        let script = set_value_script(r#"[id="a.b"]"#, "Ada");
        assert!(script.contains("Object.getOwnPropertyDescriptor(proto, 'value').set"));
        assert!(script.contains("setter.call(el, \"Ada\")"));
        assert!(script.contains(r#"document.querySelector("[id=\"a.b\"]")"#));
    }

    #[test]
    fn test_events_fire_in_order_and_bubble() {
        let script = set_value_script("#x", "1");
        assert!(script.contains(r#"["input","change","blur"]"#));
        assert!(script.contains("bubbles: true"));
    }

    #[test]
    fn test_values_are_escaped() {
        let script = set_value_script("#x", "O'Brien \"Jr\"\n");
        assert!(script.contains(r#""O'Brien \"Jr\"\n""#));
    }
}
