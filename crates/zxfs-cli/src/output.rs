//! Output formatting for human and JSON consumers
//!
//! Messages are rendered to strings first so the formats can be tested
//! without capturing stdout.

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output with status marks and indentation
pub struct HumanFormatter;

impl HumanFormatter {
    fn render_success(message: &str) -> String {
        format!("\u{2713} {}", message)
    }

    fn render_error(message: &str) -> String {
        format!("\u{2717} Error: {}", message)
    }

    fn render_warn(message: &str) -> String {
        format!("\u{26a0} Warning: {}", message)
    }

    fn render_info(message: &str) -> String {
        if message.is_empty() {
            String::new()
        } else {
            format!("  {}", message)
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("{}", Self::render_success(message));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", Self::render_error(message));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", Self::render_warn(message));
    }
    fn info(&self, message: &str) {
        println!("{}", Self::render_info(message));
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// One JSON document per message; `info` lines are dropped
pub struct JsonFormatter;

impl JsonFormatter {
    fn render_success(message: &str) -> serde_json::Value {
        serde_json::json!({"success": true, "message": message})
    }

    fn render_error(message: &str) -> serde_json::Value {
        serde_json::json!({"success": false, "error": message})
    }

    fn render_warn(message: &str) -> serde_json::Value {
        serde_json::json!({"level": "warning", "message": message})
    }
}

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", Self::render_success(message));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", Self::render_error(message));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", Self::render_warn(message));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    match OutputFormat::from_flag(json) {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}
