/// Receiver for non-fatal conditions the engines recover from.
pub trait DiagnosticSink {
    fn warn(&mut self, message: &str);
}

/// Forwards warnings to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn warn(&mut self, message: &str) {
        log::warn!("{message}");
    }
}

/// Collects warnings in memory.
impl DiagnosticSink for Vec<String> {
    fn warn(&mut self, message: &str) {
        self.push(message.to_string());
    }
}
