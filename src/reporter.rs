use std::time::Duration;

use crate::events::Event;

/// Reporter aggregates events and produces human or JSON output.
pub struct Reporter {
    events: Vec<Event>,
    json_mode: bool,
}

impl Reporter {
    pub fn new(json_mode: bool) -> Self {
        Self {
            events: Vec::new(),
            json_mode,
        }
    }

    pub fn record(&mut self, event: Event) {
        if self.json_mode {
            // Emit JSON line to stdout
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{}", line);
            }
        }
        self.events.push(event);
    }

    pub fn json_mode(&self) -> bool {
        self.json_mode
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// One-line human summary of a finished run.
    pub fn summary(&self, bytes: u64, elapsed: Duration) -> String {
        let mut completed = 0;
        let mut skipped = 0;
        for event in &self.events {
            match event {
                Event::TaskCompleted { .. } => completed += 1,
                Event::TaskSkipped { .. } => skipped += 1,
                _ => {}
            }
        }
        let elapsed = Duration::from_millis(elapsed.as_millis() as u64);
        let mut line = format!(
            "{} task(s) done, {} of content in {}",
            completed,
            bytesize::ByteSize::b(bytes),
            humantime::format_duration(elapsed)
        );
        if skipped > 0 {
            line.push_str(&format!(", {} skipped", skipped));
        }
        line
    }
}
