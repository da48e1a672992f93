use super::event_log::format_local;

/// Values substituted into a channel payload.
#[derive(Clone, Debug, PartialEq)]
pub struct NotificationEvent {
    pub identity: String,
    pub image_url: String,
    /// Epoch seconds at which the notification fired.
    pub fired_at: f64,
}

/// Payload template with `[[name]]`, `[[time]]`, `[[date]]`,
/// `[[image_url]]` and `[[timestamp]]` placeholders.
#[derive(Clone, Debug)]
pub struct MessageTemplate {
    text: String,
}

impl MessageTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn render(&self, event: &NotificationEvent) -> String {
        self.text
            .replace("[[name]]", &event.identity)
            .replace("[[time]]", &format_local(event.fired_at, "%H:%M:%S"))
            .replace("[[date]]", &format_local(event.fired_at, "%Y-%m-%d"))
            .replace("[[image_url]]", &event.image_url)
            .replace("[[timestamp]]", &event.fired_at.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> NotificationEvent {
        NotificationEvent {
            identity: "alice".into(),
            image_url: "http://cam/event-image/alice_1.jpg".into(),
            fired_at: 1_700_000_000.5,
        }
    }

    #[test]
    fn test_all_placeholders_substituted() {
        let t = MessageTemplate::new("[[name]]|[[time]]|[[date]]|[[image_url]]|[[timestamp]]");
        let out = t.render(&event());
        assert!(!out.contains("[["), "{out}");
        let parts: Vec<&str> = out.split('|').collect();
        assert_eq!(parts[0], "alice");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 10);
        assert_eq!(parts[3], "http://cam/event-image/alice_1.jpg");
        assert_eq!(parts[4], "1700000000.5");
    }

    #[test]
    fn test_repeated_placeholder_and_plain_text() {
        let out = MessageTemplate::new("hi [[name]], bye [[name]]").render(&event());
        assert_eq!(out, "hi alice, bye alice");
        assert_eq!(MessageTemplate::new("static").render(&event()), "static");
    }
}
