use std::net::UdpSocket;

use crate::notification::domain::message_template::{MessageTemplate, NotificationEvent};
use crate::notification::domain::notification_channel::{
    ChannelError, ChannelKind, NotificationChannel,
};

/// Sends the rendered template as one datagram.
pub struct UdpChannel {
    host: String,
    port: u16,
    template: MessageTemplate,
}

impl UdpChannel {
    pub fn new(host: &str, port: u16, template: &str) -> Self {
        Self {
            host: host.trim().to_string(),
            port,
            template: MessageTemplate::new(template),
        }
    }
}

impl NotificationChannel for UdpChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Udp
    }

    fn send(&self, event: &NotificationEvent) -> Result<(), ChannelError> {
        if self.host.is_empty() || self.port == 0 {
            return Err(ChannelError::Misconfigured(format!(
                "udp target '{}:{}'",
                self.host, self.port
            )));
        }
        let payload = self.template.render(event);
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.send_to(payload.as_bytes(), (self.host.as_str(), self.port))?;
        log::debug!("Sent UDP message to {}:{}", self.host, self.port);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn event() -> NotificationEvent {
        NotificationEvent {
            identity: "alice".into(),
            image_url: "u".into(),
            fired_at: 1.0,
        }
    }

    #[test]
    fn test_datagram_carries_rendered_template() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        UdpChannel::new("127.0.0.1", port, "seen [[name]]")
            .send(&event())
            .unwrap();

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"seen alice");
    }

    #[test]
    fn test_missing_host_or_port_is_misconfigured() {
        for channel in [UdpChannel::new("", 9999, "x"), UdpChannel::new("127.0.0.1", 0, "x")] {
            assert!(matches!(
                channel.send(&event()),
                Err(ChannelError::Misconfigured(_))
            ));
        }
    }
}
