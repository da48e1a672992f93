use crate::config::settings::Settings;
use crate::notification::domain::notification_channel::{ChannelProvider, NotificationChannel};

use super::http_channel::HttpChannel;
use super::text_endpoint_channel::TextEndpointChannel;
use super::udp_channel::UdpChannel;

/// Builds the channels switched on in the live settings, per call.
#[derive(Clone, Copy, Debug, Default)]
pub struct SettingsChannelProvider;

impl ChannelProvider for SettingsChannelProvider {
    fn channels(&self, s: &Settings) -> Vec<Box<dyn NotificationChannel>> {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
        if s.use_web {
            channels.push(Box::new(HttpChannel::new(&s.web_service_url, &s.custom_message_http)));
        }
        if s.use_udp {
            channels.push(Box::new(UdpChannel::new(
                &s.udp_service_url,
                s.udp_service_port,
                &s.custom_message_udp,
            )));
        }
        if s.use_text_endpoint {
            channels.push(Box::new(TextEndpointChannel::new(
                &s.text_endpoint_host,
                &s.text_endpoint_user,
                &s.text_endpoint_pass,
                &s.text_endpoint_input,
            )));
        }
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::domain::notification_channel::ChannelKind;
    use std::path::Path;

    fn kinds(s: &Settings) -> Vec<ChannelKind> {
        SettingsChannelProvider.channels(s).iter().map(|c| c.kind()).collect()
    }

    #[test]
    fn test_defaults_enable_nothing() {
        assert!(kinds(&Settings::defaults(Path::new("/tmp"))).is_empty());
    }

    #[test]
    fn test_enabled_channels_follow_settings() {
        let mut s = Settings::defaults(Path::new("/tmp"));
        s.use_udp = true;
        s.use_text_endpoint = true;
        assert_eq!(kinds(&s), vec![ChannelKind::Udp, ChannelKind::TextEndpoint]);
        s.use_web = true;
        assert_eq!(
            kinds(&s),
            vec![ChannelKind::Http, ChannelKind::Udp, ChannelKind::TextEndpoint]
        );
    }
}
