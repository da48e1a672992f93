pub mod event_image_store;
pub mod http_channel;
pub mod settings_channel_provider;
pub mod text_endpoint_channel;
pub mod udp_channel;
