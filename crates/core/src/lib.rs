pub mod shared {
    pub mod bounding_box;
    pub mod clock;
    pub mod constants;
    pub mod frame;
}

pub mod config {
    pub mod config_store;
    pub mod settings;
}

pub mod trigger {
    pub mod domain {
        pub mod trigger_channel;
        pub mod trigger_descriptor;
        pub mod trigger_window;
    }
    pub mod infrastructure {
        pub mod file_trigger_channel;
    }
    pub mod trigger_watch;
}

pub mod capture {
    pub mod domain {
        pub mod video_capture;
    }
    pub mod infrastructure;
    pub mod frame_source;
}

pub mod detection {
    pub mod domain {
        pub mod cadence_policy;
        pub mod face_detector;
        pub mod face_encoder;
        pub mod face_matcher;
        pub mod face_tracker;
        pub mod frame_enhancement;
        pub mod tracked_face;
    }
    pub mod infrastructure;
}

pub mod overlay {
    pub mod glyphs;
    pub mod overlay_renderer;
}

pub mod notification {
    pub mod domain {
        pub mod event_log;
        pub mod message_template;
        pub mod notification_channel;
        pub mod notifier;
    }
    pub mod channel_dispatcher;
    pub mod infrastructure;
    pub mod notification_throttle;
    pub mod retention_sweeper;
}

pub mod pipeline {
    pub mod frame_queue;
    pub mod live_pipeline;
    pub mod processor;
}
