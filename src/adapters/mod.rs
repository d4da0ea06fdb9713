//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements / provides | Connects to                  |
//! |--------------|-----------------------|------------------------------|
//! | `wifi`       | ConnectivityPort      | ESP-IDF WiFi STA             |
//! | `mqtt`       | StatusPublisher +     | broker session (esp-idf-svc) |
//! |              | ChannelEvents feed    |                              |
//! | `smart_plug` | set-level source      | voice-assistant discovery    |
//! | `ota`        | update endpoint       | HTTP listener + esp-ota      |
//! | `log_sink`   | StatusPublisher       | serial log output            |
//! | `time`       | monotonic clock       | ESP high-resolution timer    |

pub mod log_sink;
pub mod mqtt;
pub mod ota;
pub mod smart_plug;
pub mod time;
pub mod wifi;
